use std::fmt;
use std::process::Command;

use crate::error::{Error, Result};
use crate::identity::{IdentityLookup, SystemLookup};

/// creates a group and user of the given name, returning the new (uid, gid)
pub type ProvisionFn = dyn Fn(&str) -> Result<(u32, u32)> + Send + Sync;

/// account provisioning capability, chosen once at startup
pub enum Provisioner {
    Supported(Box<ProvisionFn>),
    Unsupported,
}

impl Provisioner {
    /// pick the provisioner for the running platform
    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            Self::Supported(Box::new(add_remapped_root_user))
        } else {
            Self::Unsupported
        }
    }

    pub fn provision(&self, name: &str) -> Result<(u32, u32)> {
        match self {
            Self::Supported(provision) => {
                let (uid, gid) = provision(name)?;
                tracing::info!(account = name, uid, gid, "provisioned remapped root account");
                Ok((uid, gid))
            }
            Self::Unsupported => Err(Error::ProvisioningUnsupported),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supported(_) => f.write_str("Provisioner::Supported"),
            Self::Unsupported => f.write_str("Provisioner::Unsupported"),
        }
    }
}

/// add a system group and a matching system user through the shadow utils
fn add_remapped_root_user(name: &str) -> Result<(u32, u32)> {
    run_tool(name, "groupadd", &["--system", name])?;
    run_tool(
        name,
        "useradd",
        &[
            "--system",
            "--no-create-home",
            "--shell",
            "/bin/false",
            "--gid",
            name,
            name,
        ],
    )?;

    let user = SystemLookup.lookup_user(name)?;
    Ok((user.uid, user.gid))
}

fn run_tool(name: &str, program: &str, args: &[&str]) -> Result<()> {
    tracing::debug!(program, ?args, "running account tool");
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| Error::Provisioning {
            name: name.to_string(),
            message: format!("failed to execute {}: {}", program, e),
        })?;

    if !status.success() {
        return Err(Error::Provisioning {
            name: name.to_string(),
            message: format!("{} exited with {}", program, status),
        });
    }
    Ok(())
}
