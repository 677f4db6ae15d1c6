//! subordinate id ranges and remapped root resolution

mod lookup;
mod provision;
mod root;
mod subid;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mapping::{IdKind, IdRange, IdentityMapping, PROC_UID_MAP};

pub use lookup::{IdentityLookup, SystemLookup, UserRecord};
pub use provision::{ProvisionFn, Provisioner};
pub use root::DEFAULT_SPECIFIER;
pub use subid::parse_subordinate_ranges;

pub const DEFAULT_ACCOUNT: &str = "remaproot";

/// locations of the identity files consulted by [`IdentitySource`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPaths {
    pub subuid: PathBuf,
    pub subgid: PathBuf,
    /// process identity map used for [`crate::host_max_id`]
    pub uid_map: PathBuf,
}

impl Default for IdentityPaths {
    fn default() -> Self {
        Self {
            subuid: PathBuf::from("/etc/subuid"),
            subgid: PathBuf::from("/etc/subgid"),
            uid_map: PathBuf::from(PROC_UID_MAP),
        }
    }
}

/// what to do when the account behind a mapping cannot be resolved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LookupPolicy {
    /// propagate the lookup error
    #[default]
    Strict,
    /// log it and fall back to an empty (identity) mapping
    BestEffort,
}

/// builds id mappings and remapped root pairs from system identity data
#[derive(Debug)]
pub struct IdentitySource<L = SystemLookup> {
    paths: IdentityPaths,
    lookup: L,
    provisioner: Provisioner,
    policy: LookupPolicy,
    default_account: String,
    container_root_account: String,
}

impl IdentitySource<SystemLookup> {
    /// system databases, default paths, platform provisioner
    pub fn system() -> Self {
        Self::new(IdentityPaths::default(), SystemLookup).with_provisioner(Provisioner::detect())
    }
}

impl<L: IdentityLookup> IdentitySource<L> {
    /// source with provisioning disabled; see [`Self::with_provisioner`]
    pub fn new(paths: IdentityPaths, lookup: L) -> Self {
        Self {
            paths,
            lookup,
            provisioner: Provisioner::Unsupported,
            policy: LookupPolicy::Strict,
            default_account: DEFAULT_ACCOUNT.to_string(),
            container_root_account: DEFAULT_ACCOUNT.to_string(),
        }
    }

    pub fn with_provisioner(mut self, provisioner: Provisioner) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn with_policy(mut self, policy: LookupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// account substituted for the `default` remapped root token
    pub fn with_default_account(mut self, name: impl Into<String>) -> Self {
        self.default_account = name.into();
        self
    }

    /// account whose uid stands in for root during tree translation
    pub fn with_container_root_account(mut self, name: impl Into<String>) -> Self {
        self.container_root_account = name.into();
        self
    }

    pub fn paths(&self) -> &IdentityPaths {
        &self.paths
    }

    /// ranges delegated to `name` in the configured subordinate id file
    pub fn subordinate_ranges(&self, name: &str, kind: IdKind) -> Result<Vec<IdRange>> {
        let path: &Path = match kind {
            IdKind::Uid => &self.paths.subuid,
            IdKind::Gid => &self.paths.subgid,
        };
        parse_subordinate_ranges(path, name, kind, &self.lookup)
    }

    /// uid/gid mappings for a user/group pair.
    ///
    /// the subordinate ranges of both files come first; each map then gets a
    /// trailing single-id range sending container root onto the real account
    /// (the user's uid, the group's gid). both files are always read, so an
    /// unreadable or malformed file fails under either policy.
    pub fn build_identity_mapping(
        &self,
        username: &str,
        groupname: &str,
    ) -> Result<IdentityMapping> {
        let uid_ranges = self.subordinate_ranges(username, IdKind::Uid);
        let uid_map = self.soften(uid_ranges, username, groupname)?;
        let gid_ranges = self.subordinate_ranges(groupname, IdKind::Gid);
        let gid_map = self.soften(gid_ranges, username, groupname)?;
        let root = self.lookup.lookup_user(username).and_then(|user| {
            let gid = self.lookup.lookup_group(groupname)?;
            Ok((user.uid, gid))
        });
        let root = self.soften(root, username, groupname)?;

        match (uid_map, gid_map, root) {
            (Some(mut uid_map), Some(mut gid_map), Some((uid, gid))) => {
                uid_map.push(IdRange::new(0, uid, 1));
                gid_map.push(IdRange::new(0, gid, 1));
                Ok(IdentityMapping::new(uid_map, gid_map))
            }
            _ => Ok(IdentityMapping::default()),
        }
    }

    /// under [`LookupPolicy::BestEffort`] an account lookup failure becomes
    /// `None`; every other error propagates
    fn soften<T>(
        &self,
        result: Result<T>,
        username: &str,
        groupname: &str,
    ) -> Result<Option<T>> {
        match (result, self.policy) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(err @ Error::IdentityLookupFailed { .. }), LookupPolicy::BestEffort) => {
                tracing::warn!(
                    username,
                    groupname,
                    error = %err,
                    "cannot resolve remapping account, using identity mapping"
                );
                Ok(None)
            }
            (Err(err), _) => Err(err),
        }
    }

    /// highest assignable host id, from the configured process identity map
    pub fn host_max_id(&self) -> Result<u32> {
        crate::mapping::host_max_id(&self.paths.uid_map)
    }
}
