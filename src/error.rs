use std::path::PathBuf;

use crate::mapping::{Direction, IdKind};

/// error type for remapfs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid user/group specification for remapped root: {0:?}")]
    InvalidRootSpec(String),

    #[error("{kind} lookup failed for {name:?}: {reason}")]
    IdentityLookupFailed {
        kind: IdKind,
        name: String,
        reason: String,
    },

    #[error("cannot parse subordinate id file {path} at line {line_number}: {line:?}")]
    MalformedIdentityFile {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    #[error("{kind} {id} cannot be mapped {direction}")]
    UnmappableId {
        id: u32,
        kind: IdKind,
        direction: Direction,
    },

    #[error("no support for adding user/group on this platform")]
    ProvisioningUnsupported,

    #[error("failed to provision account {name:?}: {message}")]
    Provisioning { name: String, message: String },

    #[error("failed to parse namespace mapping from {0}")]
    NamespaceParseError(PathBuf),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

impl<T> IoResultExt<T> for nix::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|errno| Error::Io {
            path: path.into(),
            source: std::io::Error::from_raw_os_error(errno as i32),
        })
    }
}
