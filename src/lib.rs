//! remapfs - user namespace id remapping
//!
//! translates between a container's uid/gid space and the host's, derives the
//! remapping ranges from the subordinate id files, and rewrites ownership of
//! whole directory trees so root-owned files line up with the container's root.
//!
//! # Core concepts
//!
//! - **IdRange**: a contiguous block of container ids mapped linearly onto host ids
//! - **IdentityMapping**: ordered uid and gid range lists; first match wins
//! - **Remapped root**: the host uid/gid that stands in for root inside the container
//! - **Translation**: forward turns host root (0) into container root, inverse undoes it
//!
//! # Example usage
//!
//! ```no_run
//! use remapfs::{ops, HostFs, IdentitySource};
//! use std::path::Path;
//!
//! let source = IdentitySource::system();
//!
//! // ranges from /etc/subuid and /etc/subgid, plus container root
//! let mapping = source.build_identity_mapping("alice", "alice").unwrap();
//! let (root_uid, _root_gid) = mapping.root_pair().unwrap();
//!
//! // hand the rootfs over to container root
//! let options = ops::TranslateOptions::default();
//! ops::translate_tree(&HostFs, Path::new("/rootfs"), root_uid, &options).unwrap();
//! ```

mod config;
mod error;
mod identity;
mod mapping;

pub mod fs;
pub mod ops;

pub use config::Config;
pub use error::{Error, Result};
pub use fs::{FileOwnership, FileType, FsOps, HostFs};
pub use identity::{
    parse_subordinate_ranges, IdentityLookup, IdentityPaths, IdentitySource, LookupPolicy,
    ProvisionFn, Provisioner, SystemLookup, UserRecord, DEFAULT_ACCOUNT, DEFAULT_SPECIFIER,
};
pub use mapping::{
    current_gid_map, current_uid_map, get_root_uid_gid, host_max_id, parse_id_map, to_container,
    to_host, Direction, IdKind, IdRange, IdentityMapping, PROC_GID_MAP, PROC_UID_MAP,
};
