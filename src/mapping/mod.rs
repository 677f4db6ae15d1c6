mod proc;
mod range;

pub use proc::{
    current_gid_map, current_uid_map, host_max_id, parse_id_map, PROC_GID_MAP, PROC_UID_MAP,
};
pub use range::{
    get_root_uid_gid, to_container, to_host, Direction, IdKind, IdRange, IdentityMapping,
};
