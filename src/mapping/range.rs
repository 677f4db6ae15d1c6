use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// which id space a lookup belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Uid,
    Gid,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Uid => f.write_str("uid"),
            IdKind::Gid => f.write_str("gid"),
        }
    }
}

/// direction of a translation that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    ToHost,
    ToContainer,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToHost => f.write_str("to a host id"),
            Direction::ToContainer => f.write_str("to a container id"),
        }
    }
}

/// a single contiguous range in a uid/gid mapping
///
/// `container_id..container_id+size` maps linearly onto `host_id..host_id+size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    /// start of range inside the container
    pub container_id: u32,
    /// start of range on the host
    pub host_id: u32,
    /// number of ids in this range, never zero
    pub size: u32,
}

impl IdRange {
    pub fn new(container_id: u32, host_id: u32, size: u32) -> Self {
        Self {
            container_id,
            host_id,
            size,
        }
    }

    /// check if a container id falls within this range
    pub fn contains_container(&self, id: u32) -> bool {
        in_range(id, self.container_id, self.size)
    }

    /// check if a host id falls within this range
    pub fn contains_host(&self, id: u32) -> bool {
        in_range(id, self.host_id, self.size)
    }

    /// format for /proc/<pid>/uid_map or gid_map
    pub fn to_proc_format(&self) -> String {
        format!("{} {} {}", self.container_id, self.host_id, self.size)
    }
}

// widened so ranges reaching u32::MAX don't overflow
fn in_range(id: u32, start: u32, size: u32) -> bool {
    let id = u64::from(id);
    let start = u64::from(start);
    id >= start && id < start + u64::from(size)
}

/// translate a host id into the container's id space.
///
/// an empty mapping is the identity. ranges are searched in order and the
/// first one containing `host_id` wins.
pub fn to_container(host_id: u32, map: &[IdRange], kind: IdKind) -> Result<u32> {
    if map.is_empty() {
        return Ok(host_id);
    }
    map.iter()
        .find(|range| range.contains_host(host_id))
        .and_then(|range| range.container_id.checked_add(host_id - range.host_id))
        .ok_or(Error::UnmappableId {
            id: host_id,
            kind,
            direction: Direction::ToContainer,
        })
}

/// translate a container id into the host's id space.
///
/// an empty mapping is the identity. ranges are searched in order and the
/// first one containing `container_id` wins.
pub fn to_host(container_id: u32, map: &[IdRange], kind: IdKind) -> Result<u32> {
    if map.is_empty() {
        return Ok(container_id);
    }
    map.iter()
        .find(|range| range.contains_container(container_id))
        .and_then(|range| range.host_id.checked_add(container_id - range.container_id))
        .ok_or(Error::UnmappableId {
            id: container_id,
            kind,
            direction: Direction::ToHost,
        })
}

/// host uid/gid pair that stands in for root inside the container.
/// absent (empty) mappings resolve to the real root, 0.
pub fn get_root_uid_gid(uid_map: &[IdRange], gid_map: &[IdRange]) -> Result<(u32, u32)> {
    let uid = to_host(0, uid_map, IdKind::Uid)?;
    let gid = to_host(0, gid_map, IdKind::Gid)?;
    Ok((uid, gid))
}

/// uid and gid range lists for one remapping configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapping {
    pub uid_map: Vec<IdRange>,
    pub gid_map: Vec<IdRange>,
}

impl IdentityMapping {
    pub fn new(uid_map: Vec<IdRange>, gid_map: Vec<IdRange>) -> Self {
        Self { uid_map, gid_map }
    }

    /// no ranges at all; every translation is the identity
    pub fn is_empty(&self) -> bool {
        self.uid_map.is_empty() && self.gid_map.is_empty()
    }

    /// container root as seen from the host
    pub fn root_pair(&self) -> Result<(u32, u32)> {
        get_root_uid_gid(&self.uid_map, &self.gid_map)
    }

    pub fn uid_to_host(&self, uid: u32) -> Result<u32> {
        to_host(uid, &self.uid_map, IdKind::Uid)
    }

    pub fn gid_to_host(&self, gid: u32) -> Result<u32> {
        to_host(gid, &self.gid_map, IdKind::Gid)
    }

    pub fn uid_to_container(&self, uid: u32) -> Result<u32> {
        to_container(uid, &self.uid_map, IdKind::Uid)
    }

    pub fn gid_to_container(&self, gid: u32) -> Result<u32> {
        to_container(gid, &self.gid_map, IdKind::Gid)
    }
}
