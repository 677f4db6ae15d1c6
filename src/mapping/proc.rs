use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::mapping::IdRange;

pub const PROC_UID_MAP: &str = "/proc/self/uid_map";
pub const PROC_GID_MAP: &str = "/proc/self/gid_map";

/// parse /proc/<pid>/uid_map or gid_map format
/// format: "container_start host_start count" per line, whitespace separated
pub fn parse_id_map(content: &str, source: &Path) -> Result<Vec<IdRange>> {
    let mut ranges = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(Error::NamespaceParseError(source.to_path_buf()));
        }

        let [container_id, host_id, size] = parse_triplet(&parts, source)?;
        ranges.push(IdRange::new(container_id, host_id, size));
    }

    Ok(ranges)
}

fn parse_triplet(parts: &[&str], source: &Path) -> Result<[u32; 3]> {
    let mut out = [0u32; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| Error::NamespaceParseError(source.to_path_buf()))?;
    }
    Ok(out)
}

/// highest assignable host id, taken from the length column of the first
/// line of a process identity-map file.
///
/// only the first three tokens are consumed; anything after them is ignored.
pub fn host_max_id(path: &Path) -> Result<u32> {
    let content = std::fs::read_to_string(path).with_path(path)?;
    let parts: Vec<&str> = content
        .lines()
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .take(3)
        .collect();
    if parts.len() != 3 {
        return Err(Error::NamespaceParseError(path.to_path_buf()));
    }

    let [_, _, size] = parse_triplet(&parts, path)?;
    tracing::debug!(path = %path.display(), max_id = size, "read host id range");
    Ok(size)
}

/// read current process uid map from /proc/self/uid_map
pub fn current_uid_map() -> Result<Vec<IdRange>> {
    read_id_map(Path::new(PROC_UID_MAP))
}

/// read current process gid map from /proc/self/gid_map
pub fn current_gid_map() -> Result<Vec<IdRange>> {
    read_id_map(Path::new(PROC_GID_MAP))
}

fn read_id_map(path: &Path) -> Result<Vec<IdRange>> {
    let content = std::fs::read_to_string(path).with_path(path)?;
    parse_id_map(&content, path)
}
