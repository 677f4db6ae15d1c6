use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::identity::IdentityLookup;
use crate::mapping::{IdKind, IdRange};

/// collect the ranges delegated to `name` in a subordinate id file
/// (/etc/subuid or /etc/subgid format: `name:start:length` per line).
///
/// every matching line is kept, in file order. the container side of each
/// range is `name`'s own numeric id in the `kind` id space, looked up once on
/// the first match. every line must have three fields; start and length are
/// only checked on `name`'s own lines, other names are skipped.
pub fn parse_subordinate_ranges<L: IdentityLookup + ?Sized>(
    path: &Path,
    name: &str,
    kind: IdKind,
    lookup: &L,
) -> Result<Vec<IdRange>> {
    let file = File::open(path).with_path(path)?;
    let mut ranges = Vec::new();
    let mut own_id = None;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_path(path)?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let malformed = || Error::MalformedIdentityFile {
            path: path.to_path_buf(),
            line_number: index + 1,
            line: text.to_string(),
        };
        let fields: Vec<&str> = text.split(':').collect();
        let [owner, start, length] = fields[..] else {
            return Err(malformed());
        };
        if owner != name {
            continue;
        }
        let (start, length) = parse_range(start, length).ok_or_else(malformed)?;

        let container_id = match own_id {
            Some(id) => id,
            None => {
                let id = lookup.lookup_id(name, kind)?;
                own_id = Some(id);
                id
            }
        };
        ranges.push(IdRange::new(container_id, start, length));
    }

    tracing::debug!(
        path = %path.display(),
        name,
        ranges = ranges.len(),
        "parsed subordinate id ranges"
    );
    Ok(ranges)
}

fn parse_range(start: &str, length: &str) -> Option<(u32, u32)> {
    let start = start.parse().ok()?;
    let length = length.parse().ok()?;
    if length == 0 {
        return None;
    }
    Some((start, length))
}
