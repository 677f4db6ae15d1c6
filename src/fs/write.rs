use std::fs::{self, DirBuilder, Permissions};
use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;

use nix::unistd::{chown, Gid, Uid};

use crate::error::{IoResultExt, Result};

/// change ownership without following a trailing symlink
pub fn lchown(path: &Path, uid: u32, gid: u32) -> Result<()> {
    std::os::unix::fs::lchown(path, Some(uid), Some(gid)).with_path(path)
}

/// set permission bits (follows symlinks, so never call it on one)
pub fn chmod(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode & 0o7777)).with_path(path)
}

/// create a directory and chown it to `uid`/`gid`.
/// an existing directory is not an error; its ownership is still changed.
pub fn mkdir_as(path: &Path, mode: u32, uid: u32, gid: u32) -> Result<()> {
    create_dir(path, mode, false)?;
    chown_dir(path, uid, gid)
}

/// like [`mkdir_as`] but creates missing parents too.
/// only the final path component is chowned.
pub fn mkdir_all_as(path: &Path, mode: u32, uid: u32, gid: u32) -> Result<()> {
    create_dir(path, mode, true)?;
    chown_dir(path, uid, gid)
}

fn create_dir(path: &Path, mode: u32, recursive: bool) -> Result<()> {
    match DirBuilder::new().recursive(recursive).mode(mode).create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e).with_path(path),
    }
}

fn chown_dir(path: &Path, uid: u32, gid: u32) -> Result<()> {
    chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid))).with_path(path)?;
    tracing::debug!(path = %path.display(), uid, gid, "created directory");
    Ok(())
}
