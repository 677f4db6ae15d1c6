pub mod read;
pub mod write;

use std::path::{Path, PathBuf};

use crate::error::Result;

pub use read::{list_dir, FileOwnership, FileType};
pub use write::{chmod, lchown, mkdir_all_as, mkdir_as};

/// filesystem primitives used by the ownership translator
pub trait FsOps {
    /// stat an entry without following symlinks
    fn ownership(&self, path: &Path) -> Result<FileOwnership>;

    /// entries of a directory as full paths, in a stable order
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// chown that does not follow symlinks
    fn lchown(&self, path: &Path, uid: u32, gid: u32) -> Result<()>;

    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;
}

/// the real filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct HostFs;

impl FsOps for HostFs {
    fn ownership(&self, path: &Path) -> Result<FileOwnership> {
        FileOwnership::from_path(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        list_dir(path)
    }

    fn lchown(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
        write::lchown(path, uid, gid)
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        write::chmod(path, mode)
    }
}
