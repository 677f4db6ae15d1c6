//! ownership translation between host root and container root

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::{FileOwnership, FsOps};

/// options for a tree translation
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// undo a previous translation: container root back to 0
    pub inverse: bool,
    /// decide what would change without touching the tree
    pub dry_run: bool,
}

/// result of a tree translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateStats {
    /// entries whose ownership was inspected
    pub examined: u64,
    /// entries that were rewritten (or would be in dry-run)
    pub rewritten: u64,
    /// entries left as they were
    pub unchanged: u64,
    /// entries already owned by container root before a forward pass
    pub already_remapped: u64,
}

/// what happened to a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Rewritten,
    Unchanged,
}

/// new owner for an entry, or None when it is left alone.
/// uid and gid are handled independently.
fn target_owner(
    ownership: &FileOwnership,
    container_root: u32,
    inverse: bool,
) -> Option<(u32, u32)> {
    let (from, to) = if inverse {
        (container_root, 0)
    } else {
        (0, container_root)
    };
    if ownership.uid != from && ownership.gid != from {
        return None;
    }

    let swap = |id: u32| if id == from { to } else { id };
    Some((swap(ownership.uid), swap(ownership.gid)))
}

fn already_remapped(ownership: &FileOwnership, container_root: u32, inverse: bool) -> bool {
    !inverse && (ownership.uid == container_root || ownership.gid == container_root)
}

/// translate the ownership of a single entry.
///
/// forward: uid/gid 0 becomes `container_root`. inverse: `container_root`
/// becomes 0. after a rewrite the original mode is put back with chmod,
/// except on symlinks where chmod would hit the target instead.
pub fn translate_entry<F: FsOps + ?Sized>(
    fs: &F,
    path: &Path,
    ownership: &FileOwnership,
    container_root: u32,
    options: &TranslateOptions,
) -> Result<EntryOutcome> {
    if already_remapped(ownership, container_root, options.inverse) {
        tracing::warn!(
            path = %path.display(),
            uid = ownership.uid,
            gid = ownership.gid,
            container_root,
            "entry already owned by container root"
        );
    }

    let Some((uid, gid)) = target_owner(ownership, container_root, options.inverse) else {
        return Ok(EntryOutcome::Unchanged);
    };

    if !options.dry_run {
        fs.lchown(path, uid, gid)?;
        if !ownership.is_symlink() {
            fs.chmod(path, ownership.mode)?;
        }
    }
    tracing::trace!(path = %path.display(), uid, gid, "rewrote ownership");

    Ok(EntryOutcome::Rewritten)
}

enum Pending {
    /// queue the directory's entries in listing order
    Enter(PathBuf),
    /// translate a file or symlink, or descend into a directory
    Visit(PathBuf),
    /// translate the directory itself once everything below it is done
    Leave(PathBuf),
}

/// translate every entry below `root`, then `root` itself.
///
/// directories are walked depth-first with an explicit worklist, entries in
/// listing order; symlinks are translated but never descended into. a
/// directory is translated only after its contents, so `root` is the last
/// entry touched. the first error
/// aborts the walk and leaves whatever was already rewritten in place.
pub fn translate_tree<F: FsOps + ?Sized>(
    fs: &F,
    root: &Path,
    container_root: u32,
    options: &TranslateOptions,
) -> Result<TranslateStats> {
    let mut stats = TranslateStats::default();
    let mut pending = vec![
        Pending::Leave(root.to_path_buf()),
        Pending::Enter(root.to_path_buf()),
    ];

    while let Some(next) = pending.pop() {
        match next {
            Pending::Enter(dir) => {
                // reversed so entries pop in listing order
                let entries = fs.read_dir(&dir)?;
                pending.extend(entries.into_iter().rev().map(Pending::Visit));
            }
            Pending::Visit(path) => {
                let ownership = fs.ownership(&path)?;
                if ownership.is_dir() {
                    pending.push(Pending::Leave(path.clone()));
                    pending.push(Pending::Enter(path));
                } else {
                    visit(fs, &path, &ownership, container_root, options, &mut stats)?;
                }
            }
            Pending::Leave(dir) => {
                let ownership = fs.ownership(&dir)?;
                visit(fs, &dir, &ownership, container_root, options, &mut stats)?;
            }
        }
    }

    tracing::info!(
        root = %root.display(),
        container_root,
        inverse = options.inverse,
        examined = stats.examined,
        rewritten = stats.rewritten,
        already_remapped = stats.already_remapped,
        "translated ownership"
    );
    Ok(stats)
}

fn visit<F: FsOps + ?Sized>(
    fs: &F,
    path: &Path,
    ownership: &FileOwnership,
    container_root: u32,
    options: &TranslateOptions,
    stats: &mut TranslateStats,
) -> Result<()> {
    stats.examined += 1;
    if already_remapped(ownership, container_root, options.inverse) {
        stats.already_remapped += 1;
    }
    match translate_entry(fs, path, ownership, container_root, options)? {
        EntryOutcome::Rewritten => stats.rewritten += 1,
        EntryOutcome::Unchanged => stats.unchanged += 1,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fs::{FileType, HostFs};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::{tempdir, TempDir};

    const X: u32 = 100000;

    /// real tree for structure and modes, in-memory table for ownership,
    /// so ownership can be rewritten without privileges
    #[derive(Default)]
    struct OverlayFs {
        owners: RefCell<HashMap<PathBuf, (u32, u32)>>,
        chowns: RefCell<Vec<PathBuf>>,
        chmods: RefCell<Vec<PathBuf>>,
        unreadable: Option<PathBuf>,
    }

    impl OverlayFs {
        fn set_owner(&self, path: &Path, uid: u32, gid: u32) {
            self.owners.borrow_mut().insert(path.to_path_buf(), (uid, gid));
        }

        fn owner(&self, path: &Path) -> (u32, u32) {
            self.owners.borrow().get(path).copied().unwrap_or((0, 0))
        }
    }

    impl FsOps for OverlayFs {
        fn ownership(&self, path: &Path) -> Result<FileOwnership> {
            let mut ownership = HostFs.ownership(path)?;
            (ownership.uid, ownership.gid) = self.owner(path);
            Ok(ownership)
        }

        fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
            if self.unreadable.as_deref() == Some(path) {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            HostFs.read_dir(path)
        }

        fn lchown(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
            self.chowns.borrow_mut().push(path.to_path_buf());
            self.set_owner(path, uid, gid);
            Ok(())
        }

        fn chmod(&self, path: &Path, _mode: u32) -> Result<()> {
            self.chmods.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    /// root/
    ///   etc/passwd
    ///   etc/ssl/cert
    ///   home/user/notes
    ///   link -> etc
    ///   top
    fn sample_tree() -> TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("etc/ssl")).unwrap();
        fs::create_dir_all(root.join("home/user")).unwrap();
        fs::write(root.join("etc/passwd"), "root:x:0:0").unwrap();
        fs::write(root.join("etc/ssl/cert"), "cert").unwrap();
        fs::write(root.join("home/user/notes"), "notes").unwrap();
        fs::write(root.join("top"), "top").unwrap();
        symlink("etc", root.join("link")).unwrap();
        dir
    }

    fn all_paths(root: &Path) -> Vec<PathBuf> {
        let mut paths = vec![root.to_path_buf()];
        let mut index = 0;
        while index < paths.len() {
            let path = paths[index].clone();
            if FileOwnership::from_path(&path).unwrap().is_dir() {
                paths.extend(HostFs.read_dir(&path).unwrap());
            }
            index += 1;
        }
        paths
    }

    fn ownership(uid: u32, gid: u32, file_type: FileType) -> FileOwnership {
        FileOwnership {
            file_type,
            uid,
            gid,
            mode: 0o100644,
        }
    }

    #[test]
    fn test_entry_forward_uid_and_gid_independent() {
        let overlay = OverlayFs::default();
        let path = Path::new("/x");
        let options = TranslateOptions::default();

        let outcome =
            translate_entry(&overlay, path, &ownership(0, 500, FileType::Regular), X, &options)
                .unwrap();
        assert_eq!(outcome, EntryOutcome::Rewritten);
        assert_eq!(overlay.owner(path), (X, 500));

        translate_entry(&overlay, path, &ownership(500, 0, FileType::Regular), X, &options)
            .unwrap();
        assert_eq!(overlay.owner(path), (500, X));
    }

    #[test]
    fn test_entry_inverse() {
        let overlay = OverlayFs::default();
        let path = Path::new("/x");
        let options = TranslateOptions {
            inverse: true,
            ..Default::default()
        };

        translate_entry(&overlay, path, &ownership(X, 7, FileType::Regular), X, &options)
            .unwrap();
        assert_eq!(overlay.owner(path), (0, 7));

        // real root is not touched by the inverse pass
        let outcome =
            translate_entry(&overlay, path, &ownership(0, 0, FileType::Regular), X, &options)
                .unwrap();
        assert_eq!(outcome, EntryOutcome::Unchanged);
    }

    #[test]
    fn test_entry_unrelated_owner_untouched() {
        let overlay = OverlayFs::default();
        let outcome = translate_entry(
            &overlay,
            Path::new("/x"),
            &ownership(1000, 1000, FileType::Regular),
            X,
            &TranslateOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome, EntryOutcome::Unchanged);
        assert!(overlay.chowns.borrow().is_empty());
        assert!(overlay.chmods.borrow().is_empty());
    }

    #[test]
    fn test_entry_symlink_never_chmod() {
        let overlay = OverlayFs::default();
        let path = Path::new("/link");
        translate_entry(
            &overlay,
            path,
            &ownership(0, 0, FileType::Symlink),
            X,
            &TranslateOptions::default(),
        )
        .unwrap();

        assert_eq!(overlay.chowns.borrow().as_slice(), [path.to_path_buf()]);
        assert!(overlay.chmods.borrow().is_empty());
    }

    #[test]
    fn test_tree_forward() {
        let dir = sample_tree();
        let root = dir.path();
        let overlay = OverlayFs::default();
        overlay.set_owner(&root.join("home/user/notes"), 1000, 0);
        overlay.set_owner(&root.join("home/user"), 1000, 1000);

        let stats = translate_tree(&overlay, root, X, &TranslateOptions::default()).unwrap();

        assert_eq!(overlay.owner(&root.join("etc/ssl/cert")), (X, X));
        assert_eq!(overlay.owner(&root.join("home/user/notes")), (1000, X));
        assert_eq!(overlay.owner(&root.join("home/user")), (1000, 1000));
        assert_eq!(overlay.owner(&root.join("link")), (X, X));
        assert_eq!(overlay.owner(root), (X, X));

        // root, etc, etc/passwd, etc/ssl, etc/ssl/cert, home, home/user,
        // home/user/notes, link, top
        assert_eq!(stats.examined, 10);
        assert_eq!(stats.rewritten, 9);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.already_remapped, 0);
    }

    #[test]
    fn test_tree_root_translated_last() {
        let dir = sample_tree();
        let root = dir.path();
        let overlay = OverlayFs::default();

        translate_tree(&overlay, root, X, &TranslateOptions::default()).unwrap();

        let chowns = overlay.chowns.borrow();
        assert_eq!(chowns.last().unwrap(), root);
        // a directory comes after everything inside it
        let position = |p: &Path| chowns.iter().position(|c| c == p).unwrap();
        assert!(position(&root.join("etc/ssl/cert")) < position(&root.join("etc/ssl")));
        assert!(position(&root.join("etc/ssl")) < position(&root.join("etc")));
    }

    #[test]
    fn test_tree_entries_in_listing_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("a")).unwrap();
        fs::write(root.join("a/inner"), "").unwrap();
        fs::write(root.join("b"), "").unwrap();
        fs::create_dir(root.join("c")).unwrap();

        let overlay = OverlayFs::default();
        translate_tree(&overlay, root, X, &TranslateOptions::default()).unwrap();

        assert_eq!(
            overlay.chowns.borrow().as_slice(),
            [
                root.join("a/inner"),
                root.join("a"),
                root.join("b"),
                root.join("c"),
                root.to_path_buf(),
            ]
        );
    }

    #[test]
    fn test_tree_symlink_not_descended_or_chmodded() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret"), "s").unwrap();

        let dir = tempdir().unwrap();
        let root = dir.path();
        symlink(outside.path(), root.join("escape")).unwrap();

        let overlay = OverlayFs::default();
        translate_tree(&overlay, root, X, &TranslateOptions::default()).unwrap();

        let chowns = overlay.chowns.borrow();
        assert!(chowns.contains(&root.join("escape")));
        assert!(!chowns.contains(&outside.path().join("secret")));
        assert!(!overlay.chmods.borrow().contains(&root.join("escape")));
    }

    #[test]
    fn test_tree_forward_then_inverse_restores() {
        let dir = sample_tree();
        let root = dir.path();
        let overlay = OverlayFs::default();
        overlay.set_owner(&root.join("top"), 1000, 0);
        overlay.set_owner(&root.join("etc/passwd"), 0, 42);
        overlay.set_owner(&root.join("home/user"), 1000, 1000);

        let before: Vec<_> = all_paths(root).iter().map(|p| overlay.owner(p)).collect();

        translate_tree(&overlay, root, X, &TranslateOptions::default()).unwrap();
        let inverse = TranslateOptions {
            inverse: true,
            ..Default::default()
        };
        translate_tree(&overlay, root, X, &inverse).unwrap();

        let after: Vec<_> = all_paths(root).iter().map(|p| overlay.owner(p)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_tree_already_remapped_is_not_fatal() {
        let dir = sample_tree();
        let root = dir.path();
        let overlay = OverlayFs::default();
        overlay.set_owner(&root.join("top"), X, X);
        overlay.set_owner(&root.join("etc/passwd"), X, 0);

        let stats = translate_tree(&overlay, root, X, &TranslateOptions::default()).unwrap();

        assert_eq!(stats.already_remapped, 2);
        assert_eq!(overlay.owner(&root.join("etc/passwd")), (X, X));
        assert_eq!(overlay.owner(&root.join("top")), (X, X));
    }

    #[test]
    fn test_tree_dry_run_changes_nothing() {
        let dir = sample_tree();
        let root = dir.path();
        let overlay = OverlayFs::default();
        let options = TranslateOptions {
            dry_run: true,
            ..Default::default()
        };

        let stats = translate_tree(&overlay, root, X, &options).unwrap();

        assert_eq!(stats.rewritten, 10);
        assert!(overlay.chowns.borrow().is_empty());
        assert!(overlay.chmods.borrow().is_empty());
    }

    #[test]
    fn test_tree_unreadable_subdir_aborts() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a"), "").unwrap();
        fs::create_dir_all(root.join("bad/deeper")).unwrap();
        fs::write(root.join("bad/below"), "").unwrap();
        fs::create_dir(root.join("c")).unwrap();
        fs::write(root.join("c/later"), "").unwrap();
        fs::write(root.join("z"), "").unwrap();

        let overlay = OverlayFs {
            unreadable: Some(root.join("bad")),
            ..Default::default()
        };

        let err = translate_tree(&overlay, root, X, &TranslateOptions::default()).unwrap_err();
        match err {
            Error::Io { path, .. } => assert_eq!(path, root.join("bad")),
            other => panic!("expected io error, got {:?}", other),
        }

        // entries listed before the failure stay translated
        assert_eq!(overlay.owner(&root.join("a")), (X, X));
        // nothing at or below the failure, and nothing listed after it
        let chowns = overlay.chowns.borrow();
        assert_eq!(chowns.as_slice(), [root.join("a")]);
        assert!(!chowns.contains(&root.join("z")));
        assert!(!chowns.contains(&root.join("c/later")));
        assert!(!chowns.contains(&root.to_path_buf()));
    }

    #[test]
    fn test_tree_missing_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            translate_tree(&HostFs, &missing, X, &TranslateOptions::default()),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_tree_host_fs_dry_run() {
        // files created by this process: forward pass only rewrites them
        // when the tests run as root
        let dir = sample_tree();
        let options = TranslateOptions {
            dry_run: true,
            ..Default::default()
        };
        let stats = translate_tree(&HostFs, dir.path(), X, &options).unwrap();

        assert_eq!(stats.examined, 10);
        assert_eq!(stats.rewritten + stats.unchanged, 10);
    }
}
