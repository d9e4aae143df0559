use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use log::trace;
use log::warn;
use loadout::BinaryFormat;
use walkdir::WalkDir;

use crate::normalize;
use crate::Error;
use crate::HostPlatform;
use crate::TargetPlatform;

/// Copies resolved libraries into the staging tree.
///
/// On Windows targets real files are always copied. On POSIX and macOS
/// symlink chains are reproduced hop by hop so version links keep working;
/// a link whose target would land outside the staging root is repositioned
/// under an `up/` prefix inside the root instead.
pub struct Stager {
    target: TargetPlatform,
    host: HostPlatform,
    /// The staging root no copy may escape.
    root: PathBuf,
    overwrite: bool,
}

impl Stager {
    /// Create a stager rooted at `root`.
    pub fn new<P: Into<PathBuf>>(target: TargetPlatform, root: P) -> Self {
        Self {
            target,
            host: HostPlatform::current(),
            root: root.into(),
            overwrite: true,
        }
    }

    /// Whether existing destination files are replaced (default) or kept.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Stage one resolved library into `dest_dir`.
    ///
    /// Framework bundles (macOS) are copied as whole directory trees;
    /// everything else as a file, following the symlink policy.
    pub fn stage<P: AsRef<Path>>(&self, source: P, dest_dir: &Path) -> Result<(), Error> {
        let source = source.as_ref();
        let file_name = source
            .file_name()
            .ok_or_else(|| Error::Config(format!("{source:?} has no file name")))?;
        let dest = dest_dir.join(file_name);
        if source.is_dir() {
            self.copy_tree(source, &dest)
        } else {
            self.copy_file(source, &dest)
        }
        .map_err(|e| Error::Stage(source.to_path_buf(), e))
    }

    /// Copy one file, reproducing the symlink chain behind it.
    fn copy_file(&self, source: &Path, dest: &Path) -> Result<(), std::io::Error> {
        let copy_reals =
            self.target == TargetPlatform::Windows || self.host == HostPlatform::Windows;
        let dest_dir = dest.parent().map(Path::to_path_buf).unwrap_or_default();
        fs_err::create_dir_all(&dest_dir)?;
        if !self.overwrite && dest.exists() {
            return Ok(());
        }
        if dest.exists() || dest.is_symlink() {
            fs_err::remove_file(dest)?;
        }
        let metadata = fs_err::symlink_metadata(source)?;
        if copy_reals || !metadata.is_symlink() {
            fs_err::copy(source, dest)?;
            trace!("Copied {source:?} -> {dest:?}");
            return Ok(());
        }

        // The source is a symlink: recreate the link in the destination and
        // then bring its final target inside the tree as well.
        let real_source = fs_err::canonicalize(source)?;
        let source_dir = source.parent().unwrap_or(Path::new("."));
        let real_dir = real_source.parent().unwrap_or(Path::new("."));
        let relative_dir = relative_to(real_dir, source_dir);
        let link = relative_dir.join(real_source.file_name().unwrap_or_default());
        let link_dest = normalize(&dest_dir.join(&link));
        if escapes(&link_dest, &self.root) {
            // The target would land outside the staging root; reposition it
            // under the `up/` prefix and point the link there.
            let repositioned = reposition(&link_dest, &self.root);
            let target_dir = repositioned.parent().unwrap_or(&self.root);
            let link = relative_to(target_dir, &dest_dir)
                .join(repositioned.file_name().unwrap_or_default());
            symlink(&link, dest)?;
            trace!("Linked {dest:?} -> {link:?}");
            self.copy_file(&real_source, &repositioned)?;
        } else {
            symlink(&link, dest)?;
            trace!("Linked {dest:?} -> {link:?}");
            self.copy_file(&real_source, &link_dest)?;
        }
        Ok(())
    }

    /// Copy a whole directory tree (framework bundles), reproducing inner
    /// symlinks relative to their own targets.
    fn copy_tree(&self, source: &Path, dest: &Path) -> Result<(), std::io::Error> {
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .unwrap_or_else(|_| entry.path());
            let entry_dest = dest.join(relative);
            if entry.path_is_symlink() {
                let link = fs_err::read_link(entry.path())?;
                if entry_dest.exists() || entry_dest.is_symlink() {
                    remove_any(&entry_dest)?;
                }
                symlink(&link, &entry_dest)?;
            } else if entry.file_type().is_dir() {
                fs_err::create_dir_all(&entry_dest)?;
            } else {
                if entry_dest.exists() {
                    fs_err::remove_file(&entry_dest)?;
                }
                if let Some(parent) = entry_dest.parent() {
                    fs_err::create_dir_all(parent)?;
                }
                fs_err::copy(entry.path(), &entry_dest)?;
            }
        }
        trace!("Copied tree {source:?} -> {dest:?}");
        Ok(())
    }

    /// The staging root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Reset permissions across the staging tree: directories 0o755, files
/// 0o644, binaries in the executable directory 0o744. Symlinks are left
/// untouched.
#[cfg(unix)]
pub fn reset_permissions(
    root: &Path,
    bin_dir: &Path,
    format: BinaryFormat,
) -> Result<(), Error> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.path_is_symlink() {
            continue;
        }
        let mode = if entry.file_type().is_dir() {
            0o755
        } else if entry.path().parent() == Some(bin_dir) && format.is_valid(entry.path()) {
            0o744
        } else {
            0o644
        };
        if let Err(e) = fs_err::set_permissions(entry.path(), Permissions::from_mode(mode)) {
            warn!("Failed to set permissions on {:?}: {e}", entry.path());
        }
    }
    Ok(())
}

/// Permissions are not meaningful on non-unix hosts.
#[cfg(not(unix))]
pub fn reset_permissions(
    _root: &Path,
    _bin_dir: &Path,
    _format: BinaryFormat,
) -> Result<(), Error> {
    Ok(())
}

/// Does `path` point above `root`?
pub fn escapes(path: &Path, root: &Path) -> bool {
    relative_to(&normalize(path), root)
        .components()
        .next()
        == Some(Component::ParentDir)
}

/// Rewrite a path that escapes `root` to stay inside it: every `..`
/// component of the relative path becomes `up`.
pub fn reposition(path: &Path, root: &Path) -> PathBuf {
    let relative = relative_to(&normalize(path), root);
    if relative.components().next() != Some(Component::ParentDir) {
        return path.to_path_buf();
    }
    let mut repositioned = root.to_path_buf();
    for comp in relative.components() {
        match comp {
            Component::ParentDir => repositioned.push("up"),
            comp => repositioned.push(comp),
        }
    }
    repositioned
}

/// Express `path` relative to `base`, walking up with `..` where needed.
///
/// Both paths must be absolute or both relative; no filesystem access.
pub(crate) fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_buf = normalize(path);
    let base_buf = normalize(base);
    let path: Vec<Component<'_>> = path_buf.components().collect();
    let base: Vec<Component<'_>> = base_buf.components().collect();
    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for comp in &path[common..] {
        relative.push(comp);
    }
    relative
}

#[cfg(unix)]
fn symlink(link: &Path, at: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = at.parent() {
        fs_err::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(link, at)
}

#[cfg(not(unix))]
fn symlink(_link: &Path, at: &Path) -> Result<(), std::io::Error> {
    // Unreachable in practice: Windows hosts always copy real files.
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("cannot create symlink at {at:?} on this host"),
    ))
}

fn remove_any(path: &Path) -> Result<(), std::io::Error> {
    if path.is_dir() && !path.is_symlink() {
        fs_err::remove_dir_all(path)
    } else {
        fs_err::remove_file(path)
    }
}
