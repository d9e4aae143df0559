use std::path::Path;
use std::path::PathBuf;

use log::trace;
use log::warn;
use walkdir::WalkDir;

use crate::TargetPlatform;

/// Remove files a package never needs: static archives, import libraries
/// and debug databases on Windows, bundled JARs on Android, framework
/// headers and `.prl` files on macOS.
pub fn remove_unneeded_files(root: &Path, target: TargetPlatform) {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            if target == TargetPlatform::Mac && name == "Headers" {
                dirs.push(path.to_path_buf());
            }
            continue;
        }
        let unneeded = match target {
            TargetPlatform::Windows => {
                name.ends_with(".a")
                    || name.ends_with(".static.prl")
                    || name.ends_with(".pdb")
                    || name.ends_with(".lib")
            }
            TargetPlatform::Android => name.ends_with(".jar"),
            TargetPlatform::Mac => name == "Headers" || name.ends_with(".prl"),
            TargetPlatform::Posix => false,
        };
        if unneeded {
            files.push(path.to_path_buf());
        }
    }
    for dir in dirs {
        trace!("Removing {dir:?}");
        if let Err(e) = fs_err::remove_dir_all(&dir) {
            warn!("Failed to remove {dir:?}: {e}");
        }
    }
    for file in files {
        trace!("Removing {file:?}");
        if let Err(e) = fs_err::remove_file(&file) {
            warn!("Failed to remove {file:?}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn windows_sweep_removes_import_libraries() {
        let tmp = TempDir::new().unwrap();
        for name in ["app.exe", "foo.dll", "foo.lib", "foo.pdb", "libbar.a"] {
            fs_err::write(tmp.path().join(name), b"x").unwrap();
        }
        remove_unneeded_files(tmp.path(), TargetPlatform::Windows);
        assert!(tmp.path().join("app.exe").exists());
        assert!(tmp.path().join("foo.dll").exists());
        assert!(!tmp.path().join("foo.lib").exists());
        assert!(!tmp.path().join("foo.pdb").exists());
        assert!(!tmp.path().join("libbar.a").exists());
    }

    #[test]
    fn mac_sweep_removes_headers_trees() {
        let tmp = TempDir::new().unwrap();
        let headers = tmp.path().join("Qux.framework/Versions/A/Headers");
        fs_err::create_dir_all(&headers).unwrap();
        fs_err::write(headers.join("Qux.h"), b"x").unwrap();
        fs_err::write(tmp.path().join("Qux.framework/Qux.prl"), b"x").unwrap();
        remove_unneeded_files(tmp.path(), TargetPlatform::Mac);
        assert!(!headers.exists());
        assert!(!tmp.path().join("Qux.framework/Qux.prl").exists());
    }

    #[test]
    fn posix_sweep_keeps_everything() {
        let tmp = TempDir::new().unwrap();
        fs_err::write(tmp.path().join("libfoo.a"), b"x").unwrap();
        remove_unneeded_files(tmp.path(), TargetPlatform::Posix);
        assert!(tmp.path().join("libfoo.a").exists());
    }
}
