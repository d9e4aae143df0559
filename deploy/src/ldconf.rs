use std::collections::VecDeque;
use std::io::BufRead;
use std::io::BufReader;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use fs_err::File;
use glob::glob;
use log::log_enabled;
use log::trace;
use log::warn;
use log::Level::Trace;

/// Default library directories searched after everything else on ELF hosts.
pub const DEFAULT_ELF_SEARCH_DIRS: [&str; 6] = [
    "/usr/lib",
    "/usr/lib64",
    "/lib",
    "/lib64",
    "/usr/local/lib",
    "/usr/local/lib64",
];

/// Directories the dynamic linker is configured to search, in file order,
/// followed by [`DEFAULT_ELF_SEARCH_DIRS`].
///
/// `conf` is usually `/etc/ld.so.conf`; a missing file just yields the
/// defaults.
pub fn elf_search_dirs<P: AsRef<Path>>(conf: P) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    read_ld_so_conf(conf.as_ref(), &mut paths);
    paths.extend(DEFAULT_ELF_SEARCH_DIRS.iter().map(PathBuf::from));
    if log_enabled!(Trace) {
        for path in paths.iter() {
            trace!("System library path {:?}", path);
        }
    }
    paths
}

/// Parse an `ld.so.conf`-style file into `paths`.
///
/// `include` directives are expanded with a glob relative to the directory
/// of the file that contains them and followed recursively; a file is read
/// at most once.
pub fn read_ld_so_conf(conf: &Path, paths: &mut Vec<PathBuf>) {
    let mut conf_files = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(conf.to_path_buf());
    while let Some(path) = queue.pop_front() {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(ref e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                warn!("Failed to open {path:?}: {e}");
                continue;
            }
        };
        let conf_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        conf_files.push(path);
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let Ok(line) = line else {
                break;
            };
            let line = match line.find('#') {
                Some(i) => &line[..i],
                None => &line[..],
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            if let Some(pattern) = line.strip_prefix("include") {
                let pattern = pattern.trim();
                if pattern.is_empty() {
                    // Malformed "include" directive.
                    continue;
                }
                let pattern = if Path::new(pattern).is_absolute() {
                    PathBuf::from(pattern)
                } else {
                    conf_dir.join(pattern)
                };
                let Some(pattern) = pattern.to_str() else {
                    continue;
                };
                let Ok(more_files) = glob(pattern) else {
                    continue;
                };
                for file in more_files.flatten() {
                    if !conf_files.contains(&file) {
                        queue.push_back(file);
                    }
                }
            } else {
                let path = PathBuf::from(line);
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
    }
}
