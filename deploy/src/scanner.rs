use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;

use log::trace;
use log::warn;
use walkdir::WalkDir;

use crate::ExcludeList;
use crate::Resolver;
use crate::TargetPlatform;

/// Walks the transitive import graph of a staging tree.
///
/// The walk is single-threaded and deterministic: binaries are visited in
/// path order and the output set is sorted. Cycles are broken by a seen set.
pub struct Scanner<'a> {
    resolver: &'a Resolver,
    excludes: &'a ExcludeList,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over the given resolver and exclusion list.
    pub fn new(resolver: &'a Resolver, excludes: &'a ExcludeList) -> Self {
        Self { resolver, excludes }
    }

    /// Every regular file under `root` that decodes as a binary of the
    /// target's format, in path order. Symlinks are skipped: their targets
    /// are visited under their own names.
    pub fn find_binaries<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        let format = self.resolver.format();
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && !entry.path_is_symlink())
            .map(|entry| entry.into_path())
            .filter(|path| format.is_valid(path))
            .collect()
    }

    /// Immediate dependencies of one binary: each import resolved and
    /// filtered through the exclusion list.
    ///
    /// A file that fails to decode contributes nothing; parse problems never
    /// abort a walk.
    pub fn dependencies<P: AsRef<Path>>(&self, binary: P) -> Vec<PathBuf> {
        let binary = binary.as_ref();
        let info = match self.resolver.format().decode(binary) {
            Ok(info) => info,
            Err(e) => {
                trace!("Skipping {binary:?}: {e}");
                return Vec::new();
            }
        };
        let mut dependencies = Vec::new();
        for import in &info.imports {
            let Some(path) = self.resolver.resolve(import, binary, &info) else {
                continue;
            };
            if self.excludes.is_excluded(&path) {
                trace!("Excluded {path:?}");
                continue;
            }
            dependencies.push(path);
        }
        dependencies
    }

    /// Transitive closure over the dependencies of `binary`.
    ///
    /// On macOS targets, members of a framework bundle are recorded as the
    /// bundle root; the bundle is the staging unit.
    pub fn all_dependencies<P: AsRef<Path>>(&self, binary: P) -> BTreeSet<PathBuf> {
        let mut queue: VecDeque<PathBuf> = self.dependencies(binary).into();
        let mut seen = BTreeSet::new();
        let mut resolved = BTreeSet::new();
        while let Some(dependency) = queue.pop_front() {
            if !seen.insert(dependency.clone()) {
                continue;
            }
            for transitive in self.dependencies(&dependency) {
                if !seen.contains(&transitive) {
                    queue.push_back(transitive);
                }
            }
            resolved.insert(self.record_as(dependency));
        }
        resolved
    }

    /// The unique, sorted set of external libraries needed by every binary
    /// under `root`.
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> BTreeSet<PathBuf> {
        let root = root.as_ref();
        let mut resolved = BTreeSet::new();
        for binary in self.find_binaries(root) {
            resolved.extend(self.all_dependencies(&binary));
        }
        if resolved.is_empty() {
            warn!("No external dependencies found under {root:?}");
        }
        resolved
    }

    /// Resolve an extra library requested by name, as if it were imported by
    /// the main executable.
    pub fn guess<P: AsRef<Path>>(&self, main_executable: P, name: &str) -> Option<PathBuf> {
        let main_executable = main_executable.as_ref();
        let info = match self.resolver.format().decode(main_executable) {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to decode {main_executable:?}: {e}");
                return None;
            }
        };
        self.resolver.resolve(name, main_executable, &info)
    }

    /// Collapse framework members to the bundle root on macOS targets.
    fn record_as(&self, dependency: PathBuf) -> PathBuf {
        if self.resolver.target() != TargetPlatform::Mac {
            return dependency;
        }
        if let Some(s) = dependency.to_str() {
            if let Some(i) = s.rfind(".framework/") {
                return PathBuf::from(&s[..i + ".framework".len()]);
            }
        }
        dependency
    }
}
