use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use log::trace;
use loadout::BinaryFormat;
use loadout::BinaryInfo;

use crate::elf_search_dirs;
use crate::ndk_search_dirs;
use crate::TargetPlatform;

/// Resolves an import name to a concrete on-disk library, following the
/// target's runtime-link rules.
///
/// All state is injected at construction; resolution never consults global
/// mutable state, so for fixed inputs the answer is deterministic.
pub struct Resolver {
    target: TargetPlatform,
    format: BinaryFormat,
    /// Configured system roots, sorted by the profile loader.
    system_lib_dirs: Vec<PathBuf>,
    /// Target-conventional directories, searched last.
    default_dirs: Vec<PathBuf>,
    /// Directory of the main executable (`@executable_path`).
    main_executable_dir: Option<PathBuf>,
}

impl Resolver {
    /// Create a resolver for `target`.
    ///
    /// `system_lib_dirs` are the configured extra roots; the
    /// target-conventional defaults are composed here (linker configuration
    /// on Linux, NDK directories on Android, `DYLD_*` and `/usr/local/lib`
    /// on macOS, nothing on Windows).
    pub fn new(
        target: TargetPlatform,
        target_arch: &str,
        system_lib_dirs: Vec<PathBuf>,
        main_executable: Option<&Path>,
    ) -> Self {
        let default_dirs = match target {
            TargetPlatform::Posix => elf_search_dirs("/etc/ld.so.conf"),
            TargetPlatform::Android => ndk_search_dirs(target_arch),
            TargetPlatform::Mac => {
                let mut dirs = paths_from_env("DYLD_LIBRARY_PATH");
                dirs.extend(paths_from_env("DYLD_FRAMEWORK_PATH"));
                dirs.push(PathBuf::from("/usr/local/lib"));
                dirs
            }
            TargetPlatform::Windows => Vec::new(),
        };
        Self {
            target,
            format: target.binary_format(),
            system_lib_dirs,
            default_dirs,
            main_executable_dir: main_executable
                .and_then(Path::parent)
                .map(Path::to_path_buf),
        }
    }

    /// Builder-style override of the conventional default directories.
    pub fn default_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.default_dirs = dirs;
        self
    }

    /// Resolve one import of `importer` to an absolute path.
    ///
    /// `info` is the decoded importer; its embedded search paths and machine
    /// tag drive the lookup. Returns `None` when no candidate directory
    /// yields the name; the caller drops the edge.
    pub fn resolve(&self, name: &str, importer: &Path, info: &BinaryInfo) -> Option<PathBuf> {
        let importer_dir = importer.parent().unwrap_or(Path::new("."));
        let resolved = match self.format {
            BinaryFormat::Elf => self.resolve_elf(name, importer_dir, info),
            BinaryFormat::MachO => self.resolve_mach(name, importer_dir, info),
            BinaryFormat::Pe => self.resolve_pe(name, importer_dir),
        };
        match &resolved {
            Some(path) => trace!("Resolved {name:?} as {path:?}"),
            None => trace!("Failed to resolve {name:?} imported by {importer:?}"),
        }
        resolved
    }

    /// ELF lookup: expanded rpaths, then the configured roots (the
    /// `LD_LIBRARY_PATH` slot of the search order), then expanded runpaths,
    /// then the target defaults. A candidate must match the importer's
    /// machine tag unless either tag is unknown.
    fn resolve_elf(&self, name: &str, importer_dir: &Path, info: &BinaryInfo) -> Option<PathBuf> {
        let rpaths = expand_elf_paths(&info.rpaths, importer_dir);
        let runpaths = expand_elf_paths(&info.runpaths, importer_dir);
        let search_dirs = rpaths
            .iter()
            .chain(self.system_lib_dirs.iter())
            .chain(runpaths.iter())
            .chain(self.default_dirs.iter());
        for dir in search_dirs {
            let path = dir.join(name);
            if !path.exists() {
                continue;
            }
            match self.format.decode(&path) {
                Ok(candidate) if candidate.machine.matches(info.machine) => return Some(path),
                Ok(candidate) => {
                    trace!(
                        "Skipping {path:?}: machine {} != {}",
                        candidate.machine,
                        info.machine
                    );
                }
                Err(e) => trace!("Skipping {path:?}: {e}"),
            }
        }
        None
    }

    /// Mach-O lookup: substitute `@executable_path`, `@loader_path` and
    /// `@rpath` (each declared rpath in turn), then fall back to the
    /// environment and conventional directories keyed by the dylib name or
    /// the framework fragment.
    fn resolve_mach(&self, name: &str, importer_dir: &Path, info: &BinaryInfo) -> Option<PathBuf> {
        if let Some(rest) = name.strip_prefix("@executable_path/") {
            let base = self.main_executable_dir.as_deref().unwrap_or(importer_dir);
            return existing(base.join(rest));
        }
        if let Some(rest) = name.strip_prefix("@loader_path/") {
            return existing(importer_dir.join(rest));
        }
        if let Some(rest) = name.strip_prefix("@rpath/") {
            for rpath in &info.rpaths {
                let base = if let Some(tail) = rpath.strip_prefix("@loader_path/") {
                    importer_dir.join(tail)
                } else if let Some(tail) = rpath.strip_prefix("@executable_path/") {
                    let base = self.main_executable_dir.as_deref().unwrap_or(importer_dir);
                    base.join(tail)
                } else {
                    PathBuf::from(rpath)
                };
                if let Some(path) = existing(base.join(rest)) {
                    return Some(path);
                }
            }
        } else if !name.starts_with('@') {
            if let Some(path) = existing(PathBuf::from(name)) {
                return Some(path);
            }
        }
        // The name wasn't found through its own tokens; try the search
        // directories with the dylib name or the framework fragment.
        let fragment = mach_fragment(name);
        for dir in self.default_dirs.iter().chain(self.system_lib_dirs.iter()) {
            if let Some(path) = existing(dir.join(fragment)) {
                return Some(path);
            }
        }
        None
    }

    /// PE lookup: the importer's directory, then the configured roots,
    /// matching the file name case-insensitively.
    fn resolve_pe(&self, name: &str, importer_dir: &Path) -> Option<PathBuf> {
        std::iter::once(&importer_dir.to_path_buf())
            .chain(self.system_lib_dirs.iter())
            .find_map(|dir| find_case_insensitive(dir, name))
    }

    /// The target this resolver was built for.
    pub fn target(&self) -> TargetPlatform {
        self.target
    }

    /// The binary format this resolver decodes candidates with.
    pub fn format(&self) -> BinaryFormat {
        self.format
    }
}

/// Expand `$ORIGIN` against the importer directory, resolve relative
/// entries against it too, and normalize.
fn expand_elf_paths(paths: &[String], importer_dir: &Path) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|entry| entry.split(':'))
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut expanded = PathBuf::new();
            for comp in Path::new(entry).components() {
                match comp {
                    Component::Normal(comp) if comp == "$ORIGIN" || comp == "${ORIGIN}" => {
                        expanded.push(importer_dir);
                    }
                    comp => expanded.push(comp),
                }
            }
            if expanded.is_relative() {
                expanded = importer_dir.join(expanded);
            }
            normalize(&expanded)
        })
        .collect()
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where possible.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // "/.." is "/".
                Some(Component::RootDir) => {}
                _ => normalized.push(comp),
            },
            comp => normalized.push(comp),
        }
    }
    normalized
}

/// The lookup key for a Mach-O import: the file name for dylibs, the
/// `Foo.framework/...` fragment for framework members.
fn mach_fragment(name: &str) -> &str {
    if let Some(i) = name.find(".framework") {
        let head = &name[..i];
        match head.rfind('/') {
            Some(j) => &name[j + 1..],
            None => name,
        }
    } else {
        match name.rfind('/') {
            Some(j) => &name[j + 1..],
            None => name,
        }
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// Find `name` in `dir`, first directly, then by scanning the directory for
/// a case-insensitive match.
fn find_case_insensitive(dir: &Path, name: &str) -> Option<PathBuf> {
    let direct = dir.join(name);
    if direct.exists() {
        return Some(direct);
    }
    let entries = fs_err::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if file_name
            .to_str()
            .is_some_and(|f| f.eq_ignore_ascii_case(name))
        {
            return Some(dir.join(file_name));
        }
    }
    None
}

fn paths_from_env(var: &str) -> Vec<PathBuf> {
    std::env::var_os(var)
        .map(|value| std::env::split_paths(&value).collect())
        .unwrap_or_default()
}
