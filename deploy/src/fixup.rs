use std::fmt::Write as _;
use std::path::Path;
use std::path::PathBuf;

use log::info;
use log::warn;
use rayon::prelude::*;

use crate::find_tool;
use crate::relative_to;
use crate::run_tool;
use crate::worker_threads;
use crate::Error;
use crate::ExcludeList;
use crate::Resolver;
use crate::Scanner;
use crate::TargetPlatform;

/// Rewrites embedded library references in every staged binary so the tree
/// resolves from any install location.
///
/// ELF binaries get a `$ORIGIN`-relative `RUNPATH` via `patchelf`; Mach-O
/// binaries get an `@executable_path` rpath, `@rpath` install names and
/// rewritten imports via `install_name_tool`. PE needs no rewrite: placement
/// next to the importer suffices.
pub struct Fixer<'a> {
    resolver: &'a Resolver,
    excludes: &'a ExcludeList,
    /// Staging root.
    data_dir: PathBuf,
    /// Absolute library directory inside the staging root.
    lib_dir: PathBuf,
    /// Absolute path of the main executable.
    main_executable: PathBuf,
    verbose: bool,
}

impl<'a> Fixer<'a> {
    /// Create a fixer for the staged tree at `data_dir`.
    pub fn new(
        resolver: &'a Resolver,
        excludes: &'a ExcludeList,
        data_dir: PathBuf,
        lib_dir: PathBuf,
        main_executable: PathBuf,
    ) -> Self {
        Self {
            resolver,
            excludes,
            data_dir,
            lib_dir,
            main_executable,
            verbose: false,
        }
    }

    /// Let invoked tools inherit stdio.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Fix every staged binary, one task per file on a bounded pool.
    ///
    /// The file set is computed before any task starts and tasks operate on
    /// disjoint files. Tool failures are logged and do not stop the run.
    pub fn fix_tree(&self) -> Result<(), Error> {
        let target = self.resolver.target();
        let tool = match target {
            TargetPlatform::Posix | TargetPlatform::Android => {
                let Some(patchelf) = find_tool("patchelf") else {
                    warn!("patchelf not found, staged binaries keep their search paths");
                    return Ok(());
                };
                patchelf
            }
            TargetPlatform::Mac => {
                let Some(tool) = find_tool("install_name_tool") else {
                    warn!("install_name_tool not found, staged binaries keep their references");
                    return Ok(());
                };
                tool
            }
            TargetPlatform::Windows => return Ok(()),
        };
        let scanner = Scanner::new(self.resolver, self.excludes);
        let binaries = scanner.find_binaries(&self.data_dir);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads())
            .build()
            .map_err(|e| Error::Config(format!("failed to build thread pool: {e}")))?;
        pool.install(|| {
            binaries.par_iter().for_each(|binary| {
                let result = match target {
                    TargetPlatform::Mac => self.fix_mach(&tool, binary),
                    _ => self.fix_elf(&tool, binary),
                };
                if let Err(e) = result {
                    warn!("Failed to fix {binary:?}: {e}");
                }
            });
        });
        Ok(())
    }

    /// Set `RUNPATH` so lookup reaches the library directory relative to the
    /// binary itself. Binaries repositioned under the `up/` escape prefix
    /// get plain `$ORIGIN`.
    fn fix_elf(&self, patchelf: &Path, binary: &Path) -> Result<(), Error> {
        let mut log = format!("Fixing {binary:?}\n");
        let info = self.resolver.format().decode(binary)?;
        let binary_dir = binary.parent().unwrap_or(&self.data_dir);
        let relative = relative_to(&self.lib_dir, binary_dir);
        let runpath = if binary_dir.starts_with(self.data_dir.join("up"))
            || relative.as_os_str().is_empty()
        {
            "$ORIGIN".to_string()
        } else {
            format!("$ORIGIN/{}", relative.display())
        };
        let already_set = info
            .rpaths
            .iter()
            .chain(info.runpaths.iter())
            .any(|path| *path == runpath);
        if !already_set {
            let _ = writeln!(log, "  Setting runpath to {runpath}");
            let out = run_tool(
                patchelf,
                [
                    "--set-rpath".as_ref(),
                    runpath.as_ref(),
                    binary.as_os_str(),
                ],
                self.verbose,
            )?;
            if !out.success() {
                let _ = writeln!(log, "  patchelf failed: {}", out.stderr.trim());
            }
        }
        info!("{}", log.trim_end());
        Ok(())
    }

    /// Replace stale rpaths with one `@executable_path`-relative rpath,
    /// rewrite library ids to `@rpath/<name>` and repoint imports.
    fn fix_mach(&self, install_name_tool: &Path, binary: &Path) -> Result<(), Error> {
        let mut log = format!("Fixing {binary:?}\n");
        let info = self.resolver.format().decode(binary)?;
        let bin_dir = self
            .main_executable
            .parent()
            .unwrap_or(&self.data_dir)
            .to_path_buf();
        let relative = relative_to(&self.lib_dir, &bin_dir);
        let rpath = if relative.as_os_str().is_empty() {
            "@executable_path/.".to_string()
        } else {
            format!("@executable_path/{}", relative.display())
        };
        let run = |args: &[&std::ffi::OsStr], log: &mut String| -> Result<(), Error> {
            let out = run_tool(install_name_tool, args.iter().copied(), self.verbose)?;
            if !out.success() {
                let _ = writeln!(log, "  install_name_tool failed: {}", out.stderr.trim());
            }
            Ok(())
        };

        // Stale rpaths are deleted before the new one is added.
        if binary.starts_with(&bin_dir) {
            for old in &info.rpaths {
                let _ = writeln!(log, "  Deleting rpath {old}");
                run(
                    &["-delete_rpath".as_ref(), old.as_ref(), binary.as_os_str()],
                    &mut log,
                )?;
            }
            let _ = writeln!(log, "  Adding rpath {rpath}");
            run(
                &["-add_rpath".as_ref(), rpath.as_ref(), binary.as_os_str()],
                &mut log,
            )?;
        }

        if !info.kind.is_executable() {
            let file_name = binary
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let id = format!("@rpath/{file_name}");
            if info.install_name.as_deref() != Some(id.as_str()) {
                let _ = writeln!(log, "  Setting id to {id}");
                run(
                    &["-id".as_ref(), id.as_ref(), binary.as_os_str()],
                    &mut log,
                )?;
            }
        }

        for import in &info.imports {
            if import.starts_with(&rpath) || import.starts_with("@rpath/") {
                continue;
            }
            if self.excludes.is_excluded(import) {
                continue;
            }
            let rewritten = match framework_member(import) {
                Some(in_framework) => format!("{rpath}/{in_framework}"),
                None => {
                    let name = import.rsplit('/').next().unwrap_or(import);
                    format!("@rpath/{name}")
                }
            };
            if *import != rewritten {
                let _ = writeln!(log, "  {import} -> {rewritten}");
                run(
                    &[
                        "-change".as_ref(),
                        import.as_ref(),
                        rewritten.as_ref(),
                        binary.as_os_str(),
                    ],
                    &mut log,
                )?;
            }
        }
        info!("{}", log.trim_end());
        Ok(())
    }
}

/// For a framework member path, the fragment starting at the bundle name:
/// `/Library/Frameworks/Qux.framework/Versions/A/Qux` →
/// `Qux.framework/Versions/A/Qux`. `None` for plain dylibs.
fn framework_member(import: &str) -> Option<&str> {
    let i = import.find(".framework")?;
    match import[..i].rfind('/') {
        Some(j) => Some(&import[j + 1..]),
        None => Some(import),
    }
}
