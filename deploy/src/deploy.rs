use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use log::info;
use log::warn;
use rayon::prelude::*;

use crate::find_tool;
use crate::remove_unneeded_files;
use crate::reset_permissions;
use crate::run_tool;
use crate::worker_threads;
use crate::write_build_info;
use crate::write_launcher;
use crate::Error;
use crate::ExcludeList;
use crate::Fixer;
use crate::Profile;
use crate::Resolver;
use crate::Scanner;
use crate::Stager;
use crate::TargetPlatform;

/// A phase hook: receives the current staging root.
///
/// Hooks carry the framework-specific staging steps (plugin trees, QML
/// modules, certificate bundles); the engine only sequences them.
pub type Hook = Box<dyn Fn(&Path) -> Result<(), Error>>;

/// What a deployment run did.
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Every external dependency the walker resolved, sorted.
    pub dependencies: BTreeSet<PathBuf>,
    /// Source → destination pairs actually copied.
    pub staged: Vec<(PathBuf, PathBuf)>,
    /// Copy failures; the run continues past them.
    pub failures: Vec<(PathBuf, String)>,
}

/// Sequences the deployment pipeline for one staging tree.
pub struct Deployer {
    profile: Profile,
    data_dir: PathBuf,
    pre_hooks: Vec<Hook>,
    post_hooks: Vec<Hook>,
    verbose: bool,
}

impl Deployer {
    /// Create a deployer for the staging tree at `data_dir`.
    pub fn new<P: Into<PathBuf>>(profile: Profile, data_dir: P) -> Self {
        Self {
            profile,
            data_dir: data_dir.into(),
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            verbose: false,
        }
    }

    /// Add a hook that runs before the core phase.
    pub fn pre_hook(mut self, hook: Hook) -> Self {
        self.pre_hooks.push(hook);
        self
    }

    /// Add a hook that runs after the core phase.
    pub fn post_hook(mut self, hook: Hook) -> Self {
        self.post_hooks.push(hook);
        self
    }

    /// Let invoked tools inherit stdio.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The loaded profile.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Run the pipeline: hooks, scan, copy, strip, permissions, sweep,
    /// relocation fix, launcher and build info.
    pub fn run(&self) -> Result<DeployReport, Error> {
        if !self.data_dir.is_dir() {
            return Err(Error::Config(format!(
                "data directory {:?} does not exist",
                self.data_dir
            )));
        }
        let profile = &self.profile;
        let target = profile.target;
        let main_executable = self.data_dir.join(&profile.main_executable);
        let lib_dir = self.data_dir.join(&profile.lib_dir);
        let bin_dir = main_executable
            .parent()
            .unwrap_or(&self.data_dir)
            .to_path_buf();

        for hook in &self.pre_hooks {
            hook(&self.data_dir)?;
        }

        let resolver = Resolver::new(
            target,
            &profile.target_arch,
            profile.system_lib_dirs.clone(),
            Some(&main_executable),
        );
        let excludes = ExcludeList::load(&profile.exclude_file, target);
        let scanner = Scanner::new(&resolver, &excludes);

        info!("Copying required libs");
        let mut dependencies = scanner.scan(&self.data_dir);
        for name in &profile.extra_libs {
            let Some(path) = scanner.guess(&main_executable, name) else {
                warn!("Failed to resolve extra library {name:?}");
                continue;
            };
            dependencies.extend(scanner.all_dependencies(&path));
            dependencies.insert(path);
        }

        let mut report = DeployReport::default();
        let dest_dir = if target.libs_beside_executable() {
            bin_dir.clone()
        } else {
            lib_dir.clone()
        };
        let stager = Stager::new(target, &self.data_dir);
        for source in &dependencies {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let dest = dest_dir.join(file_name);
            if *source == dest {
                continue;
            }
            info!("    {} -> {}", source.display(), dest.display());
            match stager.stage(source, &dest_dir) {
                Ok(()) => report.staged.push((source.clone(), dest)),
                Err(e) => {
                    warn!("{e}");
                    report.failures.push((source.clone(), e.to_string()));
                }
            }
        }
        report.dependencies = dependencies;

        if profile.build_type.strips() && profile.strip {
            info!("Stripping symbols");
            self.strip_tree(&scanner);
        }

        info!("Resetting file permissions");
        reset_permissions(&self.data_dir, &bin_dir, target.binary_format())?;

        info!("Removing unnecessary files");
        remove_unneeded_files(&self.data_dir, target);

        let fix_rpaths = match target {
            TargetPlatform::Posix => profile.fix_rpaths,
            TargetPlatform::Mac => true,
            TargetPlatform::Windows | TargetPlatform::Android => false,
        };
        if fix_rpaths {
            info!("Fixing rpaths");
            Fixer::new(
                &resolver,
                &excludes,
                self.data_dir.clone(),
                lib_dir.clone(),
                main_executable.clone(),
            )
            .verbose(self.verbose)
            .fix_tree()?;
        }

        for hook in &self.post_hooks {
            hook(&self.data_dir)?;
        }

        if profile.write_launcher {
            write_launcher(target, &self.data_dir, &main_executable, &lib_dir, fix_rpaths)?;
        }

        info!("Writing build system information");
        write_build_info(
            &self.data_dir.join(&profile.build_info_file),
            &profile.sources_dir,
            &report.dependencies,
        )?;
        Ok(report)
    }

    /// Strip every staged binary on a bounded pool; failures are warnings.
    fn strip_tree(&self, scanner: &Scanner<'_>) {
        let Some(strip) = find_tool(&self.profile.strip_cmd) else {
            warn!("{} not found, skipping strip", self.profile.strip_cmd);
            return;
        };
        let binaries = scanner.find_binaries(&self.data_dir);
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads())
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Failed to build thread pool: {e}");
                return;
            }
        };
        let verbose = self.verbose;
        pool.install(|| {
            binaries.par_iter().for_each(|binary| {
                match run_tool(&strip, [binary.as_os_str()], verbose) {
                    Ok(out) if !out.success() => {
                        warn!("strip failed on {binary:?}: {}", out.stderr.trim());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to run strip on {binary:?}: {e}"),
                }
            });
        });
    }
}
