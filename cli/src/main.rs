use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use walkdir::WalkDir;

use loadout::BinaryFormat;
use loadout_deploy::Deployer;
use loadout_deploy::ExcludeList;
use loadout_deploy::Profile;
use loadout_deploy::Resolver;
use loadout_deploy::Scanner;

mod logger;

use self::logger::Logger;

#[derive(clap::Parser)]
#[clap(version)]
struct Args {
    /// Verbose output.
    #[clap(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Show the dynamic-link information of a binary.
    Show {
        /// Binary file.
        #[clap(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the resolved external dependencies of a staging tree.
    Deps(DepsArgs),
    /// Prepare a staging tree: resolve, copy, strip, relocate.
    Deploy(DeployArgs),
}

#[derive(clap::Args)]
struct DepsArgs {
    /// Packaging profile; may be repeated, later files override.
    #[clap(short = 'c', long = "config", value_name = "FILE", required = true)]
    profiles: Vec<PathBuf>,

    /// Directory with the data to package.
    #[clap(short = 'd', long = "data", value_name = "DIR")]
    data_dir: PathBuf,
}

#[derive(clap::Args)]
struct DeployArgs {
    /// Packaging profile; may be repeated, later files override.
    #[clap(short = 'c', long = "config", value_name = "FILE", required = true)]
    profiles: Vec<PathBuf>,

    /// Directory with the data to package.
    #[clap(short = 'd', long = "data", value_name = "DIR")]
    data_dir: PathBuf,
}

fn main() -> ExitCode {
    match do_main() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    Logger::init(args.verbose)?;
    match args.command {
        Command::Show { file } => show(file),
        Command::Deps(deps_args) => deps(deps_args),
        Command::Deploy(deploy_args) => deploy(deploy_args, args.verbose),
    }
}

fn show(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let formats = [BinaryFormat::Elf, BinaryFormat::MachO, BinaryFormat::Pe];
    let Some(format) = formats.into_iter().find(|format| format.is_valid(&file)) else {
        return Err(format!("{file:?} is not a recognized binary").into());
    };
    let info = format.decode(&file)?;
    let mut printer = Printer::new();
    printer.kv("Format", format_args!("{:?}", info.format));
    printer.kv("Kind", format_args!("{:?}", info.kind));
    printer.kv("Machine", format_args!("{}", info.machine));
    if let Some(file_name) = file.file_name() {
        printer.kv(
            "Name",
            format_args!("{}", format.library_name(&file_name.to_string_lossy())),
        );
    }
    if let Some(install_name) = &info.install_name {
        printer.kv("Install name", format_args!("{install_name}"));
    }
    print_paths(&mut printer, "Imports", &info.imports);
    print_paths(&mut printer, "Rpaths", &info.rpaths);
    print_paths(&mut printer, "Runpaths", &info.runpaths);
    Ok(())
}

fn print_paths(printer: &mut Printer, title: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    printer.title(title);
    for path in paths {
        printer.row(path);
    }
}

fn deps(args: DepsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let profile = Profile::load(&args.profiles)?;
    let main_executable = args.data_dir.join(&profile.main_executable);
    let resolver = Resolver::new(
        profile.target,
        &profile.target_arch,
        profile.system_lib_dirs.clone(),
        Some(&main_executable),
    );
    let excludes = ExcludeList::load(&profile.exclude_file, profile.target);
    let scanner = Scanner::new(&resolver, &excludes);
    for dependency in scanner.scan(&args.data_dir) {
        println!("{}", dependency.display());
    }
    Ok(())
}

fn deploy(args: DeployArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let profile = Profile::load(&args.profiles)?;
    let report = Deployer::new(profile, &args.data_dir)
        .verbose(verbose)
        .run()?;

    let mut printer = Printer::new();
    printer.title("Packaged data");
    let mut files: Vec<PathBuf> = WalkDir::new(&args.data_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() || entry.path_is_symlink())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    let mut total = 0_u64;
    for file in &files {
        if let Ok(metadata) = fs_err::symlink_metadata(file) {
            if !metadata.is_symlink() {
                total += metadata.len();
            }
        }
        let relative = file.strip_prefix(&args.data_dir).unwrap_or(file);
        printer.row(relative.display());
    }
    printer.kv("Packaged data size", format_args!("{}", human_size(total)));
    if !report.failures.is_empty() {
        printer.title("Failures");
        for (path, reason) in &report.failures {
            printer.row(format_args!("{}: {reason}", path.display()));
        }
        return Err(format!("{} file(s) failed to stage", report.failures.len()).into());
    }
    Ok(())
}

/// `1536` → `1.50 KiB`.
fn human_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if size < 1024 {
        return format!("{size} B");
    }
    let exponent = (size.ilog2() / 10).min(UNITS.len() as u32) as usize;
    let scaled = size as f64 / (1_u64 << (10 * exponent)) as f64;
    format!("{:.2} {}", scaled, UNITS[exponent - 1])
}

struct Printer {
    first_title: bool,
}

impl Printer {
    fn new() -> Self {
        Self { first_title: true }
    }

    fn title(&mut self, title: &str) {
        let newline = if !self.first_title {
            "\n"
        } else {
            self.first_title = false;
            ""
        };
        println!("{}{}", newline, title.bold().underline());
    }

    fn kv<V: std::fmt::Display>(&mut self, key: &str, value: V) {
        println!("{}: {}", key.bold().blue(), value);
    }

    fn row<V: std::fmt::Display>(&mut self, value: V) {
        println!("    {}", value);
    }
}
