use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use log::info;

use crate::commit_hash;
use crate::find_tool;
use crate::run_tool;
use crate::search_package_for;
use crate::Error;

/// Write the reproducibility record: source commit, CI build-log URL, host
/// release info and the system-package provenance of every staged
/// dependency, sorted.
pub fn write_build_info(
    build_info_file: &Path,
    sources_dir: &Path,
    dependencies: &BTreeSet<PathBuf>,
) -> Result<(), Error> {
    if let Some(parent) = build_info_file.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let mut file = fs_err::File::create(build_info_file)?;

    let commit = commit_hash(sources_dir).unwrap_or_else(|| "Unknown".into());
    writeln!(file, "Commit hash: {commit}")?;
    if let Some(url) = build_log_url() {
        writeln!(file, "Build log URL: {url}")?;
    }
    writeln!(file)?;

    for line in host_info().lines().filter(|line| !line.is_empty()) {
        writeln!(file, "{line}")?;
    }
    writeln!(file)?;

    let packages: BTreeSet<String> = dependencies
        .iter()
        .filter_map(|dep| search_package_for(dep))
        .collect();
    for package in packages {
        writeln!(file, "{package}")?;
    }
    info!("Wrote build info {build_info_file:?}");
    Ok(())
}

/// The build-log URL of the CI run, when standard CI variables are set.
pub fn build_log_url() -> Option<String> {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    if let Some(url) = var("TRAVIS_BUILD_WEB_URL") {
        return Some(url);
    }
    if let (Some(account), Some(_project), Some(job)) = (
        var("APPVEYOR_ACCOUNT_NAME"),
        var("APPVEYOR_PROJECT_NAME"),
        var("APPVEYOR_JOB_ID"),
    ) {
        let slug = var("APPVEYOR_PROJECT_SLUG")?;
        return Some(format!(
            "https://ci.appveyor.com/project/{account}/{slug}/build/job/{job}"
        ));
    }
    if let (Some(server), Some(repository), Some(run)) = (
        var("GITHUB_SERVER_URL"),
        var("GITHUB_REPOSITORY"),
        var("GITHUB_RUN_ID"),
    ) {
        return Some(format!("{server}/{repository}/actions/runs/{run}"));
    }
    None
}

/// Host release info: the concatenated `/etc/*-release` files, or the
/// kernel identification when none exist.
pub fn host_info() -> String {
    let mut info = String::new();
    if let Ok(entries) = fs_err::read_dir("/etc") {
        let mut release_files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().ends_with("-release"))
            })
            .collect();
        release_files.sort();
        for path in release_files {
            if let Ok(text) = fs_err::read_to_string(&path) {
                info.push_str(&text);
            }
        }
    }
    if info.is_empty() {
        if let Some(uname) = find_tool("uname") {
            if let Ok(out) = run_tool(uname, ["-a"], false) {
                info = out.stdout;
            }
        }
    }
    info
}
