use std::path::Path;
use std::path::PathBuf;

use crate::find_tool;
use crate::run_tool;

/// Ask the host package managers which package owns `path`.
///
/// Managers are consulted in a fixed order until one recognizes the path;
/// the first answer wins. Returns `package version`-style provenance
/// strings, or `None` when no manager claims the file.
pub fn search_package_for(path: &Path) -> Option<String> {
    type Query = fn(&PathBuf, &Path) -> Option<String>;
    let managers: [(&str, Query); 5] = [
        ("brew", search_brew),
        ("pacman", search_pacman),
        ("dpkg", search_dpkg),
        ("rpm", search_rpm),
        ("pkg", search_pkg),
    ];
    for (name, query) in managers {
        let Some(manager) = find_tool(name) else {
            continue;
        };
        if let Some(info) = query(&manager, path) {
            return Some(info);
        }
    }
    None
}

/// Homebrew keeps everything under its cellar; the first two path
/// components below it are the package name and version.
fn search_brew(brew: &PathBuf, path: &Path) -> Option<String> {
    let out = run_tool(brew, ["--cellar"], false).ok()?;
    if !out.success() {
        return None;
    }
    let cellar = PathBuf::from(out.stdout.trim());
    let relative = path.strip_prefix(&cellar).ok()?;
    let mut components = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy());
    let package = components.next()?;
    let version = components.next()?;
    Some(format!("{package} {version}"))
}

fn search_pacman(pacman: &PathBuf, path: &Path) -> Option<String> {
    let path = path.to_string_lossy().replace('\\', "/");
    let out = run_tool(pacman, ["-Qo", &path], false).ok()?;
    if !out.success() {
        return None;
    }
    // "path is owned by <package> <version>"
    let mut words = out.stdout.split_whitespace().rev();
    let version = words.next()?;
    let package = words.next()?;
    Some(format!("{package} {version}"))
}

fn search_dpkg(dpkg: &PathBuf, path: &Path) -> Option<String> {
    let out = run_tool(dpkg, ["-S".as_ref(), path.as_os_str()], false).ok()?;
    if !out.success() {
        return None;
    }
    let package = out.stdout.split(':').next()?.trim().to_string();
    let out = run_tool(dpkg, ["-s", &package], false).ok()?;
    if !out.success() {
        return None;
    }
    let version = out
        .stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Version:"))?
        .trim();
    Some(format!("{package} {version}"))
}

fn search_rpm(rpm: &PathBuf, path: &Path) -> Option<String> {
    let out = run_tool(rpm, ["-qf".as_ref(), path.as_os_str()], false).ok()?;
    let info = out.stdout.trim();
    (out.success() && !info.is_empty()).then(|| info.to_string())
}

fn search_pkg(pkg: &PathBuf, path: &Path) -> Option<String> {
    let out = run_tool(
        pkg,
        ["which".as_ref(), "-q".as_ref(), path.as_os_str()],
        false,
    )
    .ok()?;
    let info = out.stdout.trim();
    (out.success() && !info.is_empty()).then(|| info.to_string())
}
