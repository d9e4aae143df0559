use std::path::Path;

use crate::find_tool;
use crate::run_tool_in;

/// The commit hash of `HEAD` in the source tree, if it is under version
/// control and a client is available.
pub fn commit_hash(sources_dir: &Path) -> Option<String> {
    git_query(sources_dir, &["rev-parse", "HEAD"])
}

fn git_query(sources_dir: &Path, args: &[&str]) -> Option<String> {
    let git = find_tool("git")?;
    let out = run_tool_in(sources_dir, git, args).ok()?;
    if !out.success() {
        return None;
    }
    let value = out.stdout.trim().to_string();
    (!value.is_empty()).then_some(value)
}
