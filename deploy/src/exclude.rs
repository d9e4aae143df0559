use std::path::Path;

use log::trace;
use log::warn;
use regex::Regex;

use crate::TargetPlatform;

/// Per-target denylist of library paths that must never be staged.
///
/// One full-match regex per non-empty, non-comment line; `#` starts a
/// comment and may appear mid-line. On Windows targets both the pattern and
/// the candidate are lowercased and backslashes become forward slashes
/// before matching.
pub struct ExcludeList {
    patterns: Vec<Regex>,
    windows: bool,
}

impl ExcludeList {
    /// An empty list that excludes nothing.
    pub fn empty(target: TargetPlatform) -> Self {
        Self {
            patterns: Vec::new(),
            windows: target == TargetPlatform::Windows,
        }
    }

    /// Load the exclusion list for `target` from `path`.
    ///
    /// A missing file yields an empty list: deploying without one is
    /// legitimate, it just stages everything.
    pub fn load<P: AsRef<Path>>(path: P, target: TargetPlatform) -> Self {
        let path = path.as_ref();
        match fs_err::read_to_string(path) {
            Ok(text) => Self::parse(&text, target),
            Err(e) => {
                trace!("No exclusion list at {path:?}: {e}");
                Self::empty(target)
            }
        }
    }

    /// Parse exclusion rules from text.
    ///
    /// Lines that fail to compile are skipped with a warning; a typo in one
    /// rule must not abort the run.
    pub fn parse(text: &str, target: TargetPlatform) -> Self {
        let mut list = Self::empty(target);
        for line in text.lines() {
            let line = match line.find('#') {
                Some(i) => &line[..i],
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let pattern = if list.windows {
                line.to_lowercase()
            } else {
                line.to_string()
            };
            match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(regex) => list.patterns.push(regex),
                Err(e) => warn!("Skipping exclusion rule {line:?}: {e}"),
            }
        }
        list
    }

    /// Whether `path` matches any rule.
    pub fn is_excluded<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref().to_string_lossy();
        let path = if self.windows {
            path.to_lowercase().replace('\\', "/")
        } else {
            path.into_owned()
        };
        self.patterns.iter().any(|pattern| pattern.is_match(&path))
    }

    /// The number of loaded rules.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if no rules are loaded.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_full_match() {
        let list = ExcludeList::parse(".*/libc\\.so\\..*\n", TargetPlatform::Posix);
        assert!(list.is_excluded("/usr/lib/libc.so.6"));
        assert!(list.is_excluded("/lib64/libc.so.6.1"));
        assert!(!list.is_excluded("/usr/lib/libc.so"));
        assert!(!list.is_excluded("prefix /usr/lib/libc.so.6"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let list = ExcludeList::parse(
            "# full-line comment\n\
             \n\
             /usr/lib/libm\\.so.* # mid-line comment\n",
            TargetPlatform::Posix,
        );
        assert_eq!(1, list.len());
        assert!(list.is_excluded("/usr/lib/libm.so.6"));
    }

    #[test]
    fn windows_matching_is_case_insensitive_and_slash_normalized() {
        let list = ExcludeList::parse("c:/windows/system32/.*\\.dll\n", TargetPlatform::Windows);
        assert!(list.is_excluded("C:\\Windows\\System32\\KERNEL32.DLL"));
        assert!(!list.is_excluded("C:\\App\\foo.dll"));
    }

    #[test]
    fn invalid_rules_are_skipped_not_fatal() {
        let list = ExcludeList::parse("(unclosed\n/usr/lib/libz\\.so.*\n", TargetPlatform::Posix);
        assert_eq!(1, list.len());
        assert!(list.is_excluded("/usr/lib/libz.so.1"));
    }
}
