use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use configparser::ini::Ini;

use crate::BuildType;
use crate::Error;
use crate::TargetPlatform;

/// Deployment profile: the typed view of the INI configuration.
///
/// Keys are case-sensitive; later profile files override earlier ones.
/// List values are parsed once at load, deduplicated and sorted so that
/// every later lookup is deterministic.
#[derive(Debug)]
pub struct Profile {
    /// Source tree, for VCS queries. `Package.sourcesDir`.
    pub sources_dir: PathBuf,
    /// Deployment target. `Package.targetPlatform`, required.
    pub target: TargetPlatform,
    /// Architecture tag, e.g. `x86_64` or `arm64-v8a`. `Package.targetArch`.
    pub target_arch: String,
    /// Main executable, relative to the staging root.
    /// `Package.mainExecutable`, required.
    pub main_executable: PathBuf,
    /// Library directory, relative to the staging root. `Package.libDir`.
    pub lib_dir: PathBuf,
    /// Build type of the payload. `Package.buildType`.
    pub build_type: BuildType,
    /// Build-info record, relative to the staging root.
    /// `Package.buildInfoFile`.
    pub build_info_file: PathBuf,
    /// Whether to write a launcher script. `Package.writeLauncher`.
    pub write_launcher: bool,
    /// Extra system library roots, sorted. `System.libDir`.
    pub system_lib_dirs: Vec<PathBuf>,
    /// Library names to force-resolve, sorted. `System.extraLibs`.
    pub extra_libs: Vec<String>,
    /// Whether to strip staged binaries in release builds. `System.strip`.
    pub strip: bool,
    /// Strip utility. `System.stripCmd`.
    pub strip_cmd: String,
    /// Exclusion list override. `System.excludeFile`.
    ///
    /// Defaults to `exclude/<target>.txt` next to the first profile file.
    pub exclude_file: PathBuf,
    /// Whether to run the ELF relocation fixer. `Posix.fixRpaths`.
    pub fix_rpaths: bool,
}

impl Profile {
    /// Load and merge one or more profile files.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        let Some(first) = paths.first() else {
            return Err(Error::Config("no profile file given".into()));
        };
        let base_dir = first
            .as_ref()
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let mut merged = Ini::new_cs();
        for path in paths {
            let text = fs_err::read_to_string(path.as_ref())?;
            let map = Ini::new_cs()
                .read(text)
                .map_err(|e| Error::Config(format!("{:?}: {e}", path.as_ref())))?;
            for (section, keys) in map {
                for (key, value) in keys {
                    merged.set(&section, &key, value);
                }
            }
        }
        Self::from_ini(&merged, &base_dir)
    }

    /// Build the profile from an already-parsed INI.
    ///
    /// `base_dir` anchors relative data-file paths (the exclusion list).
    pub fn from_ini(ini: &Ini, base_dir: &Path) -> Result<Self, Error> {
        let get = |section: &str, key: &str| -> Option<String> {
            ini.get(section, key).map(|v| v.trim().to_string())
        };
        let target: TargetPlatform = get("Package", "targetPlatform")
            .ok_or_else(|| Error::Config("Package.targetPlatform is not set".into()))?
            .parse()?;
        let target_arch = get("Package", "targetArch").unwrap_or_default();
        let main_executable = get("Package", "mainExecutable")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| Error::Config("Package.mainExecutable is not set".into()))?;
        let build_type = match get("Package", "buildType") {
            Some(value) => value.parse()?,
            None => BuildType::default(),
        };
        let system_lib_dirs = match get("System", "libDir") {
            Some(value) => parse_list(&value).into_iter().map(PathBuf::from).collect(),
            None if target == TargetPlatform::Android => {
                vec![PathBuf::from(format!("/opt/android-libs/{target_arch}/lib"))]
            }
            None => Vec::new(),
        };
        let exclude_file = match get("System", "excludeFile") {
            Some(value) => base_dir.join(value),
            None => base_dir.join("exclude").join(target.exclude_file_name()),
        };
        Ok(Self {
            sources_dir: get("Package", "sourcesDir").map_or_else(|| ".".into(), PathBuf::from),
            target,
            target_arch,
            main_executable,
            lib_dir: get("Package", "libDir").map_or_else(|| "lib".into(), PathBuf::from),
            build_type,
            build_info_file: get("Package", "buildInfoFile")
                .map_or_else(|| "build-info.txt".into(), PathBuf::from),
            write_launcher: get("Package", "writeLauncher").is_none_or(|v| parse_bool(&v)),
            system_lib_dirs,
            extra_libs: parse_list(&get("System", "extraLibs").unwrap_or_default()),
            strip: get("System", "strip").is_none_or(|v| parse_bool(&v)),
            strip_cmd: get("System", "stripCmd").unwrap_or_else(|| "strip".into()),
            exclude_file,
            fix_rpaths: get("Posix", "fixRpaths").is_none_or(|v| parse_bool(&v)),
        })
    }
}

/// `true`/`yes`/`1`, case-insensitive; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1")
}

/// Split a comma-separated value, trimming entries and dropping empty ones.
///
/// The result is deduplicated and sorted.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
