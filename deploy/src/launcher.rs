use std::io::Write;
use std::path::Path;

use log::info;

use crate::relative_to;
use crate::Error;
use crate::TargetPlatform;

/// Write a launcher script at the staging root.
///
/// POSIX targets get `<program>.sh` exporting `PATH` (and `LD_LIBRARY_PATH`
/// when the relocation fixer was skipped); Windows targets get
/// `<program>.bat`. Other targets have no launcher.
pub fn write_launcher(
    target: TargetPlatform,
    data_dir: &Path,
    main_executable: &Path,
    lib_dir: &Path,
    rpaths_fixed: bool,
) -> Result<(), Error> {
    match target {
        TargetPlatform::Posix => {
            write_posix_launcher(data_dir, main_executable, lib_dir, rpaths_fixed)
        }
        TargetPlatform::Windows => write_windows_launcher(data_dir, main_executable),
        TargetPlatform::Mac | TargetPlatform::Android => Ok(()),
    }
}

fn write_posix_launcher(
    data_dir: &Path,
    main_executable: &Path,
    lib_dir: &Path,
    rpaths_fixed: bool,
) -> Result<(), Error> {
    let program = main_executable
        .file_name()
        .ok_or_else(|| Error::Config("main executable has no file name".into()))?
        .to_string_lossy()
        .into_owned();
    let bin_dir = main_executable.parent().unwrap_or(data_dir);
    let bin_dir = relative_to(bin_dir, data_dir);
    let lib_dir = relative_to(lib_dir, data_dir);
    let script = data_dir.join(format!("{program}.sh"));
    let mut launcher = fs_err::File::create(&script)?;
    writeln!(launcher, "#!/bin/sh")?;
    writeln!(launcher)?;
    writeln!(launcher, "path=$(realpath \"$0\")")?;
    writeln!(launcher, "ROOTDIR=$(dirname \"$path\")")?;
    writeln!(
        launcher,
        "export PATH=\"${{ROOTDIR}}/{}:$PATH\"",
        bin_dir.display()
    )?;
    if !rpaths_fixed {
        writeln!(
            launcher,
            "export LD_LIBRARY_PATH=\"${{ROOTDIR}}/{}:$LD_LIBRARY_PATH\"",
            lib_dir.display()
        )?;
    }
    writeln!(launcher, "{program} \"$@\"")?;
    drop(launcher);
    make_executable(&script)?;
    make_executable(main_executable)?;
    info!("Wrote launcher {script:?}");
    Ok(())
}

fn write_windows_launcher(data_dir: &Path, main_executable: &Path) -> Result<(), Error> {
    let program = main_executable
        .file_name()
        .ok_or_else(|| Error::Config("main executable has no file name".into()))?
        .to_string_lossy()
        .into_owned();
    let bin_dir = main_executable.parent().unwrap_or(data_dir);
    let bin_dir = relative_to(bin_dir, data_dir);
    let script = data_dir.join(format!("{program}.bat"));
    let mut launcher = fs_err::File::create(&script)?;
    writeln!(launcher, "@echo off")?;
    writeln!(
        launcher,
        "start /b \"\" \"%~dp0{}\\{}\"",
        bin_dir.display(),
        program
    )?;
    info!("Wrote launcher {script:?}");
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), Error> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;
    if path.exists() {
        fs_err::set_permissions(path, Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}
