use std::path::PathBuf;

use log::trace;
use log::warn;

/// One row of the Android ABI table: the ABI name used by the build system,
/// the kernel architecture, the target triple and the clang runtime
/// directory name.
pub struct AndroidAbi {
    /// ABI name, e.g. `arm64-v8a`.
    pub abi: &'static str,
    /// Kernel architecture, e.g. `aarch64`.
    pub arch: &'static str,
    /// Target triple under the NDK sysroot.
    pub triple: &'static str,
    /// Architecture directory under the clang runtime tree.
    pub clang_arch: &'static str,
}

/// Supported Android ABIs.
pub const ANDROID_ABIS: [AndroidAbi; 5] = [
    AndroidAbi {
        abi: "arm64-v8a",
        arch: "aarch64",
        triple: "aarch64-linux-android",
        clang_arch: "aarch64",
    },
    AndroidAbi {
        abi: "armeabi-v7a",
        arch: "arm",
        triple: "arm-linux-androideabi",
        clang_arch: "arm",
    },
    AndroidAbi {
        abi: "x86",
        arch: "i686",
        triple: "i686-linux-android",
        clang_arch: "i386",
    },
    AndroidAbi {
        abi: "x86_64",
        arch: "x86_64",
        triple: "x86_64-linux-android",
        clang_arch: "x86_64",
    },
    AndroidAbi {
        abi: "riscv64",
        arch: "riscv64",
        triple: "riscv64-linux-android",
        clang_arch: "riscv64",
    },
];

/// Look up the ABI table row for a target architecture.
pub fn android_abi(target_arch: &str) -> Option<&'static AndroidAbi> {
    ANDROID_ABIS.iter().find(|abi| abi.abi == target_arch)
}

/// NDK library directories for a target architecture: the sysroot libraries
/// for the target triple plus the clang runtime libraries.
///
/// The NDK is located through `ANDROID_NDK_ROOT`; without it (or with an
/// unknown architecture) the list is empty and resolution falls back to the
/// configured system roots.
pub fn ndk_search_dirs(target_arch: &str) -> Vec<PathBuf> {
    let Some(ndk_root) = std::env::var_os("ANDROID_NDK_ROOT") else {
        trace!("ANDROID_NDK_ROOT is not set");
        return Vec::new();
    };
    let Some(abi) = android_abi(target_arch) else {
        warn!("Unknown Android architecture {target_arch:?}");
        return Vec::new();
    };
    let toolchain = PathBuf::from(ndk_root)
        .join("toolchains")
        .join("llvm")
        .join("prebuilt")
        .join("linux-x86_64");
    let mut dirs = vec![toolchain.join("sysroot").join("usr/lib").join(abi.triple)];
    if let Some(clang_version) = newest_clang_version(&toolchain) {
        dirs.push(
            toolchain
                .join("lib/clang")
                .join(clang_version)
                .join("lib/linux")
                .join(abi.clang_arch),
        );
    }
    dirs
}

/// The newest clang release shipped with the toolchain, by directory name.
fn newest_clang_version(toolchain: &std::path::Path) -> Option<String> {
    let entries = fs_err::read_dir(toolchain.join("lib/clang")).ok()?;
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .max()
}
