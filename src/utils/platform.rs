//! Platform-specific helpers.

/// Checks whether a command is available on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Name of the Subversion executable for the current platform.
#[must_use]
pub const fn get_svn_command() -> &'static str {
    if cfg!(windows) {
        "svn.exe"
    } else {
        "svn"
    }
}

/// Architecture directory name used inside the machine-local tool cache.
///
/// Runner tool caches are keyed by the Node.js architecture names, so the
/// Rust target names are mapped onto those.
#[must_use]
pub fn tool_cache_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "ia32",
        "aarch64" => "arm64",
        "arm" => "arm",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        other => other,
    }
}
