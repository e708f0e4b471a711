// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way, along with the platform the
//! current process is running on.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::PathBuf,
};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine absolute path to homeops configuration directory.
///
/// Uses `$XDG_CONFIG_HOME/homeops` on Linux, `~/Library/Application
/// Support/homeops` on macOS, and `%APPDATA%\homeops` on Windows. Does not
/// check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("homeops"))
        .ok_or(NoWayHome)
}

/// Determine absolute path to directory holding tool log files.
///
/// Uses `$XDG_DATA_HOME/homeops/logs` or the platform equivalent of the
/// local data directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn log_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|path| path.join("homeops").join("logs"))
        .ok_or(NoWayHome)
}

/// Operating system flavour the current process runs on.
///
/// WSL is kept apart from plain Linux, because tools that manage Windows-side
/// applications from inside WSL need to reach across to the Windows file
/// system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Wsl,
}

impl Platform {
    /// Detect platform of current process.
    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if is_wsl() {
            Self::Wsl
        } else {
            Self::Linux
        }
    }

    /// Check if platform is a Unix flavour.
    pub fn is_unix(&self) -> bool {
        !matches!(self, Self::Windows)
    }
}

impl Display for Platform {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Wsl => "wsl",
        };
        fmt.pad(name)
    }
}

fn is_wsl() -> bool {
    ["/proc/sys/kernel/osrelease", "/proc/version"]
        .iter()
        .filter_map(|path| read_to_string(path).ok())
        .any(|content| kernel_mentions_microsoft(&content))
}

pub(crate) fn kernel_mentions_microsoft(content: &str) -> bool {
    content.to_ascii_lowercase().contains("microsoft")
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("5.15.153.1-microsoft-standard-WSL2", true; "wsl2 release")]
    #[test_case("4.4.0-19041-Microsoft", true; "wsl1 release")]
    #[test_case("6.8.0-45-generic", false; "plain linux")]
    #[test]
    fn detect_wsl_kernel_release(release: &str, expect: bool) {
        assert_eq!(kernel_mentions_microsoft(release), expect);
    }

    #[test]
    fn windows_is_not_unix() {
        assert!(!Platform::Windows.is_unix());
        assert!(Platform::Wsl.is_unix());
        assert!(Platform::MacOs.is_unix());
    }
}
