// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Location of IDE user settings per platform.
//!
//! | Platform | User settings directory                              |
//! |----------|------------------------------------------------------|
//! | Windows  | `%APPDATA%\Antigravity\User`                         |
//! | macOS    | `~/Library/Application Support/Antigravity/User`     |
//! | Linux    | `~/.config/Antigravity/User`                         |
//! | WSL      | Windows-side `%APPDATA%\Antigravity\User` via `/mnt` |
//!
//! Inside WSL the IDE runs on the Windows side, so its settings live on the
//! Windows file system. The Windows `%APPDATA%` is asked from `cmd.exe`, and
//! translated into a WSL path with `wslpath`.

use crate::{
    path::Platform,
    syscall::{Invocation, Shell, ShellError},
};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name of the IDE inside the platform configuration directory.
pub const IDE_DIR: &str = "Antigravity";

/// Determine IDE user settings directory for target platform.
///
/// # Errors
///
/// - Return [`LayoutError::NoConfigDir`] if configuration directory of
///   platform cannot be determined.
/// - Return [`LayoutError::Wsl`] if Windows-side directory cannot be
///   resolved from within WSL.
pub fn user_dir(platform: Platform, shell: &impl Shell) -> Result<PathBuf> {
    let base = match platform {
        Platform::Wsl => windows_appdata(shell)?,
        _ => dirs::config_dir().ok_or(LayoutError::NoConfigDir)?,
    };

    Ok(user_dir_in(&base))
}

/// Join platform configuration directory with IDE user settings directory.
pub fn user_dir_in(config_dir: &Path) -> PathBuf {
    config_dir.join(IDE_DIR).join("User")
}

fn windows_appdata(shell: &impl Shell) -> Result<PathBuf> {
    let appdata = shell
        .run(&Invocation::new("cmd.exe").args(["/c", "echo", "%APPDATA%"]))
        .map_err(LayoutError::Wsl)?;
    let appdata = appdata.trim();
    if appdata.is_empty() || appdata.contains('%') {
        return Err(LayoutError::NoAppData);
    }

    let translated = shell
        .run(&Invocation::new("wslpath").args(["-u", appdata]))
        .map_err(LayoutError::Wsl)?;
    debug!("windows appdata {appdata:?} is {:?} in wsl", translated.trim());

    Ok(PathBuf::from(translated.trim()))
}

/// Settings layout error types.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// Platform configuration directory unknown.
    #[error("cannot determine configuration directory of platform")]
    NoConfigDir,

    /// Windows did not report an `%APPDATA%` directory.
    #[error("windows did not report an %APPDATA% directory")]
    NoAppData,

    /// Windows interop from WSL fails.
    #[error("cannot reach windows side from wsl")]
    Wsl(#[source] ShellError),
}

/// Friendly result alias :3
pub type Result<T, E = LayoutError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::fake::FakeShell;
    use pretty_assertions::assert_eq;

    #[test]
    fn wsl_resolves_windows_appdata() -> anyhow::Result<()> {
        let shell = FakeShell::default()
            .output("cmd.exe /c echo %APPDATA%", "C:\\Users\\blah\\AppData\\Roaming\r\n")
            .output(
                "wslpath -u C:\\Users\\blah\\AppData\\Roaming",
                "/mnt/c/Users/blah/AppData/Roaming\n",
            );

        let result = user_dir(Platform::Wsl, &shell)?;
        assert_eq!(
            result,
            PathBuf::from("/mnt/c/Users/blah/AppData/Roaming/Antigravity/User")
        );

        Ok(())
    }

    #[test]
    fn wsl_rejects_unexpanded_appdata() {
        let shell = FakeShell::default().output("cmd.exe /c echo %APPDATA%", "%APPDATA%\r\n");
        let result = user_dir(Platform::Wsl, &shell);
        assert!(matches!(result, Err(LayoutError::NoAppData)));
    }

    #[test]
    fn native_platforms_join_config_dir() {
        assert_eq!(
            user_dir_in(Path::new("/home/blah/.config")),
            PathBuf::from("/home/blah/.config/Antigravity/User")
        );
    }
}
