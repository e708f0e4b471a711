// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Administrative privilege checks.
//!
//! Stopping system services and reading the media server's data directory
//! both need administrative rights. Instead of failing half way through, the
//! backup tools relaunch themselves elevated up front. The relaunched process
//! receives [`ELEVATED_FLAG`], so it never tries to relaunch a second time.

use crate::{
    path::Platform,
    syscall::{Invocation, Shell, ShellError},
};

use std::{ffi::OsString, path::Path};
use tracing::{debug, info};

/// Hidden flag marking a process as the elevated relaunch of itself.
pub const ELEVATED_FLAG: &str = "--elevated";

/// Check if current process runs with administrative rights.
pub fn is_elevated(shell: &impl Shell, platform: Platform) -> bool {
    let elevated = match platform {
        Platform::Windows => shell.run(&Invocation::new("net").arg("session")).is_ok(),
        _ => shell
            .run(&Invocation::new("id").arg("-u"))
            .map(|uid| uid.trim() == "0")
            .unwrap_or(false),
    };
    debug!("elevated: {elevated}");

    elevated
}

/// Build invocation that relaunches target executable elevated.
///
/// The relaunched process receives the same arguments plus
/// [`ELEVATED_FLAG`].
pub fn relaunch_invocation(platform: Platform, exe: &Path, args: &[OsString]) -> Invocation {
    match platform {
        Platform::Windows => {
            let mut list: Vec<String> = args
                .iter()
                .map(|arg| powershell_quote(&arg.to_string_lossy()))
                .collect();
            list.push(powershell_quote(ELEVATED_FLAG));
            let script = format!(
                "$p = Start-Process -FilePath {} -ArgumentList {} -Verb RunAs -Wait -PassThru; exit $p.ExitCode",
                powershell_quote(&exe.to_string_lossy()),
                list.join(","),
            );

            Invocation::new("powershell").args(["-NoProfile", "-Command", script.as_str()])
        }
        _ => Invocation::new(exe)
            .args(args.iter().cloned())
            .arg(ELEVATED_FLAG)
            .elevated(),
    }
}

/// Relaunch target executable elevated, and wait for it to finish.
///
/// # Errors
///
/// - Return [`ShellError`] if the relaunch cannot be started, or if the
///   elevated process fails.
pub fn relaunch_elevated(
    shell: &impl Shell,
    platform: Platform,
    exe: &Path,
    args: &[OsString],
) -> Result<(), ShellError> {
    info!("relaunch with administrative rights");
    shell.run_interactive(&relaunch_invocation(platform, exe, args))
}

// INVARIANT: PowerShell single quotes are escaped by doubling them.
fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::fake::FakeShell;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("0\n", true; "root")]
    #[test_case("1000\n", false; "regular user")]
    #[test]
    fn unix_checks_user_id(uid: &str, expect: bool) {
        let shell = FakeShell::default().output("id -u", uid);
        pretty_assertions::assert_eq!(is_elevated(&shell, Platform::Linux), expect);
    }

    #[test]
    fn windows_checks_net_session() {
        let shell = FakeShell::default().fail("net session");
        assert!(!is_elevated(&shell, Platform::Windows));
        assert!(is_elevated(&FakeShell::default(), Platform::Windows));
    }

    #[test]
    fn unix_relaunches_through_sudo() {
        let result = relaunch_invocation(
            Platform::Linux,
            Path::new("/usr/bin/media-backup"),
            &["--dry-run".into()],
        );
        assert_eq!(
            result.to_string(),
            "sudo /usr/bin/media-backup --dry-run --elevated"
        );
    }

    #[test]
    fn windows_relaunches_through_powershell() {
        let result = relaunch_invocation(
            Platform::Windows,
            Path::new(r"C:\Tools\media-backup.exe"),
            &["--config".into(), r"C:\it's\here.json".into()],
        );
        let script = result.arguments().last().map(|arg| arg.to_string_lossy().into_owned());
        assert_eq!(result.program(), "powershell");
        assert_eq!(
            script.as_deref(),
            Some(
                r"$p = Start-Process -FilePath 'C:\Tools\media-backup.exe' -ArgumentList '--config','C:\it''s\here.json','--elevated' -Verb RunAs -Wait -PassThru; exit $p.ExitCode"
            )
        );
    }
}
