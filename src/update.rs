// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package manager updates.
//!
//! Runs the upgrade-everything routine of every package manager found on the
//! system, one after another, with their output going straight to the
//! terminal. A manager that fails does not stop the others.

use crate::{
    path::Platform,
    syscall::{Invocation, Shell},
};

use serde::Deserialize;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{info, instrument, warn};

/// Supported package managers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    Winget,
    Choco,
    Scoop,
    Brew,
    Apt,
    Dnf,
    Pacman,
    Zypper,
    Flatpak,
    Snap,
    Rustup,
}

impl ManagerKind {
    /// Every package manager in the order they are updated.
    pub const ALL: [Self; 11] = [
        Self::Winget,
        Self::Choco,
        Self::Scoop,
        Self::Brew,
        Self::Apt,
        Self::Dnf,
        Self::Pacman,
        Self::Zypper,
        Self::Flatpak,
        Self::Snap,
        Self::Rustup,
    ];

    /// Binary that has to be on `PATH`.
    pub fn program(&self) -> &'static str {
        match self {
            Self::Winget => "winget",
            Self::Choco => "choco",
            Self::Scoop => "scoop",
            Self::Brew => "brew",
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
            Self::Rustup => "rustup",
        }
    }

    /// Check if package manager is at home on target platform.
    pub fn supports(&self, platform: Platform) -> bool {
        match self {
            Self::Winget | Self::Choco | Self::Scoop => platform == Platform::Windows,
            Self::Brew => matches!(platform, Platform::MacOs | Platform::Linux | Platform::Wsl),
            Self::Apt | Self::Dnf | Self::Pacman | Self::Zypper | Self::Flatpak | Self::Snap => {
                matches!(platform, Platform::Linux | Platform::Wsl)
            }
            Self::Rustup => true,
        }
    }

    /// Check if package manager needs root on Unix.
    pub fn needs_root(&self) -> bool {
        matches!(
            self,
            Self::Apt | Self::Dnf | Self::Pacman | Self::Zypper | Self::Snap
        )
    }

    /// Invocations that upgrade everything, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        let cmd = |args: &[&str]| Invocation::new(self.program()).args(args.iter().copied());
        match self {
            Self::Winget => vec![cmd(&[
                "upgrade",
                "--all",
                "--accept-source-agreements",
                "--accept-package-agreements",
                "--silent",
            ])],
            Self::Choco => vec![cmd(&["upgrade", "all", "-y"])],
            Self::Scoop => vec![cmd(&["update"]), cmd(&["update", "*"])],
            Self::Brew => vec![cmd(&["update"]), cmd(&["upgrade"])],
            Self::Apt => vec![cmd(&["update"]), cmd(&["-y", "upgrade"])],
            Self::Dnf => vec![cmd(&["-y", "upgrade"])],
            Self::Pacman => vec![cmd(&["-Syu", "--noconfirm"])],
            Self::Zypper => vec![cmd(&["--non-interactive", "update"])],
            Self::Flatpak => vec![cmd(&["update", "-y"])],
            Self::Snap => vec![cmd(&["refresh"])],
            Self::Rustup => vec![cmd(&["update"])],
        }
    }
}

impl Display for ManagerKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Winget => "winget",
            Self::Choco => "choco",
            Self::Scoop => "scoop",
            Self::Brew => "brew",
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
            Self::Rustup => "rustup",
        };
        fmt.pad(name)
    }
}

/// Why a package manager was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Binary is not on `PATH`.
    NotInstalled,

    /// User asked for it to be skipped.
    Excluded,
}

/// Outcome of updating one package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Updated,
    Planned,
    Skipped(SkipReason),
    Failed(String),
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Updated => fmt.write_str("updated"),
            Self::Planned => fmt.write_str("would update"),
            Self::Skipped(SkipReason::NotInstalled) => fmt.write_str("skipped (not installed)"),
            Self::Skipped(SkipReason::Excluded) => fmt.write_str("skipped (excluded)"),
            Self::Failed(message) => write!(fmt, "failed: {message}"),
        }
    }
}

/// Runs upgrades across package managers.
#[derive(Debug)]
pub struct Updater<S: Shell> {
    shell: S,
    platform: Platform,
    skip: BTreeSet<ManagerKind>,
    only: BTreeSet<ManagerKind>,
    elevated: bool,
    dry_run: bool,
}

impl<S: Shell> Updater<S> {
    pub fn new(shell: S, platform: Platform) -> Self {
        Self {
            shell,
            platform,
            skip: BTreeSet::new(),
            only: BTreeSet::new(),
            elevated: false,
            dry_run: false,
        }
    }

    /// Never touch these package managers.
    pub fn skip(mut self, kinds: impl IntoIterator<Item = ManagerKind>) -> Self {
        self.skip.extend(kinds);
        self
    }

    /// Only touch these package managers, even if foreign to the platform.
    pub fn only(mut self, kinds: impl IntoIterator<Item = ManagerKind>) -> Self {
        self.only.extend(kinds);
        self
    }

    /// Process already runs as root, so `sudo` is not needed.
    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Only report what would be run.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Package managers considered for update, in update order.
    pub fn selected(&self) -> Vec<ManagerKind> {
        ManagerKind::ALL
            .into_iter()
            .filter(|kind| {
                if self.only.is_empty() {
                    kind.supports(self.platform)
                } else {
                    self.only.contains(kind)
                }
            })
            .collect()
    }

    /// List selected package managers with their availability.
    pub fn listing(&self) -> Vec<(ManagerKind, bool)> {
        self.selected()
            .into_iter()
            .map(|kind| (kind, self.shell.exists(kind.program())))
            .collect()
    }

    /// Update every selected package manager.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self) -> UpdateSummary {
        let results = self
            .selected()
            .into_iter()
            .map(|kind| (kind, self.update(kind)))
            .collect();

        UpdateSummary { results }
    }

    fn update(&self, kind: ManagerKind) -> Status {
        if self.skip.contains(&kind) {
            return Status::Skipped(SkipReason::Excluded);
        }

        if !self.shell.exists(kind.program()) {
            return Status::Skipped(SkipReason::NotInstalled);
        }

        info!("update {kind}");
        for invocation in self.invocations(kind) {
            if self.dry_run {
                info!("would run {invocation}");
                continue;
            }

            if let Err(err) = self.shell.run_interactive(&invocation) {
                warn!("{err}");
                return Status::Failed(err.to_string());
            }
        }

        if self.dry_run {
            Status::Planned
        } else {
            Status::Updated
        }
    }

    fn invocations(&self, kind: ManagerKind) -> Vec<Invocation> {
        let sudo = kind.needs_root() && self.platform.is_unix() && !self.elevated;
        kind.invocations()
            .into_iter()
            .map(|invocation| if sudo { invocation.elevated() } else { invocation })
            .collect()
    }
}

/// Outcome of updating every selected package manager.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub results: Vec<(ManagerKind, Status)>,
}

impl UpdateSummary {
    /// Package managers that failed to update.
    pub fn failed(&self) -> Vec<ManagerKind> {
        self.results
            .iter()
            .filter(|(_, status)| matches!(status, Status::Failed(_)))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Turn failures into an error.
    ///
    /// # Errors
    ///
    /// - Return [`UpdateError::Failed`] if any package manager failed.
    pub fn check(&self) -> Result<()> {
        let failed = self.failed();
        if failed.is_empty() {
            return Ok(());
        }

        Err(UpdateError::Failed {
            managers: failed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

impl Display for UpdateSummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let width = self
            .results
            .iter()
            .map(|(kind, _)| kind.to_string().len())
            .max()
            .unwrap_or(0);
        for (kind, status) in &self.results {
            writeln!(fmt, "{:<width$}  {status}", kind.to_string())?;
        }

        Ok(())
    }
}

/// Package update error types.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// At least one package manager failed.
    #[error("package managers failed to update: {managers}")]
    Failed { managers: String },
}

/// Friendly result alias :3
pub type Result<T, E = UpdateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::fake::FakeShell;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case(ManagerKind::Winget, "winget upgrade --all --accept-source-agreements --accept-package-agreements --silent"; "winget")]
    #[test_case(ManagerKind::Choco, "choco upgrade all -y"; "choco")]
    #[test_case(ManagerKind::Brew, "brew update && brew upgrade"; "brew")]
    #[test_case(ManagerKind::Scoop, "scoop update && scoop update *"; "scoop")]
    #[test_case(ManagerKind::Pacman, "pacman -Syu --noconfirm"; "pacman")]
    #[test_case(ManagerKind::Zypper, "zypper --non-interactive update"; "zypper")]
    #[test]
    fn upgrade_invocations(kind: ManagerKind, expect: &str) {
        let result = kind
            .invocations()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" && ");
        pretty_assertions::assert_eq!(result, expect);
    }

    #[test]
    fn continue_past_failures() {
        let shell = FakeShell::with_programs(["apt-get", "flatpak", "rustup"])
            .fail("sudo apt-get -y upgrade");
        let updater = Updater::new(shell, Platform::Linux);

        let summary = updater.run();
        assert_eq!(summary.failed(), vec![ManagerKind::Apt]);
        assert_eq!(
            updater.shell.calls(),
            vec![
                "sudo apt-get update",
                "sudo apt-get -y upgrade",
                "flatpak update -y",
                "rustup update",
            ]
        );
        assert!(matches!(summary.check(), Err(UpdateError::Failed { .. })));
    }

    #[test]
    fn skip_missing_and_excluded_managers() {
        let shell = FakeShell::with_programs(["pacman", "snap", "rustup"]);
        let updater = Updater::new(shell, Platform::Linux)
            .skip([ManagerKind::Snap])
            .elevated(true);

        let summary = updater.run();
        let expect = indoc! {r#"
            brew     skipped (not installed)
            apt      skipped (not installed)
            dnf      skipped (not installed)
            pacman   updated
            zypper   skipped (not installed)
            flatpak  skipped (not installed)
            snap     skipped (excluded)
            rustup   updated
        "#};
        assert_eq!(summary.to_string(), expect);
        assert_eq!(
            updater.shell.calls(),
            vec!["pacman -Syu --noconfirm", "rustup update"]
        );
        assert!(summary.check().is_ok());
    }

    #[test]
    fn only_selects_given_managers() {
        let shell = FakeShell::with_programs(["winget", "rustup"]);
        let updater = Updater::new(shell, Platform::Linux).only([ManagerKind::Rustup]);

        assert_eq!(updater.selected(), vec![ManagerKind::Rustup]);
        updater.run();
        assert_eq!(updater.shell.calls(), vec!["rustup update"]);
    }

    #[test]
    fn dry_run_runs_nothing() {
        let shell = FakeShell::with_programs(["winget", "choco"]);
        let updater = Updater::new(shell, Platform::Windows).dry_run(true);

        let summary = updater.run();
        assert_eq!(
            summary.results,
            vec![
                (ManagerKind::Winget, Status::Planned),
                (ManagerKind::Choco, Status::Planned),
                (ManagerKind::Scoop, Status::Skipped(SkipReason::NotInstalled)),
                (ManagerKind::Rustup, Status::Skipped(SkipReason::NotInstalled)),
            ]
        );
        assert!(updater.shell.calls().is_empty());
    }
}
