// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! IDE settings synchronization.
//!
//! Keeps the user settings of the Antigravity IDE in a plain directory, the
//! __sync repository__, such that they can be carried over to other machines
//! running Windows, macOS, Linux, or WSL.
//!
//! # Backup
//!
//! Backing up copies each configured settings file out of the IDE user
//! directory into the sync repository, mirrors each configured directory
//! (e.g., snippets) such that stale entries disappear, and replaces the
//! extension listing with the one reported by the IDE. If a git remote is
//! configured, the sync repository is pulled first, and everything is
//! committed and pushed afterwards.
//!
//! # Restore
//!
//! Restoring pulls first if a git remote is configured, copies everything
//! back into the IDE user directory without deleting anything there, and
//! installs every listed extension that is missing. Extensions that are not
//! listed are only removed when pruning is requested.
//!
//! Anything that is missing on either side is skipped with a warning.

pub mod extensions;
pub mod layout;
pub mod remote;

use crate::{
    config::SyncConfig,
    mirror::{copy_file, list_files, mirror, same_content, MirrorOptions},
    path::Platform,
    sync::{
        extensions::{ExtensionCli, ExtensionDiff, ExtensionList},
        remote::{PullOutcome, SyncRepo},
    },
    syscall::Shell,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// File name of extension listing inside sync repository.
pub const EXTENSIONS_FILE: &str = "extensions.txt";

/// Settings synchronizer.
#[derive(Debug)]
pub struct Syncer<S: Shell> {
    config: SyncConfig,
    user_dir: PathBuf,
    shell: S,
    use_git: bool,
    platform: Platform,
}

impl<S: Shell> Syncer<S> {
    /// Construct new synchronizer for target platform.
    ///
    /// Uses the configured user directory override if any, otherwise the
    /// platform's IDE user directory.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Layout`] if user directory cannot be determined.
    pub fn new(config: SyncConfig, shell: S, platform: Platform) -> Result<Self> {
        let user_dir = match &config.user_dir {
            Some(user_dir) => user_dir.clone(),
            None => layout::user_dir(platform, &shell)?,
        };
        info!("settings directory of {platform} is {:?}", user_dir.display());

        Ok(Self {
            config,
            user_dir,
            shell,
            use_git: true,
            platform,
        })
    }

    /// Enable or disable syncing through git remote.
    pub fn with_git(mut self, use_git: bool) -> Self {
        self.use_git = use_git;
        self
    }

    /// Request removal of extensions missing from backed up listing.
    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.config.prune_extensions |= prune;
        self
    }

    fn repo_dir(&self) -> &Path {
        &self.config.repo_dir
    }

    fn extensions(&self) -> ExtensionCli<'_, S> {
        ExtensionCli::new(&self.shell, &self.config.ide_cli)
    }

    fn sync_repo(&self) -> Result<Option<SyncRepo>> {
        match (&self.config.remote, self.use_git) {
            (Some(remote), true) => Ok(Some(SyncRepo::open_or_create(self.repo_dir(), remote)?)),
            _ => Ok(None),
        }
    }

    /// Back up IDE settings into sync repository.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Mirror`] if settings cannot be copied.
    /// - Return [`SyncError::Io`] if extension listing cannot be written.
    /// - Return [`SyncError::Remote`] if git syncing fails.
    #[instrument(skip(self), level = "debug")]
    pub fn backup(&self) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();
        let repo = self.sync_repo()?;
        if let Some(repo) = &repo {
            repo.pull()?;
        }

        info!("back up {:?} into {:?}", self.user_dir.display(), self.repo_dir().display());
        mkdirp::mkdirp(self.repo_dir()).map_err(|err| SyncError::Io {
            source: err,
            path: self.repo_dir().to_path_buf(),
        })?;
        for file in &self.config.files {
            match copy_file(self.user_dir.join(file), self.repo_dir().join(file))? {
                Some(_) => summary.files_synced += 1,
                None => summary.files_skipped += 1,
            }
        }

        for dir in &self.config.dirs {
            let report = mirror(
                self.user_dir.join(dir),
                self.repo_dir().join(dir),
                &MirrorOptions::purging(),
            )?;
            summary.count_mirror(report.skipped, report.files_copied);
        }

        let cli = self.extensions();
        if cli.is_available() {
            let installed = cli.installed()?;
            let path = self.repo_dir().join(EXTENSIONS_FILE);
            write(&path, installed.to_string()).map_err(|err| SyncError::Io {
                source: err,
                path: path.clone(),
            })?;
            info!("exported {} extensions", installed.len());
            summary.extensions = installed.len();
        } else {
            warn!("{} not found on PATH, skip extension export", self.config.ide_cli);
        }

        if let Some(repo) = &repo {
            let message = format!(
                "chore: back up settings from {} at {}",
                self.platform,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            if repo.commit_all(message)?.is_some() {
                repo.push()?;
                summary.pushed = true;
            }
        }

        Ok(summary)
    }

    /// Restore IDE settings from sync repository.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Mirror`] if settings cannot be copied.
    /// - Return [`SyncError::Remote`] if git syncing fails.
    #[instrument(skip(self), level = "debug")]
    pub fn restore(&self) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();
        if let Some(repo) = self.sync_repo()? {
            summary.pulled = repo.pull()? == PullOutcome::FastForward;
        }

        info!("restore {:?} into {:?}", self.repo_dir().display(), self.user_dir.display());
        for file in &self.config.files {
            match copy_file(self.repo_dir().join(file), self.user_dir.join(file))? {
                Some(_) => summary.files_synced += 1,
                None => summary.files_skipped += 1,
            }
        }

        for dir in &self.config.dirs {
            let report = mirror(
                self.repo_dir().join(dir),
                self.user_dir.join(dir),
                &MirrorOptions::default(),
            )?;
            summary.count_mirror(report.skipped, report.files_copied);
        }

        let Some(desired) = self.backed_up_extensions() else {
            warn!("no {EXTENSIONS_FILE} in sync repository, skip extensions");
            return Ok(summary);
        };

        let cli = self.extensions();
        if !cli.is_available() {
            warn!("{} not found on PATH, skip extension restore", self.config.ide_cli);
            return Ok(summary);
        }

        let diff = ExtensionDiff::between(&desired, &cli.installed()?);
        summary.extensions = diff.missing.len();
        summary.failed.extend(cli.install_all(&diff.missing));
        if self.config.prune_extensions {
            summary.failed.extend(cli.uninstall_all(&diff.extra));
        } else if !diff.extra.is_empty() {
            info!("{} installed extensions are not backed up", diff.extra.len());
        }

        Ok(summary)
    }

    /// Compare IDE settings with sync repository without changing anything.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Mirror`] if a directory cannot be traversed.
    /// - Return [`SyncError::Shell`] if installed extensions cannot be listed.
    pub fn status(&self) -> Result<SyncStatus> {
        let mut entries = Vec::new();
        for file in &self.config.files {
            let state = FileState::compare(&self.user_dir.join(file), &self.repo_dir().join(file));
            entries.push((file.clone(), state));
        }

        for dir in &self.config.dirs {
            let (user, repo) = (self.user_dir.join(dir), self.repo_dir().join(dir));
            let mut files = list_files(&user)?;
            files.extend(list_files(&repo)?);
            files.sort();
            files.dedup();
            for file in files {
                let state = FileState::compare(&user.join(&file), &repo.join(&file));
                entries.push((Path::new(dir).join(file).display().to_string(), state));
            }
        }

        let cli = self.extensions();
        let extensions = match (self.backed_up_extensions(), cli.is_available()) {
            (Some(desired), true) => Some(ExtensionDiff::between(&desired, &cli.installed()?)),
            _ => None,
        };

        Ok(SyncStatus {
            entries,
            extensions,
        })
    }

    fn backed_up_extensions(&self) -> Option<ExtensionList> {
        read_to_string(self.repo_dir().join(EXTENSIONS_FILE))
            .ok()
            .map(|content| ExtensionList::from(content.as_str()))
    }
}

/// Summary of a backup or restore.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    /// Files and directories synced.
    pub files_synced: usize,

    /// Files and directories skipped because they were missing.
    pub files_skipped: usize,

    /// Extensions exported on backup, or installed on restore.
    pub extensions: usize,

    /// Extensions that failed to install or uninstall.
    pub failed: Vec<String>,

    /// Changes were pushed to remote.
    pub pushed: bool,

    /// Changes were pulled from remote.
    pub pulled: bool,
}

impl SyncSummary {
    fn count_mirror(&mut self, skipped: bool, copied: usize) {
        if skipped {
            self.files_skipped += 1;
        } else {
            self.files_synced += copied;
        }
    }
}

impl Display for SyncSummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{} synced, {} skipped, {} extensions",
            self.files_synced, self.files_skipped, self.extensions
        )?;
        if !self.failed.is_empty() {
            write!(fmt, ", {} extensions failed", self.failed.len())?;
        }
        if self.pulled {
            fmt.write_str(", pulled")?;
        }
        if self.pushed {
            fmt.write_str(", pushed")?;
        }

        Ok(())
    }
}

/// State of one synced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Same,
    Differs,
    OnlyInUser,
    OnlyInRepo,
    Missing,
}

impl FileState {
    fn compare(user: &Path, repo: &Path) -> Self {
        match (user.is_file(), repo.is_file()) {
            (true, true) if same_content(user, repo) => Self::Same,
            (true, true) => Self::Differs,
            (true, false) => Self::OnlyInUser,
            (false, true) => Self::OnlyInRepo,
            (false, false) => Self::Missing,
        }
    }
}

impl Display for FileState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Same => "same",
            Self::Differs => "differs",
            Self::OnlyInUser => "not backed up",
            Self::OnlyInRepo => "not restored",
            Self::Missing => "missing",
        };
        fmt.write_str(label)
    }
}

/// Comparison between IDE settings and sync repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Every synced file path with its state.
    pub entries: Vec<(String, FileState)>,

    /// Extension difference, if both sides could be read.
    pub extensions: Option<ExtensionDiff>,
}

impl SyncStatus {
    /// Check if both sides agree entirely.
    pub fn is_clean(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, state)| matches!(state, FileState::Same | FileState::Missing))
            && self.extensions.as_ref().is_none_or(ExtensionDiff::is_empty)
    }
}

impl Display for SyncStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let width = self
            .entries
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        for (name, state) in &self.entries {
            writeln!(fmt, "{name:<width$}  {state}")?;
        }

        match &self.extensions {
            Some(diff) => {
                for id in &diff.missing {
                    writeln!(fmt, "extension {id}  not installed")?;
                }
                for id in &diff.extra {
                    writeln!(fmt, "extension {id}  not backed up")?;
                }
            }
            None => writeln!(fmt, "extensions  unknown")?,
        }

        Ok(())
    }
}

/// Settings sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// User settings directory cannot be determined.
    #[error(transparent)]
    Layout(#[from] layout::LayoutError),

    /// Settings cannot be copied.
    #[error(transparent)]
    Mirror(#[from] crate::mirror::MirrorError),

    /// Git syncing fails.
    #[error(transparent)]
    Remote(#[from] remote::RemoteError),

    /// IDE command line interface fails.
    #[error(transparent)]
    Shell(#[from] crate::syscall::ShellError),

    /// Sync repository cannot be written to.
    #[error("failed to write {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::fake::FakeShell;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::create_dir_all;

    fn config() -> SyncConfig {
        SyncConfig {
            repo_dir: "repo".into(),
            ide_cli: "antigravity".into(),
            user_dir: Some("user".into()),
            files: vec!["settings.json".into(), "keybindings.json".into()],
            dirs: vec!["snippets".into()],
            remote: None,
            prune_extensions: false,
        }
    }

    fn seed(path: &str, content: &str) {
        create_dir_all(Path::new(path).parent().unwrap()).unwrap();
        write(path, content).unwrap();
    }

    #[sealed_test]
    fn backup_copies_settings_and_exports_extensions() -> anyhow::Result<()> {
        seed("user/settings.json", r#"{ "editor.fontSize": 14 }"#);
        seed("user/snippets/rust.json", "{}");
        seed("repo/snippets/stale.json", "{}");
        let shell = FakeShell::with_programs(["antigravity"]).output(
            "antigravity --list-extensions",
            "rust-lang.rust-analyzer\nesbenp.prettier-vscode\nRust-Lang.rust-analyzer\n",
        );

        let syncer = Syncer::new(config(), shell, Platform::Linux)?;
        let summary = syncer.backup()?;

        assert_eq!(read_to_string("repo/settings.json")?, r#"{ "editor.fontSize": 14 }"#);
        assert!(Path::new("repo/snippets/rust.json").exists());
        assert!(!Path::new("repo/snippets/stale.json").exists());
        assert!(!Path::new("repo/keybindings.json").exists());
        let expect = indoc! {r#"
            esbenp.prettier-vscode
            rust-lang.rust-analyzer
        "#};
        assert_eq!(read_to_string("repo/extensions.txt")?, expect);
        assert_eq!(summary.files_synced, 2);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.extensions, 2);

        Ok(())
    }

    #[sealed_test]
    fn backup_without_ide_cli_still_copies_files() -> anyhow::Result<()> {
        seed("user/settings.json", "{}");

        let syncer = Syncer::new(config(), FakeShell::default(), Platform::Linux)?;
        let summary = syncer.backup()?;

        assert!(Path::new("repo/settings.json").exists());
        assert!(!Path::new("repo/extensions.txt").exists());
        assert_eq!(summary.extensions, 0);

        Ok(())
    }

    #[sealed_test]
    fn restore_installs_missing_extensions_only() -> anyhow::Result<()> {
        seed("repo/settings.json", "{ restored }");
        seed("repo/snippets/go.json", "{}");
        seed("user/snippets/mine.json", "{}");
        seed("repo/extensions.txt", "a.one\nb.two\nc.three\n");
        let shell = FakeShell::with_programs(["antigravity"])
            .output("antigravity --list-extensions", "B.Two\nd.four\n");

        let syncer = Syncer::new(config(), shell, Platform::Linux)?;
        let summary = syncer.restore()?;

        assert_eq!(read_to_string("user/settings.json")?, "{ restored }");
        assert!(Path::new("user/snippets/go.json").exists());
        assert!(Path::new("user/snippets/mine.json").exists());
        assert_eq!(summary.extensions, 2);
        assert_eq!(
            syncer.shell.calls(),
            vec![
                "antigravity --list-extensions",
                "antigravity --install-extension a.one",
                "antigravity --install-extension c.three",
            ]
        );

        Ok(())
    }

    #[sealed_test]
    fn restore_prunes_extra_extensions_on_request() -> anyhow::Result<()> {
        seed("repo/extensions.txt", "a.one\n");
        let shell = FakeShell::with_programs(["antigravity"])
            .output("antigravity --list-extensions", "a.one\nd.four\n")
            .fail("antigravity --uninstall-extension d.four");

        let syncer = Syncer::new(config(), shell, Platform::Linux)?.with_pruning(true);
        let summary = syncer.restore()?;

        assert_eq!(summary.failed, vec!["d.four".to_string()]);
        assert_eq!(
            syncer.shell.calls().last().map(String::as_str),
            Some("antigravity --uninstall-extension d.four")
        );

        Ok(())
    }

    #[sealed_test]
    fn status_compares_both_sides() -> anyhow::Result<()> {
        seed("user/settings.json", "{ a }");
        seed("repo/settings.json", "{ b }");
        seed("repo/keybindings.json", "[]");
        seed("user/snippets/rust.json", "{}");
        seed("repo/snippets/rust.json", "{}");

        let syncer = Syncer::new(config(), FakeShell::default(), Platform::Linux)?;
        let status = syncer.status()?;

        let expect = vec![
            ("settings.json".to_string(), FileState::Differs),
            ("keybindings.json".to_string(), FileState::OnlyInRepo),
            (
                Path::new("snippets").join("rust.json").display().to_string(),
                FileState::Same,
            ),
        ];
        assert_eq!(status.entries, expect);
        assert!(!status.is_clean());

        Ok(())
    }
}
