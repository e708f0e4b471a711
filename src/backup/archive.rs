// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup archive naming and compression.

use crate::syscall::{Invocation, Shell, ShellError};

use chrono::{Local, NaiveDateTime};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::metadata,
    path::{Path, PathBuf},
    process::Child,
    time::Duration,
};
use tracing::{debug, instrument, warn};

/// Timestamp layout embedded in archive names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// File extension of archives.
pub const ARCHIVE_EXT: &str = "7z";

/// File extension of logs that accompany archives.
pub const LOG_EXT: &str = "log";

/// Interval between archive size checks during compression.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Name of a backup archive: `<prefix>-YYYYMMDD-HHMMSS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    prefix: String,
    stamp: NaiveDateTime,
}

impl ArchiveName {
    /// Construct new archive name with explicit timestamp.
    pub fn new(prefix: impl Into<String>, stamp: NaiveDateTime) -> Self {
        Self {
            prefix: prefix.into(),
            stamp,
        }
    }

    /// Construct new archive name stamped with current local time.
    pub fn now(prefix: impl Into<String>) -> Self {
        Self::new(prefix, Local::now().naive_local())
    }

    /// Parse archive name out of file name, given the expected prefix.
    ///
    /// Returns `None` for anything that is not an archive of that prefix.
    pub fn parse(file_name: &str, prefix: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{ARCHIVE_EXT}"))?;
        let stamp = stem.strip_prefix(prefix)?.strip_prefix('-')?;
        let stamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

        Some(Self::new(prefix, stamp))
    }

    pub fn stamp(&self) -> NaiveDateTime {
        self.stamp
    }

    /// File name of archive.
    pub fn archive(&self) -> String {
        format!("{self}.{ARCHIVE_EXT}")
    }

    /// File name of log that accompanies archive.
    pub fn log(&self) -> String {
        format!("{self}.{LOG_EXT}")
    }
}

impl Display for ArchiveName {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}-{}", self.prefix, self.stamp.format(TIMESTAMP_FORMAT))
    }
}

/// Build compression invocation for target archive and inputs.
pub fn compress_invocation(
    compressor: &str,
    level: u8,
    archive: &Path,
    inputs: &[PathBuf],
) -> Invocation {
    Invocation::new(compressor)
        .args(["a", "-t7z"])
        .arg(format!("-mx={level}"))
        .arg(archive)
        .args(inputs.iter().map(|input| input.as_os_str()))
}

/// Compression running in the background.
///
/// Progress is reported by watching the archive grow on disk, since the
/// compression tool is run with silenced output.
#[derive(Debug)]
pub struct CompressionJob {
    invocation: Invocation,
    archive: PathBuf,
}

impl CompressionJob {
    pub fn new(invocation: Invocation, archive: impl Into<PathBuf>) -> Self {
        Self {
            invocation,
            archive: archive.into(),
        }
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Run compression to completion, showing a spinner with the size of
    /// the archive so far.
    ///
    /// Returns final size of archive in bytes.
    ///
    /// # Errors
    ///
    /// - Return [`ArchiveError::Shell`] if compression tool cannot start.
    /// - Return [`ArchiveError::Wait`] if compression tool cannot be waited on.
    /// - Return [`ArchiveError::Failed`] if compression tool reports failure.
    #[instrument(skip(self, shell), fields(archive = ?self.archive), level = "debug")]
    pub async fn run(&self, shell: &impl Shell) -> Result<u64> {
        let mut child = shell.spawn(&self.invocation)?;
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?;
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => {
                    abandon(&mut child, &bar);
                    return Err(ArchiveError::Wait(err));
                }
            }

            bar.set_message(format!("compressing {}", HumanBytes(self.size())));
            tokio::time::sleep(POLL_INTERVAL).await;
        };
        bar.finish_and_clear();

        if !status.success() {
            return Err(ArchiveError::Failed {
                command: self.invocation.to_string(),
                status: status.to_string(),
            });
        }

        let size = self.size();
        debug!("archive is {}", HumanBytes(size));
        Ok(size)
    }

    fn size(&self) -> u64 {
        metadata(&self.archive).map(|meta| meta.len()).unwrap_or(0)
    }
}

// INVARIANT: Never leave an unwatched compressor behind.
fn abandon(child: &mut Child, bar: &ProgressBar) {
    bar.finish_and_clear();
    if let Err(err) = child.kill().and_then(|_| child.wait()) {
        warn!("failed to stop compression tool: {err}");
    }
}

/// Archive error types.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Compression tool cannot be started.
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Compression tool cannot be waited on.
    #[error("failed to wait on compression tool")]
    Wait(#[source] std::io::Error),

    /// Compression tool reported failure.
    #[error("compression {command:?} failed: {status}")]
    Failed { command: String, status: String },

    /// Spinner template is malformed.
    #[error(transparent)]
    Template(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(4, 5, 6))
            .unwrap_or_default()
    }

    #[test]
    fn name_embeds_timestamp() {
        let name = ArchiveName::new("plex", stamp());
        assert_eq!(name.archive(), "plex-20240309-040506.7z");
        assert_eq!(name.log(), "plex-20240309-040506.log");
    }

    #[test]
    fn parse_own_archive_name() {
        let name = ArchiveName::new("plex", stamp());
        assert_eq!(ArchiveName::parse(&name.archive(), "plex"), Some(name));
    }

    #[test_case("plex-20240309-040506.log"; "log file")]
    #[test_case("other-20240309-040506.7z"; "different prefix")]
    #[test_case("plex-latest.7z"; "no timestamp")]
    #[test_case("plexx-20240309-040506.7z"; "prefix must be followed by dash")]
    #[test]
    fn parse_rejects_foreign_names(file_name: &str) {
        pretty_assertions::assert_eq!(ArchiveName::parse(file_name, "plex"), None);
    }

    #[test]
    fn compress_invocation_layout() {
        let result = compress_invocation(
            "7z",
            9,
            Path::new("/scratch/plex.7z"),
            &["/scratch/data".into(), "/scratch/registry.reg".into()],
        );
        assert_eq!(
            result.to_string(),
            "7z a -t7z -mx=9 /scratch/plex.7z /scratch/data /scratch/registry.reg"
        );
    }

    #[cfg(unix)]
    #[test]
    fn abandon_stops_and_reaps_compressor() -> anyhow::Result<()> {
        use crate::syscall::SystemShell;

        let mut child = SystemShell.spawn(&Invocation::new("sleep").arg("30"))?;
        let bar = ProgressBar::hidden();
        abandon(&mut child, &bar);

        assert!(bar.is_finished());
        assert!(child.try_wait()?.is_some_and(|status| !status.success()));

        Ok(())
    }
}
