// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Media server maintenance.
//!
//! Empties out directories of the media server's data directory that only
//! hold regenerable content (transcoder caches, crash reports, etc.), and
//! removes old server logs. The server is stopped while this happens, and
//! started again afterwards no matter what.

use crate::{
    backup::service::{Service, ServiceGuard},
    config::BackupConfig,
    path::Platform,
    syscall::{Shell, ShellError},
};

use indicatif::HumanBytes;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_dir, remove_dir_all, remove_file, symlink_metadata},
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::{debug, error, info, instrument, warn};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Media server maintenance run.
#[derive(Debug)]
pub struct Cleanup<S: Shell> {
    config: BackupConfig,
    shell: Arc<S>,
    platform: Platform,
    dry_run: bool,
}

impl<S: Shell> Cleanup<S> {
    pub fn new(config: BackupConfig, shell: Arc<S>, platform: Platform) -> Self {
        Self {
            config,
            shell,
            platform,
            dry_run: false,
        }
    }

    /// Only report what would be removed.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Collect every entry that would be removed.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError::OutsideData`] if a configured directory is
    ///   not inside the data directory.
    /// - Return [`CleanupError::Io`] if a directory cannot be read.
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for dir in &self.config.cleanup.purge {
            let dir = self.inside_data(dir)?;
            if !dir.is_dir() {
                warn!("skip missing directory {:?}", dir.display());
                continue;
            }

            for entry in read_dir(&dir).map_err(io_err(&dir))? {
                let path = entry.map_err(io_err(&dir))?.path();
                let bytes = disk_usage(&path)?;
                candidates.push(Candidate { path, bytes });
            }
        }

        if let Some(logs) = &self.config.cleanup.logs_dir {
            let logs = self.inside_data(logs)?;
            let max_age = Duration::from_secs(self.config.cleanup.log_max_age_days * SECS_PER_DAY);
            candidates.extend(old_files(&logs, max_age)?);
        }

        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(candidates)
    }

    fn inside_data(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let nested = path.components().count() > 0
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !nested {
            return Err(CleanupError::OutsideData {
                entry: relative.to_string(),
            });
        }

        Ok(self.config.data_dir.join(path))
    }

    fn check_entries(&self) -> Result<()> {
        let cleanup = &self.config.cleanup;
        for entry in cleanup.purge.iter().chain(cleanup.logs_dir.iter()) {
            self.inside_data(entry)?;
        }

        Ok(())
    }

    /// Perform cleanup.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError::NoData`] if data directory does not exist.
    /// - Return [`CleanupError::OutsideData`] if a configured directory is
    ///   not inside the data directory.
    /// - Return [`CleanupError::Service`] if service cannot be stopped, or
    ///   cannot be started again at the end.
    /// - Return [`CleanupError::Io`] if content cannot be read or removed.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self) -> Result<CleanupReport> {
        if !self.config.data_dir.is_dir() {
            return Err(CleanupError::NoData {
                path: self.config.data_dir.clone(),
            });
        }

        // INVARIANT: Refuse bad entries before the service goes down.
        self.check_entries()?;

        if self.dry_run {
            let candidates = self.candidates()?;
            for candidate in &candidates {
                info!(
                    "would remove {:?} ({})",
                    candidate.path.display(),
                    HumanBytes(candidate.bytes)
                );
            }
            return Ok(CleanupReport::new(candidates, true));
        }

        let guard = ServiceGuard::new(
            self.shell.clone(),
            Service::new(&self.config.service, self.platform),
        );
        let result = guard
            .stop()
            .map_err(CleanupError::Service)
            .and_then(|_| self.purge());

        // INVARIANT: Stopped service is always started again.
        if let Err(err) = guard.restart() {
            error!("{err}");
            return result.and(Err(CleanupError::Service(err)));
        }

        result
    }

    fn purge(&self) -> Result<CleanupReport> {
        let candidates = self.candidates()?;
        for candidate in &candidates {
            debug!("remove {:?}", candidate.path.display());
            let removed = if candidate.path.is_dir() {
                remove_dir_all(&candidate.path)
            } else {
                remove_file(&candidate.path)
            };
            removed.map_err(io_err(&candidate.path))?;
        }

        let report = CleanupReport::new(candidates, false);
        info!("{report}");
        Ok(report)
    }
}

/// Entry scheduled for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path to file or directory.
    pub path: PathBuf,

    /// Bytes taken up on disk.
    pub bytes: u64,
}

/// Outcome of a cleanup run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Entries that were, or would be, removed.
    pub removed: Vec<Candidate>,

    /// Total bytes reclaimed, or that would be reclaimed.
    pub reclaimed: u64,

    /// Nothing was actually removed.
    pub dry_run: bool,
}

impl CleanupReport {
    fn new(removed: Vec<Candidate>, dry_run: bool) -> Self {
        let reclaimed = removed.iter().map(|candidate| candidate.bytes).sum();
        Self {
            removed,
            reclaimed,
            dry_run,
        }
    }
}

impl Display for CleanupReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let verb = if self.dry_run { "would reclaim" } else { "reclaimed" };
        write!(
            fmt,
            "{verb} {} from {} entries",
            HumanBytes(self.reclaimed),
            self.removed.len()
        )
    }
}

fn old_files(dir: &Path, max_age: Duration) -> Result<Vec<Candidate>> {
    if !dir.is_dir() {
        warn!("skip missing log directory {:?}", dir.display());
        return Ok(Vec::new());
    }

    let now = SystemTime::now();
    let mut old = Vec::new();
    for entry in read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        let meta = symlink_metadata(&path).map_err(io_err(&path))?;
        if !meta.is_file() {
            continue;
        }

        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age > max_age {
            old.push(Candidate {
                path,
                bytes: meta.len(),
            });
        }
    }

    Ok(old)
}

fn disk_usage(path: &Path) -> Result<u64> {
    let meta = symlink_metadata(path).map_err(io_err(path))?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }

    let mut total = 0;
    for entry in read_dir(path).map_err(io_err(path))? {
        total += disk_usage(&entry.map_err(io_err(path))?.path())?;
    }

    Ok(total)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CleanupError + '_ {
    move |err| CleanupError::Io {
        source: err,
        path: path.to_path_buf(),
    }
}

/// Cleanup error types.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    /// Media server data directory does not exist.
    #[error("media server data directory {path:?} does not exist")]
    NoData { path: PathBuf },

    /// Configured directory leaves the data directory.
    #[error("cleanup entry {entry:?} must be a path inside the data directory")]
    OutsideData { entry: String },

    /// Service manager refused to stop or start the service.
    #[error("failed to control media server service")]
    Service(#[source] ShellError),

    /// File system operation failed.
    #[error("failed to clean up {path:?}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CleanupError> = std::result::Result<T, E>;
