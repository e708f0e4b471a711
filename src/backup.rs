// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Media server backup.
//!
//! A backup stages a copy of the media server's data directory on a scratch
//! disk while the server is stopped, then compresses that copy into a
//! timestamped archive while the server is already running again. The archive
//! and the log of the run end up in the destination directory, where only the
//! most recent archives are kept.
//!
//! # Service Guarantee
//!
//! Once stopped, the media server is always started again, even if any later
//! step of the backup fails.
//!
//! # See Also
//!
//! - [`cleanup`] for the maintenance half of the pair.

pub mod archive;
pub mod cleanup;
pub mod privilege;
pub mod retention;
pub mod service;

use crate::{
    backup::{
        archive::{compress_invocation, ArchiveError, ArchiveName, CompressionJob},
        privilege::is_elevated,
        retention::RetentionError,
        service::{Service, ServiceGuard},
    },
    config::BackupConfig,
    logging::{LogError, LogHandle},
    mirror::{mirror, MirrorError, MirrorOptions},
    path::Platform,
    syscall::{Invocation, Shell, ShellError},
};

use indicatif::HumanBytes;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{copy, remove_dir_all, remove_file, rename},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info, instrument, warn};

/// Directory inside scratch directory holding the staged data.
pub const STAGING_DIR: &str = "data";

/// File inside scratch directory holding the exported registry key.
pub const REGISTRY_FILE: &str = "registry.reg";

/// Media server backup run.
#[derive(Debug)]
pub struct Backup<S: Shell> {
    config: BackupConfig,
    shell: Arc<S>,
    platform: Platform,
    name: ArchiveName,
    log: Option<LogHandle>,
    dry_run: bool,
}

impl<S: Shell> Backup<S> {
    /// Construct new backup run whose archive is stamped with current time.
    pub fn new(config: BackupConfig, shell: Arc<S>, platform: Platform) -> Self {
        let name = ArchiveName::now(config.prefix.as_str());
        Self {
            config,
            shell,
            platform,
            name,
            log: None,
            dry_run: false,
        }
    }

    /// Use explicit archive name instead.
    pub fn with_name(mut self, name: ArchiveName) -> Self {
        self.name = name;
        self
    }

    /// Move log file next to the archive when done.
    pub fn with_log(mut self, log: LogHandle) -> Self {
        self.log = Some(log);
        self
    }

    /// Only report planned steps.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Describe every step the backup would take.
    pub fn plan(&self) -> Vec<String> {
        let service = self.service();
        let mut steps = vec![
            format!("run {}", service.stop_invocation()),
            format!(
                "mirror {:?} to {:?}",
                self.config.data_dir.display(),
                self.staging_dir().display()
            ),
        ];
        if let Some(invocation) = self.registry_invocation() {
            steps.push(format!("run {invocation}"));
        }
        steps.push(format!(
            "run {}",
            self.compression_job(self.registry_invocation().is_some())
                .invocation()
        ));
        steps.push(format!("run {}", service.start_invocation()));
        steps.push(format!(
            "move {:?} to {:?}",
            self.name.archive(),
            self.config.destination.display()
        ));
        steps.push(format!(
            "remove {:?}",
            self.config.scratch_dir.display()
        ));
        steps.push(format!(
            "keep {} newest archives in {:?}",
            self.config.keep,
            self.config.destination.display()
        ));

        steps
    }

    /// Perform backup.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::NotElevated`] if elevation is required but
    ///   missing.
    /// - Return [`BackupError::NoData`] if data directory does not exist.
    /// - Return [`BackupError::Service`] if service cannot be stopped, or
    ///   cannot be started again at the end.
    /// - Return [`BackupError::Mirror`] if data cannot be staged.
    /// - Return [`BackupError::Registry`] if registry key cannot be exported.
    /// - Return [`BackupError::Archive`] if compression fails.
    /// - Return [`BackupError::Io`] if archive cannot be moved, or scratch
    ///   directory cannot be prepared or removed.
    /// - Return [`BackupError::Log`] if log file cannot be moved.
    /// - Return [`BackupError::Retention`] if expired archives cannot be
    ///   removed.
    #[instrument(skip(self), fields(archive = %self.name), level = "debug")]
    pub async fn run(&self) -> Result<BackupReport> {
        if self.dry_run {
            for step in self.plan() {
                info!("would {step}");
            }
            return Ok(BackupReport::default());
        }

        let guard = Arc::new(ServiceGuard::new(self.shell.clone(), self.service()));
        let result = self.pipeline(&guard).await;

        // INVARIANT: Stopped service is always started again.
        if guard.is_stopped() {
            warn!("service is still stopped, starting it again");
            if let Err(err) = guard.restart() {
                error!("{err}");
                return result.and(Err(BackupError::Service(err)));
            }
        }

        result
    }

    async fn pipeline(&self, guard: &Arc<ServiceGuard<S>>) -> Result<BackupReport> {
        if self.config.require_elevation && !is_elevated(self.shell.as_ref(), self.platform) {
            return Err(BackupError::NotElevated);
        }

        if !self.config.data_dir.is_dir() {
            return Err(BackupError::NoData {
                path: self.config.data_dir.clone(),
            });
        }

        reset_dir(&self.config.scratch_dir)?;
        guard.stop().map_err(BackupError::Service)?;

        let options = MirrorOptions {
            exclude: self.config.exclude.clone(),
            purge: false,
        };
        let staged = mirror(&self.config.data_dir, self.staging_dir(), &options)?;
        info!(
            "staged {} files ({})",
            staged.files_copied,
            HumanBytes(staged.bytes_copied)
        );

        let mut report = BackupReport {
            files_staged: staged.files_copied,
            bytes_staged: staged.bytes_copied,
            registry_exported: self.export_registry()?,
            ..Default::default()
        };

        let job = self.compression_job(report.registry_exported);
        let restart = {
            let guard = Arc::clone(guard);
            tokio::task::spawn_blocking(move || guard.restart())
        };
        let (compressed, restarted) = tokio::join!(job.run(self.shell.as_ref()), restart);
        match restarted {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!("failed to start service during compression: {err}"),
            Err(err) => warn!("service restart task failed: {err}"),
        }
        report.archive_size = compressed?;

        self.store(report)
    }

    fn store(&self, mut report: BackupReport) -> Result<BackupReport> {
        let destination = &self.config.destination;
        mkdirp::mkdirp(destination).map_err(|err| BackupError::Io {
            source: err,
            path: destination.clone(),
        })?;

        let archive = destination.join(self.name.archive());
        move_file(&self.scratch_archive(), &archive)?;
        info!("stored archive {:?}", archive.display());

        if let Some(log) = &self.log {
            log.relocate(destination.join(self.name.log()))?;
        }

        remove_dir_all(&self.config.scratch_dir).map_err(|err| BackupError::Io {
            source: err,
            path: self.config.scratch_dir.clone(),
        })?;

        report.removed = retention::sweep(destination, &self.config.prefix, self.config.keep)?;
        report.archive = Some(archive);

        Ok(report)
    }

    fn export_registry(&self) -> Result<bool> {
        let Some(invocation) = self.registry_invocation() else {
            if let Some(key) = &self.config.registry_key {
                warn!("skip export of registry key {key:?} outside of windows");
            }
            return Ok(false);
        };

        self.shell.run(&invocation).map_err(BackupError::Registry)?;
        Ok(true)
    }

    fn registry_invocation(&self) -> Option<Invocation> {
        let key = self.config.registry_key.as_deref()?;
        if self.platform != Platform::Windows {
            return None;
        }

        Some(
            Invocation::new("reg")
                .args(["export", key])
                .arg(self.config.scratch_dir.join(REGISTRY_FILE))
                .arg("/y"),
        )
    }

    fn compression_job(&self, with_registry: bool) -> CompressionJob {
        let mut inputs = vec![self.staging_dir()];
        if with_registry {
            inputs.push(self.config.scratch_dir.join(REGISTRY_FILE));
        }

        let archive = self.scratch_archive();
        let invocation = compress_invocation(
            &self.config.compressor,
            self.config.compression_level,
            &archive,
            &inputs,
        );

        CompressionJob::new(invocation, archive)
    }

    fn service(&self) -> Service {
        Service::new(&self.config.service, self.platform)
    }

    fn staging_dir(&self) -> PathBuf {
        self.config.scratch_dir.join(STAGING_DIR)
    }

    fn scratch_archive(&self) -> PathBuf {
        self.config.scratch_dir.join(self.name.archive())
    }
}

/// Outcome of a backup run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Final location of archive, absent on dry runs.
    pub archive: Option<PathBuf>,

    /// Size of archive in bytes.
    pub archive_size: u64,

    /// Number of files staged for compression.
    pub files_staged: usize,

    /// Number of bytes staged for compression.
    pub bytes_staged: u64,

    /// Registry key was exported along with the data.
    pub registry_exported: bool,

    /// Expired archives and logs that were removed.
    pub removed: Vec<PathBuf>,
}

impl Display for BackupReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let Some(archive) = &self.archive else {
            return fmt.write_str("nothing was backed up");
        };

        write!(
            fmt,
            "backed up {} files ({}) into {:?} ({})",
            self.files_staged,
            HumanBytes(self.bytes_staged),
            archive.display(),
            HumanBytes(self.archive_size),
        )?;
        if !self.removed.is_empty() {
            write!(fmt, ", removed {} expired files", self.removed.len())?;
        }

        Ok(())
    }
}

fn reset_dir(path: &Path) -> Result<()> {
    let io_err = |err| BackupError::Io {
        source: err,
        path: path.to_path_buf(),
    };

    if path.exists() {
        warn!("clear leftover scratch directory {:?}", path.display());
        remove_dir_all(path).map_err(io_err)?;
    }
    mkdirp::mkdirp(path).map_err(io_err)?;

    Ok(())
}

// INVARIANT: Fall back to copy and delete when rename cannot cross devices.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if rename(from, to).is_ok() {
        return Ok(());
    }

    copy(from, to)
        .and_then(|_| remove_file(from))
        .map_err(|err| BackupError::Move {
            source: err,
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        })
}

/// Backup error types.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Administrative rights are missing.
    #[error("backup requires administrative rights")]
    NotElevated,

    /// Media server data directory does not exist.
    #[error("media server data directory {path:?} does not exist")]
    NoData { path: PathBuf },

    /// Service manager refused to stop or start the service.
    #[error("failed to control media server service")]
    Service(#[source] ShellError),

    /// Data could not be staged.
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// Registry key could not be exported.
    #[error("failed to export registry key")]
    Registry(#[source] ShellError),

    /// Compression failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Archive could not be moved to its destination.
    #[error("failed to move {from:?} to {to:?}")]
    Move {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// File system operation failed.
    #[error("failed to access {path:?}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Log file could not be moved next to the archive.
    #[error(transparent)]
    Log(#[from] LogError),

    /// Expired archives could not be removed.
    #[error(transparent)]
    Retention(#[from] RetentionError),
}

/// Friendly result alias :3
pub type Result<T, E = BackupError> = std::result::Result<T, E>;
