// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Console and log file output.
//!
//! Every tool reports its progress twice: a compact human readable stream on
//! standard error, and a flat timestamped log file. The log file of each tool
//! lives at `<data_local_dir>/homeops/logs/<tool>.log`, and is rolled over to
//! `<tool>.log.1` once it grows past [`MAX_LOG_SIZE`] at start-up.

use crate::path::{log_dir, NoWayHome};

use std::{
    fs::{copy, remove_file, rename, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Size in bytes after which a tool log file gets rolled over.
pub const MAX_LOG_SIZE: u64 = 1024 * 1024;

/// Install logging for target tool using its rolling log file.
///
/// # Errors
///
/// - Return [`LogError::NoWayHome`] if log directory cannot be determined.
/// - Return [`LogError::Io`] if log file cannot be rolled or opened.
/// - Return [`LogError::Install`] if logging was already installed.
pub fn init(tool: &str) -> Result<LogHandle> {
    let path = log_dir()?.join(format!("{tool}.log"));
    roll_over(&path, MAX_LOG_SIZE)?;
    init_at(path)
}

/// Install logging for one run of target tool, using a fresh log file.
///
/// The log file is named `<tool>-<run>.log` inside the tool's own log
/// directory, and is meant to be relocated once the run is done.
///
/// # Errors
///
/// - Return [`LogError::NoWayHome`] if log directory cannot be determined.
/// - Return [`LogError::Io`] if log file cannot be opened.
/// - Return [`LogError::Install`] if logging was already installed.
pub fn init_run(tool: &str, run: &str) -> Result<LogHandle> {
    init_at(log_dir()?.join(tool).join(format!("{tool}-{run}.log")))
}

/// Install logging with explicit log file path.
///
/// # Errors
///
/// - Return [`LogError::Io`] if log file cannot be opened.
/// - Return [`LogError::Filter`] if `RUST_LOG` cannot be parsed.
/// - Return [`LogError::Install`] if logging was already installed.
pub fn init_at(path: impl Into<PathBuf>) -> Result<LogHandle> {
    let file = Arc::new(LogFile::open(path)?);
    let console = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(io::stderr);
    let logfile = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(file.clone());
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(console)
        .with(logfile)
        .with(filter)
        .try_init()?;

    Ok(LogHandle { file })
}

/// Handle to installed log file.
#[derive(Debug, Clone)]
pub struct LogHandle {
    file: Arc<LogFile>,
}

impl LogHandle {
    /// Current path of log file.
    pub fn path(&self) -> PathBuf {
        self.file.path()
    }

    /// Move log file to new location, and keep logging there.
    ///
    /// # Errors
    ///
    /// - Return [`LogError::Io`] if log file cannot be moved.
    pub fn relocate(&self, dest: impl AsRef<Path>) -> Result<()> {
        self.file.relocate(dest)
    }

    /// Remove log file, and drop whatever gets logged from now on.
    ///
    /// # Errors
    ///
    /// - Return [`LogError::Io`] if log file cannot be removed.
    pub fn discard(&self) -> Result<()> {
        self.file.discard()
    }
}

#[cfg(test)]
impl LogHandle {
    /// Handle to log file that no subscriber writes to.
    pub(crate) fn detached(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            file: Arc::new(LogFile::open(path)?),
        })
    }
}

/// Log file shared between logging layer and its handle.
#[derive(Debug)]
pub struct LogFile {
    state: Mutex<LogState>,
}

#[derive(Debug)]
struct LogState {
    // INVARIANT: None once the log file was discarded.
    file: Option<File>,
    path: PathBuf,
}

impl LogFile {
    /// Open log file for appending, creating it and its parents if needed.
    ///
    /// # Errors
    ///
    /// - Return [`LogError::Io`] if file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            mkdirp::mkdirp(parent).map_err(|err| LogError::Io {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let file = open_append(&path)?;
        Ok(Self {
            state: Mutex::new(LogState {
                file: Some(file),
                path,
            }),
        })
    }

    /// Current path of log file.
    pub fn path(&self) -> PathBuf {
        match self.state.lock() {
            Ok(state) => state.path.clone(),
            Err(poisoned) => poisoned.into_inner().path.clone(),
        }
    }

    /// Move log file to new location, and keep appending there.
    ///
    /// # Errors
    ///
    /// - Return [`LogError::Io`] if log file cannot be moved.
    /// - Return [`LogError::Poisoned`] if a writer panicked mid-write.
    pub fn relocate(&self, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        let mut guard = self.state.lock().map_err(|_| LogError::Poisoned)?;
        let state = &mut *guard;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |err| LogError::Io { source: err, path }
        };

        let Some(file) = state.file.as_mut() else {
            return Ok(());
        };
        file.flush().map_err(io_err(&state.path))?;
        if let Some(parent) = dest.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            mkdirp::mkdirp(parent).map_err(io_err(parent))?;
        }

        // INVARIANT: Copy then reopen, because an open file cannot be renamed
        // on every platform.
        copy(&state.path, dest).map_err(io_err(dest))?;
        let old = state.file.replace(open_append(dest)?);
        drop(old);
        remove_file(&state.path).map_err(io_err(&state.path))?;
        state.path = dest.to_path_buf();

        Ok(())
    }

    /// Stop writing to log file, and remove it.
    ///
    /// # Errors
    ///
    /// - Return [`LogError::Io`] if log file cannot be removed.
    /// - Return [`LogError::Poisoned`] if a writer panicked mid-write.
    pub fn discard(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| LogError::Poisoned)?;
        if state.file.take().is_some() {
            remove_file(&state.path).map_err(|err| LogError::Io {
                source: err,
                path: state.path.clone(),
            })?;
        }

        Ok(())
    }
}

impl Write for &LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        match state.file.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        match state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| LogError::Io {
            source: err,
            path: path.to_path_buf(),
        })
}

/// Roll log file over to `<name>.1` once it exceeds target size.
///
/// # Errors
///
/// - Return [`LogError::Io`] if log file cannot be renamed.
pub fn roll_over(path: &Path, max_size: u64) -> Result<()> {
    let Ok(metadata) = path.metadata() else {
        return Ok(());
    };

    if metadata.len() <= max_size {
        return Ok(());
    }

    let mut rolled = path.as_os_str().to_owned();
    rolled.push(".1");
    let rolled = PathBuf::from(rolled);
    if rolled.exists() {
        remove_file(&rolled).map_err(|err| LogError::Io {
            source: err,
            path: rolled.clone(),
        })?;
    }

    rename(path, &rolled).map_err(|err| LogError::Io {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Logging error types.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Log directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Log file cannot be manipulated.
    #[error("failed to access log file {:?}", path.display())]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Log filter directive is invalid.
    #[error(transparent)]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// Global subscriber already installed.
    #[error(transparent)]
    Install(#[from] tracing_subscriber::util::TryInitError),

    /// Log file lock poisoned.
    #[error("log file lock poisoned")]
    Poisoned,
}

/// Friendly result alias :3
pub type Result<T, E = LogError> = std::result::Result<T, E>;
