// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Retention of backup archives.

use crate::backup::archive::{ArchiveName, ARCHIVE_EXT};

use glob::Pattern;
use std::{
    fs::remove_file,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Select archives that fall outside the retention window.
///
/// Archives are ordered by their embedded timestamp, newest first. Everything
/// after the `keep` newest is expired. Keeping zero archives means keeping all
/// of them.
pub fn expired(mut archives: Vec<ArchiveName>, keep: usize) -> Vec<ArchiveName> {
    if keep == 0 {
        return Vec::new();
    }

    archives.sort_by_key(|name| std::cmp::Reverse(name.stamp()));
    archives.into_iter().skip(keep).collect()
}

/// Remove expired archives of target prefix from directory.
///
/// The log that accompanies each expired archive is removed along with it.
/// Returns every removed path.
///
/// # Errors
///
/// - Return [`RetentionError::Pattern`] if directory cannot be searched.
/// - Return [`RetentionError::Remove`] if an expired file cannot be removed.
#[instrument(skip(dir), level = "debug")]
pub fn sweep(dir: impl AsRef<Path>, prefix: &str, keep: usize) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let pattern = format!(
        "{}/{}-*.{ARCHIVE_EXT}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(prefix)
    );

    let archives = glob::glob(&pattern)?
        .filter_map(std::result::Result::ok)
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            ArchiveName::parse(file_name, prefix)
        })
        .collect();

    let mut removed = Vec::new();
    for name in expired(archives, keep) {
        for path in [dir.join(name.archive()), dir.join(name.log())] {
            if !path.exists() {
                continue;
            }

            info!("remove expired {:?}", path.display());
            remove_file(&path).map_err(|err| RetentionError::Remove {
                source: err,
                path: path.clone(),
            })?;
            removed.push(path);
        }
    }

    Ok(removed)
}

/// Retention error types.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    /// Archive search pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Expired file cannot be removed.
    #[error("failed to remove expired file {path:?}")]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RetentionError> = std::result::Result<T, E>;
