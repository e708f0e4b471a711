// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Directory mirroring.
//!
//! Recursive copying of directory trees, used to move IDE settings in and
//! out of the sync repository, and to stage media server data before
//! compression. A missing source is never an error: the copy is skipped and
//! the report says so.
//!
//! # Exclusion Rules
//!
//! Exclusion rules use gitignore syntax relative to the source directory,
//! e.g., `Cache/` leaves out every directory named "Cache", while
//! `Cache/PhotoTranscoder` only leaves out that one nested directory.

use ignore::{
    overrides::{Override, OverrideBuilder},
    WalkBuilder,
};
use std::{
    collections::HashSet,
    fs::{copy, metadata, remove_dir_all, remove_file},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Options for mirroring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorOptions {
    /// Gitignore style rules of content to leave out.
    pub exclude: Vec<String>,

    /// Remove content of destination not present in source.
    pub purge: bool,
}

impl MirrorOptions {
    /// Mirror everything, purging stale destination content.
    pub fn purging() -> Self {
        Self {
            exclude: Vec::new(),
            purge: true,
        }
    }
}

/// Summary of what mirroring did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    /// Files copied because they were new or changed.
    pub files_copied: usize,

    /// Total bytes of copied files.
    pub bytes_copied: u64,

    /// Files left alone because they were already up to date.
    pub files_unchanged: usize,

    /// Stale files and directories removed from destination.
    pub files_removed: usize,

    /// Source did not exist, so nothing happened.
    pub skipped: bool,
}

/// Mirror source directory into destination directory.
///
/// # Errors
///
/// - Return [`MirrorError::Rule`] if an exclusion rule is invalid.
/// - Return [`MirrorError::Walk`] if a directory cannot be traversed.
/// - Return [`MirrorError::Io`] if content cannot be copied or removed.
#[instrument(skip(src, dst, options), level = "debug")]
pub fn mirror(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    options: &MirrorOptions,
) -> Result<MirrorReport> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    let mut report = MirrorReport::default();
    if !src.is_dir() {
        warn!("skip missing directory {:?}", src.display());
        report.skipped = true;
        return Ok(report);
    }

    debug!("mirror {:?} to {:?}", src.display(), dst.display());
    make_dir(dst)?;

    let mut seen = HashSet::new();
    for entry in walk(src, &options.exclude)? {
        let (path, is_dir) = entry;
        let relative = path.strip_prefix(src).unwrap_or(&path).to_path_buf();
        let target = dst.join(&relative);

        if is_dir {
            make_dir(&target)?;
        } else if is_up_to_date(&path, &target) {
            report.files_unchanged += 1;
        } else {
            report.bytes_copied += copy(&path, &target).map_err(|err| MirrorError::Io {
                source: err,
                path: target.clone(),
            })?;
            report.files_copied += 1;
        }

        seen.insert(relative);
    }

    if options.purge {
        report.files_removed = purge(dst, &seen, &options.exclude)?;
    }

    Ok(report)
}

/// Copy one file, creating parent directories of destination.
///
/// Returns number of bytes copied, or `None` if source does not exist.
///
/// # Errors
///
/// - Return [`MirrorError::Io`] if file cannot be copied.
pub fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<Option<u64>> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if !src.is_file() {
        warn!("skip missing file {:?}", src.display());
        return Ok(None);
    }

    if let Some(parent) = dst.parent() {
        make_dir(parent)?;
    }

    copy(src, dst).map(Some).map_err(|err| MirrorError::Io {
        source: err,
        path: dst.to_path_buf(),
    })
}

/// Check if two files have identical content.
///
/// Two missing files count as identical.
pub fn same_content(left: impl AsRef<Path>, right: impl AsRef<Path>) -> bool {
    match (std::fs::read(left), std::fs::read(right)) {
        (Ok(left), Ok(right)) => left == right,
        (Err(_), Err(_)) => true,
        _ => false,
    }
}

/// List files below directory, relative to it and sorted.
///
/// A missing directory has no files.
///
/// # Errors
///
/// - Return [`MirrorError::Walk`] if directory cannot be traversed.
pub fn list_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = walk(root, &[])?
        .into_iter()
        .filter(|(_, is_dir)| !is_dir)
        .map(|(path, _)| path.strip_prefix(root).unwrap_or(&path).to_path_buf())
        .collect::<Vec<_>>();
    files.sort();

    Ok(files)
}

fn walk(root: &Path, exclude: &[String]) -> Result<Vec<(PathBuf, bool)>> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .overrides(excludes(root, exclude)?)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry?;

        // INVARIANT: Never report the root itself.
        if entry.depth() == 0 {
            continue;
        }

        let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
        entries.push((entry.into_path(), is_dir));
    }

    Ok(entries)
}

fn excludes(root: &Path, rules: &[String]) -> Result<Override> {
    let mut builder = OverrideBuilder::new(root);
    for rule in rules {
        // INVARIANT: Override globs whitelist by default, so negate them.
        builder
            .add(&format!("!{}", rule.trim_start_matches('!')))
            .map_err(MirrorError::Rule)?;
    }

    builder.build().map_err(MirrorError::Rule)
}

fn purge(dst: &Path, seen: &HashSet<PathBuf>, exclude: &[String]) -> Result<usize> {
    let mut removed = 0;
    for (path, is_dir) in walk(dst, exclude)? {
        let relative = path.strip_prefix(dst).unwrap_or(&path);
        if seen.contains(relative) || !path.exists() {
            continue;
        }

        debug!("purge stale {:?}", path.display());
        let result = if is_dir {
            remove_dir_all(&path)
        } else {
            remove_file(&path)
        };
        result.map_err(|err| MirrorError::Io {
            source: err,
            path: path.clone(),
        })?;
        removed += 1;
    }

    Ok(removed)
}

fn is_up_to_date(src: &Path, dst: &Path) -> bool {
    let (Ok(src_meta), Ok(dst_meta)) = (metadata(src), metadata(dst)) else {
        return false;
    };

    // INVARIANT: Only content decides, never modification times.
    src_meta.len() == dst_meta.len() && same_content(src, dst)
}

fn make_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }

    mkdirp::mkdirp(path)
        .map(|_| ())
        .map_err(|err| MirrorError::Io {
            source: err,
            path: path.to_path_buf(),
        })
}

/// Mirroring error types.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// Exclusion rule is not valid gitignore syntax.
    #[error("invalid exclusion rule")]
    Rule(#[source] ignore::Error),

    /// Directory tree cannot be traversed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// File system operation fails.
    #[error("failed to mirror {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};

    fn tree(root: &str) -> Vec<String> {
        list_files(root)
            .unwrap()
            .into_iter()
            .map(|path| path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn seed(root: &str, files: &[&str]) {
        for file in files {
            let path = Path::new(root).join(file);
            create_dir_all(path.parent().unwrap()).unwrap();
            write(&path, format!("content of {file}")).unwrap();
        }
    }

    #[sealed_test]
    fn mirror_with_purge_matches_source() -> anyhow::Result<()> {
        seed("src", &["a.json", "snippets/rust.json", "snippets/deep/x.json"]);
        seed("dst", &["stale.json", "snippets/old.json", "gone/file"]);

        let report = mirror("src", "dst", &MirrorOptions::purging())?;

        assert_eq!(tree("dst"), tree("src"));
        assert_eq!(report.files_copied, 3);
        assert_eq!(report.files_removed, 3);
        assert_eq!(read_to_string("dst/snippets/deep/x.json")?, "content of snippets/deep/x.json");

        Ok(())
    }

    #[sealed_test]
    fn mirror_without_purge_keeps_extra_content() -> anyhow::Result<()> {
        seed("src", &["a.json"]);
        seed("dst", &["mine.json"]);

        mirror("src", "dst", &MirrorOptions::default())?;

        assert_eq!(tree("dst"), vec!["a.json", "mine.json"]);

        Ok(())
    }

    #[sealed_test]
    fn mirror_honours_exclusion_rules() -> anyhow::Result<()> {
        seed(
            "data",
            &[
                "Preferences.xml",
                "Cache/blob",
                "Plug-ins/Cache/keep",
                "Media/Cache/PhotoTranscoder/x.jpg",
                "Media/Cache/other.bin",
            ],
        );
        let options = MirrorOptions {
            exclude: vec!["/Cache/".into(), "Media/Cache/PhotoTranscoder".into()],
            purge: false,
        };

        mirror("data", "scratch", &options)?;

        assert_eq!(
            tree("scratch"),
            vec!["Media/Cache/other.bin", "Plug-ins/Cache/keep", "Preferences.xml"]
        );

        Ok(())
    }

    #[sealed_test]
    fn mirror_skips_missing_source() -> anyhow::Result<()> {
        let report = mirror("nope", "dst", &MirrorOptions::purging())?;
        assert!(report.skipped);
        assert!(!Path::new("dst").exists());

        Ok(())
    }

    #[sealed_test]
    fn mirror_twice_copies_nothing_new() -> anyhow::Result<()> {
        seed("src", &["a.json", "b/c.json"]);
        mirror("src", "dst", &MirrorOptions::purging())?;
        let report = mirror("src", "dst", &MirrorOptions::purging())?;

        assert_eq!(report.files_copied, 0);
        assert_eq!(report.files_unchanged, 2);
        assert_eq!(report.files_removed, 0);

        Ok(())
    }

    #[sealed_test]
    fn mirror_copies_same_size_edit_into_newer_destination() -> anyhow::Result<()> {
        create_dir_all("src")?;
        create_dir_all("dst")?;
        write("src/settings.json", r#"{ "size": 14 }"#)?;
        write("dst/settings.json", r#"{ "size": 16 }"#)?;
        let hour_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open("src/settings.json")?
            .set_modified(hour_ago)?;

        let report = mirror("src", "dst", &MirrorOptions::purging())?;

        assert_eq!(report.files_copied, 1);
        assert_eq!(report.files_unchanged, 0);
        assert_eq!(read_to_string("dst/settings.json")?, r#"{ "size": 14 }"#);

        Ok(())
    }

    #[sealed_test]
    fn copy_file_creates_parents_and_skips_missing() -> anyhow::Result<()> {
        seed("user", &["settings.json"]);

        assert_eq!(copy_file("user/settings.json", "repo/nested/settings.json")?, Some(24));
        assert_eq!(copy_file("user/keybindings.json", "repo/keybindings.json")?, None);
        assert!(same_content("user/settings.json", "repo/nested/settings.json"));
        assert!(!same_content("user/settings.json", "repo/keybindings.json"));

        Ok(())
    }
}
