// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installed application inventory.
//!
//! Asks each package source that exists on the system what it has installed,
//! and merges the answers into one listing. Every source is a small parser
//! over the output of the tool that owns it.
//!
//! | Source    | Tool                                       |
//! |-----------|--------------------------------------------|
//! | registry  | `reg query` over the three uninstall keys  |
//! | dpkg      | `dpkg-query -W`                            |
//! | rpm       | `rpm -qa`                                  |
//! | pacman    | `pacman -Q`                                |
//! | brew      | `brew list --versions`                     |
//! | cask      | `brew list --cask --versions`              |
//! | flatpak   | `flatpak list --app`                       |
//! | snap      | `snap list`                                |
//! | bundle    | `/Applications/*.app`                      |

use crate::{
    path::Platform,
    syscall::{Invocation, Shell, ShellError},
};

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::write,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Directory scanned for macOS application bundles.
pub const BUNDLE_DIR: &str = "/Applications";

const UNINSTALL_KEYS: [&str; 3] = [
    r"HKLM\Software\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKLM\Software\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Uninstall",
];

/// Where an application record came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AppSource {
    Registry,
    Dpkg,
    Rpm,
    Pacman,
    Brew,
    Cask,
    Flatpak,
    Snap,
    Bundle,
}

impl AppSource {
    /// Every source in query order.
    pub const ALL: [Self; 9] = [
        Self::Registry,
        Self::Dpkg,
        Self::Rpm,
        Self::Pacman,
        Self::Brew,
        Self::Cask,
        Self::Flatpak,
        Self::Snap,
        Self::Bundle,
    ];

    /// Tool that has to be on `PATH` for source to be queried.
    pub fn program(&self) -> Option<&'static str> {
        match self {
            Self::Registry => Some("reg"),
            Self::Dpkg => Some("dpkg-query"),
            Self::Rpm => Some("rpm"),
            Self::Pacman => Some("pacman"),
            Self::Brew | Self::Cask => Some("brew"),
            Self::Flatpak => Some("flatpak"),
            Self::Snap => Some("snap"),
            Self::Bundle => None,
        }
    }

    /// Check if source makes sense on target platform.
    pub fn supports(&self, platform: Platform) -> bool {
        match self {
            Self::Registry => platform == Platform::Windows,
            Self::Cask | Self::Bundle => platform == Platform::MacOs,
            Self::Brew => platform != Platform::Windows,
            Self::Dpkg | Self::Rpm | Self::Pacman | Self::Flatpak | Self::Snap => {
                matches!(platform, Platform::Linux | Platform::Wsl)
            }
        }
    }
}

impl Display for AppSource {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Registry => "registry",
            Self::Dpkg => "dpkg",
            Self::Rpm => "rpm",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
            Self::Cask => "cask",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
            Self::Bundle => "bundle",
        };
        fmt.pad(name)
    }
}

/// One installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppRecord {
    pub name: String,
    pub version: Option<String>,
    pub publisher: Option<String>,
    pub source: AppSource,
    pub install_date: Option<NaiveDate>,
}

impl AppRecord {
    fn new(name: impl Into<String>, source: AppSource) -> Self {
        Self {
            name: name.into(),
            version: None,
            publisher: None,
            source,
            install_date: None,
        }
    }

    fn version(mut self, version: &str) -> Self {
        self.version = non_empty(version);
        self
    }

    fn publisher(mut self, publisher: &str) -> Self {
        self.publisher = non_empty(publisher);
        self
    }

    /// Check if name or publisher contains text, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.name.to_lowercase().contains(&text)
            || self
                .publisher
                .as_ref()
                .is_some_and(|publisher| publisher.to_lowercase().contains(&text))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    match value {
        "" | "(none)" => None,
        value => Some(value.to_string()),
    }
}

/// Collects application records across package sources.
#[derive(Debug)]
pub struct Inventory<S: Shell> {
    shell: S,
    platform: Platform,
    bundle_dir: PathBuf,
}

impl<S: Shell> Inventory<S> {
    pub fn new(shell: S, platform: Platform) -> Self {
        Self {
            shell,
            platform,
            bundle_dir: PathBuf::from(BUNDLE_DIR),
        }
    }

    /// Scan another directory for application bundles.
    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = dir.into();
        self
    }

    /// Sources that can be queried on this system.
    pub fn available(&self) -> Vec<AppSource> {
        AppSource::ALL
            .into_iter()
            .filter(|source| source.supports(self.platform))
            .filter(|source| source.program().is_none_or(|program| self.shell.exists(program)))
            .collect()
    }

    /// Collect records of every available source, or only the requested
    /// ones.
    ///
    /// A source that fails is reported and left out. Records are
    /// deduplicated by name and source, then sorted by name ignoring case.
    #[instrument(skip(self), level = "debug")]
    pub fn collect(&self, only: &[AppSource]) -> Vec<AppRecord> {
        let sources = if only.is_empty() {
            self.available()
        } else {
            only.to_vec()
        };

        let mut records = Vec::new();
        for source in sources {
            match self.query(source) {
                Ok(found) => {
                    debug!("{source} reported {} applications", found.len());
                    records.extend(found);
                }
                Err(err) => warn!("{err}"),
            }
        }

        normalize(records)
    }

    /// Query one source.
    ///
    /// # Errors
    ///
    /// - Return [`AppsError::Source`] if the tool of the source fails.
    /// - Return [`AppsError::Pattern`] if bundle directory cannot be searched.
    pub fn query(&self, source: AppSource) -> Result<Vec<AppRecord>> {
        let run = |invocation: Invocation| {
            self.shell
                .run(&invocation)
                .map_err(|err| AppsError::Source { source: err, kind: source })
        };

        let records = match source {
            AppSource::Registry => {
                let mut records = Vec::new();
                let mut failures = Vec::new();
                for key in UNINSTALL_KEYS {
                    match run(Invocation::new("reg").args(["query", key, "/s"])) {
                        Ok(output) => records.extend(parse_registry(&output)),
                        Err(err) => {
                            warn!("skip registry key {key}: {err}");
                            failures.push(err);
                        }
                    }
                }

                // INVARIANT: Registry source only fails when every key fails.
                if failures.len() == UNINSTALL_KEYS.len() {
                    if let Some(err) = failures.pop() {
                        return Err(err);
                    }
                }
                records
            }
            AppSource::Dpkg => parse_dpkg(&run(Invocation::new("dpkg-query").args([
                "-W",
                "-f=${db:Status-Abbrev}\t${Package}\t${Version}\t${Maintainer}\n",
            ]))?),
            AppSource::Rpm => parse_rpm(&run(Invocation::new("rpm").args([
                "-qa",
                "--queryformat",
                "%{NAME}\t%{VERSION}-%{RELEASE}\t%{VENDOR}\t%{INSTALLTIME}\n",
            ]))?),
            AppSource::Pacman => parse_pacman(&run(Invocation::new("pacman").arg("-Q"))?),
            AppSource::Brew => parse_brew(
                &run(Invocation::new("brew").args(["list", "--formula", "--versions"]))?,
                AppSource::Brew,
            ),
            AppSource::Cask => parse_brew(
                &run(Invocation::new("brew").args(["list", "--cask", "--versions"]))?,
                AppSource::Cask,
            ),
            AppSource::Flatpak => parse_flatpak(&run(Invocation::new("flatpak").args([
                "list",
                "--app",
                "--columns=name,version,origin",
            ]))?),
            AppSource::Snap => parse_snap(&run(Invocation::new("snap").arg("list"))?),
            AppSource::Bundle => bundles(&self.bundle_dir)?,
        };

        Ok(records)
    }
}

/// Deduplicate records by name and source, and sort them by name.
pub fn normalize(records: Vec<AppRecord>) -> Vec<AppRecord> {
    let mut seen = HashSet::new();
    let mut records: Vec<_> = records
        .into_iter()
        .filter(|record| seen.insert((record.name.to_lowercase(), record.source)))
        .collect();
    records.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.source.cmp(&b.source))
    });

    records
}

/// Parse `reg query <key> /s` output of an uninstall key.
///
/// Entries without a display name, and system components, are left out.
pub fn parse_registry(output: &str) -> Vec<AppRecord> {
    #[derive(Default)]
    struct Entry {
        name: Option<String>,
        version: String,
        publisher: String,
        date: Option<NaiveDate>,
        system: bool,
    }

    fn finish(entry: Entry, records: &mut Vec<AppRecord>) {
        let Some(name) = entry.name.filter(|_| !entry.system) else {
            return;
        };

        let mut record = AppRecord::new(name, AppSource::Registry)
            .version(&entry.version)
            .publisher(&entry.publisher);
        record.install_date = entry.date;
        records.push(record);
    }

    let mut records = Vec::new();
    let mut entry = Entry::default();
    for line in output.lines() {
        if line.starts_with("HKEY_") {
            finish(std::mem::take(&mut entry), &mut records);
            continue;
        }

        let mut fields = line.trim().splitn(3, "    ");
        let (Some(key), Some(_kind)) = (fields.next(), fields.next()) else {
            continue;
        };
        let value = fields.next().unwrap_or_default().trim();
        match key {
            "DisplayName" => entry.name = non_empty(value),
            "DisplayVersion" => entry.version = value.to_string(),
            "Publisher" => entry.publisher = value.to_string(),
            "InstallDate" => entry.date = NaiveDate::parse_from_str(value, "%Y%m%d").ok(),
            "SystemComponent" => entry.system = value == "0x1",
            _ => {}
        }
    }
    finish(entry, &mut records);

    records
}

/// Parse tab separated `dpkg-query` output, keeping installed packages only.
pub fn parse_dpkg(output: &str) -> Vec<AppRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let status = fields.next()?;
            let name = fields.next()?;
            if !status.trim().starts_with("ii") || name.is_empty() {
                return None;
            }

            Some(
                AppRecord::new(name, AppSource::Dpkg)
                    .version(fields.next().unwrap_or_default())
                    .publisher(fields.next().unwrap_or_default()),
            )
        })
        .collect()
}

/// Parse tab separated `rpm -qa` output.
pub fn parse_rpm(output: &str) -> Vec<AppRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next().filter(|name| !name.is_empty())?;
            let mut record = AppRecord::new(name, AppSource::Rpm)
                .version(fields.next().unwrap_or_default())
                .publisher(fields.next().unwrap_or_default());
            record.install_date = fields
                .next()
                .and_then(|secs| secs.trim().parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|stamp| stamp.date_naive());

            Some(record)
        })
        .collect()
}

/// Parse `pacman -Q` output.
pub fn parse_pacman(output: &str) -> Vec<AppRecord> {
    output
        .lines()
        .filter_map(|line| {
            let (name, version) = line.trim().split_once(' ')?;
            Some(AppRecord::new(name, AppSource::Pacman).version(version))
        })
        .collect()
}

/// Parse `brew list --versions` output, keeping the newest version.
pub fn parse_brew(output: &str, source: AppSource) -> Vec<AppRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            Some(AppRecord::new(name, source).version(fields.last().unwrap_or_default()))
        })
        .collect()
}

/// Parse tab separated `flatpak list --columns=name,version,origin` output.
pub fn parse_flatpak(output: &str) -> Vec<AppRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next().filter(|name| !name.trim().is_empty())?;
            Some(
                AppRecord::new(name.trim(), AppSource::Flatpak)
                    .version(fields.next().unwrap_or_default())
                    .publisher(fields.next().unwrap_or_default()),
            )
        })
        .collect()
}

/// Parse `snap list` output.
pub fn parse_snap(output: &str) -> Vec<AppRecord> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<_> = line.split_whitespace().collect();
            let name = fields.first()?;
            let publisher = fields
                .get(4)
                .map(|publisher| publisher.trim_end_matches(['✓', '*']))
                .unwrap_or_default();

            Some(
                AppRecord::new(*name, AppSource::Snap)
                    .version(fields.get(1).copied().unwrap_or_default())
                    .publisher(publisher),
            )
        })
        .collect()
}

/// List `.app` bundles in target directory.
///
/// # Errors
///
/// - Return [`AppsError::Pattern`] if directory cannot be searched.
pub fn bundles(dir: impl AsRef<Path>) -> Result<Vec<AppRecord>> {
    let pattern = format!(
        "{}/*.app",
        glob::Pattern::escape(&dir.as_ref().to_string_lossy())
    );

    Ok(glob::glob(&pattern)?
        .filter_map(std::result::Result::ok)
        .filter_map(|path| {
            let name = path.file_stem()?.to_string_lossy().into_owned();
            Some(AppRecord::new(name, AppSource::Bundle))
        })
        .collect())
}

/// Aligned table of records.
#[derive(Debug)]
pub struct Table<'a>(pub &'a [AppRecord]);

impl Display for Table<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let header = ["NAME", "VERSION", "PUBLISHER", "SOURCE", "INSTALLED"];
        let rows: Vec<[String; 5]> = self
            .0
            .iter()
            .map(|record| {
                [
                    record.name.clone(),
                    record.version.clone().unwrap_or_default(),
                    record.publisher.clone().unwrap_or_default(),
                    record.source.to_string(),
                    record.install_date.map(|date| date.to_string()).unwrap_or_default(),
                ]
            })
            .collect();

        let mut widths = header.map(|title| title.chars().count());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header = header.map(String::from);
        for row in std::iter::once(&header).chain(&rows) {
            let line = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(fmt, "{}", line.trim_end())?;
        }

        Ok(())
    }
}

/// Export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Determine export format through file extension.
    ///
    /// # Errors
    ///
    /// - Return [`AppsError::UnknownFormat`] for anything but `.json` and
    ///   `.csv`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            _ => Err(AppsError::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Render records in target export format.
///
/// # Errors
///
/// - Return [`AppsError::Json`] if records cannot be serialized.
pub fn render(records: &[AppRecord], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        ExportFormat::Csv => {
            let mut csv = String::from("name,version,publisher,source,install_date\n");
            for record in records {
                let fields = [
                    record.name.clone(),
                    record.version.clone().unwrap_or_default(),
                    record.publisher.clone().unwrap_or_default(),
                    record.source.to_string(),
                    record.install_date.map(|date| date.to_string()).unwrap_or_default(),
                ];
                let line = fields.iter().map(|field| csv_field(field)).collect::<Vec<_>>();
                csv.push_str(&line.join(","));
                csv.push('\n');
            }

            Ok(csv)
        }
    }
}

// INVARIANT: Quote fields holding separators, doubling embedded quotes.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write records into file, with format picked from its extension.
///
/// # Errors
///
/// - Return [`AppsError::UnknownFormat`] if extension is not supported.
/// - Return [`AppsError::Json`] if records cannot be serialized.
/// - Return [`AppsError::Export`] if file cannot be written.
pub fn export(records: &[AppRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = render(records, ExportFormat::from_path(path)?)?;
    write(path, content).map_err(|err| AppsError::Export {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Application inventory error types.
#[derive(Debug, thiserror::Error)]
pub enum AppsError {
    /// Tool behind a source failed.
    #[error("failed to query {kind} applications")]
    Source {
        #[source]
        source: ShellError,
        kind: AppSource,
    },

    /// Bundle directory cannot be searched.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Records cannot be serialized into JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Export file extension is not supported.
    #[error("cannot tell export format of {path:?}, use .json or .csv")]
    UnknownFormat { path: PathBuf },

    /// Export file cannot be written.
    #[error("failed to write export file {path:?}")]
    Export {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = AppsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::fake::FakeShell;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::create_dir_all;

    fn record(name: &str, source: AppSource) -> AppRecord {
        AppRecord::new(name, source)
    }

    #[test]
    fn registry_skips_nameless_and_system_entries() {
        let output = indoc! {r#"

            HKEY_LOCAL_MACHINE\Software\Microsoft\Windows\CurrentVersion\Uninstall\7-Zip
                DisplayName    REG_SZ    7-Zip 23.01 (x64)
                DisplayVersion    REG_SZ    23.01
                Publisher    REG_SZ    Igor Pavlov
                InstallDate    REG_SZ    20240102

            HKEY_LOCAL_MACHINE\Software\Microsoft\Windows\CurrentVersion\Uninstall\KB123
                SystemComponent    REG_DWORD    0x1
                DisplayName    REG_SZ    Hidden Update

            HKEY_LOCAL_MACHINE\Software\Microsoft\Windows\CurrentVersion\Uninstall\Orphan
                UninstallString    REG_SZ    C:\orphan\uninstall.exe

            HKEY_LOCAL_MACHINE\Software\Microsoft\Windows\CurrentVersion\Uninstall\Plex
                DisplayName    REG_SZ    Plex Media Server
                Publisher    REG_SZ
        "#};

        let mut zip = record("7-Zip 23.01 (x64)", AppSource::Registry)
            .version("23.01")
            .publisher("Igor Pavlov");
        zip.install_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        let expect = vec![zip, record("Plex Media Server", AppSource::Registry)];
        assert_eq!(parse_registry(output), expect);
    }

    fn registry_query(key: &str) -> String {
        Invocation::new("reg").args(["query", key, "/s"]).to_string()
    }

    #[test]
    fn registry_survives_missing_key() -> anyhow::Result<()> {
        let hklm = indoc! {r#"
            HKEY_LOCAL_MACHINE\Software\Microsoft\Windows\CurrentVersion\Uninstall\7-Zip
                DisplayName    REG_SZ    7-Zip
        "#};
        let shell = FakeShell::default()
            .output(&registry_query(UNINSTALL_KEYS[0]), hklm)
            .fail(&registry_query(UNINSTALL_KEYS[2]));
        let inventory = Inventory::new(shell, Platform::Windows);

        let result = inventory.query(AppSource::Registry)?;
        assert_eq!(result, vec![record("7-Zip", AppSource::Registry)]);

        Ok(())
    }

    #[test]
    fn registry_fails_when_every_key_fails() {
        let mut shell = FakeShell::default();
        for key in UNINSTALL_KEYS {
            shell = shell.fail(&registry_query(key));
        }
        let inventory = Inventory::new(shell, Platform::Windows);

        let result = inventory.query(AppSource::Registry);
        assert!(matches!(result, Err(AppsError::Source { kind: AppSource::Registry, .. })));
    }

    #[test]
    fn dpkg_keeps_installed_only() {
        let output = indoc! {"
            ii \tcurl\t8.5.0-2ubuntu10\tUbuntu Developers <ubuntu-devel@lists.ubuntu.com>
            rc \told-thing\t1.0\tNobody <nobody@example.com>
        "};
        let expect = vec![record("curl", AppSource::Dpkg)
            .version("8.5.0-2ubuntu10")
            .publisher("Ubuntu Developers <ubuntu-devel@lists.ubuntu.com>")];
        assert_eq!(parse_dpkg(output), expect);
    }

    #[test]
    fn rpm_converts_install_time() {
        let output = "bash\t5.2.26-3.fc40\tFedora Project\t1704153600\nzlib\t1.3-1\t(none)\tgarbage\n";
        let mut bash = record("bash", AppSource::Rpm)
            .version("5.2.26-3.fc40")
            .publisher("Fedora Project");
        bash.install_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        let expect = vec![bash, record("zlib", AppSource::Rpm).version("1.3-1")];
        assert_eq!(parse_rpm(output), expect);
    }

    #[test]
    fn pacman_and_brew() {
        assert_eq!(
            parse_pacman("linux 6.7.arch1-1\nvim 9.1.0-1\n"),
            vec![
                record("linux", AppSource::Pacman).version("6.7.arch1-1"),
                record("vim", AppSource::Pacman).version("9.1.0-1"),
            ]
        );
        assert_eq!(
            parse_brew("git 2.43.0 2.44.0\nffmpeg 6.1.1\n", AppSource::Brew),
            vec![
                record("git", AppSource::Brew).version("2.44.0"),
                record("ffmpeg", AppSource::Brew).version("6.1.1"),
            ]
        );
    }

    #[test]
    fn flatpak_and_snap() {
        assert_eq!(
            parse_flatpak("Firefox\t122.0\tflathub\nGIMP\t\tflathub\n"),
            vec![
                record("Firefox", AppSource::Flatpak).version("122.0").publisher("flathub"),
                record("GIMP", AppSource::Flatpak).publisher("flathub"),
            ]
        );

        let output = indoc! {"
            Name    Version   Rev    Tracking       Publisher   Notes
            core22  20240111  1122   latest/stable  canonical✓  base
            vlc     3.0.20    3777   latest/stable  videolan*   -
        "};
        assert_eq!(
            parse_snap(output),
            vec![
                record("core22", AppSource::Snap).version("20240111").publisher("canonical"),
                record("vlc", AppSource::Snap).version("3.0.20").publisher("videolan"),
            ]
        );
    }

    #[sealed_test]
    fn bundles_from_directory() -> anyhow::Result<()> {
        create_dir_all("Applications/Safari.app/Contents")?;
        create_dir_all("Applications/Utilities")?;
        let result = Inventory::new(FakeShell::default(), Platform::MacOs)
            .with_bundle_dir("Applications")
            .collect(&[AppSource::Bundle]);
        assert_eq!(result, vec![record("Safari", AppSource::Bundle)]);

        Ok(())
    }

    #[test]
    fn collect_dedupes_and_sorts() {
        let shell = FakeShell::with_programs(["pacman", "flatpak"])
            .output("pacman -Q", "zsh 5.9-5\nVim 9.1.0-1\nvim 9.1.0-1\n")
            .output(
                "flatpak list --app --columns=name,version,origin",
                "vim\t9.0\tflathub\n",
            );
        let inventory = Inventory::new(shell, Platform::Linux);

        assert_eq!(inventory.available(), vec![AppSource::Pacman, AppSource::Flatpak]);
        let result: Vec<_> = inventory
            .collect(&[])
            .into_iter()
            .map(|record| format!("{} {}", record.name, record.source))
            .collect();
        assert_eq!(result, vec!["Vim pacman", "vim flatpak", "zsh pacman"]);
    }

    #[test]
    fn filter_on_name_or_publisher() {
        let app = record("Firefox", AppSource::Flatpak).publisher("Mozilla");
        assert!(app.matches("fire"));
        assert!(app.matches("MOZ"));
        assert!(!app.matches("chrome"));
    }

    #[test]
    fn render_table_and_csv() -> anyhow::Result<()> {
        let mut zip = record("7-Zip", AppSource::Registry)
            .version("23.01")
            .publisher("Pavlov, Igor");
        zip.install_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        let records = vec![zip, record("vim", AppSource::Pacman).version("9.1")];

        let table = indoc! {"
            NAME   VERSION  PUBLISHER     SOURCE    INSTALLED
            7-Zip  23.01    Pavlov, Igor  registry  2024-01-02
            vim    9.1                    pacman
        "};
        assert_eq!(Table(&records).to_string(), table);

        let csv = indoc! {r#"
            name,version,publisher,source,install_date
            7-Zip,23.01,"Pavlov, Igor",registry,2024-01-02
            vim,9.1,,pacman,
        "#};
        assert_eq!(render(&records, ExportFormat::Csv)?, csv);

        let json: serde_json::Value = serde_json::from_str(&render(&records, ExportFormat::Json)?)?;
        assert_eq!(json[0]["install_date"], "2024-01-02");
        assert_eq!(json[1]["publisher"], serde_json::Value::Null);

        Ok(())
    }

    #[test]
    fn export_format_from_extension() {
        assert_eq!(ExportFormat::from_path("apps.JSON").ok(), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path("apps.csv").ok(), Some(ExportFormat::Csv));
        assert!(matches!(
            ExportFormat::from_path("apps.xlsx"),
            Err(AppsError::UnknownFormat { .. })
        ));
    }
}
