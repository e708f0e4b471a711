// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that each homeops tool uses to
//! simplify the process of deserialization. Every tool reads exactly one
//! configuration file once at start-up, and never writes it back.
//!
//! # File Formats
//!
//! Configuration files are JSON by default. A file with a `.toml` extension
//! is parsed as TOML instead, with the exact same layout.
//!
//! # Shell Expansion
//!
//! Fields holding paths or secrets undergo shell expansion after parsing,
//! such that `~/backups` or `$CLOUDFLARE_API_TOKEN` resolve to their actual
//! values.

use crate::{
    ddns::RecordType,
    path::{config_dir, NoWayHome},
    update::ManagerKind,
};

use serde::{de::DeserializeOwned, Deserialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Configuration file layout of a tool.
pub trait ConfigLayout: DeserializeOwned {
    /// Perform shell expansion on fields that need it.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a variable cannot be
    ///   resolved.
    fn expand(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Serialization format of configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    /// Determine format through file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Parse configuration data in target format.
///
/// # Errors
///
/// - Return [`ConfigError::DeserializeJson`] or
///   [`ConfigError::DeserializeToml`] if data does not match layout.
/// - Return [`ConfigError::ShellExpansion`] if expansion fails.
pub fn parse<T: ConfigLayout>(data: &str, format: Format) -> Result<T> {
    let mut layout: T = match format {
        Format::Json => serde_json::from_str(data)?,
        Format::Toml => toml::de::from_str(data)?,
    };

    // INVARIANT: Perform shell expansion on every freshly parsed layout.
    layout.expand()?;

    Ok(layout)
}

/// Load configuration file at target path.
///
/// # Errors
///
/// - Return [`ConfigError::Read`] if file cannot be read.
/// - Return [`ConfigError::Parse`] if file contents are invalid.
#[instrument(skip(path), level = "debug")]
pub fn load<T: ConfigLayout>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    debug!("load configuration from {:?}", path.display());
    let data = read_to_string(path).map_err(|err| ConfigError::Read {
        source: err,
        path: path.to_path_buf(),
    })?;

    parse(&data, Format::from_path(path)).map_err(|err| ConfigError::Parse {
        source: Box::new(err),
        path: path.to_path_buf(),
    })
}

/// Determine default configuration file path of target tool.
///
/// Prefers `<config_dir>/<tool>.json`, but falls back to `<tool>.toml` if only
/// the TOML variant exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
pub fn default_path(tool: &str) -> Result<PathBuf, NoWayHome> {
    let dir = config_dir()?;
    let json = dir.join(format!("{tool}.json"));
    let toml = dir.join(format!("{tool}.toml"));
    if !json.exists() && toml.exists() {
        return Ok(toml);
    }

    Ok(json)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

fn expand_str(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)?.into_owned())
}

/// IDE settings sync layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct SyncConfig {
    /// Directory holding the backed up settings, optionally a git repository.
    pub repo_dir: PathBuf,

    /// Command line interface of the IDE used to manage extensions.
    #[serde(default = "default_ide_cli")]
    pub ide_cli: String,

    /// Override for the IDE user settings directory.
    #[serde(default)]
    pub user_dir: Option<PathBuf>,

    /// Individual files relative to user directory to sync.
    #[serde(default = "default_sync_files")]
    pub files: Vec<String>,

    /// Directories relative to user directory to mirror.
    #[serde(default = "default_sync_dirs")]
    pub dirs: Vec<String>,

    /// Git remote to sync repository directory through.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    /// Uninstall extensions that are not part of the backed up listing.
    #[serde(default)]
    pub prune_extensions: bool,
}

impl ConfigLayout for SyncConfig {
    fn expand(&mut self) -> Result<()> {
        self.repo_dir = expand_path(&self.repo_dir)?;
        if let Some(user_dir) = &self.user_dir {
            self.user_dir = Some(expand_path(user_dir)?);
        }

        Ok(())
    }
}

fn default_ide_cli() -> String {
    "antigravity".into()
}

fn default_sync_files() -> Vec<String> {
    vec!["settings.json".into(), "keybindings.json".into()]
}

fn default_sync_dirs() -> Vec<String> {
    vec!["snippets".into()]
}

/// Git remote settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct RemoteConfig {
    /// URL of remote repository.
    pub url: String,

    /// Branch to pull from and push to.
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".into()
}

/// Media server backup and cleanup layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct BackupConfig {
    /// Service to stop while its data is being touched.
    pub service: ServiceConfig,

    /// Data directory of the media server.
    pub data_dir: PathBuf,

    /// Gitignore style patterns relative to data directory to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Windows registry key to export along with the data.
    #[serde(default)]
    pub registry_key: Option<String>,

    /// Scratch directory to stage backup in before compression.
    pub scratch_dir: PathBuf,

    /// Final destination of archives and their logs.
    pub destination: PathBuf,

    /// File name prefix of archives.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Compression tool to invoke.
    #[serde(default = "default_compressor")]
    pub compressor: String,

    /// Compression level handed to the compression tool.
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,

    /// Number of most recent archives to keep.
    #[serde(default = "default_keep")]
    pub keep: usize,

    /// Relaunch with elevated privileges when needed.
    #[serde(default = "default_true")]
    pub require_elevation: bool,

    /// Cleanup settings for the cleanup half of the pair.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl ConfigLayout for BackupConfig {
    fn expand(&mut self) -> Result<()> {
        self.data_dir = expand_path(&self.data_dir)?;
        self.scratch_dir = expand_path(&self.scratch_dir)?;
        self.destination = expand_path(&self.destination)?;

        Ok(())
    }
}

fn default_prefix() -> String {
    "backup".into()
}

fn default_compressor() -> String {
    "7z".into()
}

fn default_compression_level() -> u8 {
    5
}

fn default_keep() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// Service to control during backup.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name of service as known to the service manager.
    pub name: String,

    /// Service manager to use, detected from platform when omitted.
    #[serde(default)]
    pub manager: Option<ServiceManager>,
}

/// Service manager flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceManager {
    Systemd,
    Windows,
    Launchd,
}

/// Cleanup settings of media server data directory.
#[derive(Debug, Default, PartialEq, Eq, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Directories relative to data directory to empty out.
    #[serde(default)]
    pub purge: Vec<String>,

    /// Log directory relative to data directory.
    #[serde(default)]
    pub logs_dir: Option<String>,

    /// Maximum age in days of log files to keep.
    #[serde(default = "default_log_max_age_days")]
    pub log_max_age_days: u64,
}

fn default_log_max_age_days() -> u64 {
    14
}

/// Package updater layout.
#[derive(Debug, Default, PartialEq, Eq, Clone, Deserialize)]
pub struct UpdateConfig {
    /// Package managers to never touch.
    #[serde(default)]
    pub skip: Vec<ManagerKind>,
}

impl ConfigLayout for UpdateConfig {}

/// Dynamic DNS updater layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct DdnsConfig {
    /// Bearer token of DNS provider API.
    pub api_token: String,

    /// Zone identifier containing the record.
    pub zone_id: String,

    /// Fully qualified name of record to keep updated.
    pub record_name: String,

    /// Type of record, which fixes the address family.
    #[serde(default)]
    pub record_type: RecordType,

    /// Time to live of record in seconds; 1 means automatic.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Proxy traffic through DNS provider.
    #[serde(default)]
    pub proxied: bool,

    /// Base URL of DNS provider API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Service returning the public IP address as plain text.
    #[serde(default = "default_ip_url")]
    pub ip_url: String,
}

impl ConfigLayout for DdnsConfig {
    fn expand(&mut self) -> Result<()> {
        self.api_token = expand_str(&self.api_token)?;
        self.zone_id = expand_str(&self.zone_id)?;

        Ok(())
    }
}

fn default_ttl() -> u32 {
    1
}

fn default_api_base() -> String {
    "https://api.cloudflare.com/client/v4".into()
}

fn default_ip_url() -> String {
    "https://api.ipify.org".into()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file cannot be read.
    #[error("failed to read configuration file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file has invalid contents.
    #[error("invalid configuration file {:?}", path.display())]
    Parse {
        #[source]
        source: Box<ConfigError>,
        path: PathBuf,
    },

    /// Failed to deserialize JSON configuration.
    #[error(transparent)]
    DeserializeJson(#[from] serde_json::Error),

    /// Failed to deserialize TOML configuration.
    #[error(transparent)]
    DeserializeToml(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah"), ("SETTINGS", "/srv/settings")])]
    fn deserialize_sync_config() -> anyhow::Result<()> {
        let result: SyncConfig = parse(
            r#"{
                "repo_dir": "$SETTINGS/antigravity",
                "user_dir": "~/custom/User",
                "files": ["settings.json"],
                "remote": { "url": "https://blah.org/settings.git" }
            }"#,
            Format::Json,
        )?;

        let expect = SyncConfig {
            repo_dir: "/srv/settings/antigravity".into(),
            ide_cli: "antigravity".into(),
            user_dir: Some("/home/blah/custom/User".into()),
            files: vec!["settings.json".into()],
            dirs: vec!["snippets".into()],
            remote: Some(RemoteConfig {
                url: "https://blah.org/settings.git".into(),
                branch: "main".into(),
            }),
            prune_extensions: false,
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_backup_config_from_toml() -> anyhow::Result<()> {
        let result: BackupConfig = parse(
            indoc! {r#"
                data_dir = "/var/lib/plex"
                scratch_dir = "/var/tmp/plex-backup"
                destination = "/mnt/backup/plex"
                exclude = ["Cache/", "Codecs/"]
                keep = 3

                [service]
                name = "plexmediaserver"
                manager = "systemd"

                [cleanup]
                purge = ["Cache/PhotoTranscoder"]
                logs_dir = "Logs"
            "#},
            Format::Toml,
        )?;

        let expect = BackupConfig {
            service: ServiceConfig {
                name: "plexmediaserver".into(),
                manager: Some(ServiceManager::Systemd),
            },
            data_dir: "/var/lib/plex".into(),
            exclude: vec!["Cache/".into(), "Codecs/".into()],
            registry_key: None,
            scratch_dir: "/var/tmp/plex-backup".into(),
            destination: "/mnt/backup/plex".into(),
            prefix: "backup".into(),
            compressor: "7z".into(),
            compression_level: 5,
            keep: 3,
            require_elevation: true,
            cleanup: CleanupConfig {
                purge: vec!["Cache/PhotoTranscoder".into()],
                logs_dir: Some("Logs".into()),
                log_max_age_days: 14,
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("CF_TOKEN", "sekrit")])]
    fn deserialize_ddns_config_expands_token() -> anyhow::Result<()> {
        let result: DdnsConfig = parse(
            r#"{ "api_token": "$CF_TOKEN", "zone_id": "abc", "record_name": "home.blah.org" }"#,
            Format::Json,
        )?;

        assert_eq!(result.api_token, "sekrit");
        assert_eq!(result.record_type, RecordType::A);
        assert_eq!(result.ttl, 1);
        assert_eq!(result.api_base, "https://api.cloudflare.com/client/v4");

        Ok(())
    }

    #[test]
    fn reject_unknown_package_manager() {
        let result = parse::<UpdateConfig>(r#"{ "skip": ["nix"] }"#, Format::Json);
        assert!(matches!(result, Err(ConfigError::DeserializeJson(_))));
    }

    #[sealed_test]
    fn load_reports_offending_path() {
        std::fs::write("broken.json", "{ not json").unwrap();
        let result = load::<UpdateConfig>("broken.json");
        assert!(matches!(
            result,
            Err(ConfigError::Parse { ref path, .. }) if path == Path::new("broken.json")
        ));

        let result = load::<UpdateConfig>("missing.json");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path("pkg-update.toml"), Format::Toml);
        assert_eq!(Format::from_path("pkg-update.TOML"), Format::Toml);
        assert_eq!(Format::from_path("pkg-update.json"), Format::Json);
        assert_eq!(Format::from_path("pkg-update"), Format::Json);
    }
}
