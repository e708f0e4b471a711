// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dynamic DNS updates.
//!
//! Looks up the public address of the network this machine sits in, and
//! points one DNS record at it if it does not already. The record must exist
//! beforehand; it is never created.

use crate::config::DdnsConfig;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    net::IpAddr,
    time::Duration,
};
use tracing::{debug, info, instrument};

/// Timeout of every HTTP request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// DNS address record types.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    #[default]
    A,
    AAAA,
}

impl RecordType {
    /// Check if address belongs to the family of this record type.
    pub fn fits(&self, ip: &IpAddr) -> bool {
        matches!(
            (self, ip),
            (Self::A, IpAddr::V4(_)) | (Self::AAAA, IpAddr::V6(_))
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.pad(self.as_str())
    }
}

/// DNS record as known to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DnsRecord {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

/// DNS hosting provider.
#[allow(async_fn_in_trait)]
pub trait DnsProvider {
    /// Look up record by name and type.
    ///
    /// # Errors
    ///
    /// - Return [`DdnsError::NotFound`] if no such record exists.
    /// - Return [`DdnsError::Http`] or [`DdnsError::Api`] if the provider
    ///   cannot be asked.
    async fn find_record(&self, name: &str, record_type: RecordType) -> Result<DnsRecord>;

    /// Overwrite record with new contents.
    ///
    /// # Errors
    ///
    /// - Return [`DdnsError::Http`] or [`DdnsError::Api`] if the provider
    ///   refuses.
    async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord>;
}

/// Response envelope of the Cloudflare API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

/// Cloudflare DNS API client.
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    client: Client,
    api_base: String,
    zone_id: String,
    token: String,
}

impl CloudflareClient {
    /// Construct new client for zone of configuration.
    ///
    /// # Errors
    ///
    /// - Return [`DdnsError::Http`] if HTTP client cannot be built.
    pub fn new(config: &DdnsConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            zone_id: config.zone_id.clone(),
            token: config.api_token.clone(),
        })
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, self.zone_id)
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
        let status = response.status();
        let envelope: Envelope<T> = response.json().await?;
        if !envelope.success {
            let message = envelope
                .errors
                .iter()
                .map(|err| format!("{} ({})", err.message, err.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DdnsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(envelope.result)
    }
}

impl DnsProvider for CloudflareClient {
    #[instrument(skip(self), level = "debug")]
    async fn find_record(&self, name: &str, record_type: RecordType) -> Result<DnsRecord> {
        let response = self
            .client
            .get(self.records_url())
            .bearer_auth(&self.token)
            .query(&[("type", record_type.as_str()), ("name", name)])
            .send()
            .await?;

        let records: Vec<DnsRecord> = Self::unwrap_envelope(response).await?.unwrap_or_default();
        records
            .into_iter()
            .find(|record| record.name.eq_ignore_ascii_case(name) && record.record_type == record_type)
            .ok_or_else(|| DdnsError::NotFound {
                name: name.to_string(),
                record_type,
            })
    }

    #[instrument(skip(self, record), fields(id = %record.id), level = "debug")]
    async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
        let response = self
            .client
            .put(format!("{}/{}", self.records_url(), record.id))
            .bearer_auth(&self.token)
            .json(record)
            .send()
            .await?;

        Self::unwrap_envelope(response)
            .await?
            .ok_or(DdnsError::MissingResult)
    }
}

/// Build the HTTP client shared by every request.
///
/// # Errors
///
/// - Return [`DdnsError::Http`] if TLS backend cannot be initialized.
pub fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("homeops/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Ask address echo service for public address.
///
/// # Errors
///
/// - Return [`DdnsError::Http`] if service cannot be reached.
/// - Return [`DdnsError::BadAddress`] if service answers with anything but
///   an address.
#[instrument(skip(client), level = "debug")]
pub async fn public_ip(client: &Client, url: &str) -> Result<IpAddr> {
    let body = client.get(url).send().await?.error_for_status()?.text().await?;
    let ip = body
        .trim()
        .parse()
        .map_err(|_| DdnsError::BadAddress { body: body.trim().to_string() })?;
    debug!("public address is {ip}");

    Ok(ip)
}

/// What needs to happen to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Unchanged,
    Update { from: DnsRecord, to: DnsRecord },
}

/// Decide whether record needs to change to point at address with target
/// settings.
///
/// # Errors
///
/// - Return [`DdnsError::FamilyMismatch`] if address does not fit record type.
pub fn plan(current: &DnsRecord, ip: IpAddr, ttl: u32, proxied: bool) -> Result<Plan> {
    if !current.record_type.fits(&ip) {
        return Err(DdnsError::FamilyMismatch {
            ip,
            record_type: current.record_type,
        });
    }

    let same_content = current
        .content
        .parse::<IpAddr>()
        .map(|content| content == ip)
        .unwrap_or(false);
    if same_content && current.ttl == ttl && current.proxied == proxied {
        return Ok(Plan::Unchanged);
    }

    let to = DnsRecord {
        content: ip.to_string(),
        ttl,
        proxied,
        ..current.clone()
    };
    Ok(Plan::Update {
        from: current.clone(),
        to,
    })
}

/// Outcome of an update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged { content: String },
    Planned { from: String, to: String },
    Updated { from: String, to: String },
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unchanged { content } => write!(fmt, "record already points at {content}"),
            Self::Planned { from, to } => write!(fmt, "would update record from {from} to {to}"),
            Self::Updated { from, to } => write!(fmt, "updated record from {from} to {to}"),
        }
    }
}

/// Keeps one record pointed at the current public address.
#[derive(Debug)]
pub struct Updater<P: DnsProvider> {
    provider: P,
    name: String,
    record_type: RecordType,
    ttl: u32,
    proxied: bool,
    dry_run: bool,
}

impl<P: DnsProvider> Updater<P> {
    pub fn new(provider: P, config: &DdnsConfig) -> Self {
        Self {
            provider,
            name: config.record_name.clone(),
            record_type: config.record_type,
            ttl: config.ttl,
            proxied: config.proxied,
            dry_run: false,
        }
    }

    /// Stop after planning.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Point record at target address if needed.
    ///
    /// # Errors
    ///
    /// - Return [`DdnsError::NotFound`] if record does not exist.
    /// - Return [`DdnsError::FamilyMismatch`] if address does not fit record.
    /// - Return [`DdnsError::Http`] or [`DdnsError::Api`] if the provider
    ///   fails.
    #[instrument(skip(self), fields(record = %self.name), level = "debug")]
    pub async fn run(&self, ip: IpAddr) -> Result<Outcome> {
        let current = self.provider.find_record(&self.name, self.record_type).await?;
        let (from, to) = match plan(&current, ip, self.ttl, self.proxied)? {
            Plan::Unchanged => {
                return Ok(Outcome::Unchanged {
                    content: current.content,
                })
            }
            Plan::Update { from, to } => (from, to),
        };

        if self.dry_run {
            return Ok(Outcome::Planned {
                from: from.content,
                to: to.content,
            });
        }

        info!("point {} at {}", self.name, to.content);
        let updated = self.provider.update_record(&to).await?;
        Ok(Outcome::Updated {
            from: from.content,
            to: updated.content,
        })
    }
}

/// Dynamic DNS error types.
#[derive(Debug, thiserror::Error)]
pub enum DdnsError {
    /// Request could not be performed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Provider rejected request.
    #[error("dns provider rejected request with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider accepted request without returning the record.
    #[error("dns provider did not return updated record")]
    MissingResult,

    /// Record does not exist at provider.
    #[error("no {record_type} record named {name:?}, create it first")]
    NotFound { name: String, record_type: RecordType },

    /// Address echo service returned garbage.
    #[error("expected public address, got {body:?}")]
    BadAddress { body: String },

    /// Address family does not match record type.
    #[error("address {ip} cannot be stored in {record_type} record")]
    FamilyMismatch { ip: IpAddr, record_type: RecordType },
}

/// Friendly result alias :3
pub type Result<T, E = DdnsError> = std::result::Result<T, E>;
