// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    config::{self, DdnsConfig},
    ddns::{http_client, public_ip, CloudflareClient, Updater},
    logging,
};

use anyhow::Result;
use clap::Parser;
use std::{net::IpAddr, path::PathBuf, process::exit};
use tracing::{error, info};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Point a DNS record at the current public address",
    override_usage = "ddns-update [options]",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Use this address instead of asking for the public one.
    #[arg(short, long, value_name = "address")]
    pub ip: Option<IpAddr>,

    /// Stop after deciding whether an update is needed.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[tokio::main]
async fn main() {
    if let Err(error) = logging::init("ddns-update") {
        eprintln!("failed to set up logging: {error:?}");
        exit(1);
    }

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let path = match cli.config {
        Some(path) => path,
        None => config::default_path("ddns-update")?,
    };
    let config: DdnsConfig = config::load(path)?;

    let ip = match cli.ip {
        Some(ip) => ip,
        None => public_ip(&http_client()?, &config.ip_url).await?,
    };

    let provider = CloudflareClient::new(&config)?;
    let outcome = Updater::new(provider, &config)
        .dry_run(cli.dry_run)
        .run(ip)
        .await?;
    info!("{}: {outcome}", config.record_name);

    Ok(())
}
