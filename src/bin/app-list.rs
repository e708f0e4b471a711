// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    apps::{self, AppSource, Inventory, Table},
    logging,
    path::Platform,
    syscall::SystemShell,
};

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::{error, info};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "List installed applications across every package source",
    override_usage = "app-list [options]",
    version
)]
struct Cli {
    /// Only show applications whose name or publisher contains this text.
    #[arg(short, long, value_name = "text")]
    pub filter: Option<String>,

    /// Only ask these sources.
    #[arg(short, long, value_name = "source")]
    pub source: Vec<AppSource>,

    /// Write listing into file instead, as JSON or CSV by extension.
    #[arg(short, long, value_name = "path")]
    pub export: Option<PathBuf>,
}

fn main() {
    if let Err(error) = logging::init("app-list") {
        eprintln!("failed to set up logging: {error:?}");
        exit(1);
    }

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut records = Inventory::new(SystemShell, Platform::detect()).collect(&cli.source);
    if let Some(text) = &cli.filter {
        records.retain(|record| record.matches(text));
    }

    match cli.export {
        Some(path) => {
            apps::export(&records, &path)?;
            info!("exported {} applications to {:?}", records.len(), path.display());
        }
        None => {
            print!("{}", Table(&records));
            info!("{} applications", records.len());
        }
    }

    Ok(())
}
