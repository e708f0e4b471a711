// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    backup::privilege::is_elevated,
    config::{self, UpdateConfig},
    logging,
    path::Platform,
    syscall::SystemShell,
    update::{ManagerKind, Updater},
};

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::error;

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Upgrade everything through every installed package manager",
    override_usage = "pkg-update [options]",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Package manager to leave alone.
    #[arg(short, long, value_name = "manager")]
    pub skip: Vec<ManagerKind>,

    /// Only update these package managers.
    #[arg(short, long, value_name = "manager")]
    pub only: Vec<ManagerKind>,

    /// Only show what would be run.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// List package managers and whether they are installed.
    #[arg(short, long)]
    pub list: bool,
}

fn main() {
    if let Err(error) = logging::init("pkg-update") {
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
    let path = match cli.config {
        Some(path) => path,
        None => config::default_path("pkg-update")?,
    };

    // INVARIANT: Updater works without a configuration file.
    let config: UpdateConfig = if path.exists() {
        config::load(path)?
    } else {
        UpdateConfig::default()
    };

    let platform = Platform::detect();
    let updater = Updater::new(SystemShell, platform)
        .skip(config.skip)
        .skip(cli.skip)
        .only(cli.only)
        .elevated(platform.is_unix() && is_elevated(&SystemShell, platform))
        .dry_run(cli.dry_run);

    if cli.list {
        for (kind, installed) in updater.listing() {
            let state = if installed { "installed" } else { "not installed" };
            println!("{kind:<8} {:<8} {state}", kind.program());
        }
        return Ok(());
    }

    let summary = updater.run();
    print!("{summary}");
    summary.check()?;

    Ok(())
}
