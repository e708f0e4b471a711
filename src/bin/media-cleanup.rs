// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    backup::{
        cleanup::Cleanup,
        privilege::{is_elevated, relaunch_elevated},
    },
    config::{self, BackupConfig},
    logging,
    path::Platform,
    syscall::SystemShell,
};

use anyhow::{bail, Result};
use clap::Parser;
use std::{env, ffi::OsString, path::PathBuf, process::exit, sync::Arc};
use tracing::{error, info};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Clear media server caches and old logs",
    override_usage = "media-cleanup [options]",
    version
)]
struct Cli {
    /// Path to configuration file shared with media-backup.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Only report what would be removed.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Process was relaunched with administrative rights.
    #[arg(long, hide = true)]
    pub elevated: bool,
}

fn main() {
    if let Err(error) = logging::init("media-cleanup") {
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
        None => config::default_path("media-backup")?,
    };
    let config: BackupConfig = config::load(path)?;
    let platform = Platform::detect();
    let shell = Arc::new(SystemShell);

    if config.require_elevation && !cli.dry_run && !is_elevated(&*shell, platform) {
        if cli.elevated {
            bail!("still lacking administrative rights after relaunch");
        }

        let args: Vec<OsString> = env::args_os().skip(1).collect();
        relaunch_elevated(&*shell, platform, &env::current_exe()?, &args)?;
        return Ok(());
    }

    let report = Cleanup::new(config, shell, platform)
        .dry_run(cli.dry_run)
        .run()?;
    info!("{report}");

    Ok(())
}
