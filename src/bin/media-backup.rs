// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    backup::{
        archive::TIMESTAMP_FORMAT,
        privilege::{is_elevated, relaunch_elevated},
        Backup,
    },
    config::{self, BackupConfig},
    logging::{self, LogHandle},
    path::Platform,
    syscall::SystemShell,
};

use anyhow::{bail, Result};
use chrono::Local;
use clap::Parser;
use std::{env, ffi::OsString, path::PathBuf, process::exit, sync::Arc};
use tracing::{error, info};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Back up media server data into a timestamped archive",
    override_usage = "media-backup [options]",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Only show what would be done.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Process was relaunched with administrative rights.
    #[arg(long, hide = true)]
    pub elevated: bool,
}

#[tokio::main]
async fn main() {
    let started = Local::now().format(TIMESTAMP_FORMAT);
    let log = match logging::init_run("media-backup", &started.to_string()) {
        Ok(log) => log,
        Err(error) => {
            eprintln!("failed to set up logging: {error:?}");
            exit(1);
        }
    };

    if let Err(error) = run(log).await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run(log: LogHandle) -> Result<()> {
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

        // INVARIANT: Only the elevated run keeps a log.
        log.discard()?;
        let args: Vec<OsString> = env::args_os().skip(1).collect();
        relaunch_elevated(&*shell, platform, &env::current_exe()?, &args)?;
        return Ok(());
    }

    let report = Backup::new(config, shell, platform)
        .with_log(log)
        .dry_run(cli.dry_run)
        .run()
        .await?;
    info!("{report}");

    Ok(())
}
