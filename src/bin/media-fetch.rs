// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    logging,
    media::{DownloadOptions, Downloader},
    syscall::SystemShell,
};

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::error;

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Download videos or their audio with yt-dlp",
    override_usage = "media-fetch [options] <url>...",
    version
)]
struct Cli {
    /// Addresses to download.
    #[arg(required = true, value_name = "url")]
    pub urls: Vec<String>,

    /// Directory to download into.
    #[arg(short, long, value_name = "path", default_value = ".")]
    pub out_dir: PathBuf,

    /// Keep only the audio, as MP3.
    #[arg(short, long)]
    pub audio_only: bool,
}

fn main() {
    if let Err(error) = logging::init("media-fetch") {
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
    let options = DownloadOptions {
        out_dir: cli.out_dir,
        audio_only: cli.audio_only,
    };
    let report = Downloader::new(SystemShell, options).run(&cli.urls)?;
    print!("{report}");
    report.check()?;

    Ok(())
}
