// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    logging,
    media::{Converter, Preset},
    syscall::SystemShell,
};

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::error;

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Convert media files with ffmpeg presets",
    override_usage = "media-convert [options] <preset> <input>...",
    version
)]
struct Cli {
    /// Conversion preset to apply.
    #[arg(value_name = "preset")]
    pub preset: Preset,

    /// Files to convert.
    #[arg(required = true, value_name = "input")]
    pub inputs: Vec<PathBuf>,

    /// Directory to place outputs in, instead of next to each input.
    #[arg(short, long, value_name = "path")]
    pub out_dir: Option<PathBuf>,

    /// Overwrite existing outputs.
    #[arg(short, long)]
    pub force: bool,
}

fn main() {
    if let Err(error) = logging::init("media-convert") {
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
    let report = Converter::new(SystemShell, cli.preset)
        .out_dir(cli.out_dir)
        .force(cli.force)
        .run(&cli.inputs)?;
    print!("{report}");
    report.check()?;

    Ok(())
}
