// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use homeops::{
    config::{self, SyncConfig},
    logging,
    menu::{self, InquirePrompter, MenuChoice, Prompter},
    path::Platform,
    sync::Syncer,
    syscall::SystemShell,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Keep IDE settings, snippets, and extensions in sync across machines",
    override_usage = "\n  ide-sync [options]\n  ide-sync [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Leave git remote alone, even if one is configured.
    #[arg(long)]
    pub no_git: bool,

    /// Uninstall extensions that are not part of the backed up listing.
    #[arg(long)]
    pub prune_extensions: bool,

    /// Run one action, instead of showing the interactive menu.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Copy IDE settings into sync repository.
    Backup,

    /// Copy settings from sync repository back into IDE.
    Restore,

    /// Compare IDE settings with sync repository.
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Run(Command),
    Exit,
}

impl MenuChoice for Action {
    fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Run(Command::Backup) => "Back up settings",
            Self::Run(Command::Restore) => "Restore settings",
            Self::Run(Command::Status) => "Show status",
            Self::Exit => "Exit",
        };
        fmt.write_str(label)
    }
}

fn main() {
    if let Err(error) = logging::init("ide-sync") {
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
        None => config::default_path("ide-sync")?,
    };
    let config: SyncConfig = config::load(path)?;
    let syncer = Syncer::new(config, SystemShell, Platform::detect())?
        .with_git(!cli.no_git)
        .with_pruning(cli.prune_extensions);

    match cli.command {
        Some(command) => run_command(&syncer, command),
        None => run_menu(&syncer),
    }
}

fn run_menu(syncer: &Syncer<SystemShell>) -> Result<()> {
    let choices = [
        Action::Run(Command::Backup),
        Action::Run(Command::Restore),
        Action::Run(Command::Status),
        Action::Exit,
    ];

    let mut prompter = InquirePrompter;
    let mut confirm = InquirePrompter;
    menu::run_loop(&mut prompter, "What should be synced?", &choices, |action| {
        let Action::Run(command) = action else {
            return Ok(());
        };

        if command == Command::Restore
            && !confirm.confirm("Overwrite current IDE settings with backed up ones?")?
        {
            info!("restore cancelled");
            return Ok(());
        }

        run_command(syncer, command)
    })?;

    Ok(())
}

fn run_command(syncer: &Syncer<SystemShell>, command: Command) -> Result<()> {
    match command {
        Command::Backup => info!("backup done: {}", syncer.backup()?),
        Command::Restore => info!("restore done: {}", syncer.restore()?),
        Command::Status => {
            let status = syncer.status()?;
            print!("{status}");
            if status.is_clean() {
                info!("settings are in sync");
            }
        }
    }

    Ok(())
}
