// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal automation toolbox.
//!
//! A handful of small command line tools for keeping a few machines in
//! order: keeping IDE settings in sync across Windows, macOS, Linux, and WSL;
//! backing up and cleaning up a media server; updating every package manager
//! at once; listing installed applications; keeping a dynamic DNS record
//! current; and wrapping `ffmpeg` and `yt-dlp` with presets.
//!
//! Each tool lives in `src/bin`, and is a thin layer of argument parsing over
//! one of the modules below. The remaining modules hold what the tools share:
//! configuration loading, logging, platform detection, external program
//! invocation, interactive menus, and directory mirroring.

pub mod apps;
pub mod backup;
pub mod config;
pub mod ddns;
pub mod logging;
pub mod media;
pub mod menu;
pub mod mirror;
pub mod path;
pub mod sync;
pub mod syscall;
pub mod update;
