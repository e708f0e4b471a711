// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Media conversion and download.
//!
//! Thin wrappers that remember the right incantations for `ffmpeg` and
//! `yt-dlp`, so they never have to be looked up again.

use crate::syscall::{Invocation, Shell, ShellError};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Transcoder program.
pub const FFMPEG: &str = "ffmpeg";

/// Downloader program.
pub const YT_DLP: &str = "yt-dlp";

/// Conversion presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// H.264 video with AAC audio, ready for streaming.
    Mp4,

    /// Audio only, variable bit rate MP3.
    Mp3,

    /// Small looping animation with a generated palette.
    Gif,

    /// H.265 video, audio copied as is.
    Hevc,

    /// EBU R128 loudness normalization, video copied as is.
    Loudnorm,
}

impl Preset {
    /// File extension of output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 | Self::Loudnorm => "mp4",
            Self::Mp3 => "mp3",
            Self::Gif => "gif",
            Self::Hevc => "mkv",
        }
    }

    /// Transcoder arguments placed between input and output.
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &[
                "-c:v", "libx264", "-crf", "20", "-preset", "medium", "-c:a", "aac", "-b:a",
                "192k", "-movflags", "+faststart",
            ],
            Self::Mp3 => &["-vn", "-c:a", "libmp3lame", "-q:a", "2"],
            Self::Gif => &[
                "-vf",
                "fps=12,scale=480:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
                "-loop",
                "0",
            ],
            Self::Hevc => &[
                "-c:v", "libx265", "-crf", "24", "-preset", "medium", "-c:a", "copy",
            ],
            Self::Loudnorm => &["-c:v", "copy", "-af", "loudnorm=I=-16:TP=-1.5:LRA=11"],
        }
    }
}

impl Display for Preset {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
            Self::Gif => "gif",
            Self::Hevc => "hevc",
            Self::Loudnorm => "loudnorm",
        };
        fmt.pad(name)
    }
}

/// Default output path of converting input with preset.
///
/// Output is named after the input with the extension of the preset, placed
/// next to the input, or into the output directory if given. If that would
/// overwrite the input itself, the preset name is appended to the stem.
pub fn output_path(input: &Path, preset: Preset, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let output = dir.join(format!("{stem}.{}", preset.extension()));
    if output == input {
        return dir.join(format!("{stem}-{preset}.{}", preset.extension()));
    }

    output
}

/// Build transcoder invocation.
pub fn convert_command(input: &Path, preset: Preset, output: &Path, overwrite: bool) -> Invocation {
    Invocation::new(FFMPEG)
        .arg("-hide_banner")
        .arg(if overwrite { "-y" } else { "-n" })
        .arg("-i")
        .arg(input)
        .args(preset.args().iter().copied())
        .arg(output)
}

/// Download settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Directory to download into.
    pub out_dir: PathBuf,

    /// Extract audio as MP3 instead of keeping the video.
    pub audio_only: bool,
}

/// Build downloader invocation.
pub fn download_command(url: &str, options: &DownloadOptions) -> Invocation {
    let invocation = Invocation::new(YT_DLP);
    let invocation = if options.audio_only {
        invocation.args(["-x", "--audio-format", "mp3"])
    } else {
        invocation.args(["-f", "bestvideo+bestaudio", "--merge-output-format", "mp4"])
    };

    invocation
        .arg("-o")
        .arg(options.out_dir.join("%(title)s.%(ext)s"))
        .arg(url)
}

/// Outcome of one batch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Done,
    Skipped,
    Failed(String),
}

/// Outcome of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub items: Vec<(String, ItemStatus)>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|(_, status)| matches!(status, ItemStatus::Failed(_)))
            .count()
    }

    /// Turn failures into an error.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::Batch`] if any item failed.
    pub fn check(&self) -> Result<()> {
        match self.failed() {
            0 => Ok(()),
            failed => Err(MediaError::Batch {
                failed,
                total: self.items.len(),
            }),
        }
    }
}

impl Display for BatchReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (item, status) in &self.items {
            match status {
                ItemStatus::Done => writeln!(fmt, "done     {item}")?,
                ItemStatus::Skipped => writeln!(fmt, "skipped  {item}")?,
                ItemStatus::Failed(message) => writeln!(fmt, "failed   {item}: {message}")?,
            }
        }

        Ok(())
    }
}

/// Batch conversion of many inputs with one preset.
#[derive(Debug)]
pub struct Converter<S: Shell> {
    shell: S,
    preset: Preset,
    out_dir: Option<PathBuf>,
    force: bool,
}

impl<S: Shell> Converter<S> {
    pub fn new(shell: S, preset: Preset) -> Self {
        Self {
            shell,
            preset,
            out_dir: None,
            force: false,
        }
    }

    /// Place outputs into target directory.
    pub fn out_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.out_dir = dir;
        self
    }

    /// Overwrite existing outputs.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Convert every input, continuing past failures.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::MissingTool`] if the transcoder is not on `PATH`.
    /// - Return [`MediaError::OutDir`] if output directory cannot be created.
    #[instrument(skip(self, inputs), fields(preset = %self.preset), level = "debug")]
    pub fn run(&self, inputs: &[PathBuf]) -> Result<BatchReport> {
        require(&self.shell, FFMPEG)?;
        if let Some(dir) = &self.out_dir {
            mkdirp::mkdirp(dir).map_err(|err| MediaError::OutDir {
                source: err,
                path: dir.clone(),
            })?;
        }

        let mut report = BatchReport::default();
        for input in inputs {
            let item = input.display().to_string();
            report.items.push((item, self.convert(input)));
        }

        Ok(report)
    }

    fn convert(&self, input: &Path) -> ItemStatus {
        if !input.is_file() {
            warn!("skip missing input {:?}", input.display());
            return ItemStatus::Failed("input does not exist".into());
        }

        let output = output_path(input, self.preset, self.out_dir.as_deref());
        if output.exists() && !self.force {
            warn!("skip {:?}, output {:?} already exists", input.display(), output.display());
            return ItemStatus::Skipped;
        }

        info!("convert {:?} to {:?}", input.display(), output.display());
        match self
            .shell
            .run_interactive(&convert_command(input, self.preset, &output, self.force))
        {
            Ok(()) => ItemStatus::Done,
            Err(err) => {
                warn!("{err}");
                ItemStatus::Failed(err.to_string())
            }
        }
    }
}

/// Batch download of many URLs.
#[derive(Debug)]
pub struct Downloader<S: Shell> {
    shell: S,
    options: DownloadOptions,
}

impl<S: Shell> Downloader<S> {
    pub fn new(shell: S, options: DownloadOptions) -> Self {
        Self { shell, options }
    }

    /// Download every URL, continuing past failures.
    ///
    /// # Errors
    ///
    /// - Return [`MediaError::MissingTool`] if the downloader is not on `PATH`.
    /// - Return [`MediaError::OutDir`] if output directory cannot be created.
    #[instrument(skip(self, urls), level = "debug")]
    pub fn run(&self, urls: &[String]) -> Result<BatchReport> {
        require(&self.shell, YT_DLP)?;
        mkdirp::mkdirp(&self.options.out_dir).map_err(|err| MediaError::OutDir {
            source: err,
            path: self.options.out_dir.clone(),
        })?;

        let mut report = BatchReport::default();
        for url in urls {
            info!("download {url}");
            let status = match self.shell.run_interactive(&download_command(url, &self.options)) {
                Ok(()) => ItemStatus::Done,
                Err(err) => {
                    warn!("{err}");
                    ItemStatus::Failed(err.to_string())
                }
            };
            report.items.push((url.clone(), status));
        }

        Ok(report)
    }
}

fn require(shell: &impl Shell, program: &'static str) -> Result<()> {
    if shell.exists(program) {
        Ok(())
    } else {
        Err(MediaError::MissingTool { program })
    }
}

/// Media wrapper error types.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Required program is not installed.
    #[error("{program} is not installed or not on PATH")]
    MissingTool { program: &'static str },

    /// Output directory cannot be created.
    #[error("failed to create output directory {path:?}")]
    OutDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Some items of a batch failed.
    #[error("{failed} of {total} items failed")]
    Batch { failed: usize, total: usize },

    /// Program failed.
    #[error(transparent)]
    Shell(#[from] ShellError),
}

/// Friendly result alias :3
pub type Result<T, E = MediaError> = std::result::Result<T, E>;
