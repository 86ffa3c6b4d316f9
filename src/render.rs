//! Turning finalized reports into files on disk through external tools.
//!
//! Rendering writes `<name>.tex`, runs the typesetting engine on it and optionally rasterises
//! the resulting PDF.  Video encoding of frame sequences is offered alongside as an independent
//! operation.  Every external program is started through a [`CommandRunner`], which the default
//! [`SystemRunner`] implements on top of [`std::process::Command`].

use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use thiserror::Error;

use crate::document::Report;

/// Substring in the typesetting log that marks an aborted run.
pub const FATAL_MARKER: &str = "Emergency";

/// Resolution of the PNG produced from the typeset PDF.
pub const DEFAULT_DENSITY_DPI: u32 = 400;

/// Frame rate used when encoding frame sequences into a video.
pub const DEFAULT_VIDEO_FPS: u32 = 15;

/// Errors raised while rendering reports or encoding videos.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The report was not closed with [`Report::finalize`] before rendering.
    #[error("report '{0}' must be finalized before rendering")]
    NotFinalized(String),
    /// Creating the output directory or writing the markup failed.
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The external program could not be started.
    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The typesetting log contained the fatal marker.
    #[error("typesetting '{report}' stopped with a fatal error:\n{output}")]
    Typesetting { report: String, output: String },
    /// The raster conversion exited unsuccessfully.
    #[error("converting '{report}' to PNG failed:\n{output}")]
    Conversion { report: String, output: String },
    /// The video encoder exited unsuccessfully.
    #[error("encoding {} failed:\n{output}", path.display())]
    VideoEncoding { path: PathBuf, output: String },
}

/// Exit state and combined stdout/stderr of a finished external program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the program exited with status zero.
    pub success: bool,
    /// Exit code, absent when the program was killed by a signal.
    pub code: Option<i32>,
    /// Standard output followed by standard error.
    pub output: String,
}

/// Runs an external program to completion and captures its output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &OsStr, args: &[OsString]) -> io::Result<CommandOutput>;
}

/// [`CommandRunner`] that spawns real processes with a closed standard input.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &OsStr, args: &[OsString]) -> io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            output: combined,
        })
    }
}

/// External programs and fixed parameters used by [`LatexRenderer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toolchain {
    pub latex: PathBuf,
    pub convert: PathBuf,
    pub ffmpeg: PathBuf,
    pub density_dpi: u32,
    pub video_fps: u32,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            latex: PathBuf::from("xelatex"),
            convert: PathBuf::from("convert"),
            ffmpeg: PathBuf::from("ffmpeg"),
            density_dpi: DEFAULT_DENSITY_DPI,
            video_fps: DEFAULT_VIDEO_FPS,
        }
    }
}

impl Toolchain {
    /// Reads program overrides from `LATEX_REPORT_LATEX`, `LATEX_REPORT_CONVERT` and
    /// `LATEX_REPORT_FFMPEG`.
    pub fn from_env() -> Self {
        let mut toolchain = Self::default();
        if let Some(path) = env_program("LATEX_REPORT_LATEX") {
            toolchain.latex = path;
        }
        if let Some(path) = env_program("LATEX_REPORT_CONVERT") {
            toolchain.convert = path;
        }
        if let Some(path) = env_program("LATEX_REPORT_FFMPEG") {
            toolchain.ffmpeg = path;
        }
        toolchain
    }
}

fn env_program(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Files produced by rendering one report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOutput {
    pub report: String,
    pub tex: PathBuf,
    pub pdf: PathBuf,
    pub png: Option<PathBuf>,
}

/// Anything that can render a finalized report.  The worker pool renders through this trait.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &Report) -> Result<RenderOutput, RenderError>;
}

impl<F> ReportRenderer for F
where
    F: Fn(&Report) -> Result<RenderOutput, RenderError> + Send + Sync,
{
    fn render(&self, report: &Report) -> Result<RenderOutput, RenderError> {
        self(report)
    }
}

/// Renders reports with `xelatex`, converts them with ImageMagick and encodes videos with `ffmpeg`.
#[derive(Clone, Debug, Default)]
pub struct LatexRenderer<R = SystemRunner> {
    toolchain: Toolchain,
    runner: R,
}

impl LatexRenderer<SystemRunner> {
    /// Creates a renderer that spawns real processes.
    pub fn new(toolchain: Toolchain) -> Self {
        Self::with_runner(toolchain, SystemRunner)
    }
}

impl<R: CommandRunner> LatexRenderer<R> {
    /// Creates a renderer that starts programs through `runner`.
    pub fn with_runner(toolchain: Toolchain, runner: R) -> Self {
        Self { toolchain, runner }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Writes the markup of `report` and typesets it.
    ///
    /// The typesetting step fails when its output mentions [`FATAL_MARKER`], even if the
    /// engine exited successfully.  A non-zero exit without the marker only logs a warning,
    /// since the engine reports recoverable problems that way too.
    pub fn render_report(&self, report: &Report) -> Result<RenderOutput, RenderError> {
        if !report.is_finalized() {
            return Err(RenderError::NotFinalized(report.name().to_owned()));
        }

        if let Some(dir) = report.output_dir() {
            fs::create_dir_all(dir).map_err(|source| RenderError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let tex = report.tex_path();
        fs::write(&tex, report.markup()).map_err(|source| RenderError::Io {
            path: tex.clone(),
            source,
        })?;
        debug!("Wrote {}", tex.display());

        let mut args = Vec::new();
        if let Some(dir) = report.output_dir() {
            let mut flag = OsString::from("-output-directory=");
            flag.push(dir.as_os_str());
            args.push(flag);
        }
        args.push(tex.clone().into_os_string());

        let result = self.run(&self.toolchain.latex, &args)?;
        if result.output.contains(FATAL_MARKER) {
            return Err(RenderError::Typesetting {
                report: report.name().to_owned(),
                output: result.output,
            });
        }
        if !result.success {
            warn!(
                "{} exited with {:?} for '{}' without a fatal error; continuing.",
                self.toolchain.latex.display(),
                result.code,
                report.name()
            );
        }
        info!("Typeset {}", report.pdf_path().display());

        let png = if report.png_conversion() {
            Some(self.convert_to_png(report)?)
        } else {
            None
        };

        Ok(RenderOutput {
            report: report.name().to_owned(),
            tex,
            pdf: report.pdf_path(),
            png,
        })
    }

    /// Rasterises the typeset PDF of `report` into a PNG at the configured density.
    pub fn convert_to_png(&self, report: &Report) -> Result<PathBuf, RenderError> {
        let png = report.png_path();
        let args = [
            OsString::from("-density"),
            OsString::from(self.toolchain.density_dpi.to_string()),
            report.pdf_path().into_os_string(),
            png.clone().into_os_string(),
        ];

        let result = self.run(&self.toolchain.convert, &args)?;
        if !result.success {
            return Err(RenderError::Conversion {
                report: report.name().to_owned(),
                output: result.output,
            });
        }
        info!("Converted {}", png.display());
        Ok(png)
    }

    /// Encodes the frames matching `pattern` (for example `frames/t%04d.png`) into `output`.
    pub fn encode_video(
        &self,
        pattern: &str,
        output: impl AsRef<Path>,
    ) -> Result<PathBuf, RenderError> {
        let output = output.as_ref().to_path_buf();
        let args = [
            OsString::from("-y"),
            OsString::from("-f"),
            OsString::from("image2"),
            OsString::from("-r"),
            OsString::from(self.toolchain.video_fps.to_string()),
            OsString::from("-i"),
            OsString::from(pattern),
            output.clone().into_os_string(),
        ];

        let result = self.run(&self.toolchain.ffmpeg, &args)?;
        if !result.success {
            return Err(RenderError::VideoEncoding {
                path: output,
                output: result.output,
            });
        }
        info!("Encoded {}", output.display());
        Ok(output)
    }

    fn run(&self, program: &Path, args: &[OsString]) -> Result<CommandOutput, RenderError> {
        debug!("Running {} {:?}", program.display(), args);
        self.runner
            .run(program.as_os_str(), args)
            .map_err(|source| RenderError::Spawn {
                program: program.display().to_string(),
                source,
            })
    }
}

impl<R: CommandRunner> ReportRenderer for LatexRenderer<R> {
    fn render(&self, report: &Report) -> Result<RenderOutput, RenderError> {
        self.render_report(report)
    }
}
