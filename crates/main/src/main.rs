use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Builds LaTeX figure reports and renders them with xelatex.
///
/// The external programs default to `xelatex`, `convert` and `ffmpeg` on the `PATH` and can be
/// replaced through `LATEX_REPORT_LATEX`, `LATEX_REPORT_CONVERT` and `LATEX_REPORT_FFMPEG`.
#[derive(Parser)]
#[command(author, version, about = "Build and render LaTeX figure reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out image files as one labelled figure grid and render it.
    #[command(name = "figures", aliases = ["grid"])]
    Figures(FiguresArgs),

    /// Render one report per image file on the worker pool.
    #[command(name = "plots")]
    Plots(PlotsArgs),

    /// Encode numbered frames into a video.
    #[command(name = "video")]
    Video {
        /// Frame file pattern, for example `frames/t%04d.png`.
        #[arg(long)]
        pattern: String,
        /// Video file to write.
        #[arg(long)]
        output: PathBuf,
    },
}

/// Options shared by every command that renders reports.
#[derive(Args)]
pub struct ReportArgs {
    /// Directory receiving the .tex, .pdf and .png files.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Also rasterise the PDF to PNG.
    #[arg(long)]
    pub png: bool,

    /// Single-page output of fixed size in inches, e.g. `6.5x4`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = commands::parse_page_size)]
    pub standalone: Option<commands::PageSize>,
}

#[derive(Args)]
pub struct FiguresArgs {
    /// Report name; also the stem of the generated files.
    #[arg(long)]
    pub name: String,

    /// Figures per row.
    #[arg(long, default_value_t = latex_report::model::DEFAULT_COLUMNS)]
    pub columns: usize,

    /// Overall caption; `**bold**`, `*italic*` and `` `code` `` are recognised.
    #[arg(long, default_value = "")]
    pub caption: String,

    /// Sub-caption per figure, in file order.  Defaults to the file stems.
    #[arg(long = "title")]
    pub titles: Vec<String>,

    /// Legend image shown below the grid.
    #[arg(long = "legend")]
    pub legends: Vec<String>,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Image files in placement order.
    #[arg(required = true)]
    pub files: Vec<String>,
}

#[derive(Args)]
pub struct PlotsArgs {
    /// Number of concurrent workers; defaults to `LATEX_REPORT_WORKERS` or 1.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Keep rendering the remaining reports after a failure.
    #[arg(long)]
    pub isolate_failures: bool,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Image files, one report each.
    #[arg(required = true)]
    pub files: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Figures(args) => commands::figures(args),
        Commands::Plots(args) => commands::plots(args),
        Commands::Video { pattern, output } => commands::video(&pattern, &output),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
