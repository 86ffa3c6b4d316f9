use std::error::Error;
use std::path::Path;

use latex_report::fonts::FontConfig;
use latex_report::model::{FigureGrid, Plot};
use latex_report::pool::{self, FailurePolicy, PoolConfig};
use latex_report::render::{LatexRenderer, Toolchain};
use latex_report::richtext::{escape, parse_markup, spans_to_latex};
use latex_report::Report;
use log::info;

use crate::{FiguresArgs, PlotsArgs, ReportArgs};

/// Paper size of a standalone report, in inches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Parses `WIDTHxHEIGHT` in inches.
pub fn parse_page_size(value: &str) -> Result<PageSize, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|inches| *inches > 0.0)
            .ok_or_else(|| format!("'{}' is not a positive size in inches", part))
    };
    Ok(PageSize {
        width: parse(width)?,
        height: parse(height)?,
    })
}

/// Renders a single report holding one figure grid.
pub fn figures(args: FiguresArgs) -> Result<(), Box<dyn Error>> {
    let titles: Vec<String> = if args.titles.is_empty() {
        args.files.iter().map(|file| stem_title(file)).collect()
    } else {
        args.titles.iter().map(|title| markup_text(title)).collect()
    };

    let grid = FigureGrid::from_parts(
        args.files,
        titles,
        args.legends,
        markup_text(&args.caption),
        args.columns,
    )?;

    let mut report = new_report(&args.name, &args.report);
    report.add_figure_grid(&grid)?;
    report.finalize()?;

    let renderer = LatexRenderer::new(Toolchain::from_env());
    let output = renderer.render_report(&report)?;
    println!("Generated {}", output.pdf.display());
    if let Some(png) = output.png {
        println!("Generated {}", png.display());
    }
    Ok(())
}

/// Renders every file as its own plot report on the worker pool.
pub fn plots(args: PlotsArgs) -> Result<(), Box<dyn Error>> {
    let mut config = PoolConfig::from_env()?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.isolate_failures {
        config = config.with_failure_policy(FailurePolicy::Isolate);
    }

    let mut reports = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let name = file_stem(file);
        let mut report = new_report(&name, &args.report);
        report.add_plot(&Plot::new(file.as_str(), stem_title(file)))?;
        report.finalize()?;
        reports.push(report);
    }

    let renderer = LatexRenderer::new(Toolchain::from_env());
    let summary = pool::render_all(config, renderer, reports)?;

    for output in &summary.outputs {
        println!("Generated {}", output.pdf.display());
    }
    for failure in &summary.failures {
        eprintln!("Failed {}: {}", failure.report, failure.error);
    }
    info!(
        "{} of {} reports rendered by {} worker(s)",
        summary.rendered(),
        summary.submitted,
        summary.workers
    );

    if summary.failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} report(s) failed to render", summary.failures.len()).into())
    }
}

/// Encodes the frames matching `pattern` into `output`.
pub fn video(pattern: &str, output: &Path) -> Result<(), Box<dyn Error>> {
    let renderer = LatexRenderer::new(Toolchain::from_env());
    let path = renderer.encode_video(pattern, output)?;
    println!("Generated {}", path.display());
    Ok(())
}

fn new_report(name: &str, args: &ReportArgs) -> Report {
    let report = match args.standalone {
        Some(size) => Report::standalone(name, size.width, size.height),
        None => Report::new(name),
    };
    let report = report
        .with_font(FontConfig::from_env())
        .with_png_conversion(args.png);
    match &args.output_dir {
        Some(dir) => report.with_output_dir(dir),
        None => report,
    }
}

fn markup_text(text: &str) -> String {
    spans_to_latex(&parse_markup(text))
}

fn file_stem(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_owned())
}

fn stem_title(file: &str) -> String {
    escape(&file_stem(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_accepts_inches() {
        assert_eq!(
            parse_page_size("6.5x4"),
            Ok(PageSize {
                width: 6.5,
                height: 4.0
            })
        );
    }

    #[test]
    fn page_size_rejects_garbage() {
        assert!(parse_page_size("6.5").is_err());
        assert!(parse_page_size("0x4").is_err());
        assert!(parse_page_size("ax4").is_err());
    }

    #[test]
    fn titles_come_from_escaped_stems() {
        assert_eq!(stem_title("maps/pm2_5_total.png"), "pm2\\_5\\_total");
    }
}
