//! Markup assembly for a single report.
//!
//! A [`Report`] accumulates LaTeX fragments in the order content is appended.  The preamble
//! is derived from the report mode and font settings when the markup is requested, so those
//! settings can be changed up to the point the report is rendered.  Once
//! [`Report::finalize`] has closed the document no further content is accepted.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fonts::FontConfig;
use crate::layout::{caption_label, GridLayout, LayoutError};
use crate::model::{Animation, Block, FigureGrid, ModelError, Plot};

/// Width of each legend image relative to the text width.
const LEGEND_WIDTH: f64 = 0.49;

/// Errors raised while appending content to a report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// The report has already been closed with [`Report::finalize`].
    #[error("report '{0}' is already finalized")]
    Finalized(String),
    /// An animation needs at least one frame.
    #[error("animation '{0}' has no frames")]
    EmptyAnimation(String),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Page setup of a report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReportMode {
    /// Multi-page article with numbered figure captions.
    Full,
    /// Single page of fixed size (inches) without margins, headers or page numbers.
    /// Figure grids use unnumbered captions.
    Standalone { width_in: f64, height_in: f64 },
}

/// An in-memory LaTeX document destined for one rendered output.
///
/// The name doubles as the file stem of every generated file: `<name>.tex`, `<name>.pdf`
/// and, when conversion is enabled, `<name>.png`.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    name: String,
    mode: ReportMode,
    font: FontConfig,
    fragments: Vec<String>,
    output_dir: Option<PathBuf>,
    png_conversion: bool,
    finalized: bool,
}

impl Report {
    /// Creates a multi-page report.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_mode(name, ReportMode::Full)
    }

    /// Creates a single-page report whose paper is exactly `width_in` by `height_in` inches.
    pub fn standalone(name: impl Into<String>, width_in: f64, height_in: f64) -> Self {
        Self::with_mode(
            name,
            ReportMode::Standalone {
                width_in,
                height_in,
            },
        )
    }

    fn with_mode(name: impl Into<String>, mode: ReportMode) -> Self {
        Self {
            name: name.into(),
            mode,
            font: FontConfig::default(),
            fragments: Vec::new(),
            output_dir: None,
            png_conversion: false,
            finalized: false,
        }
    }

    /// Sets the main font and returns the updated report.
    pub fn with_font(mut self, font: FontConfig) -> Self {
        self.font = font;
        self
    }

    /// Writes every generated file into `dir` instead of the working directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Requests a PNG rendering of the typeset PDF after the render step.
    pub fn with_png_conversion(mut self, enabled: bool) -> Self {
        self.png_conversion = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    pub fn font(&self) -> &FontConfig {
        &self.font
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn png_conversion(&self) -> bool {
        self.png_conversion
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns the body fragments appended so far.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Path of the generated `.tex` file.
    pub fn tex_path(&self) -> PathBuf {
        self.output_path("tex")
    }

    /// Path of the PDF produced by the typesetting engine.
    pub fn pdf_path(&self) -> PathBuf {
        self.output_path("pdf")
    }

    /// Path of the optional PNG rendering.
    pub fn png_path(&self) -> PathBuf {
        self.output_path("png")
    }

    fn output_path(&self, extension: &str) -> PathBuf {
        let file = format!("{}.{}", self.name, extension);
        match &self.output_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Appends a grid of labelled figures.
    pub fn add_figure_grid(&mut self, grid: &FigureGrid) -> Result<(), ReportError> {
        self.ensure_open()?;
        let fragment = self.figure_grid_markup(grid)?;
        self.fragments.push(fragment);
        Ok(())
    }

    /// Appends a grid built from parallel lists of image files and titles.
    pub fn add_figures<F, T, L>(
        &mut self,
        files: F,
        titles: T,
        legends: L,
        caption: impl Into<String>,
        columns: usize,
    ) -> Result<(), ReportError>
    where
        F: IntoIterator,
        F::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        self.ensure_open()?;
        let grid = FigureGrid::from_parts(files, titles, legends, caption, columns)?;
        self.add_figure_grid(&grid)
    }

    /// Appends an animated frame sequence.
    pub fn add_animation(&mut self, animation: &Animation) -> Result<(), ReportError> {
        self.ensure_open()?;
        let last_frame = animation
            .frame_count()
            .checked_sub(1)
            .ok_or_else(|| ReportError::EmptyAnimation(animation.file_base().to_owned()))?;

        self.fragments.push(format!(
            "\\begin{{figure}}[H]\n\
             \\animategraphics[width=\\textwidth]{{{}}}{{{}}}{{0000}}{{{:04}}}\n\
             \\caption{{{}}}\n\\end{{figure}}\n",
            animation.frames_per_second(),
            animation.file_base(),
            last_frame,
            animation.caption()
        ));
        Ok(())
    }

    /// Appends a single captioned image.
    pub fn add_plot(&mut self, plot: &Plot) -> Result<(), ReportError> {
        self.ensure_open()?;
        self.fragments.push(format!(
            "\\begin{{figure}}[H]\n\\includegraphics{{{}}}\n\\caption{{{}}}\n\\end{{figure}}\n",
            plot.path(),
            plot.caption()
        ));
        Ok(())
    }

    /// Appends any content block.
    pub fn add_block(&mut self, block: &Block) -> Result<(), ReportError> {
        match block {
            Block::Grid(grid) => self.add_figure_grid(grid),
            Block::Animation(animation) => self.add_animation(animation),
            Block::Plot(plot) => self.add_plot(plot),
        }
    }

    /// Closes the document.  The report accepts no content afterwards.
    pub fn finalize(&mut self) -> Result<(), ReportError> {
        self.ensure_open()?;
        self.finalized = true;
        Ok(())
    }

    /// Returns the complete markup: preamble, body and, once finalized, the closing command.
    pub fn markup(&self) -> String {
        let mut out = self.preamble();
        for fragment in &self.fragments {
            out.push_str(fragment);
        }
        if self.finalized {
            out.push_str("\n\\end{document}\n");
        }
        out
    }

    fn ensure_open(&self) -> Result<(), ReportError> {
        if self.finalized {
            Err(ReportError::Finalized(self.name.clone()))
        } else {
            Ok(())
        }
    }

    fn preamble(&self) -> String {
        let mut out = String::from(
            "\n\\documentclass[8pt]{extarticle}\n\\usepackage{fontspec}\n",
        );
        out.push_str(&self.font.preamble_line());
        out.push_str(
            "\n\\usepackage[controls,loop]{animate}\n\\usepackage{graphicx}\n\\usepackage{caption}\n",
        );

        match self.mode {
            ReportMode::Full => out.push_str(
                "\\usepackage[left=0.7in,right=0.7in,top=0.7in,bottom=0.7in]{geometry}\n",
            ),
            ReportMode::Standalone {
                width_in,
                height_in,
            } => {
                out.push_str(&format!(
                    "\\usepackage[noheadfoot,nomarginpar,margin=0pt,\
                     paperwidth={:.6}in,paperheight={:.6}in]{{geometry}}\n",
                    width_in, height_in
                ));
                out.push_str("\\pagestyle{empty}\n\\parindent=0pt\n");
            }
        }

        out.push_str("\\usepackage{float}\n\\setlength{\\tabcolsep}{0pt}\n\\begin{document}\n");
        out
    }

    fn figure_grid_markup(&self, grid: &FigureGrid) -> Result<String, ReportError> {
        let figures = grid.figures();
        let layout = GridLayout::new(figures.len(), grid.columns())?;

        let mut out = String::from("\n\\begin{figure}[H]\n\\begin{center}\n");
        out.push_str(&format!(
            "\\begin{{tabular}}{{{}}}\n",
            "c".repeat(layout.columns())
        ));

        for row in layout.rows() {
            let images: Vec<String> = figures[row.clone()]
                .iter()
                .map(|figure| {
                    format!(
                        "\\includegraphics[width={:.6}\\textwidth]{{{}}}",
                        layout.cell_width(),
                        figure.path()
                    )
                })
                .collect();
            out.push_str(&images.join(" &\n"));
            out.push_str(" \\\\\n");

            let titles: Vec<String> = row
                .map(|index| format!("({}) {}", caption_label(index), figures[index].title()))
                .collect();
            out.push_str(&titles.join(" &\n"));
            out.push_str(" \\\\\n");
        }
        out.push_str("\\end{tabular}\n");

        for legend in grid.legends() {
            out.push_str(&format!(
                "\\includegraphics[width={:.2}\\textwidth]{{{}}}\n",
                LEGEND_WIDTH, legend
            ));
        }
        out.push_str("\\\\\n\\end{center}\n");

        let caption_command = match self.mode {
            ReportMode::Full => "caption",
            ReportMode::Standalone { .. } => "caption*",
        };
        out.push_str(&format!(
            "\\{}{{{}}}\n\\end{{figure}}\n",
            caption_command,
            grid.caption()
        ));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Figure;

    fn seven_figure_grid() -> FigureGrid {
        FigureGrid::new("Seven panels")
            .with_columns(3)
            .with_figures((0..7).map(|i| Figure::new(format!("fig{i}.png"), format!("Panel {i}"))))
    }

    #[test]
    fn grid_rows_follow_layout() {
        let mut report = Report::new("grid");
        report.add_figure_grid(&seven_figure_grid()).unwrap();
        let markup = report.markup();

        assert!(markup.contains("\\begin{tabular}{ccc}\n"));
        assert!(markup.contains(
            "\\includegraphics[width=0.333333\\textwidth]{fig0.png} &\n\
             \\includegraphics[width=0.333333\\textwidth]{fig1.png} &\n\
             \\includegraphics[width=0.333333\\textwidth]{fig2.png} \\\\\n\
             (A) Panel 0 &\n(B) Panel 1 &\n(C) Panel 2 \\\\\n"
        ));
        assert!(markup.contains(
            "\\includegraphics[width=0.333333\\textwidth]{fig6.png} \\\\\n(G) Panel 6 \\\\\n\\end{tabular}\n"
        ));
        assert_eq!(markup.matches("\\includegraphics").count(), 7);
    }

    #[test]
    fn caption_style_depends_on_mode() {
        let mut full = Report::new("full");
        full.add_figure_grid(&seven_figure_grid()).unwrap();
        assert!(full.markup().contains("\\caption{Seven panels}"));

        let mut standalone = Report::standalone("alone", 6.5, 4.0);
        standalone.add_figure_grid(&seven_figure_grid()).unwrap();
        let markup = standalone.markup();
        assert!(markup.contains("\\caption*{Seven panels}"));
        assert!(!markup.contains("\\caption{"));
    }

    #[test]
    fn standalone_preamble_fixes_paper_size() {
        let markup = Report::standalone("alone", 6.5, 4.25).markup();
        assert!(markup.contains("paperwidth=6.500000in,paperheight=4.250000in"));
        assert!(markup.contains("\\pagestyle{empty}"));
        assert!(!markup.contains("left=0.7in"));
    }

    #[test]
    fn legends_follow_the_table() {
        let grid = seven_figure_grid().with_legend("scale.png");
        let mut report = Report::new("legend");
        report.add_figure_grid(&grid).unwrap();
        assert!(report.markup().contains(
            "\\end{tabular}\n\\includegraphics[width=0.49\\textwidth]{scale.png}\n\\\\\n\\end{center}\n"
        ));
    }

    #[test]
    fn animation_pads_last_frame() {
        let mut report = Report::new("anim");
        report
            .add_animation(&Animation::new("frames/t", 120, "Plume", 15))
            .unwrap();
        assert!(report
            .markup()
            .contains("\\animategraphics[width=\\textwidth]{15}{frames/t}{0000}{0119}\n"));
    }

    #[test]
    fn empty_animation_is_rejected() {
        let mut report = Report::new("anim");
        let err = report
            .add_animation(&Animation::new("frames/t", 0, "Nothing", 15))
            .unwrap_err();
        assert_eq!(err, ReportError::EmptyAnimation("frames/t".into()));
    }

    #[test]
    fn content_after_finalize_is_rejected() {
        let mut report = Report::new("closed");
        report.add_plot(&Plot::new("a.png", "A")).unwrap();
        report.finalize().unwrap();

        assert!(report.markup().ends_with("\\end{figure}\n\n\\end{document}\n"));
        assert_eq!(
            report.add_plot(&Plot::new("b.png", "B")),
            Err(ReportError::Finalized("closed".into()))
        );
        assert!(report.finalize().is_err());
        assert_eq!(report.fragments().len(), 1);
    }

    #[test]
    fn mismatched_titles_are_rejected() {
        let mut report = Report::new("bad");
        let err = report
            .add_figures(["a.png", "b.png"], ["A"], Vec::<String>::new(), "c", 2)
            .unwrap_err();
        assert!(matches!(err, ReportError::Model(_)));
        assert!(report.fragments().is_empty());
    }

    #[test]
    fn paths_use_output_dir() {
        let report = Report::new("summary").with_output_dir("out");
        assert_eq!(report.tex_path(), Path::new("out").join("summary.tex"));
        assert_eq!(Report::new("summary").pdf_path(), Path::new("summary.pdf"));
    }
}
