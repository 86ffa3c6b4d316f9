//! Data structures describing the content appended to a report.
//!
//! The types in this module only describe *what* goes into a document: figure paths,
//! titles and captions.  Turning them into markup is the job of [`crate::document`], which
//! keeps these values free of any knowledge about the LaTeX preamble or the render step.
//!
//! Captions and titles are inserted verbatim, so they may carry inline LaTeX.  The helpers
//! in [`crate::richtext`] produce escaped caption text from plain strings.

use thiserror::Error;

/// Number of columns used by [`FigureGrid::new`] unless overridden.
pub const DEFAULT_COLUMNS: usize = 2;

/// Errors raised while assembling content blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Every figure in a grid needs exactly one title.
    #[error("figure grid has {files} files but {titles} titles")]
    TitleCountMismatch { files: usize, titles: usize },
}

/// A single image placed inside a [`FigureGrid`] together with its sub-caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Figure {
    path: String,
    title: String,
}

impl Figure {
    /// Creates a figure from an image path and its title.
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    /// Returns the image path as written into the markup.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the sub-caption shown beneath the image.
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// A grid of labelled figures followed by optional legend images and one overall caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FigureGrid {
    figures: Vec<Figure>,
    legends: Vec<String>,
    caption: String,
    columns: usize,
}

impl FigureGrid {
    /// Creates an empty grid with the given overall caption.
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            figures: Vec::new(),
            legends: Vec::new(),
            caption: caption.into(),
            columns: DEFAULT_COLUMNS,
        }
    }

    /// Builds a grid from parallel lists of files and titles.
    pub fn from_parts<F, T, L>(
        files: F,
        titles: T,
        legends: L,
        caption: impl Into<String>,
        columns: usize,
    ) -> Result<Self, ModelError>
    where
        F: IntoIterator,
        F::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        let files: Vec<String> = files.into_iter().map(Into::into).collect();
        let titles: Vec<String> = titles.into_iter().map(Into::into).collect();
        if files.len() != titles.len() {
            return Err(ModelError::TitleCountMismatch {
                files: files.len(),
                titles: titles.len(),
            });
        }

        Ok(Self::new(caption)
            .with_columns(columns)
            .with_figures(files.into_iter().zip(titles).map(|(f, t)| Figure::new(f, t)))
            .with_legends(legends))
    }

    /// Returns the figures in placement order.
    pub fn figures(&self) -> &[Figure] {
        &self.figures
    }

    /// Returns the legend image paths.
    pub fn legends(&self) -> &[String] {
        &self.legends
    }

    /// Returns the overall caption.
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Returns the number of figures per row.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Sets the number of figures per row and returns the updated grid.
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = columns;
        self
    }

    /// Appends a figure and returns the updated grid.
    pub fn with_figure(mut self, figure: Figure) -> Self {
        self.figures.push(figure);
        self
    }

    /// Extends the grid with multiple figures and returns the updated instance.
    pub fn with_figures<I>(mut self, figures: I) -> Self
    where
        I: IntoIterator<Item = Figure>,
    {
        self.figures.extend(figures);
        self
    }

    /// Appends a legend image shown below the grid.
    pub fn with_legend(mut self, legend: impl Into<String>) -> Self {
        self.legends.push(legend.into());
        self
    }

    /// Extends the legend images and returns the updated instance.
    pub fn with_legends<I>(mut self, legends: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.legends.extend(legends.into_iter().map(Into::into));
        self
    }
}

/// An animated figure built from a numbered frame sequence.
///
/// Frames are expected at `<file_base>0000.<ext>` through `<file_base>NNNN.<ext>` where
/// `NNNN` is `frame_count - 1` padded to four digits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Animation {
    file_base: String,
    frame_count: usize,
    caption: String,
    frames_per_second: u32,
}

impl Animation {
    /// Creates an animation description.
    pub fn new(
        file_base: impl Into<String>,
        frame_count: usize,
        caption: impl Into<String>,
        frames_per_second: u32,
    ) -> Self {
        Self {
            file_base: file_base.into(),
            frame_count,
            caption: caption.into(),
            frames_per_second,
        }
    }

    pub fn file_base(&self) -> &str {
        &self.file_base
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }
}

/// A single captioned image at its natural size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plot {
    path: String,
    caption: String,
}

impl Plot {
    /// Creates a plot from an image path and caption.
    pub fn new(path: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            caption: caption.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }
}

/// Individual content blocks that can be appended to a report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// Labelled grid of figures.
    Grid(FigureGrid),
    /// Animated frame sequence.
    Animation(Animation),
    /// Single captioned image.
    Plot(Plot),
}

impl From<FigureGrid> for Block {
    fn from(grid: FigureGrid) -> Self {
        Self::Grid(grid)
    }
}

impl From<Animation> for Block {
    fn from(animation: Animation) -> Self {
        Self::Animation(animation)
    }
}

impl From<Plot> for Block {
    fn from(plot: Plot) -> Self {
        Self::Plot(plot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_pairs_files_with_titles() {
        let grid = FigureGrid::from_parts(
            ["a.png", "b.png"],
            ["Alpha", "Beta"],
            ["legend.png"],
            "Two maps",
            3,
        )
        .expect("matching lengths");

        assert_eq!(grid.columns(), 3);
        assert_eq!(grid.figures()[1], Figure::new("b.png", "Beta"));
        assert_eq!(grid.legends(), ["legend.png".to_string()]);
    }

    #[test]
    fn from_parts_rejects_missing_titles() {
        let err = FigureGrid::from_parts(
            ["a.png", "b.png"],
            ["Alpha"],
            Vec::<String>::new(),
            "caption",
            2,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ModelError::TitleCountMismatch {
                files: 2,
                titles: 1
            }
        );
    }
}
