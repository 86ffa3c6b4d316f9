//! Row/column placement of figures inside a grid.
//!
//! Figures are laid out row-major: every row holds `columns` figures except the last one,
//! which absorbs the remainder when the figure count does not divide evenly.  Each figure
//! receives a caption label drawn from the uppercase alphabet in the same order.

use std::ops::Range;

use thiserror::Error;

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Errors produced while computing a grid layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A grid needs at least one column.
    #[error("a figure grid needs at least one column")]
    ZeroColumns,
}

/// Number of rows in a grid and the width of a partially filled last row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// `ceil(figures / columns)`.
    pub rows: usize,
    /// `figures % columns`; zero when every row is full.
    pub remainder: usize,
}

/// Computes how many rows `num_figures` figures occupy with `num_columns` per row.
pub fn grid_shape(num_figures: usize, num_columns: usize) -> Result<GridShape, LayoutError> {
    if num_columns == 0 {
        return Err(LayoutError::ZeroColumns);
    }

    let remainder = num_figures % num_columns;
    let rows = num_figures / num_columns + usize::from(remainder != 0);
    Ok(GridShape { rows, remainder })
}

/// Position of a single figure within a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Index of the figure in the input order.
    pub index: usize,
    /// Zero-based row.
    pub row: usize,
    /// Zero-based column.
    pub column: usize,
    /// Caption label, `A` for the first figure.
    pub label: String,
}

/// Pre-computed grid for a fixed number of figures and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    figures: usize,
    columns: usize,
    shape: GridShape,
}

impl GridLayout {
    /// Lays out `num_figures` figures over `num_columns` columns.
    pub fn new(num_figures: usize, num_columns: usize) -> Result<Self, LayoutError> {
        let shape = grid_shape(num_figures, num_columns)?;
        Ok(Self {
            figures: num_figures,
            columns: num_columns,
            shape,
        })
    }

    /// Returns the number of figures in the grid.
    pub fn figures(&self) -> usize {
        self.figures
    }

    /// Returns the number of columns per full row.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Returns the row count and remainder.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Fraction of the enclosing frame width given to each figure.
    pub fn cell_width(&self) -> f64 {
        1.0 / self.columns as f64
    }

    /// Returns the range of figure indices covered by `row`.
    pub fn row_span(&self, row: usize) -> Range<usize> {
        let start = row * self.columns;
        let width = if row + 1 == self.shape.rows && self.shape.remainder != 0 {
            self.shape.remainder
        } else {
            self.columns
        };
        start..start + width
    }

    /// Iterates over the figure index ranges of every row, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.shape.rows).map(move |row| self.row_span(row))
    }

    /// Iterates over every figure placement in row-major order.
    pub fn placements(&self) -> impl Iterator<Item = Placement> + '_ {
        self.rows().enumerate().flat_map(|(row, span)| {
            let start = span.start;
            span.map(move |index| Placement {
                index,
                row,
                column: index - start,
                label: caption_label(index),
            })
        })
    }
}

/// Returns the caption label for the figure at `index`.
///
/// The first 26 figures are labelled `A` through `Z`; later figures continue with two or more
/// letters the way spreadsheet columns do (`AA`, `AB`, ..., `AZ`, `BA`, ...).
pub fn caption_label(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        letters.push(ALPHABET[n % ALPHABET.len()]);
        n /= ALPHABET.len();
    }
    letters.iter().rev().map(|&byte| char::from(byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_matches_known_values() {
        assert_eq!(
            grid_shape(10, 3),
            Ok(GridShape {
                rows: 4,
                remainder: 1
            })
        );
        assert_eq!(
            grid_shape(9, 3),
            Ok(GridShape {
                rows: 3,
                remainder: 0
            })
        );
        assert_eq!(
            grid_shape(0, 5),
            Ok(GridShape {
                rows: 0,
                remainder: 0
            })
        );
    }

    #[test]
    fn zero_columns_is_rejected() {
        assert_eq!(grid_shape(4, 0), Err(LayoutError::ZeroColumns));
        assert_eq!(GridLayout::new(0, 0), Err(LayoutError::ZeroColumns));
    }

    #[test]
    fn rows_cover_every_figure() {
        for figures in 0..40 {
            for columns in 1..8 {
                let shape = grid_shape(figures, columns).unwrap();
                assert!(shape.rows * columns >= figures);
                if figures > 0 {
                    assert!((shape.rows - 1) * columns < figures);
                }

                let layout = GridLayout::new(figures, columns).unwrap();
                let covered: Vec<usize> = layout.rows().flatten().collect();
                assert_eq!(covered, (0..figures).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn seven_figures_over_three_columns() {
        let layout = GridLayout::new(7, 3).unwrap();
        let rows: Vec<_> = layout.rows().collect();
        assert_eq!(rows, vec![0..3, 3..6, 6..7]);

        let labels: Vec<_> = layout.placements().map(|p| p.label).collect();
        assert_eq!(labels, ["A", "B", "C", "D", "E", "F", "G"]);

        let last = layout.placements().last().unwrap();
        assert_eq!((last.index, last.row, last.column), (6, 2, 0));
    }

    #[test]
    fn cell_width_is_column_fraction() {
        let layout = GridLayout::new(4, 4).unwrap();
        assert!((layout.cell_width() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn labels_continue_past_the_alphabet() {
        assert_eq!(caption_label(0), "A");
        assert_eq!(caption_label(25), "Z");
        assert_eq!(caption_label(26), "AA");
        assert_eq!(caption_label(27), "AB");
        assert_eq!(caption_label(51), "AZ");
        assert_eq!(caption_label(52), "BA");
        assert_eq!(caption_label(701), "ZZ");
        assert_eq!(caption_label(702), "AAA");
    }
}
