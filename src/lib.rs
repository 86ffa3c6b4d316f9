//! Figure-grid LaTeX reports rendered through external tools on a bounded worker pool.
//!
//! Build a [`document::Report`], append figure grids, animations and plots, finalize it and
//! either render it directly with [`render::LatexRenderer`] or hand batches of reports to a
//! [`pool::ReportServer`].

pub mod document;
pub mod fonts;
pub mod layout;
pub mod model;
pub mod pool;
pub mod render;
pub mod richtext;

pub use document::{Report, ReportError, ReportMode};
pub use pool::{FailurePolicy, PoolConfig, PoolError, PoolSummary, ReportServer};
pub use render::{LatexRenderer, RenderError, RenderOutput, ReportRenderer, Toolchain};
