//! Chart selection for tabular collaborator results.
//!
//! Given the columns, rows, and the question that produced them, decide
//! whether a chart helps and which one. Purely heuristic; no model call.

pub mod selector;
mod vocabulary;

pub use selector::{select_visualization, ChartType, VisualizationSpec};
