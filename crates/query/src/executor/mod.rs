//! Row-level evaluation shared by storage engines and the repository.

mod assign;
mod filter;
mod project;
mod sort;

pub use assign::{apply_assignments, BoundAssignment, BoundExpr};
pub use filter::Filter;
pub use project::{render_text, FromView, Projected, ProjectionMapper, View, ViewValue};
pub use sort::{compare_rows, sort_rows};
