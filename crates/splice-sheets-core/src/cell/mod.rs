//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value stored in a cell
//! - [`Formula`] - Formula marker with its cached result
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")

mod address;
mod value;

pub use address::{column_span, CellAddress, CellRange};
pub use value::{formula, CellError, CellValue, Formula};
