//! # splice-sheets-core
//!
//! Core data structures for the splice-sheets editing library.
//!
//! This crate provides the fundamental types used throughout splice-sheets:
//! - [`CellValue`] - Represents cell values (numbers, text, booleans, errors, formulas)
//! - [`Formula`] - The formula marker, carrying a cached value and its validity
//! - [`CellAddress`] and [`CellRange`] - 1-based cell addressing and ranges
//!
//! ## Example
//!
//! ```rust
//! use splice_sheets_core::{CellAddress, CellValue, formula};
//!
//! let addr = CellAddress::parse("AA10").unwrap();
//! assert_eq!((addr.col, addr.row), (27, 10));
//!
//! let literal = CellValue::from("=A1*2");
//! let computed = CellValue::from(formula("=A1*2"));
//! assert!(!literal.is_formula());
//! assert!(computed.is_formula());
//! ```

pub mod cell;
pub mod error;

// Re-exports for convenience
pub use cell::{column_span, formula, CellAddress, CellError, CellRange, CellValue, Formula};
pub use error::{Error, Result};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u32 = 16_384;
