//! # splice-sheets-xlsx
//!
//! In-place editing of XLSX (Office Open XML) workbooks for splice-sheets.
//!
//! A workbook is opened from its container bytes, worksheets are parsed only
//! when touched, and saving rewrites only the parts that changed. Every other
//! member of the archive is copied through byte for byte.
//!
//! ```no_run
//! use splice_sheets_xlsx::XlsxWorkbook;
//!
//! # fn main() -> splice_sheets_xlsx::XlsxResult<()> {
//! let bytes = std::fs::read("report.xlsx")?;
//! let mut workbook = XlsxWorkbook::open(bytes)?;
//! workbook.sheet("Summary")?.set("B2", 42.0)?;
//! std::fs::write("report.xlsx", workbook.save()?)?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod index;
pub mod options;
pub mod package;
pub mod registry;
pub mod shared_strings;
pub mod tree;
pub mod workbook;
pub mod writer;

pub use error::{XlsxError, XlsxResult};
pub use options::{EditOptions, FormulaCachePolicy, TextEncoding};
pub use workbook::{Column, Sheet, XlsxWorkbook};
