//! # splice-sheets
//!
//! Surgical editing of existing Excel workbooks.
//!
//! A workbook is opened from an `.xlsx` container, cells are read and written
//! through worksheet handles, and saving rewrites only the parts that were
//! edited. Styles, drawings, pivot tables, macros and any member this library
//! does not understand are carried over byte for byte.
//!
//! ## Example
//!
//! ```no_run
//! use splice_sheets::prelude::*;
//!
//! # fn main() -> XlsxResult<()> {
//! let mut workbook = XlsxWorkbook::open_path("report.xlsx")?;
//!
//! let mut sheet = workbook.sheet("Summary")?;
//! sheet.set("B2", 1250.0)?;
//! sheet.set("B3", formula("=B2*1.2"))?;
//! let labels = sheet.column("A")?.slice_from(2)?;
//! println!("{} labels", labels.len());
//!
//! workbook.save_path("report.xlsx")?;
//! # Ok(())
//! # }
//! ```

pub mod prelude;

use std::fs;
use std::io;
use std::path::Path;

// Re-export core types
pub use splice_sheets_core::{
    column_span, formula, CellAddress, CellError, CellRange, CellValue, Error, Formula, Result,
    MAX_COLS, MAX_ROWS,
};

// Re-export editing types
pub use splice_sheets_xlsx::{
    Column, EditOptions, FormulaCachePolicy, Sheet, TextEncoding, XlsxError, XlsxResult,
    XlsxWorkbook,
};

/// Extension trait for [`XlsxWorkbook`] to work with files
pub trait WorkbookExt: Sized {
    /// Open a workbook from an `.xlsx` or `.xlsm` file
    fn open_path<P: AsRef<Path>>(path: P) -> XlsxResult<Self>;

    /// Open a workbook from a file with custom edit options
    fn open_path_with_options<P: AsRef<Path>>(path: P, options: EditOptions) -> XlsxResult<Self>;

    /// Save the workbook to an `.xlsx` or `.xlsm` file
    fn save_path<P: AsRef<Path>>(&mut self, path: P) -> XlsxResult<()>;
}

impl WorkbookExt for XlsxWorkbook {
    fn open_path<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        Self::open_path_with_options(path, EditOptions::default())
    }

    fn open_path_with_options<P: AsRef<Path>>(path: P, options: EditOptions) -> XlsxResult<Self> {
        let path = path.as_ref();
        check_extension(path)?;
        let bytes = fs::read(path)?;
        log::debug!("opening {} ({} bytes)", path.display(), bytes.len());
        XlsxWorkbook::open_with_options(bytes, options)
    }

    fn save_path<P: AsRef<Path>>(&mut self, path: P) -> XlsxResult<()> {
        let path = path.as_ref();
        check_extension(path)?;
        let bytes = self.save()?;
        fs::write(path, &bytes)?;
        log::debug!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Only Office Open XML workbooks are handled
fn check_extension(path: &Path) -> XlsxResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => Ok(()),
        _ => Err(XlsxError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Unsupported file format: {}", path.display()),
        ))),
    }
}
