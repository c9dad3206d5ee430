//! Prelude module - common imports for splice-sheets users
//!
//! ```rust
//! use splice_sheets::prelude::*;
//! ```

pub use crate::{
    // Cell types
    formula,
    CellAddress,
    CellError,
    CellRange,
    CellValue,
    Formula,

    // Editing
    Column,
    EditOptions,
    FormulaCachePolicy,
    Sheet,
    TextEncoding,
    // Extension traits
    WorkbookExt,
    XlsxWorkbook,

    // Error types
    XlsxError,
    XlsxResult,
};
