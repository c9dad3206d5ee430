//! End-to-end tests for splice-sheets-xlsx.
//!
//! Every test builds the container it needs in memory with `zip::ZipWriter`,
//! opens it with `XlsxWorkbook`, edits it, saves it, and then inspects the
//! output archive member by member.

mod editing;

pub use common::*;
