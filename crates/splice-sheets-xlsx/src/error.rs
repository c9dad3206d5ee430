//! XLSX error types

use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur while loading, editing or saving a package
///
/// Two severities live here. Structural corruption (`CorruptContainer`,
/// `MalformedPart`, `DuplicateCell`, `SharedStringRange`) means the input is
/// invalid or uses a shape this library does not understand yet; callers are
/// not expected to branch on it. Edit-time refusals (`UnsupportedCellFeature`,
/// `UnknownSheet`, `MissingPart`, `InvalidAddress`) reject one request and
/// leave the session untouched.
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The ZIP container itself is unreadable
    #[error("Corrupt container: {0}")]
    CorruptContainer(#[from] zip::result::ZipError),

    /// A part is not well-formed XML, or lacks structure this library needs
    #[error("Malformed part {part}: {message}")]
    MalformedPart { part: String, message: String },

    /// Two cell nodes claim the same address
    #[error("Duplicate cell {address} in {part}")]
    DuplicateCell { part: String, address: String },

    /// A cell references a shared string that does not exist
    #[error("Shared string index {index} out of range (table has {len} entries)")]
    SharedStringRange { index: u64, len: usize },

    /// The edit or read would need a cell feature this library does not model
    #[error("Unsupported cell feature at {address}: {feature}")]
    UnsupportedCellFeature { address: String, feature: String },

    /// No worksheet with this name
    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Invalid cell address or column label
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] splice_sheets_core::Error),
}

impl XlsxError {
    pub(crate) fn malformed(part: &str, message: impl Into<String>) -> Self {
        XlsxError::MalformedPart {
            part: part.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(address: impl ToString, feature: impl Into<String>) -> Self {
        XlsxError::UnsupportedCellFeature {
            address: address.to_string(),
            feature: feature.into(),
        }
    }

    /// Whether this error signals structural corruption of the input
    ///
    /// Structural errors are not recoverable within a session; everything
    /// else is a refusal of one specific request.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            XlsxError::CorruptContainer(_)
                | XlsxError::MalformedPart { .. }
                | XlsxError::DuplicateCell { .. }
                | XlsxError::SharedStringRange { .. }
        )
    }
}
