//! Cell value types

use std::fmt;

/// Represents the value stored in a cell
///
/// This is a closed set: every consumer matches exhaustively, so a new kind
/// of cell content can never be silently mishandled.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value (absent cell, or a cell node without content)
    #[default]
    Empty,

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// Text value
    Text(String),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Error value (#VALUE!, #REF!, etc.)
    Error(CellError),

    /// Formula with its cached result
    Formula(Formula),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Create a new formula value (see [`Formula::new`])
    pub fn formula<S: Into<String>>(text: S) -> Self {
        CellValue::Formula(Formula::new(text))
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell contains a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the formula if this is a formula cell
    pub fn as_formula(&self) -> Option<&Formula> {
        match self {
            CellValue::Formula(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => write!(f, ""),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => write!(f, "{}", e),
            CellValue::Formula(formula) => write!(f, "{}", formula),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

impl From<Formula> for CellValue {
    fn from(f: Formula) -> Self {
        CellValue::Formula(f)
    }
}

/// Formula marker
///
/// Wrapping text in `Formula` is what distinguishes "store the formula
/// `=A1*2`" from "store the literal text `=A1*2`".
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    text: String,
    cached: Option<Box<CellValue>>,
    cache_valid: bool,
}

impl Formula {
    /// Create a formula from its expression text
    ///
    /// The text is normalized to carry a leading `=`:
    ///
    /// ```
    /// use splice_sheets_core::Formula;
    ///
    /// assert_eq!(Formula::new("A1*2").text(), "=A1*2");
    /// assert_eq!(Formula::new("=A1*2").text(), "=A1*2");
    /// ```
    pub fn new<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        let text = if text.starts_with('=') {
            text
        } else {
            format!("={}", text)
        };
        Self {
            text,
            cached: None,
            cache_valid: false,
        }
    }

    /// Attach a cached result read from the document
    pub fn with_cached_value(mut self, value: CellValue, cache_valid: bool) -> Self {
        self.cached = Some(Box::new(value));
        self.cache_valid = cache_valid;
        self
    }

    /// Expression text, with its leading `=`
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Expression text as stored on disk (no leading `=`)
    pub fn expression(&self) -> &str {
        self.text.strip_prefix('=').unwrap_or(&self.text)
    }

    /// Last result the host application stored, if any
    pub fn cached_value(&self) -> Option<&CellValue> {
        self.cached.as_deref()
    }

    /// Whether the cached result can be trusted
    ///
    /// `false` when there is no cached value or when the host application has
    /// been told to recalculate on open.
    pub fn is_cache_valid(&self) -> bool {
        self.cache_valid && self.cached.is_some()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Shorthand for [`Formula::new`]
pub fn formula<S: Into<String>>(text: S) -> Formula {
    Formula::new(text)
}

/// Excel error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
    /// #GETTING_DATA - External data is loading
    GettingData,
    /// #SPILL! - Dynamic array cannot spill
    Spill,
    /// #CALC! - Calculation error
    Calc,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
            CellError::GettingData => "#GETTING_DATA",
            CellError::Spill => "#SPILL!",
            CellError::Calc => "#CALC!",
        }
    }

    /// Parse an error literal as it appears in a `t="e"` cell
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "#NULL!" => Some(CellError::Null),
            "#DIV/0!" => Some(CellError::Div0),
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#NAME?" => Some(CellError::Name),
            "#NUM!" => Some(CellError::Num),
            "#N/A" => Some(CellError::Na),
            "#GETTING_DATA" => Some(CellError::GettingData),
            "#SPILL!" => Some(CellError::Spill),
            "#CALC!" => Some(CellError::Calc),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
