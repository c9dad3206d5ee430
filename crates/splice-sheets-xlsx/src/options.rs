//! Edit options

/// Options for an editing session
#[derive(Debug, Clone)]
pub struct EditOptions {
    /// How text values are stored (default: shared strings when available)
    pub text_encoding: TextEncoding,
    /// What happens to a cell's cached value when a formula is written
    pub formula_cache: FormulaCachePolicy,
    /// Ask the host application to recalculate everything on next open
    /// after a formula is written (default: true)
    pub force_full_calc_on_load: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            text_encoding: TextEncoding::Auto,
            formula_cache: FormulaCachePolicy::Remove,
            force_full_calc_on_load: true,
        }
    }
}

impl EditOptions {
    pub fn with_text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.text_encoding = encoding;
        self
    }

    pub fn with_formula_cache(mut self, policy: FormulaCachePolicy) -> Self {
        self.formula_cache = policy;
        self
    }

    pub fn with_force_full_calc_on_load(mut self, force: bool) -> Self {
        self.force_full_calc_on_load = force;
        self
    }
}

/// Storage for text cell values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// Shared strings if the workbook has a table, inline strings otherwise
    #[default]
    Auto,
    /// Always the shared string table; refused when the workbook has none
    SharedStrings,
    /// Always `<is>` inline strings
    InlineStrings,
}

impl TextEncoding {
    /// Whether text goes to the shared string table, given whether one exists
    pub(crate) fn uses_shared_strings(self, table_present: bool) -> bool {
        match self {
            TextEncoding::Auto => table_present,
            TextEncoding::SharedStrings => true,
            TextEncoding::InlineStrings => false,
        }
    }
}

/// Treatment of the previous cached value when a formula is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormulaCachePolicy {
    /// Drop `<v>`, leaving the formula without a cached value
    #[default]
    Remove,
    /// Write a numeric zero as placeholder cache
    Zero,
}
