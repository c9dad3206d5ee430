//! Editing session
//!
//! [`XlsxWorkbook`] owns a loaded package and everything materialized from
//! it. Worksheets are parsed on first access through [`XlsxWorkbook::sheet`];
//! sheets that are never touched stay raw bytes and are copied through
//! unchanged on save.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

use splice_sheets_core::{column_span, CellAddress, CellValue};

use crate::codec::{self, EncodeOutcome};
use crate::error::{XlsxError, XlsxResult};
use crate::index::CoordinateIndex;
use crate::options::{EditOptions, FormulaCachePolicy};
use crate::package::Package;
use crate::registry::{PartRegistry, SheetPart};
use crate::shared_strings::SharedStringTable;
use crate::tree::{XmlDocument, XmlElement, XmlNode};
use crate::writer::{DirtyTracker, SurgicalWriter};

/// Elements that follow `<calcPr>` in a workbook part
const AFTER_CALC_PR: &[&str] = &[
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// A materialized worksheet
#[derive(Debug)]
struct SheetState {
    doc: XmlDocument,
    index: CoordinateIndex,
}

/// Workbook-level recalculation state
#[derive(Debug)]
struct CalcState {
    workbook_path: String,
    doc: Option<XmlDocument>,
    full_calc_on_load: bool,
}

impl CalcState {
    /// Parse the workbook part if it isn't yet
    fn prepare(&mut self, package: &Package) -> XlsxResult<()> {
        if self.doc.is_none() && !self.full_calc_on_load {
            let bytes = package.member(&self.workbook_path)?;
            self.doc = Some(XmlDocument::parse(&self.workbook_path, bytes)?);
        }
        Ok(())
    }

    /// Set `<calcPr fullCalcOnLoad="1"/>`; returns whether the part changed
    fn force_full_calc(&mut self, package: &Package) -> XlsxResult<bool> {
        if self.full_calc_on_load {
            return Ok(false);
        }
        self.prepare(package)?;
        let Some(doc) = self.doc.as_mut() else {
            return Ok(false);
        };

        let root = doc.root_mut();
        match root.find_child_mut("calcPr") {
            Some(calc_pr) => calc_pr.set_attr("fullCalcOnLoad", "1"),
            None => {
                let mut calc_pr = XmlElement::new(root.qualified("calcPr"));
                calc_pr.set_attr("fullCalcOnLoad", "1");
                let pos = root
                    .children()
                    .iter()
                    .position(|node| {
                        node.as_element()
                            .is_some_and(|el| AFTER_CALC_PR.contains(&el.local_name()))
                    })
                    .unwrap_or(root.children().len());
                root.insert_child(pos, XmlNode::Element(calc_pr));
            }
        }

        self.full_calc_on_load = true;
        log::debug!("{}: requested full recalculation on load", self.workbook_path);
        Ok(true)
    }
}

/// An open workbook being edited in place
#[derive(Debug)]
pub struct XlsxWorkbook {
    package: Package,
    registry: PartRegistry,
    options: EditOptions,
    strings: SharedStringTable,
    sheets: HashMap<String, SheetState>,
    calc: CalcState,
    dirty: DirtyTracker,
    /// Formula cells per worksheet path whose cached value is a placeholder.
    /// Survives `save`, since the placeholder is what gets written.
    stale_formulas: HashMap<String, HashSet<CellAddress>>,
}

impl XlsxWorkbook {
    /// Open a workbook from the bytes of an `.xlsx` container
    pub fn open(bytes: Vec<u8>) -> XlsxResult<Self> {
        Self::open_with_options(bytes, EditOptions::default())
    }

    /// Open a workbook with custom edit options
    pub fn open_with_options(bytes: Vec<u8>, options: EditOptions) -> XlsxResult<Self> {
        let package = Package::open(bytes)?;
        let registry = PartRegistry::load(&package)?;

        let strings = match registry.resolve_shared_strings() {
            Some(path) if package.contains(path) => {
                SharedStringTable::load(path, package.member(path)?)?
            }
            Some(path) => {
                log::warn!("shared strings part {} is referenced but missing", path);
                SharedStringTable::absent()
            }
            None => SharedStringTable::absent(),
        };

        let calc = CalcState {
            workbook_path: registry.workbook_path().to_string(),
            doc: None,
            full_calc_on_load: registry.full_calc_on_load(),
        };

        Ok(Self {
            package,
            registry,
            options,
            strings,
            sheets: HashMap::new(),
            calc,
            dirty: DirtyTracker::new(),
            stale_formulas: HashMap::new(),
        })
    }

    /// Worksheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.registry.sheet_names().collect()
    }

    /// Get a worksheet by name, parsing it on first access
    pub fn sheet(&mut self, name: &str) -> XlsxResult<Sheet<'_>> {
        let part = self.registry.resolve_sheet(name)?;

        let state = match self.sheets.entry(part.path.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let doc = XmlDocument::parse(&part.path, self.package.member(&part.path)?)?;
                let index = CoordinateIndex::build(&doc)?;
                log::debug!("materialized sheet '{}' from {}", part.name, part.path);
                entry.insert(SheetState { doc, index })
            }
        };
        let stale_formulas = self.stale_formulas.entry(part.path.clone()).or_default();

        Ok(Sheet {
            part,
            state,
            stale_formulas,
            package: &self.package,
            strings: &mut self.strings,
            calc: &mut self.calc,
            dirty: &mut self.dirty,
            options: &self.options,
        })
    }

    /// Whether a worksheet's XML has been parsed this session
    pub fn is_materialized(&self, name: &str) -> bool {
        self.registry
            .resolve_sheet(name)
            .is_ok_and(|part| self.sheets.contains_key(&part.path))
    }

    /// Member paths modified since open or the last save
    pub fn dirty_parts(&self) -> Vec<&str> {
        self.dirty.paths().collect()
    }

    /// Number of entries in the shared string table
    pub fn shared_string_count(&self) -> usize {
        self.strings.len()
    }

    /// Whether the workbook asks the host application to recalculate on open
    pub fn full_calc_on_load(&self) -> bool {
        self.calc.full_calc_on_load
    }

    /// Serialize the workbook
    ///
    /// Unmodified members are copied byte for byte. The output becomes the
    /// session's new baseline: the dirty set is cleared and saving again
    /// without edits returns the same bytes.
    pub fn save(&mut self) -> XlsxResult<Vec<u8>> {
        if self.dirty.is_empty() {
            return Ok(self.package.source_bytes().to_vec());
        }

        let mut replacements = BTreeMap::new();
        for path in self.dirty.paths() {
            let bytes = if let Some(state) = self.sheets.get(path) {
                state.doc.to_bytes()
            } else if self.strings.path() == Some(path) {
                self.strings
                    .to_bytes()
                    .ok_or_else(|| XlsxError::MissingPart(path.to_string()))?
            } else if self.calc.workbook_path == path {
                self.calc
                    .doc
                    .as_ref()
                    .map(XmlDocument::to_bytes)
                    .ok_or_else(|| XlsxError::MissingPart(path.to_string()))?
            } else {
                return Err(XlsxError::MissingPart(path.to_string()));
            };
            replacements.insert(path.to_string(), bytes);
        }

        let out = SurgicalWriter::write(&self.package, &replacements)?;
        let mut reopened = Self::open_with_options(out.clone(), self.options.clone())?;
        reopened.stale_formulas = std::mem::take(&mut self.stale_formulas);
        *self = reopened;
        Ok(out)
    }

    /// Serialize the workbook into a writer
    pub fn save_to<W: Write>(&mut self, mut writer: W) -> XlsxResult<()> {
        let bytes = self.save()?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

/// A worksheet handle borrowed from an [`XlsxWorkbook`]
pub struct Sheet<'a> {
    part: &'a SheetPart,
    state: &'a mut SheetState,
    stale_formulas: &'a mut HashSet<CellAddress>,
    package: &'a Package,
    strings: &'a mut SharedStringTable,
    calc: &'a mut CalcState,
    dirty: &'a mut DirtyTracker,
    options: &'a EditOptions,
}

impl<'a> Sheet<'a> {
    /// Tab name
    pub fn name(&self) -> &str {
        &self.part.name
    }

    /// Member path of the worksheet part
    pub fn part_path(&self) -> &str {
        &self.part.path
    }

    /// A column by its label (`"A"`, `"AB"`, ...)
    pub fn column(&self, label: &str) -> XlsxResult<Column<'_>> {
        let index = CellAddress::letters_to_column(label)?;
        Ok(Column { sheet: self, index })
    }

    /// Every column from `start` to `end` inclusive, left to right
    pub fn column_range(&self, start: &str, end: &str) -> XlsxResult<Vec<Column<'_>>> {
        Ok(column_span(start, end)?
            .map(|index| Column { sheet: self, index })
            .collect())
    }

    /// Value of the cell at column `col`, row `row` (1-based)
    pub fn cell(&self, col: &str, row: u32) -> XlsxResult<CellValue> {
        self.cell_at(CellAddress::from_label(col, row)?)
    }

    /// Value of the cell at an address; `Empty` when no cell node exists
    pub fn cell_at(&self, address: CellAddress) -> XlsxResult<CellValue> {
        match self.state.index.cell(&self.state.doc, address) {
            Some(cell) => codec::decode(
                &self.part.path,
                cell,
                address,
                self.strings,
                self.cache_trusted(address),
            ),
            None => Ok(CellValue::Empty),
        }
    }

    /// Values of `row` from column `start` to `end` inclusive
    pub fn row_values(&self, row: u32, start: &str, end: &str) -> XlsxResult<Vec<CellValue>> {
        column_span(start, end)?
            .map(|col| self.cell_at(CellAddress::new(col, row)?))
            .collect()
    }

    /// Write a value to the cell at column `col`, row `row`
    pub fn set_cell(&mut self, col: &str, row: u32, value: impl Into<CellValue>) -> XlsxResult<()> {
        let address = CellAddress::from_label(col, row)?;
        self.set_at(address, value)
    }

    /// Write a value to the cell at an A1 reference
    pub fn set(&mut self, reference: &str, value: impl Into<CellValue>) -> XlsxResult<()> {
        let address = CellAddress::parse(reference)?;
        self.set_at(address, value)
    }

    /// Write a value to the cell at an address
    ///
    /// A refused write (see [`XlsxError::UnsupportedCellFeature`]) changes
    /// nothing: no node is created and nothing is marked dirty.
    pub fn set_at(&mut self, address: CellAddress, value: impl Into<CellValue>) -> XlsxResult<()> {
        let value = value.into();
        let existing = self.state.index.cell(&self.state.doc, address);
        codec::validate(&value, existing, address, self.strings, self.options)?;
        if let Some(block) = self.state.index.formula_block_containing(address) {
            return Err(XlsxError::unsupported(
                address,
                format!("cell inside the range of the formula at {}", block.start),
            ));
        }

        if existing.is_none() && value.is_empty() {
            return Ok(());
        }

        let formula = value.is_formula();
        if formula && self.options.force_full_calc_on_load {
            self.calc.prepare(self.package)?;
        }

        let cell = self.state.index.get_or_insert(&mut self.state.doc, address)?;
        let EncodeOutcome {
            formula_written,
            strings_grown,
        } = codec::encode(&value, cell, address, self.strings, self.options)?;
        log::trace!("{}!{} = {:?}", self.part.name, address, value);

        self.dirty.mark(&self.part.path);
        if strings_grown {
            if let Some(path) = self.strings.path() {
                self.dirty.mark(path);
            }
        }

        if formula_written {
            if self.options.formula_cache == FormulaCachePolicy::Zero {
                self.stale_formulas.insert(address);
            }
            if self.options.force_full_calc_on_load && self.calc.force_full_calc(self.package)? {
                self.dirty.mark(&self.calc.workbook_path);
            }
        } else {
            self.stale_formulas.remove(&address);
        }

        Ok(())
    }

    fn cache_trusted(&self, address: CellAddress) -> bool {
        !self.calc.full_calc_on_load && !self.stale_formulas.contains(&address)
    }
}

impl std::fmt::Debug for Sheet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sheet")
            .field("name", &self.part.name)
            .field("part", &self.part.path)
            .field("cells", &self.state.index.len())
            .finish()
    }
}

/// One column of a worksheet
#[derive(Clone, Copy)]
pub struct Column<'s> {
    sheet: &'s Sheet<'s>,
    index: u32,
}

impl<'s> Column<'s> {
    /// Column label (`"A"`, `"AB"`, ...)
    pub fn label(&self) -> String {
        CellAddress::column_to_letters(self.index)
    }

    /// 1-based column number
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Value at `row`; `Empty` when absent
    pub fn at(&self, row: u32) -> XlsxResult<CellValue> {
        self.sheet.cell_at(CellAddress::new(self.index, row)?)
    }

    /// Values from `start` to `end` inclusive; absent cells are `Empty`
    pub fn slice(&self, start: u32, end: u32) -> XlsxResult<Vec<CellValue>> {
        CellAddress::new(self.index, start)?;
        CellAddress::new(self.index, end)?;
        (start..=end).map(|row| self.at(row)).collect()
    }

    /// Values from `start` down to the row before the first empty cell
    pub fn slice_from(&self, start: u32) -> XlsxResult<Vec<CellValue>> {
        CellAddress::new(self.index, start)?;
        let mut values = Vec::new();
        for row in start..=splice_sheets_core::MAX_ROWS {
            let value = self.at(row)?;
            if value.is_empty() {
                break;
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Non-empty values in row order
    pub fn values(&self) -> XlsxResult<Vec<CellValue>> {
        let mut values = Vec::new();
        for row in self.sheet.state.index.rows_in_column(self.index) {
            let value = self.at(row)?;
            if !value.is_empty() {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Number of cells in this column that hold a value
    pub fn len(&self) -> usize {
        let state = &*self.sheet.state;
        state
            .index
            .rows_in_column(self.index)
            .filter_map(|row| state.index.cell(&state.doc, CellAddress { row, col: self.index }))
            .filter(|cell| has_content(cell))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Column<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("sheet", &self.sheet.name())
            .field("label", &self.label())
            .finish()
    }
}

fn has_content(cell: &XmlElement) -> bool {
    cell.has_child("f")
        || cell.has_child("is")
        || cell.find_child("v").is_some_and(|v| !v.text().is_empty())
}
