//! Coordinate index over a worksheet tree
//!
//! Maps `(row, column)` to the position of the `<c>` node inside
//! `<sheetData>`, so reads and writes don't rescan the sheet. Positions are
//! indices into `XmlElement::children()` and are kept current as cells and
//! rows are inserted.

use std::collections::BTreeMap;

use splice_sheets_core::{CellAddress, CellRange};

use crate::error::{XlsxError, XlsxResult};
use crate::tree::{XmlDocument, XmlElement, XmlNode};

/// Where a cell node lives in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSlot {
    /// Position of the `<row>` in `<sheetData>`
    pub row_pos: usize,
    /// Position of the `<c>` in its `<row>`
    pub cell_pos: usize,
}

#[derive(Debug, Clone, Default)]
struct RowEntry {
    pos: usize,
    cells: BTreeMap<u32, usize>,
}

/// Index of the cell nodes of one worksheet
#[derive(Debug, Clone)]
pub struct CoordinateIndex {
    part: String,
    sheet_data_pos: usize,
    rows: BTreeMap<u32, RowEntry>,
    /// Ranges covered by array and data table formulas
    formula_blocks: Vec<CellRange>,
}

impl CoordinateIndex {
    /// Index every cell node of a worksheet
    ///
    /// Rows and cells without an `r` attribute take the position after their
    /// predecessor. Fails with [`XlsxError::MalformedPart`] when `<sheetData>`
    /// is missing or addresses are inconsistent, and with
    /// [`XlsxError::DuplicateCell`] when two nodes claim one address.
    pub fn build(doc: &XmlDocument) -> XlsxResult<Self> {
        let part = doc.part();
        let root = doc.root();
        let sheet_data_pos = root
            .position_of("sheetData")
            .ok_or_else(|| XlsxError::malformed(part, "worksheet has no <sheetData>"))?;
        let sheet_data = root
            .element_at(sheet_data_pos)
            .ok_or_else(|| XlsxError::malformed(part, "worksheet has no <sheetData>"))?;

        let mut rows: BTreeMap<u32, RowEntry> = BTreeMap::new();
        let mut formula_blocks = Vec::new();
        let mut last_row = 0u32;

        for (row_pos, node) in sheet_data.children().iter().enumerate() {
            let Some(row_el) = node.as_element() else {
                continue;
            };
            if row_el.local_name() != "row" {
                continue;
            }

            let row = match row_el.attr("r") {
                Some(r) => r.trim().parse::<u32>().map_err(|_| {
                    XlsxError::malformed(part, format!("invalid row number '{}'", r))
                })?,
                None => last_row + 1,
            };
            if row == 0 || row > splice_sheets_core::MAX_ROWS {
                return Err(XlsxError::malformed(
                    part,
                    format!("row number {} out of range", row),
                ));
            }
            last_row = row;

            let mut entry = RowEntry {
                pos: row_pos,
                cells: BTreeMap::new(),
            };
            let mut last_col = 0u32;

            for (cell_pos, cell_node) in row_el.children().iter().enumerate() {
                let Some(cell) = cell_node.as_element() else {
                    continue;
                };
                if cell.local_name() != "c" {
                    continue;
                }

                let address = match cell.attr("r") {
                    Some(r) => CellAddress::parse(&r).map_err(|_| {
                        XlsxError::malformed(part, format!("invalid cell reference '{}'", r))
                    })?,
                    None => CellAddress::new(last_col + 1, row).map_err(|_| {
                        XlsxError::malformed(part, format!("too many cells in row {}", row))
                    })?,
                };
                if address.row != row {
                    return Err(XlsxError::malformed(
                        part,
                        format!("cell {} is inside row {}", address, row),
                    ));
                }
                if entry.cells.insert(address.col, cell_pos).is_some() {
                    return Err(XlsxError::DuplicateCell {
                        part: part.to_string(),
                        address: address.to_a1_string(),
                    });
                }
                if let Some(block) = formula_block(part, cell)? {
                    formula_blocks.push(block);
                }
                last_col = address.col;
            }

            if rows.insert(row, entry).is_some() {
                return Err(XlsxError::malformed(
                    part,
                    format!("row {} appears more than once", row),
                ));
            }
        }

        log::debug!(
            "indexed {}: {} rows, {} cells",
            part,
            rows.len(),
            rows.values().map(|r| r.cells.len()).sum::<usize>()
        );

        Ok(Self {
            part: part.to_string(),
            sheet_data_pos,
            rows,
            formula_blocks,
        })
    }

    /// The array or data table formula range covering `address`, if any
    pub fn formula_block_containing(&self, address: CellAddress) -> Option<&CellRange> {
        self.formula_blocks
            .iter()
            .find(|range| range.contains(&address))
    }

    /// Position of a cell node, if the cell exists
    pub fn lookup(&self, address: CellAddress) -> Option<CellSlot> {
        let entry = self.rows.get(&address.row)?;
        let cell_pos = *entry.cells.get(&address.col)?;
        Some(CellSlot {
            row_pos: entry.pos,
            cell_pos,
        })
    }

    /// Number of indexed cell nodes
    pub fn len(&self) -> usize {
        self.rows.values().map(|r| r.cells.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(|r| r.cells.is_empty())
    }

    /// Columns that have a cell node in `row`, ascending
    pub fn columns_in_row(&self, row: u32) -> impl Iterator<Item = u32> + '_ {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|entry| entry.cells.keys().copied())
    }

    /// Rows that have a cell node in `col`, ascending
    pub fn rows_in_column(&self, col: u32) -> impl Iterator<Item = u32> + '_ {
        self.rows
            .iter()
            .filter(move |(_, entry)| entry.cells.contains_key(&col))
            .map(|(row, _)| *row)
    }

    /// The cell node at an address
    pub fn cell<'d>(&self, doc: &'d XmlDocument, address: CellAddress) -> Option<&'d XmlElement> {
        let slot = self.lookup(address)?;
        doc.root()
            .element_at(self.sheet_data_pos)?
            .element_at(slot.row_pos)?
            .element_at(slot.cell_pos)
    }

    /// The cell node at an address, mutably
    pub fn cell_mut<'d>(
        &self,
        doc: &'d mut XmlDocument,
        address: CellAddress,
    ) -> Option<&'d mut XmlElement> {
        let slot = self.lookup(address)?;
        doc.root_mut()
            .element_at_mut(self.sheet_data_pos)?
            .element_at_mut(slot.row_pos)?
            .element_at_mut(slot.cell_pos)
    }

    /// The cell node at an address, creating it (and its row) if needed
    ///
    /// New rows and cells are inserted in ascending order and the sheet's
    /// `<dimension>` is widened to cover the address.
    pub fn get_or_insert<'d>(
        &mut self,
        doc: &'d mut XmlDocument,
        address: CellAddress,
    ) -> XlsxResult<&'d mut XmlElement> {
        if self.lookup(address).is_none() {
            self.insert_cell(doc, address)?;
        }
        self.cell_mut(doc, address)
            .ok_or_else(|| XlsxError::malformed(&self.part, "cell index out of sync with tree"))
    }

    fn insert_cell(&mut self, doc: &mut XmlDocument, address: CellAddress) -> XlsxResult<()> {
        let part = self.part.clone();
        let sheet_data_pos = self.sheet_data_pos;
        let sheet_data = doc
            .root_mut()
            .element_at_mut(sheet_data_pos)
            .ok_or_else(|| XlsxError::malformed(&part, "worksheet has no <sheetData>"))?;

        if !self.rows.contains_key(&address.row) {
            let pos = match self.rows.range(address.row + 1..).next() {
                Some((_, next)) => next.pos,
                None => match self.rows.values().map(|r| r.pos).max() {
                    Some(last) => last + 1,
                    None => sheet_data.children().len(),
                },
            };

            stamp_row_numbers(sheet_data, &self.rows);

            let mut row_el = XmlElement::new(sheet_data.qualified("row"));
            row_el.set_attr("r", &address.row.to_string());
            sheet_data.insert_child(pos, XmlNode::Element(row_el));

            for entry in self.rows.values_mut() {
                if entry.pos >= pos {
                    entry.pos += 1;
                }
            }
            self.rows.insert(
                address.row,
                RowEntry {
                    pos,
                    cells: BTreeMap::new(),
                },
            );
            log::trace!("{}: inserted row {}", part, address.row);
        }

        let entry = self
            .rows
            .get_mut(&address.row)
            .ok_or_else(|| XlsxError::malformed(&part, "row index out of sync with tree"))?;
        let row_el = sheet_data
            .element_at_mut(entry.pos)
            .ok_or_else(|| XlsxError::malformed(&part, "row index out of sync with tree"))?;

        let pos = match entry.cells.range(address.col + 1..).next() {
            Some((_, &next)) => next,
            None => match entry.cells.values().max() {
                Some(&last) => last + 1,
                None => row_el
                    .position_of("extLst")
                    .unwrap_or(row_el.children().len()),
            },
        };

        stamp_cell_refs(row_el, address.row, &entry.cells);

        let mut cell_el = XmlElement::new(row_el.qualified("c"));
        cell_el.set_attr("r", &address.to_a1_string());
        row_el.insert_child(pos, XmlNode::Element(cell_el));

        for cell_pos in entry.cells.values_mut() {
            if *cell_pos >= pos {
                *cell_pos += 1;
            }
        }
        entry.cells.insert(address.col, pos);
        widen_spans(row_el, address.col);

        widen_dimension(doc, address);
        log::trace!("{}: inserted cell {}", part, address);
        Ok(())
    }
}

/// Range of an array or data table formula anchored at `cell`
fn formula_block(part: &str, cell: &XmlElement) -> XlsxResult<Option<CellRange>> {
    let Some(f) = cell.find_child("f") else {
        return Ok(None);
    };
    if !matches!(f.attr("t").as_deref(), Some("array") | Some("dataTable")) {
        return Ok(None);
    }
    let Some(reference) = f.attr("ref") else {
        return Ok(None);
    };
    CellRange::parse(&reference).map(Some).map_err(|_| {
        XlsxError::malformed(part, format!("invalid formula range '{}'", reference))
    })
}

/// Give every indexed row an explicit `r`, so implied numbering can't shift
fn stamp_row_numbers(sheet_data: &mut XmlElement, rows: &BTreeMap<u32, RowEntry>) {
    for (row, entry) in rows {
        if let Some(row_el) = sheet_data.element_at_mut(entry.pos) {
            if row_el.attr("r").is_none() {
                row_el.set_attr("r", &row.to_string());
            }
        }
    }
}

/// Give every indexed cell of a row an explicit `r`
fn stamp_cell_refs(row_el: &mut XmlElement, row: u32, cells: &BTreeMap<u32, usize>) {
    for (&col, &pos) in cells {
        if let Some(cell) = row_el.element_at_mut(pos) {
            if cell.attr("r").is_none() {
                let address = CellAddress { row, col };
                cell.set_attr("r", &address.to_a1_string());
            }
        }
    }
}

/// Widen a row's `spans="first:last"` hint to include `col`
fn widen_spans(row_el: &mut XmlElement, col: u32) {
    let Some(spans) = row_el.attr("spans") else {
        return;
    };
    let parsed = spans
        .split_once(':')
        .and_then(|(a, b)| Some((a.parse::<u32>().ok()?, b.parse::<u32>().ok()?)));
    if let Some((first, last)) = parsed {
        if col < first || col > last {
            let widened = format!("{}:{}", first.min(col), last.max(col));
            row_el.set_attr("spans", &widened);
        }
    }
}

/// Widen `<dimension ref>` to include `address`
fn widen_dimension(doc: &mut XmlDocument, address: CellAddress) {
    let part = doc.part().to_string();
    let Some(dimension) = doc.root_mut().find_child_mut("dimension") else {
        return;
    };
    let Some(current) = dimension.attr("ref") else {
        return;
    };
    match CellRange::parse(&current) {
        Ok(range) if range.contains(&address) => {}
        Ok(range) => {
            let widened = range.expanded_to(address).to_a1_string();
            dimension.set_attr("ref", &widened);
        }
        Err(_) => log::warn!("{}: leaving unreadable dimension '{}'", part, current),
    }
}
