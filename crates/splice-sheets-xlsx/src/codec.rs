//! Cell value codec
//!
//! Converts between a `<c>` node and a [`CellValue`]. Decoding never mutates;
//! encoding validates the cell and the value before touching anything, so a
//! refused write leaves the tree and the shared string table as they were.

use splice_sheets_core::{CellAddress, CellError, CellValue, Formula};

use crate::error::{XlsxError, XlsxResult};
use crate::options::{EditOptions, FormulaCachePolicy};
use crate::shared_strings::{
    decode_excel_escapes, encode_excel_escapes, entry_text, needs_space_preserve,
    SharedStringTable,
};
use crate::tree::{XmlElement, XmlNode};

/// Side effects of an encode the session has to account for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOutcome {
    /// A formula was written (the workbook may need a recalculation flag)
    pub formula_written: bool,
    /// The shared string table gained an entry (its part is now dirty)
    pub strings_grown: bool,
}

/// Read the value of a cell node
///
/// `cache_trusted` is false once the workbook asks for a full recalculation,
/// which makes every cached formula result stale.
pub fn decode(
    part: &str,
    cell: &XmlElement,
    address: CellAddress,
    strings: &SharedStringTable,
    cache_trusted: bool,
) -> XlsxResult<CellValue> {
    let cell_type = cell.attr("t");
    let cell_type = cell_type.as_deref();
    if cell_type == Some("d") {
        return Err(XlsxError::unsupported(address, "ISO 8601 date cell"));
    }

    let raw_value = cell.find_child("v").map(XmlElement::text);

    if let Some(f) = cell.find_child("f") {
        let expression = f.text();
        if expression.is_empty() {
            let feature = match f.attr("t").as_deref() {
                Some("shared") => "shared formula without its own text",
                _ => "formula without text",
            };
            return Err(XlsxError::unsupported(address, feature));
        }

        let formula = Formula::new(expression);
        let cached = match raw_value {
            Some(v) => decode_scalar(part, address, cell_type, &v, strings, true)?,
            None => None,
        };
        return Ok(CellValue::Formula(match cached {
            Some(value) => formula.with_cached_value(value, cache_trusted),
            None => formula,
        }));
    }

    if cell_type == Some("inlineStr") {
        return Ok(match cell.find_child("is") {
            Some(is) => CellValue::Text(decode_excel_escapes(&entry_text(is))),
            None => CellValue::Empty,
        });
    }

    match raw_value {
        Some(v) => Ok(decode_scalar(part, address, cell_type, &v, strings, false)?
            .unwrap_or_default()),
        None => Ok(CellValue::Empty),
    }
}

/// Decode the text of a `<v>` according to the cell's `t`
fn decode_scalar(
    part: &str,
    address: CellAddress,
    cell_type: Option<&str>,
    v: &str,
    strings: &SharedStringTable,
    is_cache: bool,
) -> XlsxResult<Option<CellValue>> {
    let value = match cell_type {
        Some("s") => {
            let index: u64 = v.trim().parse().map_err(|_| {
                XlsxError::malformed(
                    part,
                    format!("cell {}: invalid shared string index '{}'", address, v),
                )
            })?;
            if is_cache && strings.is_rich(index)? {
                log::warn!(
                    "{}: cached value of {} is formatted text; reading it as plain text",
                    part,
                    address
                );
            }
            CellValue::Text(strings.string_at(index)?.to_string())
        }
        Some("b") => match v.trim() {
            "1" | "true" | "TRUE" => CellValue::Boolean(true),
            "0" | "false" | "FALSE" => CellValue::Boolean(false),
            other => {
                return Err(XlsxError::malformed(
                    part,
                    format!("cell {}: invalid boolean '{}'", address, other),
                ))
            }
        },
        Some("e") => CellError::parse(v).map(CellValue::Error).ok_or_else(|| {
            XlsxError::malformed(part, format!("cell {}: unknown error value '{}'", address, v))
        })?,
        Some("str") | Some("inlineStr") => CellValue::Text(decode_excel_escapes(v)),
        None | Some("n") => {
            if v.trim().is_empty() {
                return Ok(None);
            }
            let n = v.trim().parse::<f64>().map_err(|_| {
                XlsxError::malformed(part, format!("cell {}: invalid number '{}'", address, v))
            })?;
            CellValue::Number(n)
        }
        Some(other) => {
            return Err(XlsxError::unsupported(
                address,
                format!("cell type '{}'", other),
            ))
        }
    };
    Ok(Some(value))
}

/// Write a value into a cell node
///
/// Keeps `r`, `s` and any other attribute, and any `<extLst>` child; replaces
/// `t`, `<f>`, `<v>` and `<is>`.
pub fn encode(
    value: &CellValue,
    cell: &mut XmlElement,
    address: CellAddress,
    strings: &mut SharedStringTable,
    options: &EditOptions,
) -> XlsxResult<EncodeOutcome> {
    validate(value, Some(cell), address, strings, options)?;

    let use_shared = options
        .text_encoding
        .uses_shared_strings(strings.is_present());
    let mut outcome = EncodeOutcome::default();
    cell.remove_children(&["f", "v", "is"]);
    cell.remove_attr("t");

    match value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            push_value(cell, &n.to_string());
        }
        CellValue::Boolean(b) => {
            cell.set_attr("t", "b");
            push_value(cell, if *b { "1" } else { "0" });
        }
        CellValue::Error(e) => {
            cell.set_attr("t", "e");
            push_value(cell, e.as_str());
        }
        CellValue::Text(text) if use_shared => {
            let interned = strings.index_of(text)?;
            cell.set_attr("t", "s");
            push_value(cell, &interned.index.to_string());
            outcome.strings_grown = interned.appended;
        }
        CellValue::Text(text) => {
            cell.set_attr("t", "inlineStr");
            let mut t = XmlElement::new(cell.qualified("t"));
            if needs_space_preserve(text) {
                t.set_attr("xml:space", "preserve");
            }
            t.set_text(&encode_excel_escapes(text));
            let mut is = XmlElement::new(cell.qualified("is"));
            is.push_child(XmlNode::Element(t));
            push_child(cell, is);
        }
        CellValue::Formula(formula) => {
            let mut f = XmlElement::new(cell.qualified("f"));
            f.set_text(formula.expression());
            push_child(cell, f);
            if options.formula_cache == FormulaCachePolicy::Zero {
                push_value(cell, "0");
            }
            outcome.formula_written = true;
        }
    }

    Ok(outcome)
}

/// Check that `value` can be written to `cell` without changing anything
///
/// `cell` is `None` when the address has no node yet.
pub fn validate(
    value: &CellValue,
    cell: Option<&XmlElement>,
    address: CellAddress,
    strings: &SharedStringTable,
    options: &EditOptions,
) -> XlsxResult<()> {
    if let Some(cell) = cell {
        check_cell_editable(cell, address)?;
    }

    match value {
        CellValue::Number(n) if !n.is_finite() => {
            Err(XlsxError::unsupported(address, "non-finite number"))
        }
        CellValue::Text(_)
            if options.text_encoding.uses_shared_strings(strings.is_present())
                && !strings.is_present() =>
        {
            Err(XlsxError::unsupported(
                address,
                "shared string storage in a workbook without a shared strings table",
            ))
        }
        _ => Ok(()),
    }
}

/// Refuse cells whose content this codec can't rewrite faithfully
fn check_cell_editable(cell: &XmlElement, address: CellAddress) -> XlsxResult<()> {
    if cell.attr("vm").is_some() {
        return Err(XlsxError::unsupported(address, "rich value cell"));
    }
    let cell_type = cell.attr("t");
    if cell_type.as_deref() == Some("d") {
        return Err(XlsxError::unsupported(address, "ISO 8601 date cell"));
    }
    if let Some(f) = cell.find_child("f") {
        match f.attr("t").as_deref() {
            Some("array") => return Err(XlsxError::unsupported(address, "array formula")),
            Some("dataTable") => return Err(XlsxError::unsupported(address, "data table formula")),
            Some("shared") => return Err(XlsxError::unsupported(address, "shared formula")),
            _ => {}
        }
    }
    if cell_type.as_deref() == Some("inlineStr") {
        if let Some(is) = cell.find_child("is") {
            if is.has_child("r") {
                return Err(XlsxError::unsupported(address, "rich text inline string"));
            }
        }
    }
    Ok(())
}

fn push_value(cell: &mut XmlElement, text: &str) {
    let mut v = XmlElement::new(cell.qualified("v"));
    v.set_text(text);
    push_child(cell, v);
}

/// Append a value child, keeping `<extLst>` last
fn push_child(cell: &mut XmlElement, child: XmlElement) {
    match cell.position_of("extLst") {
        Some(pos) => cell.insert_child(pos, XmlNode::Element(child)),
        None => cell.push_child(XmlNode::Element(child)),
    }
}
