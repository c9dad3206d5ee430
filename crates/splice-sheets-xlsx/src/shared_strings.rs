//! Shared string table
//!
//! Append-only view over `xl/sharedStrings.xml`. Existing entries keep their
//! index for the life of the session; new text is appended at the end.

use std::collections::HashMap;

use crate::error::{XlsxError, XlsxResult};
use crate::tree::{XmlDocument, XmlElement, XmlNode};

/// Result of interning a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interned {
    /// Index of the entry holding the text
    pub index: u32,
    /// Whether a new entry was appended
    pub appended: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    rich: bool,
}

/// The workbook's shared string table
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable {
    doc: Option<XmlDocument>,
    entries: Vec<Entry>,
    plain: HashMap<String, u32>,
}

impl SharedStringTable {
    /// A workbook without a shared strings part
    pub fn absent() -> Self {
        Self::default()
    }

    /// Parse the shared strings part
    pub fn load(path: &str, bytes: &[u8]) -> XlsxResult<Self> {
        let doc = XmlDocument::parse(path, bytes)?;
        if doc.root().local_name() != "sst" {
            return Err(XlsxError::malformed(
                path,
                format!("expected <sst>, found <{}>", doc.root().name()),
            ));
        }

        let mut entries = Vec::new();
        let mut plain = HashMap::new();
        for si in doc.root().child_elements().filter(|el| el.local_name() == "si") {
            let rich = si.has_child("r");
            let text = decode_excel_escapes(&entry_text(si));
            if !rich {
                plain.entry(text.clone()).or_insert(entries.len() as u32);
            }
            entries.push(Entry { text, rich });
        }

        log::debug!("loaded {} shared strings from {}", entries.len(), path);

        Ok(Self {
            doc: Some(doc),
            entries,
            plain,
        })
    }

    /// Whether the workbook has a shared strings part
    pub fn is_present(&self) -> bool {
        self.doc.is_some()
    }

    /// Member path of the backing part
    pub fn path(&self) -> Option<&str> {
        self.doc.as_ref().map(XmlDocument::part)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text of the entry at `index`
    pub fn string_at(&self, index: u64) -> XlsxResult<&str> {
        self.entry(index).map(|entry| entry.text.as_str())
    }

    /// Whether the entry at `index` is formatted text made of runs
    pub fn is_rich(&self, index: u64) -> XlsxResult<bool> {
        self.entry(index).map(|entry| entry.rich)
    }

    fn entry(&self, index: u64) -> XlsxResult<&Entry> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .ok_or(XlsxError::SharedStringRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Index of `text`, appending a new entry if no plain entry matches
    ///
    /// Fails with [`XlsxError::MissingPart`] when the workbook has no table.
    pub fn index_of(&mut self, text: &str) -> XlsxResult<Interned> {
        if let Some(&index) = self.plain.get(text) {
            return Ok(Interned {
                index,
                appended: false,
            });
        }

        let doc = self
            .doc
            .as_mut()
            .ok_or_else(|| XlsxError::MissingPart("shared strings table".into()))?;
        let index = u32::try_from(self.entries.len()).map_err(|_| {
            XlsxError::malformed(doc.part(), "shared string table is full")
        })?;

        let sst = doc.root_mut();
        let mut t = XmlElement::new(sst.qualified("t"));
        if needs_space_preserve(text) {
            t.set_attr("xml:space", "preserve");
        }
        t.set_text(&encode_excel_escapes(text));
        let mut si = XmlElement::new(sst.qualified("si"));
        si.push_child(XmlNode::Element(t));

        let pos = match last_position(sst, "si") {
            Some(last) => last + 1,
            None => sst.position_of("extLst").unwrap_or(sst.children().len()),
        };
        sst.insert_child(pos, XmlNode::Element(si));

        self.entries.push(Entry {
            text: text.to_string(),
            rich: false,
        });
        self.plain.insert(text.to_string(), index);

        let unique = self.entries.len().to_string();
        if sst.attr("uniqueCount").is_some() {
            sst.set_attr("uniqueCount", &unique);
        }
        if let Some(count) = sst.attr("count") {
            let bumped = count.trim().parse::<u64>().map_or(unique, |n| (n + 1).to_string());
            sst.set_attr("count", &bumped);
        }

        log::trace!("appended shared string {}", index);
        Ok(Interned {
            index,
            appended: true,
        })
    }

    /// Serialized table, if present
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        self.doc.as_ref().map(XmlDocument::to_bytes)
    }
}

/// Text of an `<si>` or `<is>`: its `<t>`, or the `<t>` of each run
///
/// Phonetic hints (`<rPh>`) are skipped.
pub(crate) fn entry_text(si: &XmlElement) -> String {
    let mut out = String::new();
    for child in si.child_elements() {
        match child.local_name() {
            "t" => out.push_str(&child.text()),
            "r" => {
                if let Some(t) = child.find_child("t") {
                    out.push_str(&t.text());
                }
            }
            _ => {}
        }
    }
    out
}

fn last_position(el: &XmlElement, local: &str) -> Option<usize> {
    el.children()
        .iter()
        .rposition(|node| node.as_element().is_some_and(|e| e.local_name() == local))
}

pub(crate) fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.contains(|c: char| c == '\n' || c == '\t' || c == '\r')
}

/// Decode Excel's `_xHHHH_` escape sequences
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("_x") {
        result.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match parse_escape(candidate) {
            Some(decoded) => {
                result.push(decoded);
                rest = &candidate[7..];
            }
            None => {
                result.push('_');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// `_xHHHH_` at the start of `s`
fn parse_escape(s: &str) -> Option<char> {
    let bytes = s.as_bytes();
    if bytes.len() < 7 || bytes[6] != b'_' {
        return None;
    }
    let hex = s.get(2..6)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// Encode text so it reads back unchanged through [`decode_excel_escapes`]
///
/// Control characters XML cannot carry become `_xHHHH_`, and an underscore
/// starting a literal `_xHHHH_` is itself escaped as `_x005F_`.
pub(crate) fn encode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        match c {
            '_' if parse_escape(&s[i..]).is_some() => result.push_str("_x005F_"),
            '\t' | '\n' | '\r' => result.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                result.push_str(&format!("_x{:04X}_", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
