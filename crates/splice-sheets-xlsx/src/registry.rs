//! Logical part resolution
//!
//! Maps roles ("worksheet named X", "shared strings table") to member paths
//! by walking `_rels/.rels` → workbook part → workbook relationships. This is
//! read once when the package is opened; the manifest is never re-read.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::Package;

const DEFAULT_WORKBOOK_PATH: &str = "xl/workbook.xml";

/// A worksheet resolved to its member path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPart {
    /// Tab name as shown by the host application
    pub name: String,
    /// `sheetId` from the workbook part
    pub sheet_id: Option<u32>,
    /// Relationship id linking the workbook part to the worksheet
    pub rel_id: String,
    /// Member path of the worksheet XML
    pub path: String,
}

/// A relationship entry from a `.rels` part
#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
    external: bool,
}

/// Resolved logical parts of a workbook
#[derive(Debug, Clone)]
pub struct PartRegistry {
    workbook_path: String,
    sheets: Vec<SheetPart>,
    shared_strings: Option<String>,
    full_calc_on_load: bool,
}

impl PartRegistry {
    /// Resolve the workbook structure from a loaded package
    pub fn load(package: &Package) -> XlsxResult<Self> {
        let workbook_path = match package.member("_rels/.rels") {
            Ok(bytes) => read_relationships("_rels/.rels", bytes)?
                .into_iter()
                .find(|rel| !rel.external && rel.rel_type.ends_with("/officeDocument"))
                .map(|rel| resolve_target("", &rel.target))
                .unwrap_or_else(|| DEFAULT_WORKBOOK_PATH.to_string()),
            Err(_) => DEFAULT_WORKBOOK_PATH.to_string(),
        };

        let (sheet_refs, full_calc_on_load) =
            read_workbook_xml(&workbook_path, package.member(&workbook_path)?)?;

        let rels_path = rels_path_for(&workbook_path);
        let rels = read_relationships(&rels_path, package.member(&rels_path)?)?;

        let mut worksheets: HashMap<&str, String> = HashMap::new();
        let mut shared_strings = None;
        for rel in rels.iter().filter(|rel| !rel.external) {
            if rel.rel_type.ends_with("/worksheet") {
                worksheets.insert(rel.id.as_str(), resolve_target(&workbook_path, &rel.target));
            } else if rel.rel_type.ends_with("/sharedStrings") && shared_strings.is_none() {
                shared_strings = Some(resolve_target(&workbook_path, &rel.target));
            }
        }

        let mut sheets = Vec::new();
        for sheet in sheet_refs {
            match worksheets.get(sheet.rel_id.as_str()) {
                Some(path) => sheets.push(SheetPart {
                    name: sheet.name,
                    sheet_id: sheet.sheet_id,
                    rel_id: sheet.rel_id,
                    path: path.clone(),
                }),
                None if rels.iter().any(|rel| rel.id == sheet.rel_id) => {
                    log::warn!(
                        "sheet '{}' is not a worksheet; it cannot be edited",
                        sheet.name
                    );
                }
                None => {
                    return Err(XlsxError::malformed(
                        &workbook_path,
                        format!(
                            "sheet '{}' references missing relationship {}",
                            sheet.name, sheet.rel_id
                        ),
                    ))
                }
            }
        }

        log::debug!(
            "resolved workbook {}: {} worksheet(s), shared strings: {:?}",
            workbook_path,
            sheets.len(),
            shared_strings
        );

        Ok(Self {
            workbook_path,
            sheets,
            shared_strings,
            full_calc_on_load,
        })
    }

    /// Resolve a worksheet by its tab name
    pub fn resolve_sheet(&self, name: &str) -> XlsxResult<&SheetPart> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| XlsxError::UnknownSheet(name.to_string()))
    }

    /// Member path of the shared strings table, if the workbook has one
    pub fn resolve_shared_strings(&self) -> Option<&str> {
        self.shared_strings.as_deref()
    }

    /// Worksheet names in workbook order
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str())
    }

    /// Resolved worksheets in workbook order
    pub fn sheets(&self) -> &[SheetPart] {
        &self.sheets
    }

    /// Member path of the workbook part
    pub fn workbook_path(&self) -> &str {
        &self.workbook_path
    }

    /// Whether `<calcPr fullCalcOnLoad="1">` was set when the package was opened
    pub fn full_calc_on_load(&self) -> bool {
        self.full_calc_on_load
    }
}

/// A `<sheet>` entry of the workbook part
struct SheetRef {
    name: String,
    sheet_id: Option<u32>,
    rel_id: String,
}

/// Read the workbook part to get sheet names, rIds and the recalc flag
fn read_workbook_xml(part: &str, bytes: &[u8]) -> XlsxResult<(Vec<SheetRef>, bool)> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut full_calc_on_load = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match local_name_of(&e) {
                b"sheet" => {
                    let mut name = None;
                    let mut sheet_id = None;
                    let mut rel_id = None;

                    for attr in e.attributes().flatten() {
                        let key = attr.key.as_ref();
                        let value = attr.unescape_value().ok().map(|s| s.to_string());
                        match key {
                            b"name" => name = value,
                            b"sheetId" => sheet_id = value.and_then(|s| s.parse::<u32>().ok()),
                            _ if is_prefixed_id(key) => rel_id = value,
                            _ => {}
                        }
                    }

                    match (name, rel_id) {
                        (Some(name), Some(rel_id)) => sheets.push(SheetRef {
                            name,
                            sheet_id,
                            rel_id,
                        }),
                        _ => {
                            return Err(XlsxError::malformed(
                                part,
                                "<sheet> without name or relationship id",
                            ))
                        }
                    }
                }
                b"calcPr" => {
                    full_calc_on_load = e.attributes().flatten().any(|attr| {
                        attr.key.as_ref() == b"fullCalcOnLoad"
                            && matches!(attr.value.as_ref(), b"1" | b"true")
                    });
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::malformed(part, e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok((sheets, full_calc_on_load))
}

/// Read a `.rels` part
fn read_relationships(part: &str, bytes: &[u8]) -> XlsxResult<Vec<Relationship>> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name_of(&e) == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                let mut rel_type = None;
                let mut external = false;

                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().ok().map(|s| s.to_string());
                    match attr.key.as_ref() {
                        b"Id" => id = value,
                        b"Target" => target = value,
                        b"Type" => rel_type = value,
                        b"TargetMode" => external = value.as_deref() == Some("External"),
                        _ => {}
                    }
                }

                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::malformed(part, e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

fn local_name_of<'a>(e: &'a BytesStart<'_>) -> &'a [u8] {
    let name = e.name().into_inner();
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn is_prefixed_id(key: &[u8]) -> bool {
    key.ends_with(b":id") && key.len() > 3
}

/// `xl/workbook.xml` → `xl/_rels/workbook.xml.rels`
fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns the relationship
///
/// Absolute targets (`/xl/...`) are package-rooted; relative ones are joined
/// to the source part's directory with `.` and `..` segments folded.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }
    let base_dir = source_part.rsplit_once('/').map_or("", |(dir, _)| dir);
    if base_dir.is_empty() {
        normalize(&target)
    } else {
        normalize(&format!("{}/{}", base_dir, target))
    }
}

fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
