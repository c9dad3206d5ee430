//! Package layouts: relationship resolution, prefixed markup, odd members.

use std::io::{Cursor, Write};

use crate::{assert_untouched_except, member_names, member_text, Fixture, MAIN_NS, REL_NS};
use pretty_assertions::assert_eq;
use splice_sheets_core::CellValue;
use splice_sheets_xlsx::{XlsxError, XlsxWorkbook};
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipWriter};

#[test]
fn test_absolute_relationship_target() {
    let input = Fixture::standard().build();
    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    {
        let mut sheet = workbook.sheet("Notes").unwrap();
        assert_eq!(sheet.part_path(), "xl/worksheets/sheet2.xml");
        assert_eq!(sheet.cell("A", 1).unwrap(), CellValue::text("scratch"));
        sheet.set("A2", true).unwrap();
    }
    let output = workbook.save().unwrap();
    assert_untouched_except(&input, &output, &["xl/worksheets/sheet2.xml"]);
    assert!(member_text(&output, "xl/worksheets/sheet2.xml")
        .contains(r#"<row r="2"><c r="A2" t="b"><v>1</v></c></row>"#));
}

#[test]
fn test_missing_root_relationships_use_default_workbook() {
    let input = Fixture::standard().without("_rels/.rels").build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Sales", "Notes"]);
    assert_eq!(
        workbook.sheet("Sales").unwrap().cell("A", 2).unwrap(),
        CellValue::Number(10.0)
    );
}

#[test]
fn test_relocated_workbook_part() {
    let root_rels = crate::ROOT_RELS.replace("Target=\"xl/workbook.xml\"", "Target=\"book/main.xml\"");
    let rels = crate::WORKBOOK_RELS
        .replace("Target=\"worksheets/sheet1.xml\"", "Target=\"../xl/worksheets/sheet1.xml\"")
        .replace("Target=\"sharedStrings.xml\"", "Target=\"../xl/sharedStrings.xml\"");
    let input = Fixture::standard()
        .without("xl/workbook.xml")
        .without("xl/_rels/workbook.xml.rels")
        .with("_rels/.rels", &root_rels)
        .with("book/main.xml", crate::WORKBOOK)
        .with("book/_rels/main.xml.rels", &rels)
        .build();

    let mut workbook = XlsxWorkbook::open(input).unwrap();
    let mut sheet = workbook.sheet("Sales").unwrap();
    assert_eq!(sheet.part_path(), "xl/worksheets/sheet1.xml");
    assert_eq!(sheet.cell("A", 1).unwrap(), CellValue::text("Qty"));
    sheet.set("C3", splice_sheets_core::formula("A3*B3")).unwrap();
    drop(sheet);
    assert_eq!(
        workbook.dirty_parts(),
        vec!["book/main.xml", "xl/worksheets/sheet1.xml"]
    );
}

#[test]
fn test_prefixed_worksheet_markup() {
    let sheet = format!(
        r#"<x:worksheet xmlns:x="{}" xmlns:r="{}"><x:sheetData><x:row r="1"><x:c r="A1"><x:v>1</x:v></x:c></x:row></x:sheetData></x:worksheet>"#,
        MAIN_NS, REL_NS
    );
    let input = Fixture::standard()
        .with("xl/worksheets/sheet2.xml", &sheet)
        .build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    {
        let mut sheet = workbook.sheet("Notes").unwrap();
        assert_eq!(sheet.cell("A", 1).unwrap(), CellValue::Number(1.0));
        sheet.set("B1", "Qty").unwrap();
        sheet.set("A2", 2).unwrap();
    }
    let output = workbook.save().unwrap();
    let xml = member_text(&output, "xl/worksheets/sheet2.xml");
    assert!(xml.contains(r#"<x:c r="B1" t="s"><x:v>0</x:v></x:c></x:row>"#));
    assert!(xml.contains(r#"<x:row r="2"><x:c r="A2"><x:v>2</x:v></x:c></x:row>"#));
}

#[test]
fn test_chartsheets_are_not_editable() {
    let workbook_xml = crate::WORKBOOK.replace(
        "</sheets>",
        r#"<sheet name="Chart" sheetId="3" r:id="rId9"/></sheets>"#,
    );
    let rels = crate::WORKBOOK_RELS.replace(
        "</Relationships>",
        r#"<Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet" Target="chartsheets/sheet1.xml"/></Relationships>"#,
    );
    let input = Fixture::standard()
        .with("xl/workbook.xml", &workbook_xml)
        .with("xl/_rels/workbook.xml.rels", &rels)
        .build();

    let mut workbook = XlsxWorkbook::open(input).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Sales", "Notes"]);
    assert!(matches!(workbook.sheet("Chart"), Err(XlsxError::UnknownSheet(_))));
}

#[test]
fn test_dangling_sheet_relationship() {
    let workbook_xml = crate::WORKBOOK.replace("r:id=\"rId2\"", "r:id=\"rId42\"");
    let input = Fixture::standard()
        .with("xl/workbook.xml", &workbook_xml)
        .build();
    let err = XlsxWorkbook::open(input).unwrap_err();
    assert!(matches!(err, XlsxError::MalformedPart { ref part, .. } if part == "xl/workbook.xml"));
}

#[test]
fn test_missing_workbook_part() {
    let input = Fixture::standard().without("xl/workbook.xml").build();
    assert!(matches!(
        XlsxWorkbook::open(input),
        Err(XlsxError::MissingPart(path)) if path == "xl/workbook.xml"
    ));
}

#[test]
fn test_missing_shared_strings_member_falls_back_to_inline() {
    let input = Fixture::standard().without("xl/sharedStrings.xml").build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    assert_eq!(workbook.shared_string_count(), 0);
    {
        let mut sheet = workbook.sheet("Notes").unwrap();
        sheet.set("B1", "inline").unwrap();
        assert_eq!(sheet.cell("B", 1).unwrap(), CellValue::text("inline"));
    }
    assert_eq!(workbook.dirty_parts(), vec!["xl/worksheets/sheet2.xml"]);
}

#[test]
fn test_directory_entries_survive() {
    let options = SimpleFileOptions::default().last_modified_time(DateTime::default());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.add_directory("xl/", options).unwrap();
    for (name, body) in [
        ("[Content_Types].xml", crate::CONTENT_TYPES),
        ("_rels/.rels", crate::ROOT_RELS),
        ("xl/workbook.xml", crate::WORKBOOK),
        ("xl/_rels/workbook.xml.rels", crate::WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", crate::SALES_SHEET),
        ("xl/worksheets/sheet2.xml", crate::NOTES_SHEET),
        ("xl/sharedStrings.xml", crate::SHARED_STRINGS),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    let input = zip.finish().unwrap().into_inner();

    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    workbook.sheet("Sales").unwrap().set("A2", 11).unwrap();
    let output = workbook.save().unwrap();

    assert_eq!(member_names(&output)[0], "xl/");
    assert_untouched_except(&input, &output, &["xl/worksheets/sheet1.xml"]);
}
