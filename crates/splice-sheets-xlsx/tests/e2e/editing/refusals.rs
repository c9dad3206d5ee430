//! Refused edits and corrupt inputs.

use crate::{sheet_xml, Fixture};
use pretty_assertions::assert_eq;
use splice_sheets_core::{formula, CellValue};
use splice_sheets_xlsx::{XlsxError, XlsxWorkbook};

fn with_notes(rows: &str) -> Vec<u8> {
    Fixture::standard()
        .with("xl/worksheets/sheet2.xml", &sheet_xml(rows))
        .build()
}

#[test]
fn test_unsupported_cells_are_refused_atomically() {
    let input = with_notes(concat!(
        r#"<row r="1"><c r="A1"><f t="array" ref="A1:B2">C1:D2*2</f><v>2</v></c><c r="B1"><v>4</v></c></row>"#,
        r#"<row r="2"><c r="A2" vm="1"><v>0</v></c></row>"#,
        r#"<row r="3"><c r="A3"><f t="shared" ref="A3:A4" si="0">B3</f><v>1</v></c></row>"#,
        r#"<row r="4"><c r="A4"><f t="shared" si="0"/><v>1</v></c></row>"#,
        r#"<row r="5"><c r="A5" t="inlineStr"><is><r><rPr><b/></rPr><t>bold</t></r></is></c></row>"#,
    ));

    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    let strings_before = workbook.shared_string_count();
    {
        let mut sheet = workbook.sheet("Notes").unwrap();
        // B1 and B2 lie inside the array formula's range; B2 has no node yet
        for reference in ["A1", "B1", "B2", "A2", "A3", "A4", "A5"] {
            let err = sheet.set(reference, "replacement").unwrap_err();
            assert!(
                matches!(err, XlsxError::UnsupportedCellFeature { ref address, .. } if address == reference),
                "{}: {:?}",
                reference,
                err
            );
            assert!(!err.is_structural());
        }
        assert!(sheet.set("B2", CellValue::Empty).is_err());
        assert_eq!(sheet.cell("B", 1).unwrap(), CellValue::Number(4.0));
        assert_eq!(sheet.cell("B", 2).unwrap(), CellValue::Empty);

        let err = sheet.set("B9", f64::NAN).unwrap_err();
        assert!(matches!(err, XlsxError::UnsupportedCellFeature { .. }));
        assert_eq!(sheet.cell("B", 9).unwrap(), CellValue::Empty);
    }

    assert_eq!(workbook.shared_string_count(), strings_before);
    assert!(workbook.dirty_parts().is_empty());
    assert_eq!(workbook.save().unwrap(), input);
}

#[test]
fn test_data_table_range_is_refused() {
    let input = with_notes(concat!(
        r#"<row r="2"><c r="B2"><f t="dataTable" ref="B2:C3" dt2D="1" r1="A1" r2="A2"/><v>5</v></c></row>"#,
        r#"<row r="3"><c r="C3"><v>6</v></c></row>"#,
    ));
    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    {
        let mut sheet = workbook.sheet("Notes").unwrap();
        assert!(matches!(
            sheet.set("C3", 1),
            Err(XlsxError::UnsupportedCellFeature { .. })
        ));
        sheet.set("D3", 1).unwrap();
    }
    assert_eq!(workbook.dirty_parts(), vec!["xl/worksheets/sheet2.xml"]);
    let output = workbook.save().unwrap();
    assert!(crate::member_text(&output, "xl/worksheets/sheet2.xml")
        .contains(r#"<c r="C3"><v>6</v></c><c r="D3"><v>1</v></c>"#));
}

#[test]
fn test_refusal_after_successful_edit_keeps_that_edit() {
    let input = with_notes(r#"<row r="1"><c r="A1"><f t="array" ref="A1">1</f><v>1</v></c></row>"#);
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    {
        let mut sheet = workbook.sheet("Notes").unwrap();
        sheet.set("B1", 2).unwrap();
        assert!(sheet.set("A1", formula("=2")).is_err());
        assert_eq!(sheet.cell("B", 1).unwrap(), CellValue::Number(2.0));
    }
    assert_eq!(workbook.dirty_parts(), vec!["xl/worksheets/sheet2.xml"]);
    assert!(!workbook.full_calc_on_load());
}

#[test]
fn test_reading_unsupported_cells() {
    let input = with_notes(concat!(
        r#"<row r="1"><c r="A1" t="d"><v>2024-03-01T00:00:00</v></c>"#,
        r#"<c r="B1"><f t="shared" si="0"/><v>1</v></c></row>"#,
    ));
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    let sheet = workbook.sheet("Notes").unwrap();
    assert!(matches!(
        sheet.cell("A", 1),
        Err(XlsxError::UnsupportedCellFeature { .. })
    ));
    assert!(matches!(
        sheet.cell("B", 1),
        Err(XlsxError::UnsupportedCellFeature { .. })
    ));
}

#[test]
fn test_unknown_sheet() {
    let mut workbook = XlsxWorkbook::open(Fixture::standard().build()).unwrap();
    match workbook.sheet("Missing") {
        Err(XlsxError::UnknownSheet(name)) => assert_eq!(name, "Missing"),
        Err(other) => panic!("expected UnknownSheet, got {:?}", other),
        Ok(_) => panic!("expected UnknownSheet"),
    }
}

#[test]
fn test_corrupt_container() {
    let mut bytes = Fixture::standard().build();
    bytes.truncate(bytes.len() / 2);
    let err = XlsxWorkbook::open(bytes).unwrap_err();
    assert!(matches!(err, XlsxError::CorruptContainer(_)));
    assert!(err.is_structural());
}

#[test]
fn test_malformed_sheet_fails_on_first_access() {
    let input = Fixture::standard()
        .with("xl/worksheets/sheet2.xml", "<worksheet><sheetData><row></sheetData></worksheet>")
        .build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();

    assert!(workbook.sheet("Sales").is_ok());
    let err = workbook.sheet("Notes").unwrap_err();
    assert!(matches!(err, XlsxError::MalformedPart { ref part, .. } if part == "xl/worksheets/sheet2.xml"));
}

#[test]
fn test_duplicate_cells_fail_fast() {
    let input = with_notes(r#"<row r="1"><c r="A1"><v>1</v></c><c r="A1"><v>2</v></c></row>"#);
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    match workbook.sheet("Notes") {
        Err(XlsxError::DuplicateCell { address, .. }) => assert_eq!(address, "A1"),
        Err(other) => panic!("expected DuplicateCell, got {:?}", other),
        Ok(_) => panic!("expected DuplicateCell"),
    }
}

#[test]
fn test_shared_string_out_of_range() {
    let input = with_notes(r#"<row r="1"><c r="A1" t="s"><v>99</v></c></row>"#);
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    let sheet = workbook.sheet("Notes").unwrap();
    assert!(matches!(
        sheet.cell("A", 1),
        Err(XlsxError::SharedStringRange { index: 99, len: 3 })
    ));
}

#[test]
fn test_missing_worksheet_member() {
    let input = Fixture::standard().without("xl/worksheets/sheet2.xml").build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    assert!(matches!(
        workbook.sheet("Notes"),
        Err(XlsxError::MissingPart(path)) if path == "xl/worksheets/sheet2.xml"
    ));
}
