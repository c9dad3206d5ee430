//! Saving without edits, and saving twice.

use crate::{member_text, Fixture};
use pretty_assertions::assert_eq;
use splice_sheets_core::CellValue;
use splice_sheets_xlsx::XlsxWorkbook;

#[test]
fn test_noop_save_is_byte_identical() {
    let input = Fixture::standard().build();
    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    assert_eq!(workbook.save().unwrap(), input);
}

#[test]
fn test_reading_does_not_dirty() {
    let input = Fixture::standard().build();
    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    {
        let sheet = workbook.sheet("Sales").unwrap();
        assert_eq!(sheet.cell("A", 2).unwrap(), CellValue::Number(10.0));
        assert_eq!(sheet.column("B").unwrap().values().unwrap().len(), 3);
    }
    workbook.sheet("Notes").unwrap();

    assert!(workbook.dirty_parts().is_empty());
    assert_eq!(workbook.save().unwrap(), input);
}

#[test]
fn test_repeated_saves_are_identical() {
    let input = Fixture::standard().build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    workbook.sheet("Sales").unwrap().set("A3", 5).unwrap();

    let first = workbook.save().unwrap();
    let second = workbook.save().unwrap();
    assert_eq!(first, second);

    // the same edits on a fresh session give the same bytes too
    let mut again = XlsxWorkbook::open(Fixture::standard().build()).unwrap();
    again.sheet("Sales").unwrap().set("A3", 5).unwrap();
    assert_eq!(again.save().unwrap(), first);
}

#[test]
fn test_untouched_markup_survives_an_edit() {
    let input = Fixture::standard().build();
    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    workbook.sheet("Sales").unwrap().set("A2", 11).unwrap();
    let output = workbook.save().unwrap();

    let before = member_text(&input, "xl/worksheets/sheet1.xml");
    let after = member_text(&output, "xl/worksheets/sheet1.xml");
    assert_eq!(
        after,
        before.replace(r#"<c r="A2"><v>10</v></c>"#, r#"<c r="A2"><v>11</v></c>"#)
    );
}

#[test]
fn test_save_to_writer() {
    let input = Fixture::standard().build();
    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    let mut out = Vec::new();
    workbook.save_to(&mut out).unwrap();
    assert_eq!(out, input);
}

#[test]
fn test_save_to_file_and_reopen() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut workbook = XlsxWorkbook::open(Fixture::standard().build()).unwrap();
    workbook.sheet("Notes").unwrap().set("A1", "edited").unwrap();
    workbook.save_to(file.as_file_mut()).unwrap();

    let bytes = std::fs::read(file.path()).unwrap();
    let mut reopened = XlsxWorkbook::open(bytes).unwrap();
    assert_eq!(
        reopened.sheet("Notes").unwrap().cell("A", 1).unwrap(),
        CellValue::text("edited")
    );
}
