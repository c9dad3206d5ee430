//! Formula writes and cached values.

use crate::{assert_untouched_except, member_text, Fixture};
use pretty_assertions::assert_eq;
use splice_sheets_core::{formula, CellValue};
use splice_sheets_xlsx::{EditOptions, FormulaCachePolicy, XlsxWorkbook};

#[test]
fn test_formula_reads_back_with_stale_cache() {
    let input = Fixture::standard().build();
    let mut workbook = XlsxWorkbook::open(input.clone()).unwrap();
    {
        let mut sheet = workbook.sheet("Sales").unwrap();
        let before = sheet.cell("C", 2).unwrap();
        assert!(before.as_formula().unwrap().is_cache_valid());

        sheet.set("A1", 123.45).unwrap();
        sheet.set("B1", formula("=A1*2")).unwrap();

        assert_eq!(sheet.cell("A", 1).unwrap(), CellValue::Number(123.45));
        let b1 = sheet.cell("B", 1).unwrap();
        let f = b1.as_formula().unwrap();
        assert_eq!(f.text(), "=A1*2");
        assert!(!f.is_cache_valid());

        // every other cached result is stale once a recalculation is requested
        let c2 = sheet.cell("C", 2).unwrap();
        assert_eq!(
            c2.as_formula().unwrap().cached_value(),
            Some(&CellValue::Number(25.0))
        );
        assert!(!c2.as_formula().unwrap().is_cache_valid());
    }

    assert_eq!(
        workbook.dirty_parts(),
        vec!["xl/workbook.xml", "xl/worksheets/sheet1.xml"]
    );
    let output = workbook.save().unwrap();
    assert_untouched_except(
        &input,
        &output,
        &["xl/workbook.xml", "xl/worksheets/sheet1.xml"],
    );

    let workbook_xml = member_text(&output, "xl/workbook.xml");
    assert!(workbook_xml.contains(r#"<calcPr calcId="191029" fullCalcOnLoad="1"/>"#));
    let sheet_xml = member_text(&output, "xl/worksheets/sheet1.xml");
    assert!(sheet_xml.contains(r#"<c r="B1"><f>A1*2</f></c>"#));
}

#[test]
fn test_formula_text_versus_literal_text() {
    let mut workbook = XlsxWorkbook::open(Fixture::standard().build()).unwrap();
    {
        let mut sheet = workbook.sheet("Sales").unwrap();
        sheet.set("D1", "=A1*2").unwrap();
        assert_eq!(sheet.cell("D", 1).unwrap(), CellValue::text("=A1*2"));
    }
    assert!(!workbook.full_calc_on_load());
    assert!(!workbook.dirty_parts().contains(&"xl/workbook.xml"));
}

#[test]
fn test_recalculation_flag_is_written_once() {
    let mut workbook = XlsxWorkbook::open(Fixture::standard().build()).unwrap();
    {
        let mut sheet = workbook.sheet("Sales").unwrap();
        sheet.set("D2", formula("A2+1")).unwrap();
        sheet.set("D3", formula("A3+1")).unwrap();
    }
    let output = workbook.save().unwrap();
    let xml = member_text(&output, "xl/workbook.xml");
    assert_eq!(xml.matches("fullCalcOnLoad").count(), 1);

    // already set: further formula writes leave the workbook part alone
    let mut reopened = XlsxWorkbook::open(output).unwrap();
    assert!(reopened.full_calc_on_load());
    reopened.sheet("Sales").unwrap().set("D4", formula("A4+1")).unwrap();
    assert_eq!(reopened.dirty_parts(), vec!["xl/worksheets/sheet1.xml"]);
}

#[test]
fn test_calc_pr_is_created_in_schema_position() {
    let workbook_xml = crate::WORKBOOK.replace(
        r#"<calcPr calcId="191029"/>"#,
        r#"<definedNames><definedName name="Rate">Sales!$B$2</definedName></definedNames><extLst/>"#,
    );
    let input = Fixture::standard().with("xl/workbook.xml", &workbook_xml).build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    workbook.sheet("Sales").unwrap().set("D2", formula("Rate*2")).unwrap();
    let output = workbook.save().unwrap();

    let xml = member_text(&output, "xl/workbook.xml");
    assert!(xml.contains(r#"</definedNames><calcPr fullCalcOnLoad="1"/><extLst/></workbook>"#));
}

#[test]
fn test_cache_policies_without_recalculation_flag() {
    let options = EditOptions::default().with_force_full_calc_on_load(false);
    let mut workbook = XlsxWorkbook::open_with_options(Fixture::standard().build(), options).unwrap();
    workbook.sheet("Sales").unwrap().set("C2", formula("A2+B2")).unwrap();
    assert_eq!(workbook.dirty_parts(), vec!["xl/worksheets/sheet1.xml"]);
    let output = workbook.save().unwrap();
    assert!(member_text(&output, "xl/worksheets/sheet1.xml")
        .contains(r#"<c r="C2"><f>A2+B2</f></c>"#));

    let options = EditOptions::default()
        .with_force_full_calc_on_load(false)
        .with_formula_cache(FormulaCachePolicy::Zero);
    let mut workbook = XlsxWorkbook::open_with_options(Fixture::standard().build(), options).unwrap();
    workbook.sheet("Sales").unwrap().set("C2", formula("A2+B2")).unwrap();
    let output = workbook.save().unwrap();
    assert!(member_text(&output, "xl/worksheets/sheet1.xml")
        .contains(r#"<c r="C2"><f>A2+B2</f><v>0</v></c>"#));
}

#[test]
fn test_zero_placeholder_stays_stale_after_save() {
    let options = EditOptions::default()
        .with_force_full_calc_on_load(false)
        .with_formula_cache(FormulaCachePolicy::Zero);
    let mut workbook = XlsxWorkbook::open_with_options(Fixture::standard().build(), options).unwrap();
    workbook.sheet("Sales").unwrap().set("C2", formula("A2+B2")).unwrap();

    let before = workbook.sheet("Sales").unwrap().cell("C", 2).unwrap();
    assert_eq!(before.as_formula().unwrap().cached_value(), Some(&CellValue::Number(0.0)));
    assert!(!before.as_formula().unwrap().is_cache_valid());

    workbook.save().unwrap();
    assert!(!workbook.full_calc_on_load());
    let sheet = workbook.sheet("Sales").unwrap();
    let after = sheet.cell("C", 2).unwrap();
    assert_eq!(after.as_formula().unwrap().cached_value(), Some(&CellValue::Number(0.0)));
    assert!(!after.as_formula().unwrap().is_cache_valid());
    assert_eq!(sheet.cell("A", 2).unwrap(), CellValue::Number(10.0));
}

#[test]
fn test_formula_with_string_cache() {
    let input = Fixture::standard()
        .with(
            "xl/worksheets/sheet2.xml",
            &crate::sheet_xml(
                r#"<row r="1"><c r="A1" t="str"><f>"a"&amp;"b"</f><v>ab</v></c><c r="B1" t="e"><f>1/0</f><v>#DIV/0!</v></c><c r="C1" t="b"><f>TRUE()</f><v>1</v></c></row>"#,
            ),
        )
        .build();
    let mut workbook = XlsxWorkbook::open(input).unwrap();
    let sheet = workbook.sheet("Notes").unwrap();

    let a1 = sheet.cell("A", 1).unwrap();
    assert_eq!(a1.as_formula().unwrap().text(), "=\"a\"&\"b\"");
    assert_eq!(
        a1.as_formula().unwrap().cached_value(),
        Some(&CellValue::text("ab"))
    );
    let b1 = sheet.cell("B", 1).unwrap();
    assert_eq!(
        b1.as_formula().unwrap().cached_value(),
        Some(&CellValue::Error(splice_sheets_core::CellError::Div0))
    );
    let c1 = sheet.cell("C", 1).unwrap();
    assert_eq!(
        c1.as_formula().unwrap().cached_value(),
        Some(&CellValue::Boolean(true))
    );
}
