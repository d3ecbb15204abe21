mod common;

use common::{Cell, sales_workbook, workbook_bytes};
use excel_analytics::{ApiError, spreadsheet::parse_first_sheet};
use serde_json::json;

#[test]
fn test_first_sheet_rows_keyed_by_header() {
    let parsed = parse_first_sheet(&sales_workbook()).unwrap();

    assert_eq!(parsed.row_count(), 2);
    assert_eq!(parsed.rows[0]["Region"], json!("North"));
    assert_eq!(parsed.rows[0]["Total"].as_f64(), Some(120.0));
    assert_eq!(parsed.rows[1]["Region"], json!("South"));
    assert_eq!(parsed.rows[1]["Total"].as_f64(), Some(80.5));
}

#[test]
fn test_blank_header_cells_get_positional_names() {
    let bytes = workbook_bytes(&[
        vec![Cell::Text("Name"), Cell::Blank, Cell::Text("Active")],
        vec![Cell::Text("Ada"), Cell::Number(36.0), Cell::Bool(true)],
    ]);
    let parsed = parse_first_sheet(&bytes).unwrap();

    let row = &parsed.rows[0];
    assert_eq!(row["Name"], json!("Ada"));
    assert_eq!(row["column_2"].as_f64(), Some(36.0));
    assert_eq!(row["Active"], json!(true));
}

#[test]
fn test_short_rows_are_padded_and_empty_rows_skipped() {
    let bytes = workbook_bytes(&[
        vec![Cell::Text("A"), Cell::Text("B")],
        vec![Cell::Text("only-a")],
        vec![],
        vec![Cell::Text("x"), Cell::Text("y")],
    ]);
    let parsed = parse_first_sheet(&bytes).unwrap();

    assert_eq!(parsed.row_count(), 2);
    assert_eq!(parsed.rows[0]["A"], json!("only-a"));
    assert!(parsed.rows[0]["B"].is_null());
    assert_eq!(parsed.rows[1]["B"], json!("y"));
}

#[test]
fn test_header_only_sheet_has_no_rows() {
    let bytes = workbook_bytes(&[vec![Cell::Text("Region"), Cell::Text("Total")]]);
    let parsed = parse_first_sheet(&bytes).unwrap();
    assert_eq!(parsed.row_count(), 0);
    assert_eq!(parsed.into_json(), json!([]));
}

#[test]
fn test_corrupt_workbook_is_validation_error() {
    let mut bytes = sales_workbook();
    bytes.truncate(bytes.len() / 2);
    assert!(matches!(
        parse_first_sheet(&bytes),
        Err(ApiError::Validation(_))
    ));
}
