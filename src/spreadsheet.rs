use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde_json::{Map, Number, Value};

use crate::error::ApiError;

pub const XLSX_MIMETYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MIMETYPE: &str = "application/vnd.ms-excel";

/// Upload mimetypes accepted by `POST /files/upload`.
pub const ACCEPTED_MIMETYPES: &[&str] = &[XLSX_MIMETYPE, XLS_MIMETYPE];

pub fn is_accepted_mimetype(mimetype: &str) -> bool {
    ACCEPTED_MIMETYPES.contains(&mimetype)
}

/// ParsedSheet
///
/// The first worksheet of a workbook as JSON objects keyed by the header row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub rows: Vec<Value>,
}

impl ParsedSheet {
    pub fn row_count(&self) -> i64 {
        self.rows.len() as i64
    }

    pub fn into_json(self) -> Value {
        Value::Array(self.rows)
    }
}

/// parse_first_sheet
///
/// Reads an xlsx/xls workbook from memory. The first row supplies the keys;
/// blank header cells become `column_<n>` (1-based) and fully empty data rows
/// are skipped. A workbook without sheets, or one calamine cannot open, is a
/// validation error.
pub fn parse_first_sheet(bytes: &[u8]) -> Result<ParsedSheet, ApiError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ApiError::validation(format!("Unreadable spreadsheet: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ApiError::validation("Spreadsheet has no worksheets"))?
        .map_err(|e| ApiError::validation(format!("Unreadable worksheet: {e}")))?;

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(ParsedSheet { rows: Vec::new() });
    };

    let keys: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell_to_json(cell) {
            Value::Null => format!("column_{}", i + 1),
            Value::String(s) if s.trim().is_empty() => format!("column_{}", i + 1),
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    let rows = lines
        .filter(|line| line.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|line| {
            let object: Map<String, Value> = keys
                .iter()
                .zip(line.iter().map(cell_to_json).chain(std::iter::repeat(Value::Null)))
                .map(|(key, value)| (key.clone(), value))
                .collect();
            Value::Object(object)
        })
        .collect();

    Ok(ParsedSheet { rows })
}

/// Maps one calamine cell onto JSON. Dates and error cells keep their display
/// text.
fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}
