use calamine::{Data, Reader, Sheets, open_workbook_auto, open_workbook_auto_from_rs};
use chrono::NaiveDate;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{NormalizeError, Result};
use crate::models::{CellValue, RawSheet};

/// Which worksheet of a workbook to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// Prefix that forces a by-name lookup, for sheets named like `2025`.
pub const SHEET_NAME_PREFIX: &str = "name:";

impl SheetSelector {
    /// `name:<sheet>` selects by name, numeric text by position, anything
    /// else by name.
    pub fn parse(s: &str) -> Self {
        if let Some(name) = s.strip_prefix(SHEET_NAME_PREFIX) {
            return SheetSelector::Name(name.to_string());
        }
        match s.trim().parse::<usize>() {
            Ok(index) => SheetSelector::Index(index),
            Err(_) => SheetSelector::Name(s.to_string()),
        }
    }
}

/// A missing or unreadable path surfaces as `Io` before calamine sees it.
fn ensure_workbook_file(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(NormalizeError::MalformedInput(format!(
            "{} is not a file",
            path.display()
        )));
    }
    Ok(())
}

fn malformed(context: &str, e: impl std::fmt::Display) -> NormalizeError {
    NormalizeError::MalformedInput(format!("{}: {}", context, e))
}

/// Decodes one worksheet from an in-memory xlsx/xls/xlsb/ods buffer.
pub fn read_sheet_from_bytes(bytes: &[u8], selector: &SheetSelector) -> Result<RawSheet> {
    if bytes.is_empty() {
        return Err(NormalizeError::MalformedInput("workbook buffer is empty".to_string()));
    }
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| malformed("cannot decode workbook", e))?;
    read_selected_sheet(&mut workbook, selector)
}

pub fn read_sheet_from_path(path: impl AsRef<Path>, selector: &SheetSelector) -> Result<RawSheet> {
    let path = path.as_ref();
    ensure_workbook_file(path)?;
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| malformed(&format!("cannot open workbook {}", path.display()), e))?;
    read_selected_sheet(&mut workbook, selector)
}

pub fn sheet_names_from_bytes(bytes: &[u8]) -> Result<Vec<String>> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| malformed("cannot decode workbook", e))?;
    Ok(workbook.sheet_names())
}

pub fn sheet_names_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    ensure_workbook_file(path)?;
    let workbook = open_workbook_auto(path)
        .map_err(|e| malformed(&format!("cannot open workbook {}", path.display()), e))?;
    Ok(workbook.sheet_names())
}

fn read_selected_sheet<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    selector: &SheetSelector,
) -> Result<RawSheet> {
    let names = workbook.sheet_names();
    let name = match selector {
        SheetSelector::Index(index) => names.get(*index).cloned().ok_or_else(|| {
            NormalizeError::MalformedInput(format!(
                "sheet index {} out of range, workbook has {} sheet(s)",
                index,
                names.len()
            ))
        })?,
        SheetSelector::Name(name) => {
            if !names.iter().any(|n| n == name) {
                return Err(NormalizeError::MalformedInput(format!(
                    "sheet '{}' not found, available: {:?}",
                    name, names
                )));
            }
            name.clone()
        }
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| malformed(&format!("cannot read sheet '{}'", name), e))?;

    // calamine ranges start at the first used cell; re-anchor at A1.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
    for source_row in range.rows() {
        let mut row = vec![CellValue::Empty; col_offset];
        row.extend(source_row.iter().map(convert_cell));
        rows.push(row);
    }

    debug!("Sheet '{}' anchored at row {}, column {}", name, row_offset, col_offset);
    info!("Decoded sheet '{}': {} row(s)", name, rows.len());

    Ok(RawSheet::new(name, rows))
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => CellValue::Date(datetime.date()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        // Formula errors (#N/A, #DIV/0!) read as missing values
        Data::Error(_) => CellValue::Empty,
    }
}
