use crate::models::CellValue;
use std::fmt;
use thiserror::Error;

/// One row where two key columns disagree. `None` means the row is missing
/// on that side (the columns have different lengths).
#[derive(Debug, Clone, PartialEq)]
pub struct RowDifference {
    pub row: usize,
    pub reference: Option<CellValue>,
    pub current: Option<CellValue>,
}

impl fmt::Display for RowDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<CellValue>| match v {
            Some(cell) => format!("{:?}", cell.to_string()),
            None => "<missing>".to_string(),
        };
        write!(
            f,
            "row {}: reference={} current={}",
            self.row,
            show(&self.reference),
            show(&self.current)
        )
    }
}

fn summarize(differences: &[RowDifference]) -> String {
    const SHOWN: usize = 5;
    let mut parts: Vec<String> = differences.iter().take(SHOWN).map(|d| d.to_string()).collect();
    if differences.len() > SHOWN {
        parts.push(format!("... {} more", differences.len() - SHOWN));
    }
    parts.join("; ")
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Table {table_index} columns differ from table 0\n  reference: {reference:?}\n  actual:    {actual:?}")]
    SchemaMismatch {
        table_index: usize,
        reference: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Table {table_index} disagrees with table 0 on key column '{column}': {}", summarize(.differences))]
    KeyMismatch {
        table_index: usize,
        column: String,
        differences: Vec<RowDifference>,
    },

    #[error("Column index {index} is out of range for a table with {width} columns")]
    ColumnOutOfRange { index: usize, width: usize },

    #[error("No tables were provided")]
    EmptyInput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mismatch_message_lists_values() {
        let err = NormalizeError::KeyMismatch {
            table_index: 1,
            column: "机构".to_string(),
            differences: vec![RowDifference {
                row: 2,
                reference: Some(CellValue::Text("西安分行".to_string())),
                current: Some(CellValue::Text("宝鸡分行".to_string())),
            }],
        };

        let message = err.to_string();
        assert!(message.contains("机构"));
        assert!(message.contains("西安分行"));
        assert!(message.contains("宝鸡分行"));
        assert!(message.contains("row 2"));
    }

    #[test]
    fn test_missing_side_is_reported() {
        let diff = RowDifference {
            row: 4,
            reference: Some(CellValue::Number(1.0)),
            current: None,
        };
        assert_eq!(diff.to_string(), "row 4: reference=\"1\" current=<missing>");
    }
}
