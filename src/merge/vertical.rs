use std::collections::HashSet;
use tracing::{debug, info};

use super::dedup_rows;
use crate::error::{NormalizeError, Result, RowDifference};
use crate::models::{CellValue, NormalizedTable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerticalMergeOptions {
    /// When set, every table must carry the same set of values in this column
    /// as table 0. Off by default so partial-period batches still merge.
    pub primary_key_col: Option<usize>,
}

/// Stacks same-schema tables (typically one report across several periods).
///
/// Column names must match table 0 exactly and in order. Rows are kept in
/// input order with exact duplicates collapsed to their first occurrence.
pub fn merge_vertical(
    tables: &[NormalizedTable],
    options: &VerticalMergeOptions,
) -> Result<NormalizedTable> {
    let reference = tables.first().ok_or(NormalizeError::EmptyInput)?;

    for (table_index, table) in tables.iter().enumerate().skip(1) {
        if table.columns() != reference.columns() {
            return Err(NormalizeError::SchemaMismatch {
                table_index,
                reference: reference.columns().to_vec(),
                actual: table.columns().to_vec(),
            });
        }
    }

    if let Some(key_col) = options.primary_key_col {
        check_primary_keys(tables, key_col)?;
    }

    let total: usize = tables.iter().map(NormalizedTable::height).sum();
    let rows: Vec<Vec<CellValue>> = tables
        .iter()
        .flat_map(|t| t.rows().iter().cloned())
        .collect();
    let rows = dedup_rows(rows);

    info!(
        "🔗 Vertical merge of {} table(s): {} row(s) in, {} after dedup",
        tables.len(),
        total,
        rows.len()
    );

    let source_name = tables
        .iter()
        .map(NormalizedTable::source_name)
        .collect::<Vec<_>>()
        .join("+");

    Ok(NormalizedTable::new(
        source_name,
        reference.columns().to_vec(),
        rows,
        reference.as_of().cloned(),
    ))
}

fn check_primary_keys(tables: &[NormalizedTable], key_col: usize) -> Result<()> {
    let reference = &tables[0];
    if key_col >= reference.width() {
        return Err(NormalizeError::ColumnOutOfRange {
            index: key_col,
            width: reference.width(),
        });
    }

    let reference_keys: HashSet<&CellValue> = reference.column_values(key_col).into_iter().collect();
    let column = reference.columns()[key_col].clone();

    for (table_index, table) in tables.iter().enumerate().skip(1) {
        let keys: HashSet<&CellValue> = table.column_values(key_col).into_iter().collect();
        if keys == reference_keys {
            continue;
        }

        let mut differences: Vec<RowDifference> = reference
            .column_values(key_col)
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !keys.contains(v))
            .map(|(row, v)| RowDifference {
                row,
                reference: Some(v.clone()),
                current: None,
            })
            .collect();
        differences.extend(
            table
                .column_values(key_col)
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !reference_keys.contains(v))
                .map(|(row, v)| RowDifference {
                    row,
                    reference: None,
                    current: Some(v.clone()),
                }),
        );
        debug!("Primary key sets differ for table {}: {} value(s)", table_index, differences.len());

        return Err(NormalizeError::KeyMismatch {
            table_index,
            column,
            differences,
        });
    }

    Ok(())
}
