use std::collections::HashSet;
use tracing::info;

use super::dedup_rows;
use super::key_diff::find_key_differences;
use crate::error::{NormalizeError, Result, RowDifference};
use crate::models::{AS_OF_MARKER, CellValue, NormalizedTable};

/// Entity column shared by every table in a horizontal merge.
const ENTITY_COL: usize = 0;

/// Joins tables that describe the same entities and period with different
/// metrics into one wide table.
///
/// Every table must agree with table 0 on the entity column, the time column
/// and every as-of column, both names and row-for-row values. The result
/// starts with table 0's time column followed by every other column of every
/// table in order; repeated names get `_1`, `_2`, ... suffixes.
pub fn merge_horizontal(tables: &[NormalizedTable], time_col_index: usize) -> Result<NormalizedTable> {
    let reference = tables.first().ok_or(NormalizeError::EmptyInput)?;
    if time_col_index >= reference.width() {
        return Err(NormalizeError::ColumnOutOfRange {
            index: time_col_index,
            width: reference.width(),
        });
    }

    for (table_index, table) in tables.iter().enumerate().skip(1) {
        if time_col_index >= table.width() {
            return Err(NormalizeError::ColumnOutOfRange {
                index: time_col_index,
                width: table.width(),
            });
        }
        check_key_column(reference, table, table_index, ENTITY_COL)?;
        check_key_column(reference, table, table_index, time_col_index)?;
        check_as_of_columns(reference, table, table_index)?;
    }

    let mut columns = vec![reference.columns()[time_col_index].clone()];
    let mut taken: HashSet<String> = columns.iter().cloned().collect();
    let mut sources: Vec<(usize, usize)> = Vec::new();

    for (table_index, table) in tables.iter().enumerate() {
        for (col_index, name) in table.columns().iter().enumerate() {
            if col_index == time_col_index {
                continue;
            }
            let unique = unique_name(name, &taken);
            taken.insert(unique.clone());
            columns.push(unique);
            sources.push((table_index, col_index));
        }
    }

    let rows: Vec<Vec<CellValue>> = reference
        .rows()
        .iter()
        .enumerate()
        .map(|(row_index, ref_row)| {
            let mut row = Vec::with_capacity(columns.len());
            row.push(ref_row[time_col_index].clone());
            for &(table_index, col_index) in &sources {
                let cell = tables[table_index]
                    .rows()
                    .get(row_index)
                    .and_then(|r| r.get(col_index))
                    .cloned()
                    .unwrap_or_default();
                row.push(cell);
            }
            row
        })
        .collect();
    let rows = dedup_rows(rows);

    info!(
        "🧩 Horizontal merge of {} table(s): {} column(s), {} row(s)",
        tables.len(),
        columns.len(),
        rows.len()
    );

    Ok(NormalizedTable::new(
        reference.source_name(),
        columns,
        rows,
        reference.as_of().cloned(),
    ))
}

fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{}_{}", name, suffix);
        if !taken.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// A column that must match table 0 in name and in every value.
fn check_key_column(
    reference: &NormalizedTable,
    table: &NormalizedTable,
    table_index: usize,
    col_index: usize,
) -> Result<()> {
    let reference_name = &reference.columns()[col_index];
    let name = &table.columns()[col_index];
    if name != reference_name {
        return Err(NormalizeError::KeyMismatch {
            table_index,
            column: reference_name.clone(),
            differences: vec![RowDifference {
                row: 0,
                reference: Some(CellValue::text(reference_name.as_str())),
                current: Some(CellValue::text(name.as_str())),
            }],
        });
    }

    let differences = find_key_differences(
        &reference.column_values(col_index),
        &table.column_values(col_index),
    );
    if !differences.is_empty() {
        return Err(NormalizeError::KeyMismatch {
            table_index,
            column: reference_name.clone(),
            differences,
        });
    }
    Ok(())
}

fn check_as_of_columns(reference: &NormalizedTable, table: &NormalizedTable, table_index: usize) -> Result<()> {
    let as_of_columns = |t: &NormalizedTable| -> Vec<usize> {
        t.columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| name.contains(AS_OF_MARKER))
            .map(|(i, _)| i)
            .collect()
    };
    let reference_cols = as_of_columns(reference);
    let table_cols = as_of_columns(table);

    if reference_cols.len() != table_cols.len() {
        return Err(NormalizeError::KeyMismatch {
            table_index,
            column: AS_OF_MARKER.to_string(),
            differences: vec![RowDifference {
                row: 0,
                reference: Some(CellValue::Number(reference_cols.len() as f64)),
                current: Some(CellValue::Number(table_cols.len() as f64)),
            }],
        });
    }

    for &ref_index in &reference_cols {
        let name = &reference.columns()[ref_index];
        let Some(index) = table.column_index(name) else {
            return Err(NormalizeError::KeyMismatch {
                table_index,
                column: name.clone(),
                differences: vec![RowDifference {
                    row: 0,
                    reference: Some(CellValue::text(name.as_str())),
                    current: None,
                }],
            });
        };

        let differences = find_key_differences(&reference.column_values(ref_index), &table.column_values(index));
        if !differences.is_empty() {
            return Err(NormalizeError::KeyMismatch {
                table_index,
                column: name.clone(),
                differences,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SOURCE_AS_OF_DATE, SOURCE_AS_OF_RAW};

    fn table(name: &str, columns: &[&str], rows: Vec<Vec<CellValue>>) -> NormalizedTable {
        NormalizedTable::new(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
            None,
        )
    }

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    #[test]
    fn test_entity_mismatch_names_values() {
        let a = table("a", &["机构", "存款"], vec![vec![t("西安"), n(1.0)], vec![t("宝鸡"), n(2.0)]]);
        let b = table("b", &["机构", "贷款"], vec![vec![t("西安"), n(3.0)], vec![t("汉中"), n(4.0)]]);

        match merge_horizontal(&[a, b], 0).unwrap_err() {
            NormalizeError::KeyMismatch {
                table_index,
                column,
                differences,
            } => {
                assert_eq!(table_index, 1);
                assert_eq!(column, "机构");
                assert_eq!(differences.len(), 1);
                assert_eq!(differences[0].row, 1);
                assert_eq!(differences[0].reference, Some(t("宝鸡")));
                assert_eq!(differences[0].current, Some(t("汉中")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_disjoint_columns_are_joined() {
        let a = table("a", &["机构", "月份", "存款"], vec![
            vec![t("西安"), t("2025-03"), n(1.0)],
            vec![t("宝鸡"), t("2025-03"), n(2.0)],
        ]);
        let b = table("b", &["机构", "月份", "贷款"], vec![
            vec![t("西安"), t("2025-03"), n(3.0)],
            vec![t("宝鸡"), t("2025-03"), n(4.0)],
        ]);

        let merged = merge_horizontal(&[a, b], 1).unwrap();
        assert_eq!(merged.columns(), &["月份", "机构", "存款", "机构_1", "贷款"]);
        assert_eq!(merged.height(), 2);
        assert_eq!(merged.rows()[1], vec![t("2025-03"), t("宝鸡"), n(2.0), t("宝鸡"), n(4.0)]);
    }

    #[test]
    fn test_colliding_metric_names_are_suffixed() {
        let a = table("a", &["机构", "余额"], vec![vec![t("西安"), n(1.0)]]);
        let b = table("b", &["机构", "余额"], vec![vec![t("西安"), n(2.0)]]);
        let c = table("c", &["机构", "余额"], vec![vec![t("西安"), n(3.0)]]);

        let merged = merge_horizontal(&[a, b, c], 0).unwrap();
        assert_eq!(merged.columns(), &["机构", "余额", "余额_1", "余额_2"]);
        assert_eq!(merged.rows()[0], vec![t("西安"), n(1.0), n(2.0), n(3.0)]);
    }

    #[test]
    fn test_duplicate_assembled_rows_are_dropped() {
        let a = table("a", &["机构", "月份", "存款"], vec![
            vec![t("西安"), t("2025-03"), n(1.0)],
            vec![t("西安"), t("2025-03"), n(1.0)],
            vec![t("宝鸡"), t("2025-03"), n(2.0)],
        ]);
        let b = table("b", &["机构", "月份", "贷款"], vec![
            vec![t("西安"), t("2025-03"), n(7.0)],
            vec![t("西安"), t("2025-03"), n(7.0)],
            vec![t("宝鸡"), t("2025-03"), n(8.0)],
        ]);

        let merged = merge_horizontal(&[a, b], 1).unwrap();
        assert_eq!(merged.height(), 2);
        assert_eq!(merged.rows()[0], vec![t("2025-03"), t("西安"), n(1.0), t("西安"), n(7.0)]);
        assert_eq!(merged.rows()[1], vec![t("2025-03"), t("宝鸡"), n(2.0), t("宝鸡"), n(8.0)]);
    }

    #[test]
    fn test_time_column_out_of_range() {
        let a = table("a", &["机构"], vec![]);
        let err = merge_horizontal(&[a], 3).unwrap_err();
        assert!(matches!(err, NormalizeError::ColumnOutOfRange { index: 3, width: 1 }));
        assert!(matches!(merge_horizontal(&[], 0).unwrap_err(), NormalizeError::EmptyInput));
    }

    #[test]
    fn test_as_of_columns_must_agree() {
        let columns = ["机构", "存款", SOURCE_AS_OF_RAW, SOURCE_AS_OF_DATE];
        let a = table("a", &columns, vec![vec![t("西安"), n(1.0), t("2025年3月"), Default::default()]]);
        let b = table("b", &columns, vec![vec![t("西安"), n(2.0), t("2025年2月"), Default::default()]]);

        match merge_horizontal(&[a.clone(), b], 0).unwrap_err() {
            NormalizeError::KeyMismatch { column, .. } => assert_eq!(column, SOURCE_AS_OF_RAW),
            other => panic!("unexpected error: {other}"),
        }

        let missing = table("c", &["机构", "贷款"], vec![vec![t("西安"), n(2.0)]]);
        assert!(merge_horizontal(&[a, missing], 0).is_err());
    }

    #[test]
    fn test_time_column_name_mismatch() {
        let a = table("a", &["机构", "月份"], vec![vec![t("西安"), t("3")]]);
        let b = table("b", &["机构", "日期"], vec![vec![t("西安"), t("3")]]);
        match merge_horizontal(&[a, b], 1).unwrap_err() {
            NormalizeError::KeyMismatch { column, .. } => assert_eq!(column, "月份"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
