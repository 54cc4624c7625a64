pub mod horizontal;
pub mod key_diff;
pub mod vertical;

pub use horizontal::merge_horizontal;
pub use key_diff::find_key_differences;
pub use vertical::{VerticalMergeOptions, merge_vertical};

use crate::models::CellValue;
use std::collections::HashSet;

/// Drops exact duplicate rows, keeping the first occurrence of each.
pub(crate) fn dedup_rows(rows: Vec<Vec<CellValue>>) -> Vec<Vec<CellValue>> {
    let mut seen: HashSet<Vec<CellValue>> = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let rows = vec![
            vec![CellValue::text("b"), CellValue::Number(2.0)],
            vec![CellValue::text("a"), CellValue::Number(1.0)],
            vec![CellValue::text("b"), CellValue::Number(2.0)],
            vec![CellValue::text("a"), CellValue::Number(-0.0)],
        ];
        let deduped = dedup_rows(rows);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0][0], CellValue::text("b"));
        assert_eq!(deduped[1][0], CellValue::text("a"));
        assert_eq!(deduped[2][1], CellValue::Number(0.0));
    }
}
