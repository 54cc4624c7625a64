use crate::error::RowDifference;
use crate::models::CellValue;

/// Every row where `current` disagrees with `reference`. Rows present on only
/// one side are reported with `None` on the other.
pub fn find_key_differences(reference: &[&CellValue], current: &[&CellValue]) -> Vec<RowDifference> {
    let len = reference.len().max(current.len());
    (0..len)
        .filter_map(|row| {
            let left = reference.get(row).copied();
            let right = current.get(row).copied();
            if left == right {
                return None;
            }
            Some(RowDifference {
                row,
                reference: left.cloned(),
                current: right.cloned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_columns_have_no_differences() {
        let a = [CellValue::text("西安"), CellValue::text("宝鸡")];
        let refs: Vec<&CellValue> = a.iter().collect();
        assert!(find_key_differences(&refs, &refs).is_empty());
    }

    #[test]
    fn test_reports_changed_and_missing_rows() {
        let reference = [CellValue::text("西安"), CellValue::text("宝鸡"), CellValue::text("咸阳")];
        let current = [CellValue::text("西安"), CellValue::text("汉中")];
        let reference: Vec<&CellValue> = reference.iter().collect();
        let current: Vec<&CellValue> = current.iter().collect();

        let diffs = find_key_differences(&reference, &current);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].row, 1);
        assert_eq!(diffs[0].reference, Some(CellValue::text("宝鸡")));
        assert_eq!(diffs[0].current, Some(CellValue::text("汉中")));
        assert_eq!(diffs[1].row, 2);
        assert_eq!(diffs[1].current, None);
    }

    #[test]
    fn test_nan_cells_compare_equal() {
        let a = [CellValue::Number(f64::NAN)];
        let b = [CellValue::Number(f64::NAN)];
        let a: Vec<&CellValue> = a.iter().collect();
        let b: Vec<&CellValue> = b.iter().collect();
        assert!(find_key_differences(&a, &b).is_empty());
    }
}
