use tracing::debug;

use crate::config::HeaderConfig;
use crate::models::{CellValue, RawSheet};
use crate::processor::row_classifier::is_numeric_like;

/// Outcome of header detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDetection {
    /// Number of header rows, always at least 1.
    pub rows: usize,
    /// True when no data row was found in the preview and the cap was applied.
    pub capped: bool,
}

/// Estimates how many rows below the reserved title/date rows form the header.
#[derive(Debug, Clone)]
pub struct HeaderRowDetector {
    reserved_rows: usize,
    preview_rows: usize,
    max_header_rows: usize,
}

impl HeaderRowDetector {
    pub fn new(reserved_rows: usize, preview_rows: usize, max_header_rows: usize) -> Self {
        Self {
            reserved_rows,
            preview_rows,
            max_header_rows,
        }
    }

    pub fn from_config(config: &HeaderConfig) -> Self {
        Self::new(
            config.reserved_rows,
            config.preview_rows,
            config.max_header_rows,
        )
    }

    pub fn detect(&self, sheet: &RawSheet) -> HeaderDetection {
        let window = sheet.row_window(self.reserved_rows, self.preview_rows);
        let detection = self.detect_in_window(window);
        debug!(
            "Sheet '{}': {} header row(s) detected{}",
            sheet.name(),
            detection.rows,
            if detection.capped { " (capped)" } else { "" }
        );
        detection
    }

    /// Window row 0 is always header. Data starts at the first later row with a
    /// non-null first column. Keyed rows without numbers count as sub-header
    /// levels only when the first numeric keyed row still fits within
    /// `max_header_rows`; text-only data rows further down stay data.
    pub fn detect_in_window(&self, window: &[Vec<CellValue>]) -> HeaderDetection {
        let keyed: Vec<usize> = (1..window.len())
            .filter(|&i| window[i].first().is_some_and(|c| !c.is_null()))
            .collect();

        let numeric_start = keyed
            .iter()
            .copied()
            .find(|&i| window[i].iter().any(is_numeric_like))
            .filter(|&i| i <= self.max_header_rows);

        let found = numeric_start.or_else(|| keyed.first().copied());

        let (rows, capped) = match found {
            Some(index) => (index, false),
            None => (self.max_header_rows.min(window.len()), true),
        };

        HeaderDetection {
            rows: rows.max(1),
            capped,
        }
    }
}

impl Default for HeaderRowDetector {
    fn default() -> Self {
        Self::from_config(&HeaderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<CellValue>> {
        data.iter()
            .map(|r| {
                r.iter()
                    .map(|c| if c.is_empty() { CellValue::Empty } else { CellValue::text(*c) })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_merged_first_column_header() {
        let detector = HeaderRowDetector::default();
        let window = rows(&[
            &["机构", "存款", ""],
            &["", "余额", "净增"],
            &["西安分行", "100", "5"],
        ]);
        assert_eq!(
            detector.detect_in_window(&window),
            HeaderDetection { rows: 2, capped: false }
        );
    }

    #[test]
    fn test_text_sub_header_before_numeric_rows() {
        let detector = HeaderRowDetector::default();
        let window = rows(&[
            &["机构", "机构"],
            &["名称", "编码"],
            &["西安分行", "1001"],
            &["宝鸡分行", "1002"],
        ]);
        assert_eq!(detector.detect_in_window(&window).rows, 2);
    }

    #[test]
    fn test_text_only_table_uses_first_keyed_row() {
        let detector = HeaderRowDetector::default();
        let window = rows(&[&["机构", "负责人"], &["西安分行", "张三"], &["宝鸡分行", "李四"]]);
        assert_eq!(detector.detect_in_window(&window).rows, 1);
    }

    #[test]
    fn test_no_data_row_caps_header() {
        let detector = HeaderRowDetector::default();
        let window = rows(&[&["机构", "存款"], &["", "余额"], &["", "x"], &["", "y"], &["", "z"]]);
        assert_eq!(
            detector.detect_in_window(&window),
            HeaderDetection { rows: 3, capped: true }
        );

        let short = rows(&[&["机构", "存款"], &["", "余额"]]);
        assert_eq!(detector.detect_in_window(&short).rows, 2);
    }

    #[test]
    fn test_text_only_data_rows_stay_data() {
        let detector = HeaderRowDetector::default();
        let window = rows(&[
            &["机构", "存款", "贷款"],
            &["西安分行", "-", "-"],
            &["宝鸡分行", "-", "-"],
            &["咸阳分行", "-", "-"],
            &["汉中分行", "-", "-"],
            &["渭南分行", "100", "5"],
        ]);
        assert_eq!(
            detector.detect_in_window(&window),
            HeaderDetection { rows: 1, capped: false }
        );
    }

    #[test]
    fn test_sub_header_limited_by_max_header_rows() {
        let window = rows(&[
            &["机构", "存款"],
            &["名称", "余额"],
            &["分类", "时点"],
            &["西安分行", "100"],
        ]);
        assert_eq!(HeaderRowDetector::new(2, 10, 3).detect_in_window(&window).rows, 3);
        assert_eq!(HeaderRowDetector::new(2, 10, 2).detect_in_window(&window).rows, 1);
    }

    #[test]
    fn test_header_count_is_at_least_one() {
        let detector = HeaderRowDetector::default();
        assert_eq!(detector.detect_in_window(&[]).rows, 1);
        assert_eq!(detector.detect_in_window(&rows(&[&["机构"]])).rows, 1);
    }

    #[test]
    fn test_detect_skips_reserved_rows() {
        let sheet = RawSheet::new(
            "Sheet1",
            rows(&[
                &["月度运营报表"],
                &["日期：2025年3月"],
                &["机构", "存款"],
                &["西安分行", "100"],
            ]),
        );
        assert_eq!(HeaderRowDetector::default().detect(&sheet).rows, 1);
    }
}
