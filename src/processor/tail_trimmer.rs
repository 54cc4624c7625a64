use tracing::debug;

use crate::models::CellValue;
use crate::processor::row_classifier::RowClassifier;

/// Drops the trailing block of blank and footnote rows below the last data row.
///
/// Only a block that directly follows the last data row is removed. Anomalous
/// rows between data rows stay where they are, as does anything after the
/// last data row when the row right after it is neither blank nor explanatory.
#[derive(Debug, Clone, Default)]
pub struct TailTrimmer {
    classifier: RowClassifier,
}

impl TailTrimmer {
    pub fn new(classifier: RowClassifier) -> Self {
        Self { classifier }
    }

    /// Index of the last row classified as data, walking up past blank,
    /// explanatory and low-density rows.
    pub fn last_data_row(&self, rows: &[Vec<CellValue>]) -> Option<usize> {
        rows.iter().enumerate().rev().find_map(|(i, row)| {
            if self.classifier.is_noise_row(row) || !self.classifier.is_data_row(row) {
                None
            } else {
                Some(i)
            }
        })
    }

    /// Number of leading rows to keep.
    pub fn kept_len(&self, rows: &[Vec<CellValue>]) -> usize {
        if rows.len() <= 1 {
            return rows.len();
        }

        let last_valid = self.last_data_row(rows).unwrap_or(rows.len() - 1);

        let trailing_noise = rows[last_valid + 1..]
            .iter()
            .take_while(|row| self.classifier.is_noise_row(row))
            .count();

        if trailing_noise > 0 {
            last_valid + 1
        } else {
            rows.len()
        }
    }

    /// Returns the kept rows and how many were dropped.
    pub fn trim(&self, mut rows: Vec<Vec<CellValue>>) -> (Vec<Vec<CellValue>>, usize) {
        let keep = self.kept_len(&rows);
        let removed = rows.len() - keep;
        rows.truncate(keep);
        if removed > 0 {
            debug!("Trimmed {} trailing non-data row(s)", removed);
        }
        (rows, removed)
    }
}
