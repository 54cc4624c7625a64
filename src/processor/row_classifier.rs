use crate::config::ClassifierConfig;
use crate::models::CellValue;

/// Keywords that mark legend, formula and signature rows in the bank's report family.
pub const DEFAULT_EXPLANATORY_KEYWORDS: &[&str] = &[
    "计算公式", "参见", "指标", "说明", "备注", "注释", "公式", "方法", "日均增量", "净增", "占比",
    "合计", "统计", "时点", "余额", "行长", "主任",
];

pub const DEFAULT_MIN_NUMERIC_RATIO: f64 = 0.4;

/// True when the cell is a number, or text that parses as one once thousands
/// separators and percent signs are removed.
pub fn is_numeric_like(cell: &CellValue) -> bool {
    match cell {
        CellValue::Number(_) => true,
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return false;
            }
            let cleaned = trimmed.replace([',', '，', '%'], "");
            cleaned.trim().parse::<f64>().is_ok()
        }
        _ => false,
    }
}

/// True when every cell is null or whitespace.
pub fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}

/// `^\d+\.`: an enumerated footnote such as "1. 数据来源".
fn is_enumerated_footnote(text: &str) -> bool {
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && text[digits..].starts_with('.')
}

fn is_mixed_prose(text: &str) -> bool {
    let all_digits = !text.is_empty() && text.chars().all(|c| c.is_ascii_digit());
    !all_digits
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().any(char::is_alphabetic)
}

/// Classifies rows as data, blank or explanatory text.
///
/// Holds the keyword list and numeric-ratio threshold so each report family
/// can be tuned from configuration.
#[derive(Debug, Clone)]
pub struct RowClassifier {
    keywords: Vec<String>,
    min_numeric_ratio: f64,
}

impl RowClassifier {
    pub fn new(keywords: Vec<String>, min_numeric_ratio: f64) -> Self {
        Self {
            keywords,
            min_numeric_ratio,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.explanatory_keywords.clone(), config.min_numeric_ratio)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn min_numeric_ratio(&self) -> f64 {
        self.min_numeric_ratio
    }

    pub fn is_explanatory_row(&self, row: &[CellValue]) -> bool {
        let texts: Vec<String> = row
            .iter()
            .filter(|c| !c.is_null())
            .map(|c| c.to_string().trim().to_string())
            .collect();

        if texts
            .iter()
            .any(|t| self.keywords.iter().any(|k| t.contains(k.as_str())))
        {
            return true;
        }

        let non_empty: Vec<&String> = texts.iter().filter(|t| !t.is_empty()).collect();
        if let [only] = non_empty.as_slice() {
            if is_enumerated_footnote(only) || is_mixed_prose(only) {
                return true;
            }
        }

        false
    }

    pub fn is_data_row(&self, row: &[CellValue]) -> bool {
        is_data_row_with_ratio(row, self.min_numeric_ratio)
    }

    /// Blank or explanatory: the rows the tail-trimmer may drop.
    pub fn is_noise_row(&self, row: &[CellValue]) -> bool {
        is_blank_row(row) || self.is_explanatory_row(row)
    }
}

impl Default for RowClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

/// Data row: at least one numeric-like cell and a numeric share of at least
/// `min_numeric_ratio`. An empty row is never data.
pub fn is_data_row_with_ratio(row: &[CellValue], min_numeric_ratio: f64) -> bool {
    if row.is_empty() {
        return false;
    }
    let numeric = row.iter().filter(|c| is_numeric_like(c)).count();
    if numeric == 0 {
        return false;
    }
    (numeric as f64 / row.len() as f64) >= min_numeric_ratio
}
