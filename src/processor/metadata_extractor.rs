use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::models::{AsOfPeriod, PeriodGranularity, RawSheet};

/// Marker for the as-of date cell ("日期：2025年3月31日").
pub const DATE_MARKER: &str = "日期";

static PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})\s*年\s*(\d{1,2})\s*月(?:\s*(\d{1,2})\s*日)?$").expect("valid period regex")
});

static SENTINEL_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^unnamed").expect("valid sentinel label regex"));

/// Title and as-of period read from the reserved rows above the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportMetadata {
    pub report_name: Option<String>,
    /// Period text after the colon, as written.
    pub as_of_raw: Option<String>,
    /// `None` when `as_of_raw` is missing or could not be parsed.
    pub as_of: Option<AsOfPeriod>,
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Parses `YYYY年M月D日` as a day period and `YYYY年M月` as a month period
/// dated on the month's last day.
pub fn parse_period(raw: &str) -> Option<AsOfPeriod> {
    let trimmed = raw.trim();
    let caps = PERIOD_RE.captures(trimmed)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;

    let (granularity, date) = if trimmed.contains('日') {
        let day: u32 = caps.get(3)?.as_str().parse().ok()?;
        (PeriodGranularity::Day, NaiveDate::from_ymd_opt(year, month, day)?)
    } else {
        (PeriodGranularity::Month, last_day_of_month(year, month)?)
    };

    Some(AsOfPeriod {
        raw: raw.to_string(),
        granularity,
        date,
    })
}

/// Reads report title and as-of date from the first `reserved_rows` rows.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    reserved_rows: usize,
}

impl MetadataExtractor {
    pub fn new(reserved_rows: usize) -> Self {
        Self { reserved_rows }
    }

    pub fn extract(&self, sheet: &RawSheet) -> ReportMetadata {
        let reserved = sheet.row_window(0, self.reserved_rows);

        let report_name = reserved.first().and_then(|title_row| {
            title_row
                .iter()
                .filter(|c| !c.is_blank())
                .map(|c| c.to_string().trim().to_string())
                .find(|label| !SENTINEL_LABEL.is_match(label))
        });

        let as_of_raw = reserved
            .iter()
            .flat_map(|row| row.iter())
            .filter(|c| !c.is_null())
            .map(|c| c.to_string())
            .find(|text| text.contains(DATE_MARKER))
            .and_then(|text| text.rsplit(|c: char| c == '：' || c == ':').next().map(|s| s.trim().to_string()));

        let as_of = match as_of_raw.as_deref() {
            Some(raw) => {
                let parsed = parse_period(raw);
                if parsed.is_none() {
                    warn!("Sheet '{}': cannot parse as-of period '{}'", sheet.name(), raw);
                }
                parsed
            }
            None => {
                warn!("Sheet '{}': no '{}' cell in the reserved rows", sheet.name(), DATE_MARKER);
                None
            }
        };

        ReportMetadata {
            report_name,
            as_of_raw,
            as_of,
        }
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    #[test]
    fn test_parse_month_period() {
        let period = parse_period("2025年3月").unwrap();
        assert_eq!(period.granularity, PeriodGranularity::Month);
        assert_eq!(period.date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert_eq!(period.raw, "2025年3月");

        let feb = parse_period("2024年2月").unwrap();
        assert_eq!(feb.date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let dec = parse_period("2025年12月").unwrap();
        assert_eq!(dec.date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_parse_day_period() {
        let period = parse_period("2025年3月31日").unwrap();
        assert_eq!(period.granularity, PeriodGranularity::Day);
        assert_eq!(period.date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }

    #[test]
    fn test_unparseable_periods() {
        assert!(parse_period("2025年13月").is_none());
        assert!(parse_period("2025年2月30日").is_none());
        assert!(parse_period("本月").is_none());
        assert!(parse_period("").is_none());
    }

    #[test]
    fn test_extract_title_and_date() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![CellValue::Empty, CellValue::text("银行卡业务月度运营报表")],
                vec![CellValue::text("单位：元"), CellValue::text("日期：2025年3月")],
                vec![CellValue::text("机构")],
            ],
        );

        let metadata = MetadataExtractor::default().extract(&sheet);
        assert_eq!(metadata.report_name.as_deref(), Some("银行卡业务月度运营报表"));
        assert_eq!(metadata.as_of_raw.as_deref(), Some("2025年3月"));
        assert_eq!(
            metadata.as_of.map(|p| p.date),
            NaiveDate::from_ymd_opt(2025, 3, 31)
        );
    }

    #[test]
    fn test_missing_or_bad_date_degrades() {
        let no_date = RawSheet::new("Sheet1", vec![vec![CellValue::text("报表")]]);
        let metadata = MetadataExtractor::default().extract(&no_date);
        assert_eq!(metadata.report_name.as_deref(), Some("报表"));
        assert!(metadata.as_of_raw.is_none());
        assert!(metadata.as_of.is_none());

        let bad_date = RawSheet::new(
            "Sheet1",
            vec![vec![CellValue::text("报表")], vec![CellValue::text("日期：三月")]],
        );
        let metadata = MetadataExtractor::default().extract(&bad_date);
        assert_eq!(metadata.as_of_raw.as_deref(), Some("三月"));
        assert!(metadata.as_of.is_none());
    }

    #[test]
    fn test_date_row_beyond_reserved_rows_is_ignored() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec![CellValue::text("报表")],
                vec![CellValue::Empty],
                vec![CellValue::text("日期：2025年3月")],
            ],
        );
        assert!(MetadataExtractor::default().extract(&sheet).as_of_raw.is_none());
    }
}
