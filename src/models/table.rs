use super::CellValue;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const SOURCE_AS_OF_RAW: &str = "source_as_of_raw";
pub const SOURCE_AS_OF_DATE: &str = "source_as_of_date";
/// Substring shared by every as-of metadata column.
pub const AS_OF_MARKER: &str = "source_as_of";

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Days from 0001-01-01 to 1970-01-01, polars' Date epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A decoded worksheet: ragged rows of cells, exactly as the decoder produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row in the sheet.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Widest row among rows `start..`.
    pub fn width_from(&self, start: usize) -> usize {
        self.rows.iter().skip(start).map(Vec::len).max().unwrap_or(0)
    }

    /// Cell lookup that treats anything outside the ragged grid as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Rows `start..start+count`, clipped to the sheet.
    pub fn row_window(&self, start: usize, count: usize) -> &[Vec<CellValue>] {
        let start = start.min(self.rows.len());
        let end = start.saturating_add(count).min(self.rows.len());
        &self.rows[start..end]
    }

    /// Rows `start..` padded or cut to exactly `width` cells each.
    pub fn rectangular_rows_from(&self, start: usize, width: usize) -> Vec<Vec<CellValue>> {
        self.rows
            .iter()
            .skip(start)
            .map(|row| {
                let mut out: Vec<CellValue> = row.iter().take(width).cloned().collect();
                out.resize(width, CellValue::Empty);
                out
            })
            .collect()
    }
}

/// Flattened column names plus the positions that fell back to `column_{i}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpec {
    names: Vec<String>,
    fallback_columns: Vec<usize>,
}

impl HeaderSpec {
    pub fn new(names: Vec<String>, fallback_columns: Vec<usize>) -> Self {
        Self {
            names,
            fallback_columns,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn fallback_columns(&self) -> &[usize] {
        &self.fallback_columns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGranularity {
    Day,
    Month,
}

/// The period a report's figures are valid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsOfPeriod {
    /// Period string exactly as it appeared in the report header.
    pub raw: String,
    pub granularity: PeriodGranularity,
    /// The literal day, or the last day of the month for month periods.
    pub date: NaiveDate,
}

/// A flat, uniquely named table ready for loading or merging.
///
/// The last two columns are always `source_as_of_raw` and `source_as_of_date`
/// for tables built by the normalizer. Merge results carry whatever columns
/// the merge produced.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    source_name: String,
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    as_of: Option<AsOfPeriod>,
}

impl NormalizedTable {
    /// Builds a table, padding or cutting every row to the column count.
    pub fn new(
        source_name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
        as_of: Option<AsOfPeriod>,
    ) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();

        Self {
            source_name: source_name.into(),
            columns,
            rows,
            as_of,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn as_of(&self) -> Option<&AsOfPeriod> {
        self.as_of.as_ref()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> Vec<&CellValue> {
        self.rows
            .iter()
            .map(|row| row.get(index).unwrap_or(&EMPTY_CELL))
            .collect()
    }

    /// Consumes the table, returning its rows.
    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }

    /// Converts to a polars `DataFrame`. Each column becomes Float64 when all
    /// non-null cells are numbers, Date when all are dates, String otherwise.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.width());

        for (index, name) in self.columns.iter().enumerate() {
            let values = self.column_values(index);
            let present: Vec<&&CellValue> = values.iter().filter(|v| !v.is_null()).collect();

            let series = if !present.is_empty()
                && present.iter().all(|v| matches!(v, CellValue::Number(_)))
            {
                let data: Vec<Option<f64>> = values.iter().map(|v| v.as_number()).collect();
                Series::new(name.as_str().into(), data)
            } else if !present.is_empty()
                && present.iter().all(|v| matches!(v, CellValue::Date(_)))
            {
                let days: Vec<Option<i32>> = values
                    .iter()
                    .map(|v| {
                        v.as_date()
                            .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
                    })
                    .collect();
                Series::new(name.as_str().into(), days).cast(&DataType::Date)?
            } else {
                let data: Vec<Option<String>> = values
                    .iter()
                    .map(|v| if v.is_null() { None } else { Some(v.to_string()) })
                    .collect();
                Series::new(name.as_str().into(), data)
            };

            columns.push(series.into());
        }

        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> NormalizedTable {
        NormalizedTable::new(
            "月度运营报表",
            vec!["机构".into(), "余额".into(), SOURCE_AS_OF_DATE.into()],
            vec![
                vec!["西安分行".into(), CellValue::Number(10.5), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap().into()],
                vec!["宝鸡分行".into(), CellValue::Empty],
            ],
            None,
        )
    }

    #[test]
    fn test_rows_are_padded_to_width() {
        let table = sample_table();
        assert_eq!(table.rows()[1].len(), 3);
        assert_eq!(table.rows()[1][2], CellValue::Empty);
    }

    #[test]
    fn test_raw_sheet_cell_outside_grid_is_empty() {
        let sheet = RawSheet::new("Sheet1", vec![vec!["a".into()], vec![]]);
        assert_eq!(sheet.width(), 1);
        assert_eq!(sheet.cell(5, 5), &CellValue::Empty);
        assert_eq!(sheet.row_window(1, 10).len(), 1);
        assert_eq!(sheet.row_window(7, 10).len(), 0);
    }

    #[test]
    fn test_to_dataframe_infers_column_types() {
        let df = sample_table().to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("机构").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("余额").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column(SOURCE_AS_OF_DATE).unwrap().dtype(), &DataType::Date);
    }
}
