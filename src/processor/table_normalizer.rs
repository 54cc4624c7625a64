use std::path::Path;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::error::{NormalizeError, Result};
use crate::fetcher::workbook_reader::{SheetSelector, read_sheet_from_bytes, read_sheet_from_path};
use crate::models::{CellValue, NormalizedTable, RawSheet, SOURCE_AS_OF_DATE, SOURCE_AS_OF_RAW};
use crate::processor::header_detector::HeaderRowDetector;
use crate::processor::header_flattener::HeaderFlattener;
use crate::processor::metadata_extractor::MetadataExtractor;
use crate::processor::row_classifier::RowClassifier;
use crate::processor::tail_trimmer::TailTrimmer;

/// Degradations noticed while normalizing a sheet. None of them are fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub header_rows: usize,
    /// No data row was found in the preview window; the header cap was applied.
    pub header_capped: bool,
    /// Columns named `column_{i}` because no header text survived cleaning.
    pub fallback_columns: Vec<usize>,
    pub trimmed_rows: usize,
    /// An as-of string was found but could not be parsed into a period.
    pub unparsed_as_of: Option<String>,
}

/// Turns a raw report sheet into a flat table with as-of metadata columns.
#[derive(Debug, Clone)]
pub struct TableNormalizer {
    reserved_rows: usize,
    detector: HeaderRowDetector,
    flattener: HeaderFlattener,
    trimmer: TailTrimmer,
    extractor: MetadataExtractor,
}

impl TableNormalizer {
    pub fn new(config: &IngestConfig) -> Self {
        let classifier = RowClassifier::from_config(&config.classifier);
        Self {
            reserved_rows: config.header.reserved_rows,
            detector: HeaderRowDetector::from_config(&config.header),
            flattener: HeaderFlattener::from_config(&config.header),
            trimmer: TailTrimmer::new(classifier),
            extractor: MetadataExtractor::new(config.header.reserved_rows),
        }
    }

    pub fn normalize_bytes(
        &self,
        bytes: &[u8],
        source_name: &str,
        selector: &SheetSelector,
    ) -> Result<(NormalizedTable, NormalizeReport)> {
        let sheet = read_sheet_from_bytes(bytes, selector)?;
        self.normalize_sheet_with_report(&sheet, source_name)
    }

    /// The file stem names the table when the report carries no title.
    pub fn normalize_path(
        &self,
        path: impl AsRef<Path>,
        selector: &SheetSelector,
    ) -> Result<(NormalizedTable, NormalizeReport)> {
        let path = path.as_ref();
        let sheet = read_sheet_from_path(path, selector)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| sheet.name().to_string());
        self.normalize_sheet_with_report(&sheet, &stem)
    }

    pub fn normalize_sheet(&self, sheet: &RawSheet, source_name: &str) -> Result<NormalizedTable> {
        self.normalize_sheet_with_report(sheet, source_name)
            .map(|(table, _)| table)
    }

    /// `fallback_name` is used only when the title row is empty.
    pub fn normalize_sheet_with_report(
        &self,
        sheet: &RawSheet,
        fallback_name: &str,
    ) -> Result<(NormalizedTable, NormalizeReport)> {
        if sheet.height() == 0 {
            return Err(NormalizeError::MalformedInput(format!(
                "sheet '{}' is empty",
                sheet.name()
            )));
        }

        let detection = self.detector.detect(sheet);
        let ncols = sheet.width_from(self.reserved_rows);
        if ncols == 0 {
            return Err(NormalizeError::MalformedInput(format!(
                "sheet '{}' has no columns below the title rows",
                sheet.name()
            )));
        }

        let header_block = sheet.row_window(self.reserved_rows, detection.rows);
        let header = self.flattener.flatten(header_block, ncols);

        let data = sheet.rectangular_rows_from(self.reserved_rows + detection.rows, ncols);
        if data.is_empty() {
            return Err(NormalizeError::MalformedInput(format!(
                "sheet '{}' has no data rows below a {}-row header",
                sheet.name(),
                detection.rows
            )));
        }
        let (data, trimmed_rows) = self.trimmer.trim(data);

        let metadata = self.extractor.extract(sheet);
        let raw_cell = CellValue::from(metadata.as_of_raw.clone());
        let date_cell = CellValue::from(metadata.as_of.as_ref().map(|p| p.date));

        let rows: Vec<Vec<CellValue>> = data
            .into_iter()
            .map(|mut row| {
                row.push(raw_cell.clone());
                row.push(date_cell.clone());
                row
            })
            .collect();

        let fallback_columns = header.fallback_columns().to_vec();
        if !fallback_columns.is_empty() {
            warn!(
                "Sheet '{}': positional names used for column(s) {:?}",
                sheet.name(),
                fallback_columns
            );
        }
        if detection.capped {
            warn!(
                "Sheet '{}': no data row in preview, header capped at {} row(s)",
                sheet.name(),
                detection.rows
            );
        }

        let mut columns = header.into_names();
        columns.push(SOURCE_AS_OF_RAW.to_string());
        columns.push(SOURCE_AS_OF_DATE.to_string());

        let source_name = metadata
            .report_name
            .clone()
            .unwrap_or_else(|| fallback_name.to_string());

        let unparsed_as_of = match (&metadata.as_of_raw, &metadata.as_of) {
            (Some(raw), None) => Some(raw.clone()),
            _ => None,
        };

        let table = NormalizedTable::new(source_name, columns, rows, metadata.as_of);

        info!(
            "Normalized '{}': {} header row(s), {} column(s), {} row(s), {} trailing row(s) trimmed",
            table.source_name(),
            detection.rows,
            table.width(),
            table.height(),
            trimmed_rows
        );

        let report = NormalizeReport {
            header_rows: detection.rows,
            header_capped: detection.capped,
            fallback_columns,
            trimmed_rows,
            unparsed_as_of,
        };

        Ok((table, report))
    }
}

impl Default for TableNormalizer {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}
