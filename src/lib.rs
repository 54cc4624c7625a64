//! Normalizes banking spreadsheet exports into flat, uniquely named tables and
//! reconciles several of them vertically (same schema, different periods) or
//! horizontally (same entities, different metrics).

pub mod config;
pub mod error;
pub mod fetcher;
pub mod merge;
pub mod models;
pub mod processor;
pub mod storage;

pub use config::IngestConfig;
pub use error::{NormalizeError, Result, RowDifference};
pub use fetcher::SheetSelector;
pub use merge::{VerticalMergeOptions, find_key_differences, merge_horizontal, merge_vertical};
pub use models::{AsOfPeriod, CellValue, NormalizedTable, PeriodGranularity, RawSheet};
pub use processor::{NormalizeReport, OrgCityEnricher, TableNormalizer};
pub use storage::TableStore;
