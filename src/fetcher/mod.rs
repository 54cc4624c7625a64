pub mod report_fetcher;
pub mod workbook_reader;

pub use report_fetcher::ReportFetcher;
pub use workbook_reader::*;
