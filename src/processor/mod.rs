pub mod header_detector;
pub mod header_flattener;
pub mod metadata_extractor;
pub mod org_enricher;
pub mod row_classifier;
pub mod table_normalizer;
pub mod tail_trimmer;

pub use header_detector::*;
pub use header_flattener::*;
pub use metadata_extractor::*;
pub use org_enricher::*;
pub use row_classifier::*;
pub use table_normalizer::*;
pub use tail_trimmer::*;
