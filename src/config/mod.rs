pub mod ingest_config;

pub use ingest_config::*;
