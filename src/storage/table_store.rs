use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::config::{OutputConfig, OutputFormat};
use crate::models::{AsOfPeriod, NormalizedTable};

/// Sidecar written next to every stored table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableManifest {
    pub source_name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub as_of: Option<AsOfPeriod>,
    pub format: OutputFormat,
    pub data_file: String,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredTable {
    pub data_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Writes normalized tables under `<root>/clean/<source>/<YYYY/MM/DD>/`.
pub struct TableStore {
    root: PathBuf,
    format: OutputFormat,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, config.format)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative path for a fresh table file of the given source.
    pub fn generate_clean_path(source_name: &str, format: OutputFormat) -> String {
        let date = Utc::now().format("%Y/%m/%d").to_string();
        let file_id = Uuid::new_v4();
        format!(
            "clean/{}/{}/{}.{}",
            sanitize_segment(source_name),
            date,
            file_id,
            extension(format)
        )
    }

    pub fn store(&self, table: &NormalizedTable) -> Result<StoredTable> {
        let relative = Self::generate_clean_path(table.source_name(), self.format);
        let data_path = self.root.join(&relative);
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let mut df = table
            .to_dataframe()
            .with_context(|| format!("Failed to build DataFrame for '{}'", table.source_name()))?;

        let mut file = File::create(&data_path)
            .with_context(|| format!("Failed to create {}", data_path.display()))?;
        match self.format {
            OutputFormat::Parquet => {
                ParquetWriter::new(&mut file).finish(&mut df)?;
            }
            OutputFormat::Csv => {
                CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
            }
        }

        let manifest = TableManifest {
            source_name: table.source_name().to_string(),
            columns: table.columns().to_vec(),
            row_count: table.height(),
            as_of: table.as_of().cloned(),
            format: self.format,
            data_file: relative,
            written_at: Utc::now(),
        };
        let manifest_path = data_path.with_extension("json");
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
            .with_context(|| format!("Failed to write manifest {}", manifest_path.display()))?;

        info!(
            "💾 Stored '{}' ({} rows) at {}",
            table.source_name(),
            table.height(),
            data_path.display()
        );

        Ok(StoredTable {
            data_path,
            manifest_path,
        })
    }

    pub fn read_manifest(path: impl AsRef<Path>) -> Result<TableManifest> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }
}

fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Parquet => "parquet",
        OutputFormat::Csv => "csv",
    }
}

/// Report titles become directory names; path separators are not allowed.
fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
