use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::processor::row_classifier::{DEFAULT_EXPLANATORY_KEYWORDS, DEFAULT_MIN_NUMERIC_RATIO};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "REPORT_NORMALIZER_CONFIG";

/// Top-level configuration for an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub header: HeaderConfig,
    pub classifier: ClassifierConfig,
    pub merge: MergeConfig,
    pub output: OutputConfig,
    pub enrichment: Option<EnrichmentConfig>,
    pub fetch: Option<FetchConfig>,
}

/// How the header block is located and flattened
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub separator: String,
    /// Leading rows holding the report title and as-of date.
    pub reserved_rows: usize,
    pub preview_rows: usize,
    pub max_header_rows: usize,
    pub dedupe_column_names: bool,
}

/// Heuristics for telling data rows from footnotes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub min_numeric_ratio: f64,
    pub explanatory_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub time_col_index: usize,
    /// Re-enables the primary-key value-set check on vertical merges.
    pub primary_key_col: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Parquet,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    pub format: OutputFormat,
}

/// Where report exports are downloaded from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// May contain `{date_m}` and `{p_date_m}` placeholders.
    pub url_template: String,
    pub auth_token: Option<String>,
}

/// Organisation dimension used to add a city column
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub org_column: Option<String>,
    pub target_column: String,
    pub organizations: Vec<OrganizationRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationRecord {
    pub branch_short_name: Option<String>,
    pub united_short_name: Option<String>,
    pub city_short_name: Option<String>,
}

impl IngestConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: IngestConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads from an explicit path, then `REPORT_NORMALIZER_CONFIG`, else defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match env::var(CONFIG_PATH_ENV) {
                Ok(p) => Self::from_file(&p),
                Err(_) => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.header.separator.is_empty() {
            anyhow::bail!("header.separator must not be empty");
        }
        if self.header.preview_rows == 0 {
            anyhow::bail!("header.preview_rows must be at least 1");
        }
        if self.header.max_header_rows == 0 {
            anyhow::bail!("header.max_header_rows must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.classifier.min_numeric_ratio) {
            anyhow::bail!(
                "classifier.min_numeric_ratio must be between 0.0 and 1.0, got {}",
                self.classifier.min_numeric_ratio
            );
        }
        Ok(())
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            reserved_rows: 2,
            preview_rows: 10,
            max_header_rows: 3,
            dedupe_column_names: true,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_numeric_ratio: DEFAULT_MIN_NUMERIC_RATIO,
            explanatory_keywords: DEFAULT_EXPLANATORY_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "output".to_string(),
            format: OutputFormat::Parquet,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            org_column: None,
            target_column: "地市".to_string(),
            organizations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_report_layout() {
        let config = IngestConfig::default();
        assert_eq!(config.header.separator, "_");
        assert_eq!(config.header.reserved_rows, 2);
        assert_eq!(config.header.preview_rows, 10);
        assert_eq!(config.merge.time_col_index, 0);
        assert!(config.merge.primary_key_col.is_none());
        assert!(config.classifier.explanatory_keywords.contains(&"备注".to_string()));
        assert!(config.enrichment.is_none());
        assert!(config.fetch.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: IngestConfig = toml::from_str(
            r#"
            [header]
            separator = "-"

            [merge]
            primary_key_col = 0

            [output]
            format = "csv"

            [enrichment]
            org_column = "机构名称"
            [[enrichment.organizations]]
            branch_short_name = "雁塔支行"
            city_short_name = "西安"
            "#,
        )
        .unwrap();

        assert_eq!(config.header.separator, "-");
        assert_eq!(config.header.reserved_rows, 2);
        assert_eq!(config.merge.primary_key_col, Some(0));
        assert_eq!(config.output.format, OutputFormat::Csv);
        let enrichment = config.enrichment.unwrap();
        assert_eq!(enrichment.target_column, "地市");
        assert_eq!(enrichment.organizations.len(), 1);
        assert!(enrichment.organizations[0].united_short_name.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut config = IngestConfig::default();
        config.classifier.min_numeric_ratio = 1.5;
        assert!(config.validate().is_err());
    }
}
