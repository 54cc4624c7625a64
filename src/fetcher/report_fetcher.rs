use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::info;
use wreq::Client;
use wreq_util::Emulation;

use crate::config::FetchConfig;
use crate::processor::metadata_extractor::last_day_of_month;

/// Downloads report exports from the upstream BI service.
pub struct ReportFetcher {
    client: Client,
    config: FetchConfig,
}

impl ReportFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .emulation(Emulation::Firefox139)
            .build()?;

        Ok(ReportFetcher { client, config })
    }

    /// Fills `{date_m}` (month end, `2025-03-31`) and `{p_date_m}` (`202503`)
    /// in the configured URL template.
    pub fn build_url(&self, year: i32, month: u32) -> Result<String> {
        let month_end = last_day_of_month(year, month)
            .ok_or_else(|| anyhow!("Invalid report period {}-{}", year, month))?;
        Ok(render_url(&self.config.url_template, month_end))
    }

    pub async fn fetch_period(&self, year: i32, month: u32) -> Result<Vec<u8>> {
        let url = self.build_url(year, month)?;
        self.fetch(&url).await
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!("Downloading report from {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {}", response.status()));
        }

        let bytes = response.bytes().await?;
        info!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

fn render_url(template: &str, month_end: NaiveDate) -> String {
    template
        .replace("{date_m}", &month_end.format("%Y-%m-%d").to_string())
        .replace(
            "{p_date_m}",
            &format!("{:04}{:02}", month_end.year(), month_end.month()),
        )
}
