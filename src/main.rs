use anyhow::{Context, Result, anyhow, bail};
use report_normalizer::config::IngestConfig;
use report_normalizer::fetcher::{ReportFetcher, SheetSelector, sheet_names_from_path};
use report_normalizer::merge::{VerticalMergeOptions, merge_horizontal, merge_vertical};
use report_normalizer::models::NormalizedTable;
use report_normalizer::processor::{OrgCityEnricher, TableNormalizer};
use report_normalizer::storage::TableStore;
use std::env;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: report-normalizer <command> [options] <inputs...>

Commands:
  normalize <files...>         normalize each workbook and store it
  merge-vertical <files...>    normalize, then stack same-schema tables
  merge-horizontal <files...>  normalize, then join tables on entity and time columns
  sheets <file>                list the sheets of a workbook
  fetch <url|YYYY-MM>          download a report export, normalize and store it

Options:
  --config <path>   TOML config (default: $REPORT_NORMALIZER_CONFIG or built-in defaults)
  --sheet <idx|name|name:sheet>
  --out <dir>       output directory (overrides output.directory)
  --time-col <idx>  time column for merge-horizontal (overrides merge.time_col_index)";

#[derive(Debug, Default)]
struct CliArgs {
    command: String,
    inputs: Vec<String>,
    config_path: Option<String>,
    sheet: Option<String>,
    out: Option<String>,
    time_col: Option<usize>,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("Missing value for {}", flag))
            };
            match arg.as_str() {
                "--config" | "-c" => parsed.config_path = Some(value(&arg)?),
                "--sheet" => parsed.sheet = Some(value(&arg)?),
                "--out" | "-o" => parsed.out = Some(value(&arg)?),
                "--time-col" => {
                    let raw = value(&arg)?;
                    parsed.time_col = Some(
                        raw.parse()
                            .with_context(|| format!("Invalid --time-col value: {}", raw))?,
                    );
                }
                "--help" | "-h" => {
                    parsed.command = "help".to_string();
                }
                _ if parsed.command.is_empty() => parsed.command = arg.clone(),
                _ => parsed.inputs.push(arg.clone()),
            }
        }

        if parsed.command.is_empty() {
            parsed.command = "help".to_string();
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenv::dotenv().ok();

    let args = CliArgs::parse(env::args().skip(1))?;
    let mut config = IngestConfig::load(args.config_path.as_deref())
        .context("Failed to load ingestion configuration")?;
    if let Some(out) = &args.out {
        config.output.directory = out.clone();
    }
    if let Some(time_col) = args.time_col {
        config.merge.time_col_index = time_col;
    }
    let selector = args
        .sheet
        .as_deref()
        .map(SheetSelector::parse)
        .unwrap_or_default();

    match args.command.as_str() {
        "normalize" => run_normalize(&config, &selector, &args.inputs).await,
        "merge-vertical" => run_merge_vertical(&config, &selector, &args.inputs).await,
        "merge-horizontal" => run_merge_horizontal(&config, &selector, &args.inputs).await,
        "sheets" => run_sheets(&args.inputs),
        "fetch" => run_fetch(&config, &selector, &args.inputs).await,
        "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

/// Normalizes every file on the blocking pool, returning results in input order.
async fn normalize_files(
    config: &IngestConfig,
    selector: &SheetSelector,
    files: &[String],
) -> Vec<(String, Result<NormalizedTable>)> {
    let normalizer = TableNormalizer::new(config);
    let enricher = config.enrichment.as_ref().map(OrgCityEnricher::from_config);

    let handles: Vec<_> = files
        .iter()
        .map(|file| {
            let normalizer = normalizer.clone();
            let enricher = enricher.clone();
            let selector = selector.clone();
            let path = PathBuf::from(file);
            tokio::task::spawn_blocking(move || -> Result<NormalizedTable> {
                let (table, report) = normalizer
                    .normalize_path(&path, &selector)
                    .with_context(|| format!("Failed to normalize {}", path.display()))?;
                if report.header_capped || !report.fallback_columns.is_empty() {
                    warn!("⚠️ {} normalized with degradations: {:?}", path.display(), report);
                }
                Ok(match &enricher {
                    Some(enricher) => enricher.enrich(&table),
                    None => table,
                })
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (file, handle) in files.iter().zip(handles) {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("Normalization task for {} panicked: {}", file, e)),
        };
        results.push((file.clone(), result));
    }
    results
}

async fn normalize_all(
    config: &IngestConfig,
    selector: &SheetSelector,
    files: &[String],
) -> Result<Vec<NormalizedTable>> {
    normalize_files(config, selector, files)
        .await
        .into_iter()
        .map(|(_, result)| result)
        .collect()
}

async fn run_normalize(config: &IngestConfig, selector: &SheetSelector, files: &[String]) -> Result<()> {
    if files.is_empty() {
        bail!("normalize needs at least one input file");
    }
    info!("🚀 Normalizing {} workbook(s)", files.len());

    let store = TableStore::from_config(&config.output);
    let mut successful = 0;
    for (file, result) in normalize_files(config, selector, files).await {
        match result.and_then(|table| store.store(&table)) {
            Ok(stored) => {
                info!("✅ {} -> {}", file, stored.data_path.display());
                successful += 1;
            }
            Err(e) => error!("❌ {}: {:#}", file, e),
        }
    }

    info!("📊 Normalized {} out of {} workbook(s)", successful, files.len());
    if successful == 0 {
        bail!("No workbook was normalized successfully");
    }
    Ok(())
}

async fn run_merge_vertical(config: &IngestConfig, selector: &SheetSelector, files: &[String]) -> Result<()> {
    let tables = normalize_all(config, selector, files).await?;
    let options = VerticalMergeOptions {
        primary_key_col: config.merge.primary_key_col,
    };
    let merged = merge_vertical(&tables, &options)?;
    let stored = TableStore::from_config(&config.output).store(&merged)?;
    info!("🎉 Vertical merge stored at {}", stored.data_path.display());
    Ok(())
}

async fn run_merge_horizontal(config: &IngestConfig, selector: &SheetSelector, files: &[String]) -> Result<()> {
    let tables = normalize_all(config, selector, files).await?;
    let merged = merge_horizontal(&tables, config.merge.time_col_index)?;
    let stored = TableStore::from_config(&config.output).store(&merged)?;
    info!("🎉 Horizontal merge stored at {}", stored.data_path.display());
    Ok(())
}

fn run_sheets(inputs: &[String]) -> Result<()> {
    let file = inputs
        .first()
        .ok_or_else(|| anyhow!("sheets needs a workbook path"))?;
    for (index, name) in sheet_names_from_path(file)?.iter().enumerate() {
        println!("{}\t{}", index, name);
    }
    Ok(())
}

async fn run_fetch(config: &IngestConfig, selector: &SheetSelector, inputs: &[String]) -> Result<()> {
    let target = inputs
        .first()
        .ok_or_else(|| anyhow!("fetch needs a URL or a YYYY-MM period"))?;
    let fetcher = ReportFetcher::new(config.fetch.clone().unwrap_or_default())?;

    let bytes = match parse_period_arg(target) {
        Some((year, month)) => {
            if config.fetch.is_none() {
                bail!("Fetching by period needs a [fetch] url_template in the config");
            }
            fetcher.fetch_period(year, month).await?
        }
        None => fetcher.fetch(target).await?,
    };

    let normalizer = TableNormalizer::new(config);
    let selector = selector.clone();
    let (table, report) = tokio::task::spawn_blocking(move || {
        normalizer.normalize_bytes(&bytes, "download", &selector)
    })
    .await??;
    info!("Downloaded report normalized: {:?}", report);

    let table = match &config.enrichment {
        Some(enrichment) => OrgCityEnricher::from_config(enrichment).enrich(&table),
        None => table,
    };
    let stored = TableStore::from_config(&config.output).store(&table)?;
    info!("✅ Stored downloaded report at {}", stored.data_path.display());
    Ok(())
}

fn parse_period_arg(arg: &str) -> Option<(i32, u32)> {
    let (year, month) = arg.split_once('-')?;
    if year.len() != 4 || arg.contains("://") {
        return None;
    }
    Some((year.parse().ok()?, month.parse().ok()?))
}
