use anyhow::{Context, Result};
use report_normalizer::config::IngestConfig;
use report_normalizer::fetcher::{SheetSelector, read_sheet_from_path};
use report_normalizer::processor::{HeaderFlattener, HeaderRowDetector, MetadataExtractor};
use std::env;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        eprintln!("Usage: inspect_headers <workbook> [sheet]");
        std::process::exit(2);
    };
    let selector = args
        .get(1)
        .map(|s| SheetSelector::parse(s))
        .unwrap_or_default();

    let config = IngestConfig::load(None)?;
    let sheet = read_sheet_from_path(path, &selector)
        .with_context(|| format!("Failed to read {}", path))?;

    println!("=== INSPECTING HEADERS: {} [{}] ===\n", path, sheet.name());

    let metadata = MetadataExtractor::new(config.header.reserved_rows).extract(&sheet);
    println!("1. Report metadata:");
    println!("   name:  {:?}", metadata.report_name);
    println!("   as-of: {:?}", metadata.as_of_raw);
    if let Some(period) = &metadata.as_of {
        println!("   date:  {} ({:?})", period.date, period.granularity);
    }

    let detection = HeaderRowDetector::from_config(&config.header).detect(&sheet);
    println!("\n2. Header rows: {}{}", detection.rows, if detection.capped { " (capped)" } else { "" });

    let reserved = config.header.reserved_rows;
    for (i, row) in sheet.row_window(reserved, detection.rows).iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        println!("   level {}: {:?}", i, cells);
    }

    let ncols = sheet.width_from(reserved);
    let header = HeaderFlattener::from_config(&config.header)
        .flatten(sheet.row_window(reserved, detection.rows), ncols);
    println!("\n3. Flattened columns ({}):", header.len());
    for (i, name) in header.names().iter().enumerate() {
        let marker = if header.fallback_columns().contains(&i) { "  <- fallback" } else { "" };
        println!("   [{}] {}{}", i, name, marker);
    }

    Ok(())
}
