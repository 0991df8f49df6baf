//!
//! contactdesk report binary
//! -------------------------
//! Aggregates a contact records JSON file and prints the dashboard metrics as
//! tables, or as JSON with --json.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::env;
use std::io::IsTerminal;

use contactdesk::cli::print_report;
use contactdesk::config::ConsoleConfig;
use contactdesk::metrics::{compute_metrics_with, format_metrics, AggregationOptions};
use contactdesk::store::{JsonFileRecordStore, RecordStore};

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn usage() -> &'static str {
    "contactdesk Report\n\nUSAGE:\n  contactdesk_report [RECORDS.json] [--locale TAG] [--day-boundary B] [--date YYYY-MM-DD] [--json]\n\nThe records file defaults to CONTACTDESK_RECORDS. --date sets the reference day (default: today).\n"
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", usage());
        return Ok(());
    }

    let mut config = ConsoleConfig::from_env();
    if let Some(v) = arg_value(&args, "--locale") {
        config.set_locale(&v);
    }
    if let Some(v) = arg_value(&args, "--day-boundary") {
        config.set_day_boundary(&v);
    }

    // first bare argument that is not a flag value
    let mut positional: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        let a = &args[i];
        if matches!(a.as_str(), "--locale" | "--day-boundary" | "--date") {
            i += 2;
            continue;
        }
        if !a.starts_with('-') {
            positional = Some(a.clone());
            break;
        }
        i += 1;
    }
    let path = positional
        .map(std::path::PathBuf::from)
        .or_else(|| config.records_path.clone())
        .ok_or_else(|| anyhow::anyhow!("no records file given\n\n{}", usage()))?;

    let opts = AggregationOptions { day_boundary: config.day_boundary, locale: config.locale };
    let reference_date = match arg_value(&args, "--date") {
        Some(v) => NaiveDate::parse_from_str(&v, "%Y-%m-%d").with_context(|| format!("invalid --date {}", v))?,
        None => opts.day_boundary.today(),
    };

    let store = JsonFileRecordStore::new(&path);
    let records = store
        .fetch_contact_records()
        .await
        .with_context(|| format!("While reading {}", path.display()))?;
    let metrics = compute_metrics_with(&records, reference_date, &opts);
    let formatted = format_metrics(&metrics, opts.locale);

    if has_flag(&args, "--json") {
        let body = serde_json::json!({ "metrics": metrics, "formatted": formatted });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_report(&metrics, &formatted, std::io::stdout().is_terminal());
    }
    Ok(())
}
