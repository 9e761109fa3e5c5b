//! `filings`: load disclosure batches into a local store and inspect them.
//!
//! Reads `filings.toml` (or the path given with `--config`) and `FILINGS__*`
//! environment variables, then opens the SQLite store named by `store_path`.
//!
//! ```
//! filings ingest fnltt-2023.json
//! filings show 20240312000736
//! FILINGS__INGEST__STRICT_FACT_INSERT=true filings ingest refile.ndjson
//! ```

use std::{
  io::Read as _,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use filings_core::{IngestConfig, fact::FactView, record::parse_batch, store::DisclosureStore};
use filings_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "filings", version, about = "Disclosure ingestion pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "filings.toml")]
  config: PathBuf,

  /// Store path; overrides `store_path` from the configuration.
  #[arg(long, value_name = "PATH")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Ingest one batch: a JSON array, an API `{"list": [...]}` envelope, or
  /// newline-delimited records. Use `-` to read standard input.
  Ingest {
    file: PathBuf,
    /// Print the batch outcome as JSON.
    #[arg(long)]
    json: bool,
  },
  /// Print a report and its facts.
  Show { rcept_no: String },
  /// List known companies.
  Companies,
  /// List recent ingestion runs.
  Batches {
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of `filings.toml`.
#[derive(Deserialize, Debug)]
struct AppConfig {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  #[serde(default)]
  ingest:     IngestConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("filings.db") }

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("FILINGS").separator("__"))
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise AppConfig")
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let app_cfg = load_config(&cli.config)?;

  let store_path = expand_tilde(cli.store.as_deref().unwrap_or(&app_cfg.store_path));
  let store = SqliteStore::open(&store_path, app_cfg.ingest)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Ingest { file, json } => ingest(&store, &file, json).await,
    Command::Show { rcept_no } => show(&store, &rcept_no).await,
    Command::Companies => companies(&store).await,
    Command::Batches { limit } => batches(&store, limit).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn ingest(store: &SqliteStore, file: &Path, json: bool) -> anyhow::Result<()> {
  let input = read_input(file)?;
  let records = parse_batch(&input)
    .with_context(|| format!("failed to decode records from {file:?}"))?;

  let outcome = store.ingest(records).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    return Ok(());
  }

  println!("batch {}", outcome.batch_id);
  println!("  records             {}", outcome.records);
  println!("  companies created   {}", outcome.companies_created);
  println!("  reports registered  {}", outcome.reports_registered);
  println!("  reports updated     {}", outcome.reports_updated);
  println!("  facts inserted      {}", outcome.facts_inserted);
  println!("  facts updated       {}", outcome.facts_updated);
  if !outcome.warnings.is_empty() {
    println!("  warnings            {}", outcome.warnings.len());
    for w in &outcome.warnings {
      println!("    {w}");
    }
  }
  Ok(())
}

async fn show(store: &SqliteStore, rcept_no: &str) -> anyhow::Result<()> {
  let report = store
    .get_report(rcept_no)
    .await?
    .with_context(|| format!("no report with receipt number {rcept_no}"))?;
  let facts = store.report_facts(rcept_no).await?;

  println!(
    "{} {} {} (reprt_code {}) updated {}",
    report.rcept_no,
    report.bsns_year,
    report.period().label(),
    report.reprt_code,
    report.updated_at.to_rfc3339(),
  );

  if let Some(first) = facts.first() {
    for (kind, value) in first.fact.ratios.iter() {
      println!("  {:<24} {value}", kind.column());
    }
  }
  for view in &facts {
    println!("  {}", fact_line(view));
  }
  Ok(())
}

async fn companies(store: &SqliteStore) -> anyhow::Result<()> {
  for c in store.list_companies().await? {
    println!(
      "{:<10} {:<8} {}",
      c.corp_code,
      c.stock_code.as_deref().unwrap_or("-"),
      c.corp_name
    );
  }
  Ok(())
}

async fn batches(store: &SqliteStore, limit: usize) -> anyhow::Result<()> {
  for b in store.list_batches(limit).await? {
    let failure = match (b.failure_index, b.failure_reason.as_deref()) {
      (Some(i), Some(reason)) => format!(" at record {i}: {reason}"),
      (None, Some(reason)) => format!(": {reason}"),
      _ => String::new(),
    };
    println!(
      "{} {} {:?} records={} warnings={}{failure}",
      b.started_at.to_rfc3339(),
      b.batch_id,
      b.status,
      b.record_count,
      b.warning_count,
    );
  }
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn fact_line(view: &FactView) -> String {
  format!(
    "{:<4} {:>4} {:<32} {:>24} {:>24} {}",
    view.sj_div,
    or_dash(view.fact.ord),
    view.account_nm,
    or_dash(view.fact.current.amount),
    or_dash(view.fact.prior.amount),
    view.fact.currency,
  )
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
  value.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

fn read_input(file: &Path) -> anyhow::Result<String> {
  if file == Path::new("-") {
    let mut input = String::new();
    std::io::stdin()
      .read_to_string(&mut input)
      .context("failed to read standard input")?;
    return Ok(input);
  }
  std::fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_config_file_uses_defaults() {
    let cfg = load_config(Path::new("does-not-exist.toml")).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("filings.db"));
    assert_eq!(cfg.ingest.ratio_decimal_places, 4);
  }

  #[test]
  fn config_file_sets_ingest_options() {
    let dir = std::env::temp_dir().join(format!("filings-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("filings.toml");
    std::fs::write(
      &path,
      "store_path = \"/tmp/x.db\"\n[ingest]\nstrict_fact_insert = true\nratio_decimal_places = 2\n",
    )
    .unwrap();

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/x.db"));
    assert!(cfg.ingest.strict_fact_insert);
    assert_eq!(cfg.ingest.ratio_decimal_places, 2);

    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn tilde_is_left_alone_without_slash() {
    assert_eq!(expand_tilde(Path::new("~filings.db")), PathBuf::from("~filings.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
