//! `sitestats` command-line tool.
//!
//! Reads `sitestats.toml` (or the path given with `--config`) and
//! `SITESTATS_*` environment variables, opens the SQLite store and runs one
//! subcommand. Results are printed to stdout as JSON; logs go to stderr.
//!
//! ```text
//! sitestats insert --site 42 --kind referrers --date 2023-06-01 \
//!   --value '{"type":"referrer","data":{"label":"wordpress.com","views_count":9001}}'
//! sitestats fetch --site 42 --kind referrers --day 2023-06-01
//! ```

mod cli;
mod settings;

use anyhow::Context as _;
use clap::Parser;
use serde_json::json;
use sitestats_core::{
  calendar::Calendar,
  kind::RecordKind,
  query::RecordQuery,
  record::NewRecord,
  store::StatsStore,
};
use sitestats_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  cli::{Cli, Command, WriteArgs},
  settings::CliConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // `kinds` needs no store.
  if matches!(cli.command, Command::Kinds) {
    return print_kinds();
  }

  // Load configuration.
  let cfg = CliConfig::load(&cli.config)?;
  let calendar = cfg.calendar()?;
  let store_path = cli.store.unwrap_or(cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_calendar(calendar);
  tracing::debug!(?store_path, ?calendar, "store opened");

  run(&store, cli.command).await
}

async fn run(store: &SqliteStore, command: Command) -> anyhow::Result<()> {
  let calendar = store.calendar();

  match command {
    Command::Kinds => print_kinds(),

    Command::Insert(args) => {
      let entry = store
        .insert_record(new_record(args, &calendar))
        .await
        .context("insert failed")?;
      print(&entry)
    }

    Command::Replace(args) => {
      let entry = store
        .replace_record(new_record(args, &calendar))
        .await
        .context("replace failed")?;
      print(&entry)
    }

    Command::Fetch { site, kind, day } => {
      let kind = kind.kind()?;
      let query = match day {
        Some(day) => day.query(kind, site, &calendar),
        None => RecordQuery::for_kind(kind, site, None, &calendar),
      };
      let entries = store.fetch(&query).await.context("fetch failed")?;
      print(&entries)
    }

    Command::Delete { record_id } => {
      let deleted = store.delete_record(record_id).await.context("delete failed")?;
      print(&json!({ "record_id": record_id, "deleted": deleted }))
    }

    Command::Clear { site, kind } => {
      let kind = kind.kind()?;
      let removed = store.clear_kind(site, kind).await.context("clear failed")?;
      print(&json!({ "site_id": site, "kind": kind, "removed": removed }))
    }

    Command::Evict { before } => {
      let cutoff = before.instant(&calendar);
      let removed = store.evict_before(cutoff).await.context("evict failed")?;
      print(&json!({ "cutoff": cutoff, "removed": removed }))
    }
  }
}

fn print_kinds() -> anyhow::Result<()> {
  let kinds: Vec<_> = RecordKind::all()
    .map(|k| json!({ "code": k.code(), "name": k.name(), "dated": k.requires_date() }))
    .collect();
  print(&kinds)
}

fn new_record(args: WriteArgs, calendar: &Calendar) -> NewRecord {
  let date = args.date.map(|d| d.instant(calendar));
  args
    .values
    .into_iter()
    .fold(NewRecord::from_code(args.site, args.kind.0, date), NewRecord::with_value)
}

fn print(value: &impl serde::Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
