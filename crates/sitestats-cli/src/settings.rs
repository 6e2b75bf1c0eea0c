//! CLI configuration, layered from an optional TOML file and `SITESTATS_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use sitestats_core::calendar::Calendar;

#[derive(Debug, Deserialize)]
pub struct CliConfig {
  /// SQLite file holding the store. A leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// Fixed offset east of UTC used for day boundaries. The system time zone
  /// is used when absent.
  #[serde(default)]
  pub utc_offset_minutes: Option<i32>,
}

fn default_store_path() -> PathBuf { PathBuf::from("sitestats.sqlite") }

impl CliConfig {
  /// Read `path` (if it exists), then overlay the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SITESTATS").try_parsing(true))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")?;
    cfg.store_path = expand_home(&cfg.store_path);
    Ok(cfg)
  }

  pub fn calendar(&self) -> anyhow::Result<Calendar> {
    match self.utc_offset_minutes {
      None => Ok(Calendar::Local),
      Some(minutes) => Calendar::from_offset_minutes(minutes)
        .with_context(|| format!("utc_offset_minutes out of range: {minutes}")),
    }
  }
}

/// Resolve a leading `~` component against `$HOME`. `~user` forms and paths
/// without a home directory to resolve against come back unchanged.
fn expand_home(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}

#[cfg(test)]
mod tests {
  use chrono::FixedOffset;

  use super::*;

  fn config(offset: Option<i32>) -> CliConfig {
    CliConfig {
      store_path:         default_store_path(),
      utc_offset_minutes: offset,
    }
  }

  #[test]
  fn missing_offset_uses_local_calendar() {
    assert_eq!(config(None).calendar().unwrap(), Calendar::Local);
  }

  #[test]
  fn offset_builds_fixed_calendar() {
    assert_eq!(
      config(Some(-300)).calendar().unwrap(),
      Calendar::Fixed(FixedOffset::west_opt(5 * 3600).unwrap())
    );
    assert!(config(Some(24 * 60)).calendar().is_err());
  }

  #[test]
  fn only_a_bare_tilde_component_is_expanded() {
    assert_eq!(expand_home(Path::new("data/x.sqlite")), PathBuf::from("data/x.sqlite"));
    assert_eq!(expand_home(Path::new("~ada/x.sqlite")), PathBuf::from("~ada/x.sqlite"));

    if let Some(home) = std::env::var_os("HOME") {
      assert_eq!(
        expand_home(Path::new("~/stats/x.sqlite")),
        PathBuf::from(home).join("stats/x.sqlite")
      );
    }
  }

  #[test]
  fn file_values_are_read() {
    let path = std::env::temp_dir().join(format!("sitestats-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "store_path = \"stats.db\"\nutc_offset_minutes = 540\n").unwrap();

    let cfg = CliConfig::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(cfg.store_path, PathBuf::from("stats.db"));
    assert_eq!(cfg.utc_offset_minutes, Some(540));
  }
}
