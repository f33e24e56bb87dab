//! `hammer`: command-line client for the Hammer moderation ledger.
//!
//! # Usage
//!
//! ```
//! hammer --url http://localhost:8420 --user mod --password secret ban Griefer lava casts
//! hammer --config ~/.config/hammer/config.toml tempban Griefer 2d12h spam
//! hammer info Griefer
//! ```

mod client;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hammer", about = "Command-line client for the Hammer moderation ledger")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the hammer server (default: http://localhost:8420).
  #[arg(long, env = "HAMMER_URL")]
  url: Option<String>,

  /// Operator username.
  #[arg(long, env = "HAMMER_USER")]
  user: Option<String>,

  /// Operator password (plaintext).
  #[arg(long, env = "HAMMER_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Ban a player permanently.
  Ban {
    subject: String,
    /// Free-text reason; the remaining words are joined with spaces.
    reason:  Vec<String>,
  },
  /// Ban a player for a duration such as `30m`, `1d` or `2w3d`.
  Tempban {
    subject:  String,
    duration: String,
    reason:   Vec<String>,
  },
  /// Lift a player's ban.
  Unban {
    subject: String,
    reason:  Vec<String>,
  },
  /// Lift a player's ban for a duration; the ban applies again afterwards.
  Tempunban {
    subject:  String,
    duration: String,
    reason:   Vec<String>,
  },
  /// Show every recorded event for a player.
  Info { subject: String },
  /// Show whether a player is currently banned, and why.
  Status { subject: String },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8420".to_string()),
    username: args
      .user
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;
  println!("{}", run(&client, args.command).await?);
  Ok(())
}

async fn run(client: &ApiClient, command: Command) -> Result<String> {
  Ok(match command {
    Command::Ban { subject, reason } => {
      output::outcome(&client.ban(&subject, &reason.join(" "), None).await?)
    }
    Command::Tempban { subject, duration, reason } => {
      output::outcome(&client.ban(&subject, &reason.join(" "), Some(&duration)).await?)
    }
    Command::Unban { subject, reason } => {
      output::outcome(&client.unban(&subject, &reason.join(" "), None).await?)
    }
    Command::Tempunban { subject, duration, reason } => {
      output::outcome(&client.unban(&subject, &reason.join(" "), Some(&duration)).await?)
    }
    Command::Info { subject } => output::history(&subject, &client.history(&subject).await?),
    Command::Status { subject } => output::status(&subject, &client.status(&subject).await?),
  })
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory as _;

  use super::*;

  #[test]
  fn cli_definition_is_valid() { Args::command().debug_assert(); }

  #[test]
  fn tempban_collects_trailing_reason() {
    let args = Args::try_parse_from(["hammer", "tempban", "Griefer", "2d", "lava", "casts"]).unwrap();
    match args.command {
      Command::Tempban { subject, duration, reason } => {
        assert_eq!(subject, "Griefer");
        assert_eq!(duration, "2d");
        assert_eq!(reason.join(" "), "lava casts");
      }
      other => panic!("unexpected command {other:?}"),
    }
  }

  #[test]
  fn config_file_fields_are_optional() {
    let cfg: ConfigFile = toml::from_str(r#"url = "http://hammer:8420""#).unwrap();
    assert_eq!(cfg.url, "http://hammer:8420");
    assert!(cfg.username.is_empty());
  }
}
