//! hammer-server binary.
//!
//! ```text
//! hammer-server [--config config.toml] [serve]
//! hammer-server --config config.toml check
//! hammer-server hash-password < secret.txt
//! ```
//!
//! `serve` is the default. `check` loads the configuration and wires every
//! collaborator against a scratch in-memory ledger without binding a port.
//! `hash-password` prints the argon2 PHC string for an `[[operators]]` entry.

use std::{io::BufRead as _, path::PathBuf};

use anyhow::{Context as _, anyhow};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use hammer_server::{ServerConfig, assemble};
use hammer_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Hammer moderation ledger server")]
struct Cli {
  /// TOML configuration file; `HAMMER_*` environment variables override it.
  #[arg(short, long, global = true, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Open the ledger and serve the API (default).
  Serve,
  /// Validate the configuration and exit.
  Check,
  /// Hash the first line of stdin for use as an operator `password_hash`.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(ServerConfig::load(&cli.config)?).await,
    Command::Check => check(ServerConfig::load(&cli.config)?).await,
    Command::HashPassword => hash_password(),
  }
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open ledger at {}", cfg.store_path.display()))?;
  let hammer = assemble(&cfg, store).context("failed to assemble server")?;

  let address = cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  info!(
    %address,
    ledger = %cfg.store_path.display(),
    authorities = cfg.authorities.len(),
    identity_check = cfg.identity_check,
    "hammer listening"
  );

  axum::serve(listener, hammer.router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  hammer.sessions.shutdown();
  info!("stopped; re-checks cancelled");
  Ok(())
}

async fn check(cfg: ServerConfig) -> anyhow::Result<()> {
  let scratch = SqliteStore::open_in_memory().await?;
  assemble(&cfg, scratch).context("configuration does not assemble")?;
  println!(
    "ok: {} operator(s), {} authority(ies), enforcement {}, identity check {}",
    cfg.operators.len(),
    cfg.authorities.len(),
    cfg.enforcement_url.as_deref().unwrap_or("logged only"),
    if cfg.identity_check { "on" } else { "off" },
  );
  Ok(())
}

fn hash_password() -> anyhow::Result<()> {
  let mut line = String::new();
  std::io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\r', '\n']);
  if password.is_empty() {
    return Err(anyhow!("no password on stdin"));
  }

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow!("argon2 error: {e}"))?;
  println!("{hash}");
  Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c().await.ok();
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(_) => std::future::pending::<()>().await,
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {}
    _ = terminate => {}
  }
  info!("shutdown requested");
}
