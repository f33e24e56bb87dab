//! Enforcement sinks: a webhook into the game server, and a log-only fallback.

use std::time::Duration;

use async_trait::async_trait;
use hammer_core::{BoxError, hooks::EnforcementSink};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Serialize)]
struct KickBody<'a> {
  subject: &'a str,
  message: &'a str,
}

#[derive(Serialize)]
struct BroadcastBody<'a> {
  message: &'a str,
}

/// POSTs kicks to `<url>/kick` and broadcasts to `<url>/broadcast`.
#[derive(Clone)]
pub struct WebhookSink {
  client:   Client,
  base_url: String,
}

impl WebhookSink {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
  }

  async fn post(&self, path: &str, body: &impl Serialize) -> Result<()> {
    let url = format!("{}{path}", self.base_url);
    let resp = self.client.post(&url).json(body).send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { url, status: resp.status() });
    }
    debug!(%url, "webhook delivered");
    Ok(())
  }
}

#[async_trait]
impl EnforcementSink for WebhookSink {
  async fn kick(&self, subject: &str, message: &str) -> Result<(), BoxError> {
    Ok(self.post("/kick", &KickBody { subject, message }).await?)
  }

  async fn broadcast(&self, message: &str) -> Result<(), BoxError> {
    Ok(self.post("/broadcast", &BroadcastBody { message }).await?)
  }
}

/// Used when no webhook is configured: enforcement is only logged.
pub struct LogSink;

#[async_trait]
impl EnforcementSink for LogSink {
  async fn kick(&self, subject: &str, message: &str) -> Result<(), BoxError> {
    info!(%subject, %message, "kick (no enforcement webhook configured)");
    Ok(())
  }

  async fn broadcast(&self, message: &str) -> Result<(), BoxError> {
    info!(%message, "broadcast");
    Ok(())
  }
}
