//! Async HTTP client wrapping the Hammer JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use hammer_core::{event::Event, resolver::StatusVerdict};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

/// Connection settings for the Hammer API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Result of a ban or unban command.
#[derive(Debug, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  Committed { event: Event },
  Cancelled,
}

/// One row of `GET /subjects/{subject}/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
  #[serde(flatten)]
  pub event:   Event,
  pub expired: bool,
}

#[derive(Serialize)]
struct CommandBody<'a> {
  subject:  &'a str,
  reason:   &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  duration: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// Async HTTP client for the Hammer JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  /// `<base>/api/<segments…>`, with each segment percent-encoded.
  fn url(&self, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(&self.config.base_url)
      .with_context(|| format!("invalid server url {:?}", self.config.base_url))?;
    url
      .path_segments_mut()
      .map_err(|()| anyhow!("server url cannot be a base: {}", self.config.base_url))?
      .pop_if_empty()
      .push("api")
      .extend(segments);
    Ok(url)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Decode a success body, or turn the API's `{"error"}` body into an error.
  async fn decode<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
      return resp.json().await.with_context(|| format!("deserialising {what}"));
    }
    match resp.json::<ErrorBody>().await {
      Ok(body) => Err(anyhow!("{}", body.error)),
      Err(_) => Err(anyhow!("{what} → {status}")),
    }
  }

  // ── Commands ──────────────────────────────────────────────────────────────

  /// `POST /api/bans`
  pub async fn ban(&self, subject: &str, reason: &str, duration: Option<&str>) -> Result<Outcome> {
    self.command("bans", subject, reason, duration).await
  }

  /// `POST /api/unbans`
  pub async fn unban(&self, subject: &str, reason: &str, duration: Option<&str>) -> Result<Outcome> {
    self.command("unbans", subject, reason, duration).await
  }

  async fn command(
    &self,
    path: &str,
    subject: &str,
    reason: &str,
    duration: Option<&str>,
  ) -> Result<Outcome> {
    let url = self.url(&[path])?;
    debug!(%url, %subject, "sending command");
    let resp = self
      .auth(self.client.post(url))
      .json(&CommandBody { subject, reason, duration })
      .send()
      .await
      .with_context(|| format!("POST /{path} failed"))?;
    Self::decode(path, resp).await
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  /// `GET /api/subjects/{subject}/history`
  pub async fn history(&self, subject: &str) -> Result<Vec<HistoryEntry>> {
    let resp = self
      .auth(self.client.get(self.url(&["subjects", subject, "history"])?))
      .send()
      .await
      .with_context(|| format!("GET /subjects/{subject}/history failed"))?;
    Self::decode("history", resp).await
  }

  /// `GET /api/subjects/{subject}/status`
  pub async fn status(&self, subject: &str) -> Result<StatusVerdict> {
    let resp = self
      .auth(self.client.get(self.url(&["subjects", subject, "status"])?))
      .send()
      .await
      .with_context(|| format!("GET /subjects/{subject}/status failed"))?;
    Self::decode("status", resp).await
  }
}
