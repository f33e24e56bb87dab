//! [`HttpRegistry`]: account name histories from a profile service.
//!
//! `GET <url>/<uuid>/names` returns `[{"name": "...", "changedToAt": ms}]`,
//! where the first entry (the name chosen at account creation) has no
//! `changedToAt`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use hammer_core::{
  BoxError,
  names::{IdentityRegistry, NameChange},
};
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNameChange {
  name:          String,
  /// Milliseconds since the Unix epoch.
  changed_to_at: Option<i64>,
}

impl RawNameChange {
  fn into_change(self) -> NameChange {
    NameChange {
      name:       self.name,
      changed_at: self.changed_to_at.and_then(DateTime::from_timestamp_millis),
    }
  }
}

pub struct HttpRegistry {
  client:   Client,
  base_url: String,
}

impl HttpRegistry {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
  }

  async fn fetch(&self, identity: Uuid) -> Result<Vec<NameChange>> {
    let url = format!("{}/{}/names", self.base_url, identity.simple());
    let resp = self.client.get(&url).send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { url, status: resp.status() });
    }
    let raw: Vec<RawNameChange> = resp.json().await?;
    Ok(raw.into_iter().map(RawNameChange::into_change).collect())
  }
}

#[async_trait]
impl IdentityRegistry for HttpRegistry {
  async fn name_history(&self, identity: Uuid) -> Result<Vec<NameChange>, BoxError> {
    Ok(self.fetch(identity).await?)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Router, routing::get};

  use super::*;
  use crate::testing::serve;

  const ID: &str = "069a79f444e94726a5befca90e38aaf5";

  async fn registry() -> HttpRegistry {
    let app = Router::new().route(
      &format!("/profiles/{ID}/names"),
      get(|| async {
        (
          [("content-type", "application/json")],
          r#"[{"name":"Alice"},{"name":"Bob","changedToAt":1000000}]"#,
        )
      }),
    );
    HttpRegistry::new(&format!("{}/profiles/", serve(app).await), Duration::from_secs(5)).unwrap()
  }

  #[tokio::test]
  async fn name_history_is_decoded() {
    let r = registry().await;
    let history = r.name_history(Uuid::parse_str(ID).unwrap()).await.unwrap();
    assert_eq!(history, vec![
      NameChange { name: "Alice".into(), changed_at: None },
      NameChange { name: "Bob".into(), changed_at: DateTime::from_timestamp(1_000, 0) },
    ]);
  }

  #[tokio::test]
  async fn unknown_identity_is_an_error() {
    let r = registry().await;
    assert!(r.name_history(Uuid::new_v4()).await.is_err());
  }
}
