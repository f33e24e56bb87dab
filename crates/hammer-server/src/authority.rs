//! [`HttpAuthority`]: an external ban authority reached over HTTP.
//!
//! `GET <url>/<subject>` answers 200 with an [`Event`] when the authority has a
//! verdict, or 404 when it has none. Anything else counts as a failure.

use std::time::Duration;

use async_trait::async_trait;
use hammer_core::{BoxError, event::Event, hooks::ExternalAuthority};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// One `[[authorities]]` entry in the server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
  pub name: String,
  pub url:  String,
}

pub struct HttpAuthority {
  name:     String,
  client:   Client,
  base_url: Url,
}

impl HttpAuthority {
  /// `timeout` caps the HTTP request itself; the resolver applies its own
  /// timeout on top.
  pub fn new(config: &AuthorityConfig, timeout: Duration) -> Result<Self> {
    let base_url = Url::parse(&config.url).map_err(|_| Error::InvalidUrl(config.url.clone()))?;
    if base_url.cannot_be_a_base() {
      return Err(Error::InvalidUrl(config.url.clone()));
    }
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { name: config.name.clone(), client, base_url })
  }

  fn subject_url(&self, subject: &str) -> Result<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|()| Error::InvalidUrl(self.base_url.to_string()))?
      .pop_if_empty()
      .push(subject);
    Ok(url)
  }

  async fn fetch(&self, subject: &str) -> Result<Option<Event>> {
    let url = self.subject_url(subject)?;
    let resp = self.client.get(url.clone()).send().await?;
    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      s if s.is_success() => Ok(Some(resp.json().await?)),
      status => Err(Error::Status { url: url.to_string(), status }),
    }
  }
}

#[async_trait]
impl ExternalAuthority for HttpAuthority {
  fn name(&self) -> &str { &self.name }

  async fn verdict(&self, subject: &str) -> Result<Option<Event>, BoxError> {
    let event = self.fetch(subject).await?;
    debug!(authority = %self.name, %subject, found = event.is_some(), "queried authority");
    Ok(event)
  }
}
