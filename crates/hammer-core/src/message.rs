//! Kick and broadcast message templates.
//!
//! Templates use `<player>`, `<op>`, `<type>`, `<reason>` and `<expires>`
//! placeholders. The `*_expires` suffix is appended only when the event has an
//! expiry.

use serde::Deserialize;

use crate::event::Event;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
  pub kick:              String,
  pub kick_expires:      String,
  pub broadcast:         String,
  pub broadcast_expires: String,
  /// `chrono` strftime pattern for `<expires>`.
  pub time_format:       String,
}

impl Default for Messages {
  fn default() -> Self {
    Self {
      kick:              "You are banned from this server. Reason: <reason>".to_string(),
      kick_expires:      " (until <expires>)".to_string(),
      broadcast:         "<op> issued <type> on <player>: <reason>".to_string(),
      broadcast_expires: " (until <expires>)".to_string(),
      time_format:       "%Y-%m-%d %H:%M UTC".to_string(),
    }
  }
}

impl Messages {
  /// The message shown to a subject who is disconnected because of `event`.
  pub fn kick(&self, event: &Event) -> String {
    self.render(&self.kick, &self.kick_expires, event)
  }

  /// The message announced to staff when `event` is committed.
  pub fn broadcast(&self, event: &Event) -> String {
    self.render(&self.broadcast, &self.broadcast_expires, event)
  }

  fn render(&self, template: &str, expires_suffix: &str, event: &Event) -> String {
    let mut message = template.to_string();
    if let Some(expires_at) = event.expires_at {
      message.push_str(
        &expires_suffix
          .replace("<expires>", &expires_at.format(&self.time_format).to_string()),
      );
    }

    message
      .replace("<player>", &event.subject)
      .replace("<op>", &event.issued_by)
      .replace("<type>", event.kind.as_ref())
      .replace("<reason>", &event.reason)
  }
}
