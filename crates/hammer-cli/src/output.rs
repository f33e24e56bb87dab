//! Plain-text rendering of API responses.

use hammer_core::{
  event::Event,
  resolver::{StatusVerdict, VerdictSource},
};

use crate::client::{HistoryEntry, Outcome};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// One line describing `event`, e.g.
/// `#3 2024-01-01 12:00 UTC  ban by Mod until 2024-01-02 12:00 UTC: spam`.
pub fn event_line(event: &Event) -> String {
  let mut line = format!(
    "#{} {}  {} by {}",
    event.id,
    event.created_at.format(TIME_FORMAT),
    event.kind,
    event.issued_by,
  );
  if let Some(expires_at) = event.expires_at {
    line.push_str(&format!(" until {}", expires_at.format(TIME_FORMAT)));
  }
  if !event.reason.is_empty() {
    line.push_str(&format!(": {}", event.reason));
  }
  line
}

pub fn outcome(outcome: &Outcome) -> String {
  match outcome {
    Outcome::Committed { event } => format!("recorded {}", event_line(event)),
    Outcome::Cancelled => "cancelled by server policy; nothing recorded".to_string(),
  }
}

pub fn history(subject: &str, entries: &[HistoryEntry]) -> String {
  let mut out = format!("History for {subject}:");
  for entry in entries {
    out.push_str("\n  ");
    out.push_str(&event_line(&entry.event));
    if entry.expired {
      out.push_str(" [expired]");
    }
  }
  out
}

pub fn status(subject: &str, verdict: &StatusVerdict) -> String {
  match (&verdict.decisive_event, verdict.source) {
    (Some(event), Some(source)) if verdict.is_banned => {
      let source = match source {
        VerdictSource::Local => "local",
        VerdictSource::External => "external",
      };
      format!("{subject} is banned ({source}): {}", event_line(event))
    }
    _ => format!("{subject} is not banned"),
  }
}
