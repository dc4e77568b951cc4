//! Operator notifications.
//!
//! Delivery is deferred: stages push lines onto a [`NotificationQueue`]
//! while they work, and the queue is flushed as one summary message only
//! after the run-log entry has been written. A delivery failure is logged
//! and dropped; it never alters a stage outcome.

use std::{future::Future, time::Duration};

use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::config::PipelineConfig;

/// Notification sender.
pub trait Notify: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send(
    &self,
    subject: String,
    body: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("notification request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("notification rejected: http {0}")]
  Rejected(reqwest::StatusCode),
}

// ─── Email ───────────────────────────────────────────────────────────────────

/// Mail sender speaking the SendGrid v3 send API.
pub struct EmailNotifier {
  client:   reqwest::Client,
  endpoint: String,
  api_key:  String,
  from:     String,
  to:       String,
}

impl EmailNotifier {
  pub fn new(config: &PipelineConfig) -> Result<Self, NotifyError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self {
      client,
      endpoint: config.notify_endpoint.clone(),
      api_key: config.notify_api_key.clone(),
      from: config.notify_from.clone(),
      to: config.notify_to.clone(),
    })
  }
}

impl Notify for EmailNotifier {
  type Error = NotifyError;

  async fn send(&self, subject: String, body: String) -> Result<(), NotifyError> {
    let payload = json!({
      "personalizations": [{ "to": [{ "email": self.to }] }],
      "from": { "email": self.from },
      "subject": subject,
      "content": [{ "type": "text/plain", "value": body }],
    });
    let response = self
      .client
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(&payload)
      .send()
      .await?;
    if response.status().is_success() {
      Ok(())
    } else {
      Err(NotifyError::Rejected(response.status()))
    }
  }
}

// ─── Queue ───────────────────────────────────────────────────────────────────

/// Body lines kept per run; anything beyond is summarized in one line.
const MAX_LINES: usize = 50;

/// Lines queued during one stage run, delivered coalesced after the run-log
/// entry lands.
pub struct NotificationQueue {
  subject: String,
  lines:   Vec<String>,
}

impl NotificationQueue {
  pub fn new(subject: impl Into<String>) -> Self {
    Self {
      subject: subject.into(),
      lines:   Vec::new(),
    }
  }

  pub fn push(&mut self, line: impl Into<String>) {
    self.lines.push(line.into());
  }

  pub fn is_empty(&self) -> bool { self.lines.is_empty() }

  /// Sends the queued lines as one message. Does nothing when the queue is
  /// empty; logs and swallows delivery failures.
  pub async fn flush(self, notifier: &impl Notify) {
    let Self { subject, mut lines } = self;
    if lines.is_empty() {
      return;
    }
    if lines.len() > MAX_LINES {
      let dropped = lines.len() - MAX_LINES;
      lines.truncate(MAX_LINES);
      lines.push(format!("... and {dropped} more"));
    }
    if let Err(e) = notifier.send(subject, lines.join("\n")).await {
      warn!(error = %e, "notification delivery failed");
    }
  }
}
