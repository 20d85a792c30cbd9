//! Post the outcome of a run to a Slack incoming webhook.

use crate::report::{Outcome, Summary};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

pub const COLOR_PASSED: &str = "#0BF712";
pub const COLOR_FAILED: &str = "#FF2D00";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Request to slack failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Request to slack returned an error {status}, the response is:\n{body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
}

pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    channel: Option<String>,
    username: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: String, channel: Option<String>, username: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            channel,
            username,
        }
    }

    pub fn message(&self, pipeline: &str, summary: &Summary) -> Message {
        let (verdict, color) = if summary.all_passed() {
            ("passed", COLOR_PASSED)
        } else {
            ("failed", COLOR_FAILED)
        };
        let text = summary
            .jobs
            .iter()
            .map(|job| {
                let outcome = match &job.outcome {
                    Outcome::Passed => "passed".to_string(),
                    Outcome::Failed { exit_code } => format!("failed (exit {})", exit_code),
                    Outcome::Error(reason) => format!("error: {}", reason),
                };
                format!("*{}*: {}", job.name, outcome)
            })
            .collect::<Vec<_>>()
            .join("\n");
        Message {
            channel: self.channel.clone(),
            username: self.username.clone(),
            text: format!("*{} {}*", pipeline, verdict),
            attachments: vec![Attachment {
                text,
                color: color.to_string(),
            }],
        }
    }

    pub async fn notify(&self, pipeline: &str, summary: &Summary) -> Result<(), NotifyError> {
        let message = self.message(pipeline, summary);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status, body });
        }
        debug!("posted run summary to slack");
        Ok(())
    }
}

/// Post the run's outcome if a notifier is configured, then return the run's exit code.
///
/// A failed notification is reported but never changes the exit code.
pub async fn conclude(
    notifier: Option<&SlackNotifier>,
    pipeline: &str,
    summary: &Summary,
) -> i32 {
    if let Some(notifier) = notifier {
        if let Err(err) = notifier.notify(pipeline, summary).await {
            error!(%err, "slack notification failed");
            eprintln!("error: {}", err);
        }
    }
    summary.exit_code()
}
