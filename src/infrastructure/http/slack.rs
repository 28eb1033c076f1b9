use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;
use crate::domain::entities::deployment::Deployment;

pub const DEFAULT_AGENT_LOG_DIR: &str = "/opt/cons3rt-agent/log";
pub const SLACK_CHANNEL_PROPERTY: &str = "SLACK_CHANNEL";
pub const ATTACHMENT_COLOR: &str = "#9400D3";
/// Attachments carry at most this many trailing characters of a file.
pub const ATTACHMENT_TAIL_CHARS: usize = 7000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<SlackAttachment>,
}

impl SlackMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }

    pub fn with_icon_emoji(mut self, icon_emoji: impl Into<String>) -> Self {
        self.icon_emoji = Some(icon_emoji.into());
        self
    }

    pub fn add_attachment(&mut self, attachment: SlackAttachment) {
        debug!("Added attachment: {}", attachment.fallback);
        self.attachments.push(attachment);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackAttachment {
    pub fallback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SlackField>,
}

impl SlackAttachment {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attachment showing the tail of a text file.
    pub fn from_file_text(text: &str) -> Self {
        let tail = tail_chars(text, ATTACHMENT_TAIL_CHARS);
        Self::new(tail).with_text(tail).with_color(ATTACHMENT_COLOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

/// Last `n` characters of `text`.
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    text.char_indices()
        .rev()
        .nth(n - 1)
        .map_or(text, |(index, _)| &text[index..])
}

/// Posts messages to a Slack incoming webhook.
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: Url,
}

impl SlackNotifier {
    pub fn new(webhook_url: &str) -> Cons3rtResult<Self> {
        let webhook_url = Url::parse(webhook_url).map_err(|e| {
            Cons3rtError::validation_error("webhook_url", e.to_string(), Some(webhook_url.to_string()))
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Cons3rtError::network_error_with_source("Unable to build HTTP client", None, e))?;
        Ok(Self { http, webhook_url })
    }

    /// Posts `message`; its attachments are cleared whether or not the post
    /// went through.
    pub async fn send(&self, message: &mut SlackMessage) -> Cons3rtResult<()> {
        debug!("Slack payload: {}", serde_json::to_string(message)?);
        let sent = self
            .http
            .post(self.webhook_url.clone())
            .json(message)
            .send()
            .await;
        message.attachments.clear();

        let response = sent.map_err(|e| {
            error!("There was a problem posting to Slack: {}", e);
            Cons3rtError::network_error_with_source(
                "There was a problem posting to Slack",
                Some(self.webhook_url.to_string()),
                e,
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("Slack post failed with code: {}", status);
            return Err(Cons3rtError::network_error_with_status(
                format!("Slack post failed with code {status}"),
                Some(self.webhook_url.to_string()),
                status.as_u16(),
            ));
        }
        debug!("Posted message to Slack successfully");
        Ok(())
    }
}

/// Slack messages describing one deployment run host.
pub struct DeploymentSlacker {
    notifier: SlackNotifier,
    message: SlackMessage,
}

impl DeploymentSlacker {
    pub fn new(notifier: SlackNotifier, deployment: &Deployment) -> Cons3rtResult<Self> {
        let run_name = deployment.run_name().ok_or_else(|| {
            Cons3rtError::deployment_error("Deployment run name not found in deployment properties")
        })?;
        let run_id = deployment.run_id().ok_or_else(|| {
            Cons3rtError::deployment_error("Deployment run ID not found in deployment properties")
        })?;

        let mut message = SlackMessage::new(format!(
            "Run: {} (ID: {})\nHost: *{}*",
            run_name, run_id, deployment.role_name
        ));
        message.channel = deployment
            .properties()
            .get_exact(SLACK_CHANNEL_PROPERTY)
            .map(str::to_string);
        Ok(Self { notifier, message })
    }

    pub fn message(&self) -> &SlackMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut SlackMessage {
        &mut self.message
    }

    pub async fn send(&mut self) -> Cons3rtResult<()> {
        self.notifier.send(&mut self.message).await
    }

    /// Sends the message with the tail of `path` attached.
    pub async fn send_text_file(&mut self, path: &Path) -> Cons3rtResult<()> {
        if !path.is_file() {
            return Err(Cons3rtError::validation_error(
                "text_file",
                "not found or not a file",
                Some(path.display().to_string()),
            ));
        }
        info!("Sending a Slack message with the contents of {}", path.display());
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Cons3rtError::filesystem_error_with_source("Unable to read file", Some(path.to_path_buf()), e)
        })?;
        self.message
            .add_attachment(SlackAttachment::from_file_text(&String::from_utf8_lossy(&bytes)));
        self.send().await
    }

    /// Sends the message with one attachment per regular file in `log_dir`.
    /// Unreadable files are skipped.
    pub async fn send_agent_logs(&mut self, log_dir: &Path) -> Cons3rtResult<usize> {
        debug!("Searching for log files in {}", log_dir.display());
        let mut entries = tokio::fs::read_dir(log_dir).await.map_err(|e| {
            Cons3rtError::filesystem_error_with_source(
                "Unable to read agent log directory",
                Some(log_dir.to_path_buf()),
                e,
            )
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut attached = 0;
        for path in paths {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    info!("Adding Slack attachment with agent log file {}", path.display());
                    self.message
                        .add_attachment(SlackAttachment::from_file_text(&String::from_utf8_lossy(&bytes)));
                    attached += 1;
                }
                Err(e) => warn!("There was a problem opening file {}: {}", path.display(), e),
            }
        }
        self.send().await?;
        Ok(attached)
    }
}
