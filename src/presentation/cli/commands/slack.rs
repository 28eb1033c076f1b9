use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::application::services::deployment_service::{DeploymentLoader, DeploymentSources};
use crate::common::context::AppContext;
use crate::infrastructure::http::slack::{DeploymentSlacker, SlackAttachment, SlackMessage};

/// Post a plain Slack message
pub struct SlackPostCommand {
    pub text: String,
    pub webhook: Option<String>,
    pub channel: Option<String>,
    pub attachment: Option<String>,
    pub color: Option<String>,
}

impl SlackPostCommand {
    pub fn new(text: String, webhook: Option<String>) -> Self {
        Self {
            text,
            webhook,
            channel: None,
            attachment: None,
            color: None,
        }
    }

    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_attachment(mut self, attachment: Option<String>, color: Option<String>) -> Self {
        self.attachment = attachment;
        self.color = color;
        self
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let notifier = context.slack_notifier(self.webhook.as_deref())?;
        let settings = &context.config().slack;

        let mut message = SlackMessage::new(&self.text);
        message.channel = self.channel.clone().or_else(|| settings.channel.clone());
        message.username = settings.username.clone();
        message.icon_url = settings.icon_url.clone();
        if let Some(text) = &self.attachment {
            let mut attachment = SlackAttachment::new(text).with_text(text);
            attachment.color = self.color.clone();
            message.add_attachment(attachment);
        }

        notifier.send(&mut message).await?;
        println!("{} Posted to Slack", "✓".green());
        Ok(())
    }
}

/// Post the deployment banner with a text file attached
pub struct SlackFileCommand {
    pub path: PathBuf,
    pub webhook: Option<String>,
}

impl SlackFileCommand {
    pub fn new(path: PathBuf, webhook: Option<String>) -> Self {
        Self { path, webhook }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let mut slacker = deployment_slacker(context, self.webhook.as_deref()).await?;
        slacker.send_text_file(&self.path).await?;
        println!("{} Posted {} to Slack", "✓".green(), self.path.display());
        Ok(())
    }
}

/// Post the deployment banner with the agent logs attached
pub struct SlackLogsCommand {
    pub dir: PathBuf,
    pub webhook: Option<String>,
}

impl SlackLogsCommand {
    pub fn new(dir: PathBuf, webhook: Option<String>) -> Self {
        Self { dir, webhook }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let mut slacker = deployment_slacker(context, self.webhook.as_deref()).await?;
        let count = slacker.send_agent_logs(&self.dir).await?;
        println!("{} Posted {} log file(s) to Slack", "✓".green(), count);
        Ok(())
    }
}

async fn deployment_slacker(context: &AppContext, webhook: Option<&str>) -> Result<DeploymentSlacker> {
    let notifier = context.slack_notifier(webhook)?;
    let system = context.system_commands().with_echo(false);
    let deployment = DeploymentLoader::new()
        .load(&DeploymentSources::from_env(), &system)
        .await?;
    let mut slacker = DeploymentSlacker::new(notifier, &deployment)?;

    let settings = &context.config().slack;
    let message = slacker.message_mut();
    if message.channel.is_none() {
        message.channel = settings.channel.clone();
    }
    message.username = settings.username.clone();
    message.icon_url = settings.icon_url.clone();
    Ok(slacker)
}
