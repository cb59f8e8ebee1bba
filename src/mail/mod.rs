//! Outbound mail and the inbound email bridge.

pub mod address;
pub mod bridge;
mod local;
mod mailgun;
pub mod verify;

pub use local::{LogMailer, QueueMailer};
pub use mailgun::MailgunMailer;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::core::{AppConfig, MailerKind};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from_address: String,
    pub to_address: String,
    pub subject: String,
    pub content: String,
    /// Only the text the sender wrote, without quoted history.
    pub new_content: String,
}

/// Notification about a new conversation message, queued during a
/// transaction and turned into an [`Email`] once it has committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub message_id: i64,
    pub conversation_id: i64,
    pub to_address: String,
    pub subject: String,
    pub content: String,
}

/// What is needed to address and link conversation emails.
#[derive(Clone, Debug)]
pub struct MailSettings {
    pub domain: String,
    pub base_url: String,
}

impl From<&AppConfig> for MailSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            domain: config.mailgun_domain.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

impl MailSettings {
    pub fn conversation_link(&self, conversation_id: i64) -> String {
        format!(
            "{}/#/conversation/{}",
            self.base_url.trim_end_matches('/'),
            conversation_id
        )
    }

    pub fn append_conversation_link(&self, content: &str, conversation_id: i64) -> String {
        format!(
            "{}\n\nView the whole conversation at {}",
            content,
            self.conversation_link(conversation_id)
        )
    }
}

impl Notice {
    /// Replies to the email land on the message this notice is about.
    pub fn into_email(self, settings: &MailSettings) -> Email {
        let content = settings.append_conversation_link(&self.content, self.conversation_id);
        Email {
            from_address: address::reply_address(self.message_id, &settings.domain),
            to_address: self.to_address,
            subject: self.subject,
            content: content.clone(),
            new_content: content,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

pub fn mailer_for(config: &AppConfig) -> Arc<dyn Mailer> {
    match config.mailer {
        MailerKind::Mailgun => Arc::new(MailgunMailer::new(
            &config.mailgun_api_url,
            &config.mailgun_domain,
            &config.mailgun_api_key,
        )),
        MailerKind::Queue => Arc::new(QueueMailer::default()),
        MailerKind::Log => Arc::new(LogMailer),
    }
}

/// Send committed notices. Delivery failures are logged and otherwise
/// ignored since the change they describe is already stored.
pub async fn deliver(mailer: &dyn Mailer, settings: &MailSettings, notices: Vec<Notice>) {
    for notice in notices {
        let email = notice.into_email(settings);
        if let Err(e) = mailer.send(&email).await {
            tracing::error!("Failed to send email to {}: {}", email.to_address, e);
        }
    }
}
