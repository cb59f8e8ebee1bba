//! Mailers that never leave the process.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{Email, Mailer};

/// Writes emails to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            "Email from {} to {} with subject \"{}\":\n{}",
            email.from_address,
            email.to_address,
            email.subject,
            email.content
        );
        Ok(())
    }
}

/// Keeps sent emails in memory. Clones share the same queue.
#[derive(Clone, Default)]
pub struct QueueMailer {
    queue: Arc<Mutex<Vec<Email>>>,
}

impl QueueMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.queue
            .lock()
            .map(|queue| queue.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for QueueMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        self.queue
            .lock()
            .map_err(|_| anyhow!("Mail queue lock poisoned"))?
            .push(email.clone());
        Ok(())
    }
}
