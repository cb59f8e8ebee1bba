use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;

use super::{Email, Mailer};

/// Sends email through the Mailgun messages API.
pub struct MailgunMailer {
    client: Client,
    api_url: String,
    domain: String,
    api_key: String,
}

impl MailgunMailer {
    pub fn new(api_url: &str, domain: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            domain: domain.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_url, self.domain)
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let form = [
            ("from", email.from_address.as_str()),
            ("to", email.to_address.as_str()),
            ("subject", email.subject.as_str()),
            ("text", email.content.as_str()),
        ];
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to reach Mailgun at {}", self.api_url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Mailgun responded with {}: {}", status, body));
        }
        tracing::debug!("Sent email to {} via Mailgun", email.to_address);
        Ok(())
    }
}
