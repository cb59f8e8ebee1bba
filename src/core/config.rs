use std::env;

use anyhow::{Result, anyhow};

/// Which outbound mail backend the service talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailerKind {
    Mailgun,
    Queue,
    Log,
}

impl MailerKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_uppercase().as_str() {
            "MAILGUN" => Ok(Self::Mailgun),
            "QUEUE" => Ok(Self::Queue),
            "LOG" => Ok(Self::Log),
            other => Err(anyhow!("Unknown mailer type {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: String,
    // Used to build links back into the web app from emails
    pub base_url: String,
    pub mailer: MailerKind,
    pub mailgun_api_key: String,
    pub mailgun_domain: String,
    pub mailgun_api_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let storage_path = env::var("COMMONS_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = env::var("COMMONS_DB_PATH").unwrap_or(format!("{}/commons.db", storage_path));
        let base_url =
            env::var("COMMONS_BASE_URL").unwrap_or_else(|_| "http://localhost:2222".to_string());
        let mailer = match env::var("COMMONS_MAILER") {
            Ok(value) => MailerKind::parse(&value)?,
            Err(_) => MailerKind::Log,
        };
        let mailgun_domain =
            env::var("COMMONS_MAILGUN_DOMAIN").unwrap_or_else(|_| "localhost".to_string());
        let mailgun_api_url = env::var("COMMONS_MAILGUN_API_URL")
            .unwrap_or_else(|_| "https://api.mailgun.net/v3".to_string());
        let mailgun_api_key = match (mailer, env::var("COMMONS_MAILGUN_API_KEY")) {
            (_, Ok(key)) => key,
            (MailerKind::Mailgun, Err(_)) => {
                return Err(anyhow!("Missing env var COMMONS_MAILGUN_API_KEY"));
            }
            (_, Err(_)) => String::new(),
        };

        Ok(Self {
            db_path,
            base_url,
            mailer,
            mailgun_api_key,
            mailgun_domain,
            mailgun_api_url,
        })
    }

    /// Inbound webhooks are only signed by Mailgun so verification is
    /// skipped for every other mailer.
    pub fn requires_signed_webhooks(&self) -> bool {
        self.mailer == MailerKind::Mailgun
    }
}
