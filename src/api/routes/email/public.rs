//! Public types for the inbound email webhook
use serde::Deserialize;

use crate::mail::Email;

/// Form fields Mailgun posts for a received email. Every field is
/// optional so a partial form still reaches signature verification.
#[derive(Debug, Default, Deserialize)]
pub struct InboundEmailForm {
    pub recipient: Option<String>,
    pub to: Option<String>,
    pub sender: Option<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "body-plain")]
    pub body_plain: Option<String>,
    // The reply without quoted text or signature
    #[serde(rename = "stripped-text")]
    pub stripped_text: Option<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub signature: String,
}

impl InboundEmailForm {
    pub fn into_email(self) -> Email {
        let content = self.body_plain.unwrap_or_default();
        let new_content = self
            .stripped_text
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| content.clone());
        Email {
            from_address: self.sender.or(self.from).unwrap_or_default(),
            to_address: self.recipient.or(self.to).unwrap_or_default(),
            subject: self.subject.unwrap_or_default(),
            content,
            new_content,
        }
    }
}
