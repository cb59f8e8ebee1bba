//! Turns replies to conversation emails into conversation messages.
//!
//! A reply addressed to `replytomessage<N>@<domain>` becomes a new
//! message in N's conversation, written by whoever received N. The
//! reply is then forwarded to N's sender from the new message's own
//! reply address so the thread can continue by email.

use anyhow::Result;
use rusqlite::Connection;

use super::address::{parse_reply_address, reply_address};
use super::{Email, MailSettings, Mailer};
use crate::models::{Message, User};
use crate::resource::{Resource, ResourceError, Session};

/// A stored reply and the email that forwards it.
#[derive(Debug)]
pub struct Relayed {
    pub message: Message,
    pub forward: Option<Email>,
}

/// Store `email` as a reply to the message its recipient address points
/// at. Returns `None` when there is no such message.
pub fn store_reply(
    conn: &mut Connection,
    settings: &MailSettings,
    email: &Email,
) -> Result<Option<Relayed>, ResourceError> {
    let Some(message_id) = parse_reply_address(&email.to_address, &settings.domain) else {
        tracing::warn!(
            "Received an email for {} which is not a reply address",
            email.to_address
        );
        return Ok(None);
    };
    let Some(original) = Message::find(conn, message_id)? else {
        tracing::warn!("Received an email for message {} which does not exist", message_id);
        return Ok(None);
    };

    let mut session = Session::begin(conn)?;
    let mut message = original.reply(email.new_content.clone());
    message.insert(&mut session)?;
    let original_sender = User::find(&session, original.sender_user_id)?;
    session.commit()?;
    tracing::info!(
        "Stored email reply as message {} in conversation {}",
        message.id,
        message.conversation_id
    );

    let Some(original_sender) = original_sender else {
        tracing::warn!("Message {} has no sender to forward to", original.id);
        return Ok(Some(Relayed {
            message,
            forward: None,
        }));
    };
    let forward = Email {
        from_address: reply_address(message.id, &settings.domain),
        to_address: original_sender.email,
        subject: email.subject.clone(),
        content: settings.append_conversation_link(&email.content, message.conversation_id),
        new_content: settings
            .append_conversation_link(&email.new_content, message.conversation_id),
    };
    Ok(Some(Relayed {
        message,
        forward: Some(forward),
    }))
}

/// Store an inbound email and forward it. Returns the id of the new
/// message, if one was created. Failing to send the forward is logged
/// and does not undo the stored message.
pub async fn relay(
    db: &tokio_rusqlite::Connection,
    mailer: &dyn Mailer,
    settings: &MailSettings,
    email: Email,
) -> Result<Option<i64>> {
    let call_settings = settings.clone();
    let relayed = db
        .call(move |conn| Ok(store_reply(conn, &call_settings, &email)))
        .await??;

    let Some(Relayed { message, forward }) = relayed else {
        return Ok(None);
    };
    if let Some(forward) = forward {
        if let Err(e) = mailer.send(&forward).await {
            tracing::error!("Failed to forward email to {}: {}", forward.to_address, e);
        }
    }
    Ok(Some(message.id))
}
