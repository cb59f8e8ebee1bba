use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::{Value, json};

use super::{Conversation, User, is_administrator};
use crate::mail::Notice;
use crate::resource::{
    Filter, Permissions, Query, Resource, ResourceError, Session, payload,
};

const SELECT: &str = "SELECT m.id, m.conversation_id, m.sender_user_id, m.content,
        m.datetime_created, m.active, c.creator_user_id, c.other_user_id
    FROM messages m
    JOIN conversations c ON c.id = m.conversation_id";

/// A single message in a conversation. Messages are never edited once
/// written, only soft deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_user_id: i64,
    pub content: String,
    pub datetime_created: String,
    pub active: bool,
    // (creator, other) of the conversation, loaded alongside the message
    participants: (i64, i64),
}

impl Message {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_user_id: row.get(2)?,
            content: row.get(3)?,
            datetime_created: row.get(4)?,
            active: row.get(5)?,
            participants: (row.get(6)?, row.get(7)?),
        })
    }

    fn new(conversation_id: i64, sender_user_id: i64, content: String) -> Self {
        Self {
            id: 0,
            conversation_id,
            sender_user_id,
            content,
            datetime_created: Utc::now().to_rfc3339(),
            active: true,
            participants: (0, 0),
        }
    }

    /// The participant who did not send this message.
    pub fn receiver_user_id(&self) -> i64 {
        let (creator, other) = self.participants;
        if self.sender_user_id == creator {
            other
        } else {
            creator
        }
    }

    fn is_participant(&self, user_id: i64) -> bool {
        self.participants.0 == user_id || self.participants.1 == user_id
    }

    /// An unsaved answer to this message, sent by its receiver.
    pub fn reply(&self, content: String) -> Self {
        Self {
            participants: self.participants,
            ..Self::new(self.conversation_id, self.receiver_user_id(), content)
        }
    }
}

impl Resource for Message {
    const NAME: &'static str = "messages";
    const PERMISSIONS: Permissions = Permissions {
        all_can_read_many: false,
        standard_can_read_many: true,
    };
    const FILTERS: &'static [Filter] = &[
        Filter::integer("conversation_id", "m.conversation_id"),
        Filter::integer("sender_user_id", "m.sender_user_id"),
        Filter::boolean("active", "m.active"),
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn has_admin_rights(&self, requester: Option<&User>) -> bool {
        is_administrator(requester)
            || requester.is_some_and(|user| user.id == self.sender_user_id)
    }

    fn has_standard_rights(&self, requester: Option<&User>) -> bool {
        self.active && requester.is_some_and(|user| self.is_participant(user.id))
    }

    /// Only participants may post, and only as themselves.
    fn has_add_rights(
        conn: &Connection,
        data: &Value,
        requester: Option<&User>,
    ) -> Result<bool, ResourceError> {
        let Some(requester) = requester else {
            return Ok(false);
        };
        if data.get("sender_user_id").and_then(payload::as_id) != Some(requester.id) {
            return Ok(false);
        }
        let Some(conversation_id) = data.get("conversation_id").and_then(payload::as_id) else {
            return Ok(false);
        };
        Ok(Conversation::find(conn, conversation_id)?.is_some_and(|conversation| {
            conversation.active && conversation.is_participant(requester.id)
        }))
    }

    fn admin_serialize(&self) -> Value {
        json!({
            "id": self.id,
            "conversation_id": self.conversation_id,
            "sender_user_id": self.sender_user_id,
            "content": self.content,
            "datetime_created": self.datetime_created,
            "active": self.active,
        })
    }

    fn standard_serialize(&self) -> Value {
        json!({
            "id": self.id,
            "conversation_id": self.conversation_id,
            "sender_user_id": self.sender_user_id,
            "content": self.content,
            "datetime_created": self.datetime_created,
        })
    }

    fn find(conn: &Connection, id: i64) -> Result<Option<Self>, ResourceError> {
        Ok(conn
            .query_row(&format!("{SELECT} WHERE m.id = ?1"), [id], Self::from_row)
            .optional()?)
    }

    fn select(conn: &Connection, query: &Query) -> Result<Vec<Self>, ResourceError> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT}{} ORDER BY m.datetime_created, m.id",
            query.where_clause()
        ))?;
        let messages = stmt
            .query_map(params_from_iter(query.values()), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn admin_deserialize_add(data: &Value) -> Result<Self, ResourceError> {
        Ok(Self::new(
            payload::required_id(data, "conversation_id")?,
            payload::required_id(data, "sender_user_id")?,
            payload::required_str(data, "content")?,
        ))
    }

    fn admin_deserialize_update(&mut self, data: &Value) -> Result<(), ResourceError> {
        payload::unchanged(
            "conversation_id",
            &self.conversation_id,
            payload::optional_id(data, "conversation_id")?,
        )?;
        payload::unchanged(
            "sender_user_id",
            &self.sender_user_id,
            payload::optional_id(data, "sender_user_id")?,
        )?;
        payload::unchanged(
            "content",
            &self.content,
            payload::optional_str(data, "content")?,
        )
    }

    fn insert(&mut self, session: &mut Session) -> Result<(), ResourceError> {
        self.id = session.insert(
            "INSERT INTO messages
                (conversation_id, sender_user_id, content, datetime_created, active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.conversation_id,
                self.sender_user_id,
                self.content,
                self.datetime_created,
                self.active
            ],
        )?;
        self.participants = session.query_row(
            "SELECT creator_user_id, other_user_id FROM conversations WHERE id = ?1",
            [self.conversation_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(())
    }

    fn save(&self, session: &mut Session) -> Result<(), ResourceError> {
        session.write(
            "UPDATE messages SET active = ?1 WHERE id = ?2 AND active IS NOT ?1",
            params![self.active, self.id],
        )?;
        Ok(())
    }

    /// New messages are mailed to the receiver with a reply address
    /// pointing back at this message.
    fn on_edit(
        &self,
        session: &mut Session,
        _requester: Option<&User>,
        unchanged: bool,
    ) -> Result<(), ResourceError> {
        if unchanged || !self.active {
            return Ok(());
        }
        let sender = User::find(session, self.sender_user_id)?;
        let receiver = User::find(session, self.receiver_user_id())?;
        let (Some(sender), Some(receiver)) = (sender, receiver) else {
            tracing::warn!("Message {} has no sender or receiver to notify", self.id);
            return Ok(());
        };
        session.queue_notice(Notice {
            message_id: self.id,
            conversation_id: self.conversation_id,
            to_address: receiver.email,
            subject: format!("New message from {}", sender.name),
            content: self.content.clone(),
        });
        Ok(())
    }
}
