use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::{Value, json};

use super::{User, is_administrator};
use crate::resource::{
    Filter, Permissions, Query, Resource, ResourceError, Session, payload,
};

const COLUMNS: &str = "id, title, creator_user_id, other_user_id, datetime_created, active";

/// A thread between exactly two users. The creator administers it,
/// the other participant can read it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub creator_user_id: i64,
    pub other_user_id: i64,
    pub datetime_created: String,
    pub active: bool,
}

impl Conversation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            creator_user_id: row.get(2)?,
            other_user_id: row.get(3)?,
            datetime_created: row.get(4)?,
            active: row.get(5)?,
        })
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.creator_user_id == user_id || self.other_user_id == user_id
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.creator_user_id == self.other_user_id {
            return Err(ResourceError::validation(
                "A conversation needs two different participants",
            ));
        }
        Ok(())
    }
}

impl Resource for Conversation {
    const NAME: &'static str = "conversations";
    const PERMISSIONS: Permissions = Permissions {
        all_can_read_many: false,
        standard_can_read_many: true,
    };
    const FILTERS: &'static [Filter] = &[
        Filter::integer("creator_user_id", "creator_user_id"),
        Filter::integer("other_user_id", "other_user_id"),
        Filter::boolean("active", "active"),
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
            || requester.is_some_and(|user| user.id == self.creator_user_id)
    }

    fn has_standard_rights(&self, requester: Option<&User>) -> bool {
        self.active && requester.is_some_and(|user| self.is_participant(user.id))
    }

    /// Users can only start conversations in their own name.
    fn has_add_rights(
        _conn: &Connection,
        data: &Value,
        requester: Option<&User>,
    ) -> Result<bool, ResourceError> {
        let creator = data.get("creator_user_id").and_then(payload::as_id);
        Ok(requester.is_some_and(|user| creator == Some(user.id)))
    }

    fn admin_serialize(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "creator_user_id": self.creator_user_id,
            "other_user_id": self.other_user_id,
            "datetime_created": self.datetime_created,
            "active": self.active,
        })
    }

    fn standard_serialize(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "creator_user_id": self.creator_user_id,
            "other_user_id": self.other_user_id,
            "datetime_created": self.datetime_created,
        })
    }

    fn find(conn: &Connection, id: i64) -> Result<Option<Self>, ResourceError> {
        Ok(conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?)
    }

    fn select(conn: &Connection, query: &Query) -> Result<Vec<Self>, ResourceError> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM conversations{} ORDER BY id",
            query.where_clause()
        ))?;
        let conversations = stmt
            .query_map(params_from_iter(query.values()), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(conversations)
    }

    fn admin_deserialize_add(data: &Value) -> Result<Self, ResourceError> {
        let conversation = Self {
            id: 0,
            title: payload::optional_str(data, "title")?.unwrap_or_default(),
            creator_user_id: payload::required_id(data, "creator_user_id")?,
            other_user_id: payload::required_id(data, "other_user_id")?,
            datetime_created: Utc::now().to_rfc3339(),
            active: true,
        };
        conversation.validate()?;
        Ok(conversation)
    }

    fn admin_deserialize_update(&mut self, data: &Value) -> Result<(), ResourceError> {
        payload::unchanged(
            "creator_user_id",
            &self.creator_user_id,
            payload::optional_id(data, "creator_user_id")?,
        )?;
        payload::unchanged(
            "other_user_id",
            &self.other_user_id,
            payload::optional_id(data, "other_user_id")?,
        )?;
        if let Some(title) = payload::optional_str(data, "title")? {
            self.title = title;
        }
        Ok(())
    }

    fn insert(&mut self, session: &mut Session) -> Result<(), ResourceError> {
        self.id = session.insert(
            &format!("INSERT INTO conversations ({COLUMNS}) VALUES (NULL, ?1, ?2, ?3, ?4, ?5)"),
            params![
                self.title,
                self.creator_user_id,
                self.other_user_id,
                self.datetime_created,
                self.active
            ],
        )?;
        Ok(())
    }

    fn save(&self, session: &mut Session) -> Result<(), ResourceError> {
        session.write(
            "UPDATE conversations SET title = ?1, active = ?2
             WHERE id = ?3 AND (title IS NOT ?1 OR active IS NOT ?2)",
            params![self.title, self.active, self.id],
        )?;
        Ok(())
    }
}
