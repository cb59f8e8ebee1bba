use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::{Value, json};
use uuid::Uuid;

use super::is_administrator;
use crate::resource::{
    Filter, Permissions, Query, Resource, ResourceError, Session, payload,
};

const COLUMNS: &str = "id, name, email, is_administrator, api_key, active, date_created";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_administrator: bool,
    pub api_key: String,
    pub active: bool,
    pub date_created: String,
}

impl User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            is_administrator: row.get(3)?,
            api_key: row.get(4)?,
            active: row.get(5)?,
            date_created: row.get(6)?,
        })
    }

    fn new(name: &str, email: &str, is_administrator: bool) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            email: email.to_string(),
            is_administrator,
            api_key: Uuid::new_v4().to_string(),
            active: true,
            date_created: Utc::now().to_rfc3339(),
        }
    }

    /// Create a user outside of the API, e.g. to bootstrap the first
    /// administrator.
    pub fn create(
        conn: &Connection,
        name: &str,
        email: &str,
        is_administrator: bool,
    ) -> rusqlite::Result<Self> {
        let mut user = Self::new(name, email, is_administrator);
        conn.execute(
            &format!("INSERT INTO users ({COLUMNS}) VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                user.name,
                user.email,
                user.is_administrator,
                user.api_key,
                user.active,
                user.date_created
            ],
        )?;
        user.id = conn.last_insert_rowid();
        Ok(user)
    }

    /// Only active users can authenticate.
    pub fn find_by_api_key(conn: &Connection, api_key: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE api_key = ?1 AND active = 1"),
            [api_key],
            Self::from_row,
        )
        .optional()
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.name.trim().is_empty() {
            return Err(ResourceError::validation("Name must not be empty"));
        }
        if !self.email.contains('@') {
            return Err(ResourceError::validation("Invalid email address"));
        }
        Ok(())
    }
}

impl Resource for User {
    const NAME: &'static str = "users";
    const PERMISSIONS: Permissions = Permissions {
        all_can_read_many: false,
        standard_can_read_many: true,
    };
    const FILTERS: &'static [Filter] = &[
        Filter::text("name", "name"),
        Filter::text("email", "email"),
        Filter::boolean("is_administrator", "is_administrator"),
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
        is_administrator(requester) || requester.is_some_and(|user| user.id == self.id)
    }

    fn has_standard_rights(&self, requester: Option<&User>) -> bool {
        requester.is_some() && self.active
    }

    fn has_add_rights(
        _conn: &Connection,
        _data: &Value,
        requester: Option<&User>,
    ) -> Result<bool, ResourceError> {
        Ok(is_administrator(requester))
    }

    fn admin_serialize(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "is_administrator": self.is_administrator,
            "api_key": self.api_key,
            "active": self.active,
            "date_created": self.date_created,
        })
    }

    fn standard_serialize(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
        })
    }

    fn find(conn: &Connection, id: i64) -> Result<Option<Self>, ResourceError> {
        Ok(conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?)
    }

    fn select(conn: &Connection, query: &Query) -> Result<Vec<Self>, ResourceError> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM users{} ORDER BY id",
            query.where_clause()
        ))?;
        let users = stmt
            .query_map(params_from_iter(query.values()), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn admin_deserialize_add(data: &Value) -> Result<Self, ResourceError> {
        let user = Self::new(
            &payload::required_str(data, "name")?,
            &payload::required_str(data, "email")?,
            payload::optional_bool(data, "is_administrator")?.unwrap_or(false),
        );
        user.validate()?;
        Ok(user)
    }

    fn admin_deserialize_update(&mut self, data: &Value) -> Result<(), ResourceError> {
        payload::unchanged(
            "is_administrator",
            &self.is_administrator,
            payload::optional_bool(data, "is_administrator")?,
        )?;
        payload::unchanged(
            "api_key",
            &self.api_key,
            payload::optional_str(data, "api_key")?,
        )?;
        if let Some(name) = payload::optional_str(data, "name")? {
            self.name = name;
        }
        if let Some(email) = payload::optional_str(data, "email")? {
            self.email = email;
        }
        self.validate()
    }

    fn insert(&mut self, session: &mut Session) -> Result<(), ResourceError> {
        self.id = session.insert(
            &format!("INSERT INTO users ({COLUMNS}) VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                self.name,
                self.email,
                self.is_administrator,
                self.api_key,
                self.active,
                self.date_created
            ],
        )?;
        Ok(())
    }

    fn save(&self, session: &mut Session) -> Result<(), ResourceError> {
        session.write(
            "UPDATE users SET name = ?1, email = ?2, active = ?3
             WHERE id = ?4 AND (name IS NOT ?1 OR email IS NOT ?2 OR active IS NOT ?3)",
            params![self.name, self.email, self.active, self.id],
        )?;
        Ok(())
    }
}
