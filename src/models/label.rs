use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::{Value, json};

use super::{User, is_administrator};
use crate::resource::{
    Filter, Permissions, Query, Resource, ResourceError, Session, payload,
};

/// Public tag attached to profiles. Anyone, signed in or not, can see
/// active labels. Only administrators manage them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

impl Label {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            active: row.get(2)?,
        })
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.name.trim().is_empty() {
            return Err(ResourceError::validation("Name must not be empty"));
        }
        Ok(())
    }
}

impl Resource for Label {
    const NAME: &'static str = "labels";
    const PERMISSIONS: Permissions = Permissions {
        all_can_read_many: true,
        standard_can_read_many: true,
    };
    const FILTERS: &'static [Filter] = &[
        Filter::text("name", "name"),
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
    }

    fn has_standard_rights(&self, _requester: Option<&User>) -> bool {
        self.active
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
            "active": self.active,
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
                "SELECT id, name, active FROM labels WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?)
    }

    fn select(conn: &Connection, query: &Query) -> Result<Vec<Self>, ResourceError> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, active FROM labels{} ORDER BY name",
            query.where_clause()
        ))?;
        let labels = stmt
            .query_map(params_from_iter(query.values()), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn admin_deserialize_add(data: &Value) -> Result<Self, ResourceError> {
        let label = Self {
            id: 0,
            name: payload::required_str(data, "name")?,
            active: true,
        };
        label.validate()?;
        Ok(label)
    }

    fn admin_deserialize_update(&mut self, data: &Value) -> Result<(), ResourceError> {
        if let Some(name) = payload::optional_str(data, "name")? {
            self.name = name;
        }
        self.validate()
    }

    fn insert(&mut self, session: &mut Session) -> Result<(), ResourceError> {
        self.id = session.insert(
            "INSERT INTO labels (name, active) VALUES (?1, ?2)",
            params![self.name, self.active],
        )?;
        Ok(())
    }

    fn save(&self, session: &mut Session) -> Result<(), ResourceError> {
        session.write(
            "UPDATE labels SET name = ?1, active = ?2
             WHERE id = ?3 AND (name IS NOT ?1 OR active IS NOT ?2)",
            params![self.name, self.active, self.id],
        )?;
        Ok(())
    }
}
