//! The request pipeline shared by every resource type.
//!
//! Each operation authenticates, authorizes, acts and shapes the
//! response, in that order, and opens at most one write transaction.
//! They are synchronous and meant to run inside a single
//! `tokio_rusqlite::Connection::call`.

use rusqlite::Connection;
use serde_json::Value;

use super::shape::{self, Reply, Status, Tier};
use super::{QueryParams, Resource, ResourceError, Session, payload};
use crate::models::{User, is_administrator};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No requesting user
    #[error("Authorization failed")]
    NotAuthenticated,
    /// A requesting user without the needed rights
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Malformed(String),
    // Never shown to clients, see `Display`
    #[error("Server error")]
    Persistence(#[source] rusqlite::Error),
}

impl GatewayError {
    pub fn bad_request() -> Self {
        Self::Malformed(String::from("Bad request"))
    }

    pub fn status(&self) -> Status {
        match self {
            Self::NotAuthenticated => Status::NotAuthorized,
            Self::Forbidden => Status::Forbidden,
            Self::NotFound => Status::NotFound,
            Self::Malformed(_) => Status::BadRequest,
            Self::Persistence(_) => Status::ServerError,
        }
    }
}

impl From<ResourceError> for GatewayError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Validation(message) => Self::Malformed(message),
            ResourceError::Persistence(err) => Self::Persistence(err),
        }
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err)
    }
}

pub type GatewayResult = Result<Reply, GatewayError>;

fn parse_id(raw: &str) -> Result<i64, GatewayError> {
    raw.parse().map_err(|_| GatewayError::bad_request())
}

pub fn list_items<R: Resource>(
    conn: &Connection,
    requester: Option<&User>,
    params: &QueryParams,
) -> GatewayResult {
    tracing::debug!("list_items - {}", R::NAME);
    let permissions = R::PERMISSIONS;
    if requester.is_none() && !permissions.all_can_read_many {
        return Err(GatewayError::NotAuthenticated);
    }

    let body = if is_administrator(requester) {
        let query = R::args_to_query(params, requester)?;
        shape::admin_many(&R::select(conn, &query)?)
    } else {
        if !permissions.can_read_many() {
            return Err(GatewayError::Forbidden);
        }
        let query = R::args_to_query(params, requester)?;
        shape::mixed_many(&R::select(conn, &query)?, requester)
    };
    Ok(Reply::ok(body))
}

pub fn get_item<R: Resource>(
    conn: &Connection,
    requester: Option<&User>,
    id: &str,
) -> GatewayResult {
    let requester = requester.ok_or(GatewayError::NotAuthenticated)?;
    let id = parse_id(id)?;
    let item = R::find(conn, id)?.ok_or(GatewayError::NotFound)?;
    let body = match shape::tier_for(&item, Some(requester)) {
        Some(Tier::Admin) => shape::admin_single(&item, None),
        Some(Tier::Standard) => shape::standard_single(&item),
        None => return Err(GatewayError::Forbidden),
    };
    Ok(Reply::ok(body))
}

pub fn add_item<R: Resource>(
    conn: &mut Connection,
    requester: Option<&User>,
    data: &Value,
) -> GatewayResult {
    tracing::debug!("add_item - {}: requester = {:?}", R::NAME, requester.map(|u| u.id));
    if !R::has_add_rights(conn, data, requester)? {
        return Err(match requester {
            None => GatewayError::NotAuthenticated,
            Some(_) => GatewayError::Forbidden,
        });
    }

    let mut item = R::admin_deserialize_add(data)?;
    let mut session = Session::begin(conn)?;
    item.insert(&mut session)?;
    item.on_edit(&mut session, requester, false)?;
    let outbox = session.commit()?;

    // Persistence may fill in defaults so respond with what was stored
    let refreshed = R::find(conn, item.id())?.ok_or(GatewayError::NotFound)?;
    let body = if refreshed.has_admin_rights(requester) {
        let user = match requester {
            Some(requester) => User::find(conn, requester.id)?,
            None => None,
        };
        shape::admin_single(&refreshed, user.as_ref())
    } else {
        shape::standard_single(&refreshed)
    };
    Ok(Reply::ok(body).with_outbox(outbox))
}

pub fn edit_item<R: Resource>(
    conn: &mut Connection,
    requester: Option<&User>,
    id: &str,
    data: &Value,
) -> GatewayResult {
    let requester = requester.ok_or(GatewayError::NotAuthenticated)?;
    let id = parse_id(id)?;
    if let Some(data_id) = data.get("id").filter(|value| !value.is_null()) {
        if payload::as_id(data_id) != Some(id) {
            return Err(GatewayError::bad_request());
        }
    }

    let mut session = Session::begin(conn)?;
    let mut item = R::find(&session, id)?.ok_or(GatewayError::NotFound)?;
    if !item.has_admin_rights(Some(requester)) {
        return Err(GatewayError::Forbidden);
    }
    item.admin_deserialize_update(data)?;
    item.save(&mut session)?;
    // Any modified row in the transaction counts, not only this item's
    let unchanged = !session.is_dirty();
    tracing::debug!("calling on_edit on {} {} (unchanged = {})", R::NAME, id, unchanged);
    item.on_edit(&mut session, Some(requester), unchanged)?;
    let outbox = session.commit()?;

    Ok(Reply::ok(shape::admin_single(&item, None)).with_outbox(outbox))
}

/// Soft delete. Deleting an inactive item is a no-op that still
/// responds with the item.
pub fn delete_item<R: Resource>(
    conn: &mut Connection,
    requester: Option<&User>,
    id: &str,
) -> GatewayResult {
    let requester = requester.ok_or(GatewayError::NotAuthenticated)?;
    let id = parse_id(id)?;

    let mut session = Session::begin(conn)?;
    let mut item = R::find(&session, id)?.ok_or(GatewayError::NotFound)?;
    if !item.has_admin_rights(Some(requester)) {
        return Err(GatewayError::Forbidden);
    }
    let previously_deleted = !item.active();
    item.set_active(false);
    item.save(&mut session)?;
    if !previously_deleted {
        item.on_edit(&mut session, Some(requester), false)?;
    }
    let outbox = session.commit()?;

    Ok(Reply::ok(shape::admin_single(&item, None)).with_outbox(outbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::initialize_db;
    use crate::resource::{Filter, Permissions, Query};
    use rusqlite::OptionalExtension;
    use serde_json::json;

    /// Minimal resource that records every `on_edit` call.
    #[derive(Debug)]
    struct Widget {
        id: i64,
        owner_id: i64,
        name: String,
        public: bool,
        active: bool,
    }

    impl Widget {
        fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
            Ok(Self {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                public: row.get(3)?,
                active: row.get(4)?,
            })
        }
    }

    impl Resource for Widget {
        const NAME: &'static str = "widgets";
        const PERMISSIONS: Permissions = Permissions {
            all_can_read_many: true,
            standard_can_read_many: true,
        };
        const FILTERS: &'static [Filter] = &[Filter::integer("owner_id", "owner_id")];

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
            requester.is_some_and(|u| u.is_administrator || u.id == self.owner_id)
        }

        fn has_standard_rights(&self, requester: Option<&User>) -> bool {
            self.public || requester.is_some()
        }

        fn has_add_rights(
            _conn: &Connection,
            _data: &Value,
            requester: Option<&User>,
        ) -> Result<bool, ResourceError> {
            Ok(requester.is_some())
        }

        fn admin_serialize(&self) -> Value {
            json!({
                "id": self.id,
                "owner_id": self.owner_id,
                "name": self.name,
                "active": self.active,
            })
        }

        fn standard_serialize(&self) -> Value {
            json!({"id": self.id, "name": self.name})
        }

        fn find(conn: &Connection, id: i64) -> Result<Option<Self>, ResourceError> {
            Ok(conn
                .query_row(
                    "SELECT id, owner_id, name, public, active FROM widgets WHERE id = ?1",
                    [id],
                    Self::from_row,
                )
                .optional()?)
        }

        fn select(conn: &Connection, query: &Query) -> Result<Vec<Self>, ResourceError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, owner_id, name, public, active FROM widgets{} ORDER BY id",
                query.where_clause()
            ))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(query.values()), Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }

        fn admin_deserialize_add(data: &Value) -> Result<Self, ResourceError> {
            Ok(Self {
                id: 0,
                owner_id: payload::required_id(data, "owner_id")?,
                name: payload::required_str(data, "name")?,
                public: payload::optional_bool(data, "public")?.unwrap_or(false),
                active: true,
            })
        }

        fn admin_deserialize_update(&mut self, data: &Value) -> Result<(), ResourceError> {
            if let Some(name) = payload::optional_str(data, "name")? {
                self.name = name;
            }
            Ok(())
        }

        fn insert(&mut self, session: &mut Session) -> Result<(), ResourceError> {
            self.id = session.insert(
                "INSERT INTO widgets (owner_id, name, public, active) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![self.owner_id, self.name, self.public, self.active],
            )?;
            Ok(())
        }

        fn save(&self, session: &mut Session) -> Result<(), ResourceError> {
            session.write(
                "UPDATE widgets SET name = ?1, active = ?2
                 WHERE id = ?3 AND (name IS NOT ?1 OR active IS NOT ?2)",
                rusqlite::params![self.name, self.active, self.id],
            )?;
            Ok(())
        }

        fn on_edit(
            &self,
            session: &mut Session,
            _requester: Option<&User>,
            unchanged: bool,
        ) -> Result<(), ResourceError> {
            session.write(
                "INSERT INTO widget_edits (widget_id, unchanged) VALUES (?1, ?2)",
                rusqlite::params![self.id, unchanged],
            )?;
            Ok(())
        }
    }

    struct Fixture {
        conn: Connection,
        admin: User,
        owner: User,
        other: User,
    }

    fn fixture() -> Fixture {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize_db(&mut conn).unwrap();
        conn.execute_batch(
            "CREATE TABLE widgets (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 owner_id INTEGER NOT NULL,
                 name TEXT NOT NULL UNIQUE,
                 public INTEGER NOT NULL,
                 active INTEGER NOT NULL
             );
             CREATE TABLE widget_edits (widget_id INTEGER NOT NULL, unchanged INTEGER NOT NULL);",
        )
        .unwrap();
        let admin = User::create(&conn, "Ada", "ada@example.com", true).unwrap();
        let owner = User::create(&conn, "Olga", "olga@example.com", false).unwrap();
        let other = User::create(&conn, "Otto", "otto@example.com", false).unwrap();
        Fixture {
            conn,
            admin,
            owner,
            other,
        }
    }

    fn add_widget(f: &mut Fixture, name: &str, public: bool) -> i64 {
        let owner = f.owner.clone();
        let reply = add_item::<Widget>(
            &mut f.conn,
            Some(&owner),
            &json!({"owner_id": owner.id, "name": name, "public": public}),
        )
        .unwrap();
        reply.body.data.unwrap()["id"].as_i64().unwrap()
    }

    fn edits(conn: &Connection) -> Vec<bool> {
        let mut stmt = conn
            .prepare("SELECT unchanged FROM widget_edits ORDER BY rowid")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<bool>, _>>()
            .unwrap()
    }

    #[test]
    fn it_distinguishes_get_failures() {
        let mut f = fixture();
        let id = add_widget(&mut f, "gear", false);

        let err = get_item::<Widget>(&f.conn, None, &id.to_string()).unwrap_err();
        assert_eq!(err.status(), Status::NotAuthorized);

        let err = get_item::<Widget>(&f.conn, Some(&f.other), "abc").unwrap_err();
        assert_eq!(err.status(), Status::BadRequest);

        let err = get_item::<Widget>(&f.conn, Some(&f.other), "999").unwrap_err();
        assert_eq!(err.status(), Status::NotFound);

        let reply = get_item::<Widget>(&f.conn, Some(&f.other), &id.to_string()).unwrap();
        assert_eq!(reply.body.data, Some(json!({"id": id, "name": "gear"})));

        let reply = get_item::<Widget>(&f.conn, Some(&f.owner), &id.to_string()).unwrap();
        assert_eq!(reply.body.data.unwrap()["owner_id"], json!(f.owner.id));
    }

    #[test]
    fn it_calls_on_edit_once_when_deleting_twice() {
        let mut f = fixture();
        let id = add_widget(&mut f, "gear", false);
        let owner = f.owner.clone();

        let first = delete_item::<Widget>(&mut f.conn, Some(&owner), &id.to_string()).unwrap();
        assert_eq!(first.body.data.unwrap()["active"], json!(false));
        let second = delete_item::<Widget>(&mut f.conn, Some(&owner), &id.to_string()).unwrap();
        assert_eq!(second.status, Status::Ok);
        assert_eq!(second.body.data.unwrap()["active"], json!(false));

        // One call from the add, one from the first delete
        assert_eq!(edits(&f.conn), vec![false, false]);
    }

    #[test]
    fn it_forbids_deleting_without_admin_rights() {
        let mut f = fixture();
        let id = add_widget(&mut f, "gear", true);
        let other = f.other.clone();

        let err = delete_item::<Widget>(&mut f.conn, Some(&other), &id.to_string()).unwrap_err();
        assert_eq!(err.status(), Status::Forbidden);
        let active: bool = f
            .conn
            .query_row("SELECT active FROM widgets WHERE id = ?1", [id], |row| row.get(0))
            .unwrap();
        assert!(active);
    }

    #[test]
    fn it_forbids_updates_with_only_standard_rights() {
        let mut f = fixture();
        let id = add_widget(&mut f, "gear", true);
        let other = f.other.clone();

        let err = edit_item::<Widget>(
            &mut f.conn,
            Some(&other),
            &id.to_string(),
            &json!({"name": "cog"}),
        )
        .unwrap_err();
        assert_eq!(err.status(), Status::Forbidden);
    }

    #[test]
    fn it_reports_unchanged_updates() {
        let mut f = fixture();
        let id = add_widget(&mut f, "gear", true);
        let owner = f.owner.clone();

        edit_item::<Widget>(&mut f.conn, Some(&owner), &id.to_string(), &json!({"name": "gear"}))
            .unwrap();
        edit_item::<Widget>(&mut f.conn, Some(&owner), &id.to_string(), &json!({"name": "cog"}))
            .unwrap();

        assert_eq!(edits(&f.conn), vec![false, true, false]);
    }

    #[test]
    fn it_rejects_mismatched_payload_ids() {
        let mut f = fixture();
        let id = add_widget(&mut f, "gear", true);
        let owner = f.owner.clone();

        let err = edit_item::<Widget>(
            &mut f.conn,
            Some(&owner),
            &id.to_string(),
            &json!({"id": id + 1, "name": "cog"}),
        )
        .unwrap_err();
        assert_eq!(err.status(), Status::BadRequest);

        // A matching id, even as a string, is fine
        let reply = edit_item::<Widget>(
            &mut f.conn,
            Some(&owner),
            &id.to_string(),
            &json!({"id": id.to_string(), "name": "cog"}),
        )
        .unwrap();
        assert_eq!(reply.body.data.unwrap()["name"], json!("cog"));
    }

    #[test]
    fn it_lets_the_last_update_win() {
        let mut f = fixture();
        let id = add_widget(&mut f, "gear", true);
        let owner = f.owner.clone();
        let admin = f.admin.clone();

        edit_item::<Widget>(&mut f.conn, Some(&owner), &id.to_string(), &json!({"name": "cog"}))
            .unwrap();
        edit_item::<Widget>(
            &mut f.conn,
            Some(&admin),
            &id.to_string(),
            &json!({"name": "sprocket"}),
        )
        .unwrap();

        let widget = Widget::find(&f.conn, id).unwrap().unwrap();
        assert_eq!(widget.name, "sprocket");
    }

    #[test]
    fn it_rolls_back_on_validation_failure() {
        let mut f = fixture();
        let owner = f.owner.clone();

        let err = add_item::<Widget>(&mut f.conn, Some(&owner), &json!({"name": "gear"}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing field owner_id");
        assert!(edits(&f.conn).is_empty());
    }

    #[test]
    fn it_hides_storage_errors() {
        let mut f = fixture();
        add_widget(&mut f, "gear", true);
        let owner = f.owner.clone();

        let err = add_item::<Widget>(
            &mut f.conn,
            Some(&owner),
            &json!({"owner_id": owner.id, "name": "gear"}),
        )
        .unwrap_err();
        assert_eq!(err.status(), Status::ServerError);
        assert_eq!(err.to_string(), "Server error");
        // Only the first add reached on_edit
        assert_eq!(edits(&f.conn).len(), 1);
    }

    #[test]
    fn it_requires_a_requester_to_add() {
        let mut f = fixture();
        let err = add_item::<Widget>(&mut f.conn, None, &json!({"owner_id": 1, "name": "gear"}))
            .unwrap_err();
        assert_eq!(err.status(), Status::NotAuthorized);
    }

    #[test]
    fn it_embeds_the_requester_when_responding_to_admins() {
        let mut f = fixture();
        let owner = f.owner.clone();
        let reply = add_item::<Widget>(
            &mut f.conn,
            Some(&owner),
            &json!({"owner_id": owner.id, "name": "gear"}),
        )
        .unwrap();
        assert_eq!(reply.body.user.unwrap()["id"], json!(owner.id));

        // Someone adding a widget owned by another user only gets the
        // standard view back
        let other = f.other.clone();
        let reply = add_item::<Widget>(
            &mut f.conn,
            Some(&other),
            &json!({"owner_id": owner.id, "name": "cog"}),
        )
        .unwrap();
        assert_eq!(reply.body.user, None);
        assert!(reply.body.data.unwrap().get("owner_id").is_none());
    }

    #[test]
    fn it_mixes_tiers_for_non_administrators() {
        let mut f = fixture();
        let public = add_widget(&mut f, "gear", true);
        add_widget(&mut f, "cog", false);

        let reply = list_items::<Widget>(&f.conn, None, &QueryParams::new()).unwrap();
        assert_eq!(reply.body.data, Some(json!([{"id": public, "name": "gear"}])));

        let reply = list_items::<Widget>(&f.conn, Some(&f.other), &QueryParams::new()).unwrap();
        assert_eq!(reply.body.data.unwrap().as_array().unwrap().len(), 2);

        let reply = list_items::<Widget>(&f.conn, Some(&f.owner), &QueryParams::new()).unwrap();
        let data = reply.body.data.unwrap();
        assert_eq!(data[0]["owner_id"], json!(f.owner.id));
    }

    #[test]
    fn it_rejects_invalid_list_filters() {
        let f = fixture();
        let params: QueryParams = [("owner_id".to_string(), "me".to_string())]
            .into_iter()
            .collect();
        let err = list_items::<Widget>(&f.conn, Some(&f.admin), &params).unwrap_err();
        assert_eq!(err.status(), Status::BadRequest);
        assert_eq!(err.to_string(), "Invalid value for owner_id");
    }
}
