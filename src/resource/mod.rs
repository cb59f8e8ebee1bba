//! Generic, permission-tiered resource handling.
//!
//! Every resource exposed under `/api/<name>` implements [`Resource`].
//! The [`gateway`] drives list/get/add/edit/delete for any implementor
//! without knowing anything about its fields: who may do what is
//! answered by the capability methods and what gets returned is decided
//! by the [`shape`] functions.

pub mod gateway;
pub mod payload;
pub mod query;
pub mod session;
pub mod shape;

pub use gateway::{GatewayError, GatewayResult};
pub use query::{Filter, Query, QueryParams};
pub use session::Session;
pub use shape::{Envelope, Reply, Status, Tier};

use rusqlite::Connection;
use serde_json::Value;

use crate::models::User;

/// Static read permissions of a resource type. Anything not switched
/// on is denied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Permissions {
    /// Anonymous viewers may list the resource.
    pub all_can_read_many: bool,
    /// Signed-in viewers who are not administrators may list the
    /// resource.
    pub standard_can_read_many: bool,
}

impl Permissions {
    pub const NONE: Self = Self {
        all_can_read_many: false,
        standard_can_read_many: false,
    };

    pub fn can_read_many(&self) -> bool {
        self.all_can_read_many || self.standard_can_read_many
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The payload or query parameters were rejected. The message is
    /// returned to the client as is.
    #[error("{0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl ResourceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Capability contract every resource type has to satisfy to be served
/// by the gateway.
pub trait Resource: Sized + 'static {
    /// Mounted at `/api/<NAME>` and `/api/<NAME>/{id}`.
    const NAME: &'static str;
    const PERMISSIONS: Permissions = Permissions::NONE;
    /// Query parameters accepted when listing.
    const FILTERS: &'static [Filter] = &[];

    fn id(&self) -> i64;
    fn active(&self) -> bool;
    fn set_active(&mut self, active: bool);

    fn has_admin_rights(&self, requester: Option<&User>) -> bool;
    fn has_standard_rights(&self, requester: Option<&User>) -> bool;

    /// Whether `requester` may create an item from `data`. There is no
    /// instance yet so this is decided from the payload alone.
    fn has_add_rights(
        conn: &Connection,
        data: &Value,
        requester: Option<&User>,
    ) -> Result<bool, ResourceError>;

    fn admin_serialize(&self) -> Value;
    fn standard_serialize(&self) -> Value;

    fn args_to_query(
        params: &QueryParams,
        _requester: Option<&User>,
    ) -> Result<Query, ResourceError> {
        Query::from_params(params, Self::FILTERS)
    }

    fn find(conn: &Connection, id: i64) -> Result<Option<Self>, ResourceError>;
    fn select(conn: &Connection, query: &Query) -> Result<Vec<Self>, ResourceError>;

    /// Build a new, unsaved item from a create payload.
    fn admin_deserialize_add(data: &Value) -> Result<Self, ResourceError>;
    /// Apply an update payload to an existing item in memory.
    fn admin_deserialize_update(&mut self, data: &Value) -> Result<(), ResourceError>;

    /// Insert a new item and record its id.
    fn insert(&mut self, session: &mut Session) -> Result<(), ResourceError>;
    /// Write the current state of an existing item. Implementations
    /// only touch the row when a column actually differs so that
    /// [`Session::is_dirty`] stays meaningful.
    fn save(&self, session: &mut Session) -> Result<(), ResourceError>;

    /// Called once after every successful create, update or delete,
    /// before the transaction commits.
    fn on_edit(
        &self,
        _session: &mut Session,
        _requester: Option<&User>,
        _unchanged: bool,
    ) -> Result<(), ResourceError> {
        Ok(())
    }
}
