//! Response shaping: pick the serialization tier for each item and
//! wrap the result in the response envelope.

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::Resource;
use crate::mail::Notice;
use crate::models::User;

/// Status vocabulary used by the resource API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotAuthorized,
    Forbidden,
    NotFound,
    ServerError,
}

impl Status {
    pub fn code(self) -> StatusCode {
        match self {
            Self::Ok => StatusCode::OK,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotAuthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    // The requesting user, when a request may have changed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

impl Envelope {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// A successful gateway outcome plus the notices to mail once it has
/// been committed.
#[derive(Debug)]
pub struct Reply {
    pub status: Status,
    pub body: Envelope,
    pub outbox: Vec<Notice>,
}

impl Reply {
    pub fn ok(body: Envelope) -> Self {
        Self {
            status: Status::Ok,
            body,
            outbox: Vec::new(),
        }
    }

    pub fn with_outbox(mut self, outbox: Vec<Notice>) -> Self {
        self.outbox = outbox;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Admin,
    Standard,
}

/// The highest tier `requester` holds on `item`, if any.
pub fn tier_for<R: Resource>(item: &R, requester: Option<&User>) -> Option<Tier> {
    if item.has_admin_rights(requester) {
        Some(Tier::Admin)
    } else if item.has_standard_rights(requester) {
        Some(Tier::Standard)
    } else {
        None
    }
}

pub fn serialize<R: Resource>(item: &R, tier: Tier) -> Value {
    match tier {
        Tier::Admin => item.admin_serialize(),
        Tier::Standard => item.standard_serialize(),
    }
}

pub fn admin_many<R: Resource>(items: &[R]) -> Envelope {
    Envelope::data(Value::Array(
        items.iter().map(Resource::admin_serialize).collect(),
    ))
}

/// Each item is serialized at the tier the requester holds on it.
/// Items the requester holds no tier on are left out.
pub fn mixed_many<R: Resource>(items: &[R], requester: Option<&User>) -> Envelope {
    Envelope::data(Value::Array(
        items
            .iter()
            .filter_map(|item| tier_for(item, requester).map(|tier| serialize(item, tier)))
            .collect(),
    ))
}

pub fn admin_single<R: Resource>(item: &R, include_user: Option<&User>) -> Envelope {
    Envelope {
        data: Some(item.admin_serialize()),
        message: None,
        user: include_user.map(Resource::admin_serialize),
    }
}

pub fn standard_single<R: Resource>(item: &R) -> Envelope {
    Envelope::data(item.standard_serialize())
}
