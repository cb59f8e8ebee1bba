//! Resolves the requesting user from the `Authorization` header.

use axum::extract::FromRequestParts;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::{HeaderMap, header, request::Parts};

use super::public::ApiError;
use super::state::SharedState;
use crate::models::User;

/// The user making a request, or `None` for anonymous requests.
/// Unknown or malformed credentials are treated as anonymous.
pub struct Requester(pub Option<User>);

fn api_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.trim().split_once(' ')?;
    let credentials = credentials.trim();

    if scheme.eq_ignore_ascii_case("bearer") {
        return Some(credentials.to_string()).filter(|key| !key.is_empty());
    }
    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(credentials).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        return match decoded.split_once(':') {
            Some(("api", key)) if !key.is_empty() => Some(key.to_string()),
            _ => None,
        };
    }
    None
}

impl FromRequestParts<SharedState> for Requester {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(key) = api_key(&parts.headers) else {
            return Ok(Self(None));
        };
        let user = state
            .db
            .call(move |conn| Ok(User::find_by_api_key(conn, &key)?))
            .await?;
        if user.is_none() {
            tracing::debug!("Request with an unknown api key treated as anonymous");
        }
        Ok(Self(user))
    }
}
