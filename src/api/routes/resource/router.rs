//! Router for resource types. Each resource gets the same five
//! endpoints, all driven by the gateway.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::Query;
use serde_json::Value;

use crate::api::auth::Requester;
use crate::api::public::ApiError;
use crate::api::state::SharedState;
use crate::mail::deliver;
use crate::resource::{GatewayError, GatewayResult, QueryParams, Resource, gateway};

/// An empty body counts as an empty object.
fn parse_body(body: &Bytes) -> Result<Value, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        GatewayError::Malformed(String::from("Invalid JSON body"))
    })
}

/// Mail anything the operation queued, now that it is committed, and
/// build the response.
async fn respond(state: &SharedState, result: GatewayResult) -> Response {
    match result {
        Ok(mut reply) => {
            let outbox = std::mem::take(&mut reply.outbox);
            deliver(state.mailer.as_ref(), &state.mail_settings, outbox).await;
            reply.into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn list<R: Resource + Send>(
    State(state): State<SharedState>,
    Requester(requester): Requester,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let result = state
        .db
        .call(move |conn| Ok(gateway::list_items::<R>(conn, requester.as_ref(), &params)))
        .await?;
    Ok(respond(&state, result).await)
}

async fn get_one<R: Resource + Send>(
    State(state): State<SharedState>,
    Requester(requester): Requester,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state
        .db
        .call(move |conn| Ok(gateway::get_item::<R>(conn, requester.as_ref(), &id)))
        .await?;
    Ok(respond(&state, result).await)
}

async fn add<R: Resource + Send>(
    State(state): State<SharedState>,
    Requester(requester): Requester,
    body: Bytes,
) -> Result<Response, ApiError> {
    let result = match parse_body(&body) {
        Ok(data) => {
            state
                .db
                .call(move |conn| Ok(gateway::add_item::<R>(conn, requester.as_ref(), &data)))
                .await?
        }
        Err(err) => Err(err),
    };
    Ok(respond(&state, result).await)
}

// PATCH and PUT behave the same
async fn edit<R: Resource + Send>(
    State(state): State<SharedState>,
    Requester(requester): Requester,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let result = match parse_body(&body) {
        Ok(data) => {
            state
                .db
                .call(move |conn| {
                    Ok(gateway::edit_item::<R>(conn, requester.as_ref(), &id, &data))
                })
                .await?
        }
        Err(err) => Err(err),
    };
    Ok(respond(&state, result).await)
}

async fn delete<R: Resource + Send>(
    State(state): State<SharedState>,
    Requester(requester): Requester,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state
        .db
        .call(move |conn| Ok(gateway::delete_item::<R>(conn, requester.as_ref(), &id)))
        .await?;
    Ok(respond(&state, result).await)
}

/// Create the router for resource type `R`
pub fn router<R: Resource + Send>() -> Router<SharedState> {
    Router::new()
        .route(&format!("/{}", R::NAME), get(list::<R>).post(add::<R>))
        .route(
            &format!("/{}/{{id}}", R::NAME),
            get(get_one::<R>)
                .patch(edit::<R>)
                .put(edit::<R>)
                .delete(delete::<R>),
        )
}
