//! Router for the inbound email webhook

use axum::{
    Form, Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};

use super::public::InboundEmailForm;
use crate::api::public::ApiError;
use crate::api::state::SharedState;
use crate::mail::{bridge, verify};
use crate::resource::{Envelope, GatewayError};

/// Receives replies to conversation emails. Always answers OK once the
/// request is trusted, whether or not a message could be created, so
/// the provider does not retry.
async fn receive_email(
    State(state): State<SharedState>,
    Form(form): Form<InboundEmailForm>,
) -> Result<Response, ApiError> {
    if state.config.requires_signed_webhooks()
        && !verify::verify(
            &state.config.mailgun_api_key,
            &form.token,
            &form.timestamp,
            &form.signature,
        )
    {
        tracing::warn!("Rejected inbound email with an invalid signature");
        return Ok(GatewayError::NotAuthenticated.into_response());
    }

    let email = form.into_email();
    tracing::debug!("Received email from {} to {}", email.from_address, email.to_address);
    bridge::relay(&state.db, state.mailer.as_ref(), &state.mail_settings, email).await?;

    Ok(Json(Envelope::message("OK")).into_response())
}

/// Create the email router
pub fn router() -> Router<SharedState> {
    Router::new().route("/email", post(receive_email))
}
