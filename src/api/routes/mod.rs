//! API routes module

pub mod email;
pub mod resource;

use axum::Router;

use crate::api::state::SharedState;
use crate::models::{Conversation, Label, Message, User};

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Resource routes
        .merge(resource::router::<User>())
        .merge(resource::router::<Label>())
        .merge(resource::router::<Conversation>())
        .merge(resource::router::<Message>())
        // Inbound email webhook
        .merge(email::router())
}
