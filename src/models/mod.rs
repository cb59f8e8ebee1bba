//! Resource types served by the API.

mod conversation;
mod label;
mod message;
mod user;

pub use conversation::Conversation;
pub use label::Label;
pub use message::Message;
pub use user::User;

pub(crate) fn is_administrator(requester: Option<&User>) -> bool {
    requester.is_some_and(|user| user.is_administrator)
}
