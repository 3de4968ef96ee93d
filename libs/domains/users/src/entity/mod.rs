//! Sea-ORM entities for the auth schema

pub mod outbox;
pub mod user_info;
pub mod user_secret;
