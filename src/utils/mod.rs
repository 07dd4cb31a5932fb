pub mod auth;
pub mod ids;
pub mod uploads;

pub use auth::{create_token, hash_password, verify_password, verify_token};
