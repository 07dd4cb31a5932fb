pub mod session;

pub use session::{require_auth, CurrentUser, AUTH_COOKIE};
