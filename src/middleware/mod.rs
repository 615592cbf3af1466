pub mod admin_auth;
pub mod bearer_auth;

pub use admin_auth::AdminUser;
pub use bearer_auth::{bearer_auth_middleware, require_scopes, AuthContext};
