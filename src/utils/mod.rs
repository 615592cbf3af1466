pub mod password;
pub mod pkce;
pub mod scopes;
pub mod secret;
