pub mod admin;
pub mod oauth;
pub mod tokens;
pub mod users;
