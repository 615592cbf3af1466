pub mod authorization_code;
pub mod blacklist;
pub mod client;
pub mod token;
pub mod user;

pub use authorization_code::AuthorizationCode;
pub use blacklist::BlacklistEntry;
pub use client::Client;
pub use token::Token;
pub use user::User;
