pub mod client_registry;
pub mod oauth;
pub mod revocation;
pub mod session;

pub use client_registry::ClientRegistry;
pub use oauth::{OAuthService, ValidatedAuthorize};
pub use revocation::RevocationService;
pub use session::SessionAuthenticator;
