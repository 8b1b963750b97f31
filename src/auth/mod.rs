//! Authentication layer: credential lookup, token issuing/verification and
//! the access gate in front of protected routes.

pub mod credentials;
pub mod middleware;
pub mod token;

pub use credentials::CredentialStore;
pub use middleware::{
    authorize, check_rate_limit, require_auth, AppState, Authenticated, VerifiedIdentity,
};
pub use token::{Claims, IssuedToken, TokenHandler};
