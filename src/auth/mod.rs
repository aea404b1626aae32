//! Bearer token authentication with role-based access control.
//!
//! Access tokens are short-lived and stateless: a request is authenticated
//! by the token's signature and claims alone, with no database lookup.
//! Long-lived sessions are handled by refresh tokens (see `session`).

mod bearer;
mod errors;
mod extractors;
mod state;
mod types;

pub use bearer::bearer_token;
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
