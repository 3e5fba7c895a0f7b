//! HTTP auth gate.
//!
//! - [`BearerAuth`] / [`OptionalBearerAuth`]: access token extractors
//! - [`AdminAuth`]: bearer plus `super_admin` or `org_admin`
//! - [`require_permission`] / [`require_role`]: `from_fn_with_state` layers
//!   answering 403 when the RBAC check fails
//!
//! [`AuthError`](crate::AuthError) renders itself as an OAuth error body, so
//! every rejection here is a ready response.

pub mod admin;
pub mod auth;
pub mod error;
pub mod gate;
pub mod types;

pub use admin::{ADMIN_ROLES, AdminAuth};
pub use auth::{AuthState, BearerAuth, OptionalBearerAuth};
pub(crate) use auth::bearer_token;
pub use error::ErrorBody;
pub use gate::{PermissionGate, RoleGate, require_permission, require_role};
pub use types::AuthContext;
