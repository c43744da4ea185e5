//! Identity and access layer.
//!
//! Provides:
//! - Role and permission codes with the role → permission table
//! - Session credential issuance and verification (HS256 JWT)
//! - Password hashing with Argon2
//! - The per-request [`UserContext`] and its scope predicates
//! - The request gate that turns a credential into a [`CurrentUser`]

pub mod context;
pub mod gate;
pub mod password;
pub mod roles;
pub mod token;

pub use context::{AccessFilter, FacilityScope, UserContext};
pub use gate::{authenticate, extract_bearer_token, CurrentUser};
pub use password::{hash_password, verify_password};
pub use roles::{validate_role_table, PermissionCode, RoleCode};
pub use token::{RefreshClaims, SessionClaims, SessionInput, TokenService};
