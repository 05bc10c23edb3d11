//! `storefront-auth` — pure authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage. It verifies bearer tokens
//! and answers the single policy question the storefront asks: may this
//! principal act as that user (owner), or as an administrator?

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, authorize_owner_or_admin};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
