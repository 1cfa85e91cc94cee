//! Core types for the storefront client.
//!
//! This module provides type-safe wrappers for the session and for the
//! payloads exchanged with the storefront backend.

pub mod commerce;
pub mod response;
pub mod route;
pub mod session;
pub mod token;

pub use commerce::*;
pub use response::ApiResponse;
pub use route::AuthRoutes;
pub use session::{Session, UserRecord};
pub use token::{BearerToken, TokenError};
