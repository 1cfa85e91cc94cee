//! Storefront Client Core - Shared types library.
//!
//! This crate provides the types shared by the storefront client components:
//! - `client` - HTTP resilience layer and resource wrappers
//! - `cli` - Command-line client for exercising a live backend
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! persistence. This keeps it lightweight and usable from any front end.
//!
//! # Modules
//!
//! - [`types`] - Session, bearer token, route, response envelope and commerce types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
