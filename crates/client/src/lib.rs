//! Storefront HTTP client.
//!
//! Every resource wrapper (cart, orders, products, payments, session) funnels
//! through one [`HttpClient`]:
//!
//! - the request pipeline attaches the bearer token and normalizes the body
//! - the transport executes the request
//! - the response pipeline classifies failures, retries rate-limited calls
//!   with backoff, and signs the user out on a rejected session
//!
//! The cart additionally sits behind a [`FetchGuard`](guard::FetchGuard) that
//! suppresses overlapping and too-frequent fetches.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use storefront_client::{ClientConfig, HttpClient, MemoryNavigator, SessionStore};
//! use storefront_client::api::CartApi;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let client = HttpClient::new(config, SessionStore::in_memory(), Arc::new(MemoryNavigator::new("/")));
//! let cart = CartApi::new(client);
//! let outcome = cart.fetch().await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod pipeline;
pub mod retry;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::HttpClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, ErrorBody};
pub use navigation::{MemoryNavigator, Navigator};
pub use retry::{RequestAttempt, RetryDecision, RetryPolicy};
pub use session::{SessionService, SessionStore};
pub use transport::{ApiReply, ApiRequest, ReqwestTransport, Transport, TransportError};
