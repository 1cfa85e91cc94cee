//! Integration tests for the storefront client.
//!
//! Every test runs the real `reqwest` transport against a `wiremock`
//! backend, so requests cross an actual socket.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storefront-client-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `rate_limit` - 429 retries, backoff and exhaustion
//! - `session` - sign-in, sign-out and 401 handling
//! - `requests` - headers and body encoding on the wire
//! - `cart_guard` - fetch suppression for the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use storefront_client::{ClientConfig, HttpClient, MemoryNavigator, RetryPolicy, SessionStore};
use url::Url;

/// Retry policy with millisecond delays so exhaustion tests stay fast.
#[must_use]
pub const fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(10),
        min_delay: Duration::from_millis(10),
    }
}

/// Client configuration pointing at `base_url`.
///
/// # Panics
///
/// Panics if `base_url` is not a valid URL.
#[must_use]
#[allow(clippy::expect_used)]
pub fn config_for(base_url: &str) -> ClientConfig {
    ClientConfig::new(Url::parse(base_url).expect("mock server URL"))
}

/// A client with its store and navigator exposed for assertions.
pub struct TestClient {
    pub client: HttpClient,
    pub session: SessionStore,
    pub navigator: Arc<MemoryNavigator>,
}

impl TestClient {
    /// Build a client for `config`, starting on `route`.
    #[must_use]
    pub fn new(config: ClientConfig, session: SessionStore, route: &str) -> Self {
        let navigator = Arc::new(MemoryNavigator::new(route));
        let client = HttpClient::new(config, session.clone(), navigator.clone());
        Self {
            client,
            session,
            navigator,
        }
    }
}

/// A fresh path for a session file under the system temp directory.
#[must_use]
pub fn temp_session_file() -> PathBuf {
    std::env::temp_dir().join(format!("storefront-session-{}.json", uuid::Uuid::new_v4()))
}

/// A local URL that refuses connections.
///
/// # Panics
///
/// Panics if no local port can be bound.
#[must_use]
#[allow(clippy::expect_used)]
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind temp port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/")
}
