//! Command implementations.

pub mod auth;
pub mod shop;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use storefront_client::session::FilePersistence;
use storefront_client::{ClientConfig, ConfigError, HttpClient, MemoryNavigator, SessionStore};
use storefront_client_core::ApiResponse;
use thiserror::Error;

/// Default session file, relative to the working directory.
const DEFAULT_SESSION_FILE: &str = ".storefront-session.json";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend rejected or failed the request.
    #[error("{0}")]
    Failed(String),

    /// Output could not be rendered.
    #[error("Failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

/// Build a client whose session lives in the session file.
///
/// `route` is the screen the command stands in for; commands on the login or
/// registration route never trigger a sign-out redirect.
fn connect(route: &str) -> Result<HttpClient, CommandError> {
    let config = ClientConfig::from_env()?;
    let session_file = std::env::var("STOREFRONT_SESSION_FILE")
        .map_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);
    tracing::debug!(path = %session_file.display(), "Using session file");

    let session = SessionStore::new(FilePersistence::new(session_file));
    Ok(HttpClient::new(
        config,
        session,
        Arc::new(MemoryNavigator::new(route)),
    ))
}

/// Print a successful payload as JSON, or turn the failure into an error.
#[allow(clippy::print_stdout)]
fn print_response<T: Serialize>(response: ApiResponse<T>) -> Result<(), CommandError> {
    let data = response.into_result().map_err(CommandError::Failed)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}
