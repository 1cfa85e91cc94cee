//! Session commands.

use storefront_client::session::{Credentials, InitOutcome, Registration};
use storefront_client::SessionService;
use storefront_client_core::{ApiResponse, AuthRoutes};

use super::{CommandError, connect, print_response};

/// Sign in and save the session.
pub async fn login(email: &str, password: &str) -> Result<(), CommandError> {
    let client = connect(AuthRoutes::DEFAULT_LOGIN)?;
    let response = SessionService::new(&client)
        .login(&Credentials::new(email, password))
        .await;
    print_response(response)
}

/// Create an account and save the session.
pub async fn register(name: &str, email: &str, password: &str) -> Result<(), CommandError> {
    let client = connect(AuthRoutes::DEFAULT_REGISTER)?;
    let response = SessionService::new(&client)
        .register(&Registration::new(name, email, password))
        .await;
    print_response(response)
}

/// Confirm an email address and save the session.
pub async fn verify(token: &str) -> Result<(), CommandError> {
    let client = connect(AuthRoutes::DEFAULT_REGISTER)?;
    let response = SessionService::new(&client).verify_email(token).await;
    print_response(response)
}

/// Sign out. Always forgets the local session.
pub async fn logout() -> Result<(), CommandError> {
    let client = connect("/account")?;
    SessionService::new(&client).logout().await;
    tracing::info!("Signed out");
    Ok(())
}

/// Validate the saved session and print the user.
pub async fn whoami() -> Result<(), CommandError> {
    let client = connect("/account")?;
    let outcome = SessionService::new(&client).initialize().await;
    tracing::debug!(?outcome, "Session initialization finished");

    match outcome {
        InitOutcome::NoStoredSession | InitOutcome::Invalidated => {
            Err(CommandError::Failed("Not signed in".to_string()))
        }
        InitOutcome::Failed(message) => Err(CommandError::Failed(message)),
        InitOutcome::RateLimited => {
            tracing::warn!("Server is rate limiting, showing the saved user");
            print_user(&client)
        }
        InitOutcome::Validated | InitOutcome::AlreadyInitialized => print_user(&client),
    }
}

fn print_user(client: &storefront_client::HttpClient) -> Result<(), CommandError> {
    let user = client.session().get().user().cloned().unwrap_or_default();
    print_response(ApiResponse::ok(user))
}
