//! Session lifecycle: startup validation, login, registration, logout.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use storefront_client_core::{ApiResponse, BearerToken, UserRecord};
use tracing::{debug, error, info, instrument, warn};

use crate::client::{HttpClient, into_response};
use crate::transport::{ReqwestTransport, Transport};

/// Message used when the server answers a login without a usable token.
const INVALID_TOKEN_MESSAGE: &str = "Server returned an invalid session token";

/// Email and password.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// New account details.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: SecretString,
}

impl Registration {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// What [`SessionService::initialize`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Another caller already ran initialization.
    AlreadyInitialized,
    /// Nothing was persisted; the session stays anonymous.
    NoStoredSession,
    /// The persisted token was accepted and the user refreshed.
    Validated,
    /// Validation was rate limited; the persisted session is kept as is.
    RateLimited,
    /// The server rejected the persisted token; the session was cleared.
    Invalidated,
    /// Validation failed for another reason; the persisted session is kept.
    Failed(String),
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct VerifyEmailBody<'a> {
    token: &'a str,
}

/// Login, registration and verification all answer with a token and user.
#[derive(Deserialize)]
struct AuthPayload {
    token: String,
    #[serde(default)]
    user: Option<UserRecord>,
}

/// `auth/me` and `auth/profile` answer with either `{user, token?}` or the
/// bare user record.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserPayload {
    Wrapped {
        user: UserRecord,
        #[serde(default)]
        token: Option<String>,
    },
    Bare(UserRecord),
}

impl UserPayload {
    fn into_parts(self) -> (UserRecord, Option<String>) {
        match self {
            Self::Wrapped { user, token } => (user, token),
            Self::Bare(user) => (user, None),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Session lifecycle operations.
///
/// Every operation reports through [`ApiResponse`]; none returns `Err`.
pub struct SessionService<'a, T = ReqwestTransport> {
    client: &'a HttpClient<T>,
}

impl<'a, T: Transport> SessionService<'a, T> {
    /// Create a session service.
    #[must_use]
    pub const fn new(client: &'a HttpClient<T>) -> Self {
        Self { client }
    }

    /// Validate the persisted session once per process.
    ///
    /// Only the first call does any work. A persisted token is checked
    /// against `auth/me`: success refreshes the token (when the server
    /// rotates it) and the user record; 401 clears the session; 429 and
    /// other failures leave the persisted session in place.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> InitOutcome {
        let store = self.client.session();
        if !store.begin_initialization() {
            return InitOutcome::AlreadyInitialized;
        }
        let Some(current) = store.token() else {
            debug!("No persisted session");
            return InitOutcome::NoStoredSession;
        };

        match self.client.get::<UserPayload>("auth/me").await {
            Ok(payload) => {
                let (user, rotated) = payload.into_parts();
                let token = rotated
                    .and_then(|raw| BearerToken::parse(&raw).ok())
                    .unwrap_or(current);
                store.set(token, Some(user));
                info!("Persisted session validated");
                InitOutcome::Validated
            }
            Err(e) if e.is_rate_limited() => {
                warn!(error = %e, "Session validation rate limited, keeping persisted session");
                InitOutcome::RateLimited
            }
            Err(e) if e.is_unauthenticated() => {
                warn!("Persisted session rejected, clearing");
                store.clear();
                InitOutcome::Invalidated
            }
            Err(e) => {
                error!(error = %e, "Session validation failed");
                InitOutcome::Failed(e.user_message())
            }
        }
    }

    /// Sign in with email and password.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> ApiResponse<UserRecord> {
        let body = LoginBody {
            email: &credentials.email,
            password: credentials.password.expose_secret(),
        };
        self.establish("auth/login", &body).await
    }

    /// Create an account and sign in.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> ApiResponse<UserRecord> {
        let body = RegisterBody {
            name: &registration.name,
            email: &registration.email,
            password: registration.password.expose_secret(),
        };
        self.establish("auth/register", &body).await
    }

    /// Confirm an email address with the emailed token and sign in.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> ApiResponse<UserRecord> {
        self.establish("auth/verify-email", &VerifyEmailBody { token })
            .await
    }

    /// Sign out. Local state is cleared even if the server call fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> ApiResponse<()> {
        if let Err(e) = self
            .client
            .post::<_, serde_json::Value>("auth/logout", &serde_json::json!({}))
            .await
        {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }
        self.client.session().clear();
        ApiResponse::ok(())
    }

    /// Update profile fields and persist the merged user record.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, patch: &UserRecord) -> ApiResponse<UserRecord> {
        let result = self
            .client
            .put::<_, UserPayload>("auth/profile", patch)
            .await
            .map(|payload| {
                let (updated, _) = payload.into_parts();
                let store = self.client.session();
                let current = store.get().user().cloned().unwrap_or_default();
                let merged = current.merged(patch).merged(&updated);
                store.set_user(merged.clone());
                merged
            });
        into_response(result)
    }

    /// Post to an endpoint that issues a session and store it on success.
    async fn establish<B>(&self, path: &str, body: &B) -> ApiResponse<UserRecord>
    where
        B: Serialize + Sync,
    {
        let payload = match self.client.post::<_, AuthPayload>(path, body).await {
            Ok(payload) => payload,
            Err(e) => return ApiResponse::failure(e.user_message()),
        };

        let token = match BearerToken::parse(&payload.token) {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Rejecting session token from server");
                return ApiResponse::failure(INVALID_TOKEN_MESSAGE);
            }
        };

        let user = payload.user.unwrap_or_default();
        self.client.session().set(token, Some(user.clone()));
        info!(user_id = user.id().as_deref().unwrap_or("unknown"), "Signed in");
        ApiResponse::ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};
    use url::Url;

    use super::*;
    use crate::config::ClientConfig;
    use crate::navigation::MemoryNavigator;
    use crate::session::{MemoryPersistence, SessionStore, TOKEN_KEY, USER_KEY};
    use crate::testing::ScriptedTransport;
    use crate::transport::RequestBody;

    fn client_with(
        transport: ScriptedTransport,
        store: SessionStore,
        path: &str,
    ) -> HttpClient<ScriptedTransport> {
        let config = ClientConfig::new(Url::parse("http://localhost:5000/api/").unwrap());
        HttpClient::with_transport(transport, config, store, Arc::new(MemoryNavigator::new(path)))
    }

    fn persisted_store() -> SessionStore {
        SessionStore::new(MemoryPersistence::with_entries([
            (TOKEN_KEY, "persisted"),
            (USER_KEY, r#"{"id":"u1","name":"Old"}"#),
        ]))
    }

    fn sent_json(request: &crate::transport::ApiRequest) -> Value {
        match &request.body {
            RequestBody::Text(text) => serde_json::from_str(text).unwrap(),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let client = client_with(
            ScriptedTransport::json([(
                200,
                json!({"data": {"token": "new-token", "user": {"id": "u1", "email": "a@b.c"}}}),
            )]),
            SessionStore::in_memory(),
            "/login",
        );

        let response = SessionService::new(&client)
            .login(&Credentials::new("a@b.c", "hunter22"))
            .await;

        assert!(response.success);
        assert_eq!(response.data.unwrap().email(), Some("a@b.c"));
        let session = client.session().get();
        assert_eq!(session.token().unwrap().expose(), "new-token");

        let sent = sent_json(&client.transport().requests()[0]);
        assert_eq!(sent, json!({"email": "a@b.c", "password": "hunter22"}));
    }

    #[tokio::test]
    async fn test_invalid_login_writes_nothing() {
        let client = client_with(
            ScriptedTransport::json([(401, json!({"message": "Invalid credentials"}))]),
            SessionStore::in_memory(),
            "/login",
        );

        let response = SessionService::new(&client)
            .login(&Credentials::new("a@b.c", "wrong"))
            .await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Invalid credentials"));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_login_without_response() {
        let client = client_with(ScriptedTransport::default(), SessionStore::in_memory(), "/login");
        let response = SessionService::new(&client)
            .login(&Credentials::new("a@b.c", "pw"))
            .await;
        assert_eq!(
            response.error.as_deref(),
            Some(crate::error::NO_RESPONSE_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_login_rejects_blank_token() {
        let client = client_with(
            ScriptedTransport::json([(200, json!({"token": "  ", "user": {"id": 1}}))]),
            SessionStore::in_memory(),
            "/login",
        );
        let response = SessionService::new(&client)
            .login(&Credentials::new("a@b.c", "pw"))
            .await;
        assert_eq!(response.error.as_deref(), Some(INVALID_TOKEN_MESSAGE));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_register_and_verify_establish_session() {
        let client = client_with(
            ScriptedTransport::json([
                (201, json!({"token": "t1", "user": {"id": 1}})),
                (200, json!({"token": "t2", "user": {"id": 1, "verified": true}})),
            ]),
            SessionStore::in_memory(),
            "/register",
        );
        let service = SessionService::new(&client);

        assert!(service.register(&Registration::new("Ann", "a@b.c", "pw")).await.success);
        assert_eq!(client.session().token().unwrap().expose(), "t1");

        let verified = service.verify_email("emailed").await;
        assert_eq!(verified.data.unwrap().get("verified"), Some(&json!(true)));
        assert_eq!(client.session().token().unwrap().expose(), "t2");

        let requests = client.transport().requests();
        assert_eq!(requests[0].path, "auth/register");
        assert_eq!(requests[1].path, "auth/verify-email");
        assert_eq!(sent_json(&requests[1]), json!({"token": "emailed"}));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_request_fails() {
        let store = persisted_store();
        let client = client_with(ScriptedTransport::default(), store.clone(), "/account");

        let response = SessionService::new(&client).logout().await;

        assert!(response.success);
        assert!(!store.is_authenticated());
        assert!(store.get().user().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_merges_and_persists() {
        let store = persisted_store();
        let client = client_with(
            ScriptedTransport::json([(200, json!({"user": {"id": "u1", "name": "New"}}))]),
            store.clone(),
            "/account",
        );
        let patch = UserRecord::from_value(json!({"name": "New", "phone": "555"})).unwrap();

        let response = SessionService::new(&client).update_profile(&patch).await;

        let user = response.data.unwrap();
        assert_eq!(user.name(), Some("New"));
        assert_eq!(user.get("phone"), Some(&json!("555")));
        assert_eq!(store.get().user(), Some(&user));
    }

    #[tokio::test]
    async fn test_initialize_validates_and_rotates_token() {
        let store = persisted_store();
        let client = client_with(
            ScriptedTransport::json([(200, json!({"user": {"id": "u1", "name": "Fresh"}, "token": "rotated"}))]),
            store.clone(),
            "/",
        );
        let service = SessionService::new(&client);

        assert_eq!(service.initialize().await, InitOutcome::Validated);
        assert_eq!(store.token().unwrap().expose(), "rotated");
        assert_eq!(store.get().user().unwrap().name(), Some("Fresh"));

        assert_eq!(service.initialize().await, InitOutcome::AlreadyInitialized);
        assert_eq!(client.transport().request_count(), 1);
    }

    #[tokio::test]
    async fn test_initialize_without_session_makes_no_request() {
        let client = client_with(ScriptedTransport::default(), SessionStore::in_memory(), "/");
        assert_eq!(
            SessionService::new(&client).initialize().await,
            InitOutcome::NoStoredSession
        );
        assert_eq!(client.transport().request_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_clears_on_unauthenticated() {
        let store = persisted_store();
        let client = client_with(
            ScriptedTransport::json([(401, json!({"message": "jwt expired"}))]),
            store.clone(),
            "/",
        );
        assert_eq!(
            SessionService::new(&client).initialize().await,
            InitOutcome::Invalidated
        );
        assert!(!store.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_keeps_session_when_rate_limited() {
        let store = persisted_store();
        let client = client_with(
            ScriptedTransport::json((0..4).map(|_| (429, json!({})))),
            store.clone(),
            "/",
        );
        assert_eq!(
            SessionService::new(&client).initialize().await,
            InitOutcome::RateLimited
        );
        assert!(store.is_authenticated());
        assert_eq!(store.get().user().unwrap().name(), Some("Old"));
    }

    #[tokio::test]
    async fn test_initialize_keeps_session_on_server_error() {
        let store = persisted_store();
        let client = client_with(
            ScriptedTransport::json([(500, json!({"message": "db down"}))]),
            store.clone(),
            "/",
        );
        assert_eq!(
            SessionService::new(&client).initialize().await,
            InitOutcome::Failed("db down".to_string())
        );
        assert!(store.is_authenticated());
    }
}
