//! Client-side routes that the HTTP layer needs to know about.

/// The login and registration routes.
///
/// An unauthenticated response must never bounce the user to the login page
/// while they are already on one of these routes, or the redirect would loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRoutes {
    /// Route to navigate to when the session is invalidated.
    pub login: String,
    /// Registration route.
    pub register: String,
}

impl AuthRoutes {
    /// Default login route.
    pub const DEFAULT_LOGIN: &'static str = "/login";
    /// Default registration route.
    pub const DEFAULT_REGISTER: &'static str = "/register";

    /// Create a route set.
    #[must_use]
    pub fn new(login: impl Into<String>, register: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            register: register.into(),
        }
    }

    /// Whether `path` is (or is nested under) a login or registration route.
    ///
    /// Matching is by substring so that `/account/login?next=/cart` and
    /// `/register/verify` both count.
    #[must_use]
    pub fn is_auth_route(&self, path: &str) -> bool {
        path.contains(self.login.as_str()) || path.contains(self.register.as_str())
    }
}

impl Default for AuthRoutes {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOGIN, Self::DEFAULT_REGISTER)
    }
}
