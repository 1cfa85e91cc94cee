//! Authenticated session types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::token::BearerToken;

/// The user record returned by the backend.
///
/// The backend owns the schema, so the record is kept as a JSON object with
/// typed accessors for the fields the client actually reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    /// Create a user record from a JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a user record from an arbitrary JSON value.
    ///
    /// Returns `None` unless the value is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// The user's ID, accepting both string and numeric IDs.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.0
            .get("id")
            .or_else(|| self.0.get("_id"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// The user's email address.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    /// The user's display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// The user's role (e.g. `customer`, `admin`).
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.str_field("role")
    }

    /// Whether the user has the `admin` role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role() == Some("admin")
    }

    /// Get a raw field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Shallow-merge a patch into this record, returning the merged record.
    ///
    /// Keys present in `patch` overwrite existing keys; all other keys are kept.
    #[must_use]
    pub fn merged(&self, patch: &Self) -> Self {
        let mut fields = self.0.clone();
        for (key, value) in &patch.0 {
            fields.insert(key.clone(), value.clone());
        }
        Self(fields)
    }

    /// Borrow the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// The client-held record of the authenticated identity.
///
/// Authentication status is derived from the token, so a session can never
/// claim to be authenticated without one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<BearerToken>,
    user: Option<UserRecord>,
}

impl Session {
    /// An unauthenticated session.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            token: None,
            user: None,
        }
    }

    /// An authenticated session.
    #[must_use]
    pub const fn authenticated(token: BearerToken, user: Option<UserRecord>) -> Self {
        Self {
            token: Some(token),
            user,
        }
    }

    /// The bearer token, if authenticated.
    #[must_use]
    pub const fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// The current user record, if known.
    #[must_use]
    pub const fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    /// Whether a bearer token is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Return a copy of this session with the user record replaced.
    #[must_use]
    pub fn with_user(&self, user: UserRecord) -> Self {
        Self {
            token: self.token.clone(),
            user: Some(user),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> UserRecord {
        UserRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_anonymous_is_not_authenticated() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
    }

    #[test]
    fn test_authenticated_follows_token() {
        let token = BearerToken::parse("t").unwrap();
        let session = Session::authenticated(token, None);
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_user_id_accepts_numbers_and_mongo_ids() {
        assert_eq!(record(json!({"id": 42})).id().as_deref(), Some("42"));
        assert_eq!(record(json!({"_id": "abc"})).id().as_deref(), Some("abc"));
        assert_eq!(record(json!({"name": "x"})).id(), None);
    }

    #[test]
    fn test_merged_overwrites_and_keeps() {
        let user = record(json!({"id": 1, "name": "Old", "email": "a@b.c"}));
        let patch = record(json!({"name": "New", "phone": "555"}));
        let merged = user.merged(&patch);
        assert_eq!(merged.name(), Some("New"));
        assert_eq!(merged.email(), Some("a@b.c"));
        assert_eq!(merged.get("phone"), Some(&json!("555")));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(UserRecord::from_value(json!([1, 2])).is_none());
        assert!(UserRecord::from_value(Value::Null).is_none());
    }

    #[test]
    fn test_is_admin() {
        assert!(record(json!({"role": "admin"})).is_admin());
        assert!(!record(json!({"role": "customer"})).is_admin());
    }
}
