//! Bearer token type.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Errors that can occur when parsing a [`BearerToken`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The input string is empty or only whitespace.
    #[error("token cannot be empty")]
    Empty,
    /// The input contains characters that cannot appear in an HTTP header.
    #[error("token contains characters not allowed in a header value")]
    InvalidCharacters,
}

/// An opaque bearer credential issued by the storefront backend.
///
/// The value is held in a [`SecretString`] so it is zeroized on drop and
/// never shows up in `Debug` output or logs.
///
/// ## Examples
///
/// ```
/// use storefront_client_core::BearerToken;
///
/// let token = BearerToken::parse("abc.def.ghi").unwrap();
/// assert_eq!(token.authorization_value(), "Bearer abc.def.ghi");
/// assert_eq!(format!("{token:?}"), "BearerToken([REDACTED])");
///
/// assert!(BearerToken::parse("   ").is_err());
/// ```
#[derive(Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    /// Parse a bearer token, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or contains control characters
    /// or non-visible ASCII, which would make the `Authorization` header invalid.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TokenError::Empty);
        }
        if !trimmed.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(TokenError::InvalidCharacters);
        }
        Ok(Self(SecretString::from(trimmed.to_owned())))
    }

    /// Expose the raw token string.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// The value for an `Authorization` header.
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

impl PartialEq for BearerToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for BearerToken {}

impl core::str::FromStr for BearerToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
