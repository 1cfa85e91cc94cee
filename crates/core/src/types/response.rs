//! Uniform result envelope returned by resource wrappers.

use serde::{Deserialize, Serialize};

/// The `{success, data, error}` shape every resource wrapper returns.
///
/// Failures never propagate as `Err` past the HTTP layer; callers inspect
/// `success` and render `error` directly.
///
/// ## Examples
///
/// ```
/// use storefront_client_core::ApiResponse;
///
/// let ok = ApiResponse::ok(3);
/// assert!(ok.success);
/// assert_eq!(ok.data, Some(3));
///
/// let failed: ApiResponse<u32> = ApiResponse::failure("Cart is empty");
/// assert!(!failed.success);
/// assert_eq!(failed.error.as_deref(), Some("Cart is empty"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// A successful response.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Map the payload.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
        }
    }

    /// Convert into a standard `Result`.
    ///
    /// # Errors
    ///
    /// Returns the error message if the call failed, or a generic message if
    /// the call claimed success without a payload.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("Response contained no data".to_string()),
            (false, _) => Err(self.error.unwrap_or_else(|| "Unknown error".to_string())),
        }
    }
}

impl<T, E: ToString> From<Result<T, E>> for ApiResponse<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_without_data() {
        let resp: ApiResponse<u32> = ApiResponse::failure("nope");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ApiResponse::ok(1).into_result(), Ok(1));
        assert_eq!(
            ApiResponse::<u8>::failure("bad").into_result(),
            Err("bad".to_string())
        );
    }

    #[test]
    fn test_from_result() {
        let resp: ApiResponse<u8> = Err::<u8, _>("boom").into();
        assert_eq!(resp.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_map() {
        let resp = ApiResponse::ok(2).map(|n| n * 10);
        assert_eq!(resp.data, Some(20));
    }
}
