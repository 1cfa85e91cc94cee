//! Typed wrappers for the storefront's resources.
//!
//! Every operation returns [`ApiResponse`](storefront_client_core::ApiResponse);
//! failures are already classified and logged by the pipelines by the time a
//! wrapper sees them.

mod cart;
mod orders;
mod payments;
mod products;

pub use cart::CartApi;
pub use orders::OrdersApi;
pub use payments::PaymentsApi;
pub use products::{ProductImage, ProductQuery, ProductsApi};

/// Percent-encode an ID for use as a single path segment.
fn segment(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_escapes_separators() {
        assert_eq!(segment("abc123"), "abc123");
        assert_eq!(segment("a/b?c"), "a%2Fb%3Fc");
    }
}
