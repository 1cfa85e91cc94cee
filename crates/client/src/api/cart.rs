//! Cart operations with a cached, fetch-guarded cart.

use serde::Serialize;
use storefront_client_core::{ApiResponse, Cart, CartLineInput};
use tokio::sync::watch;
use tracing::instrument;

use super::segment;
use crate::client::{HttpClient, into_response};
use crate::error::ApiError;
use crate::guard::{FetchOutcome, GuardedResource, ResourceState};
use crate::transport::{ReqwestTransport, Transport};

#[derive(Serialize)]
struct QuantityBody {
    quantity: u32,
}

/// The current user's cart.
///
/// Fetches go through a fetch guard: overlapping fetches and fetches within
/// the throttle window are suppressed, while [`CartApi::retry`] bypasses the
/// throttle. A fetch that completes after the session changed is discarded.
#[derive(Debug)]
pub struct CartApi<T = ReqwestTransport> {
    client: HttpClient<T>,
    cart: GuardedResource<Cart>,
}

impl<T: Transport> CartApi<T> {
    /// Create a cart wrapper using the client's throttle window.
    #[must_use]
    pub fn new(client: HttpClient<T>) -> Self {
        let throttle = client.config().fetch_throttle;
        Self {
            client,
            cart: GuardedResource::new("cart", throttle),
        }
    }

    /// Snapshot of the cached cart.
    #[must_use]
    pub fn state(&self) -> ResourceState<Cart> {
        self.cart.current()
    }

    /// Subscribe to cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<Cart>> {
        self.cart.subscribe()
    }

    /// Fetch the cart, unless a fetch is running or one just finished.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> FetchOutcome<Cart> {
        self.load(0).await
    }

    /// Fetch the cart again after a failure, ignoring the throttle window.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> FetchOutcome<Cart> {
        self.load(1).await
    }

    /// Drop the cached cart (e.g. after sign-out).
    pub fn reset(&self) {
        self.cart.reset();
    }

    async fn load(&self, retry_count: u32) -> FetchOutcome<Cart> {
        let client = &self.client;
        let guard = self.cart.guard();
        let token_before = client.session().token();
        self.cart
            .fetch_with(retry_count, move || async move {
                let result = client.get::<Cart>("cart").await;
                // a cart fetched for a different identity must not be cached
                if client.session().token() != token_before {
                    guard.invalidate();
                }
                result
            })
            .await
    }

    /// Add a product to the cart.
    #[instrument(skip(self), fields(product_id = %input.product_id))]
    pub async fn add_item(&self, input: &CartLineInput) -> ApiResponse<Cart> {
        let result = self.client.post("cart/items", input).await;
        self.commit(result)
    }

    /// Change a line's quantity.
    #[instrument(skip(self))]
    pub async fn update_item(&self, line_id: &str, quantity: u32) -> ApiResponse<Cart> {
        let path = format!("cart/items/{}", segment(line_id));
        let result = self.client.put(&path, &QuantityBody { quantity }).await;
        self.commit(result)
    }

    /// Remove a line.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, line_id: &str) -> ApiResponse<Cart> {
        let path = format!("cart/items/{}", segment(line_id));
        let result = self.client.delete::<Option<Cart>>(&path).await;
        self.commit(result.map(Option::unwrap_or_default))
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> ApiResponse<Cart> {
        let result = self.client.delete::<Option<Cart>>("cart").await;
        self.commit(result.map(Option::unwrap_or_default))
    }

    fn commit(&self, result: Result<Cart, ApiError>) -> ApiResponse<Cart> {
        if let Ok(cart) = &result {
            self.cart.replace(cart.clone());
        }
        into_response(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use reqwest::{Method, StatusCode};
    use serde_json::json;
    use storefront_client_core::BearerToken;
    use url::Url;

    use super::*;
    use crate::config::ClientConfig;
    use crate::guard::Suppressed;
    use crate::navigation::MemoryNavigator;
    use crate::session::SessionStore;
    use crate::testing::ScriptedTransport;
    use crate::transport::ApiReply;

    fn cart_api(transport: ScriptedTransport) -> CartApi<ScriptedTransport> {
        let config = ClientConfig::new(Url::parse("http://localhost:5000/api/").unwrap());
        let store = SessionStore::in_memory();
        store.set(BearerToken::parse("tok").unwrap(), None);
        CartApi::new(HttpClient::with_transport(
            transport,
            config,
            store,
            Arc::new(MemoryNavigator::new("/cart")),
        ))
    }

    fn cart_json(quantity: u32) -> serde_json::Value {
        json!({"data": {"id": "c1", "items": [
            {"id": "l1", "productId": "p1", "quantity": quantity, "price": "2.50"}
        ]}})
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_caches_cart_and_throttles() {
        let api = cart_api(ScriptedTransport::json([(200, cart_json(2)), (200, cart_json(3))]));

        let FetchOutcome::Fetched(cart) = api.fetch().await else {
            panic!("expected fetched cart");
        };
        assert_eq!(cart.item_count(), 2);
        assert_eq!(api.state().data().unwrap().item_count(), 2);

        assert!(matches!(
            api.fetch().await,
            FetchOutcome::Suppressed(Suppressed::Throttled { .. })
        ));
        assert_eq!(api.client.transport().request_count(), 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(matches!(api.fetch().await, FetchOutcome::Fetched(_)));
        assert_eq!(api.client.transport().request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bypasses_throttle() {
        let api = cart_api(ScriptedTransport::json([(500, json!({})), (200, cart_json(1))]));

        assert!(matches!(api.fetch().await, FetchOutcome::Failed(_)));
        assert!(matches!(api.state(), ResourceState::Failed(_)));
        assert!(matches!(api.retry().await, FetchOutcome::Fetched(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_cart_is_unavailable() {
        let api = cart_api(ScriptedTransport::json((0..4).map(|_| (429, json!({})))));
        assert_eq!(api.fetch().await, FetchOutcome::Unavailable);
        assert_eq!(api.state(), ResourceState::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_fetch_waits_for_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        let api = cart_api(ScriptedTransport::new([
            Ok(ApiReply::new(StatusCode::TOO_MANY_REQUESTS, headers, Vec::new())),
            Ok(ApiReply::new(
                StatusCode::OK,
                HeaderMap::new(),
                cart_json(2).to_string().into_bytes(),
            )),
        ]));

        let start = tokio::time::Instant::now();
        let outcome = api.fetch().await;

        assert!(matches!(outcome, FetchOutcome::Fetched(_)));
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        assert_eq!(api.state().data().unwrap().item_count(), 2);
        assert_eq!(api.client.transport().request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthenticated_fetch_is_discarded() {
        let api = cart_api(ScriptedTransport::json([(401, json!({"message": "expired"}))]));
        assert_eq!(api.fetch().await, FetchOutcome::Stale);
        assert_eq!(api.state(), ResourceState::Idle);
        assert!(!api.client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_mutations_replace_cache() {
        let api = cart_api(ScriptedTransport::json([
            (201, cart_json(1)),
            (200, cart_json(4)),
            (200, json!({"data": {"items": []}})),
            (204, json!(null)),
        ]));

        let added = api
            .add_item(&CartLineInput {
                product_id: "p1".to_string(),
                quantity: 1,
            })
            .await;
        assert!(added.success);

        let updated = api.update_item("l1", 4).await;
        assert_eq!(updated.data.unwrap().item_count(), 4);
        assert_eq!(api.state().data().unwrap().item_count(), 4);

        assert!(api.remove_item("l1").await.data.unwrap().is_empty());
        assert!(api.clear().await.success);
        assert!(api.state().data().unwrap().is_empty());

        let requests = api.client.transport().requests();
        assert_eq!(requests[1].method, Method::PUT);
        assert_eq!(requests[1].path, "cart/items/l1");
        assert_eq!(requests[2].method, Method::DELETE);
        assert_eq!(requests[3].path, "cart");
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache() {
        let api = cart_api(ScriptedTransport::json([
            (200, cart_json(2)),
            (422, json!({"message": "Out of stock"})),
        ]));
        let _ = api.update_item("l1", 2).await;
        let response = api.update_item("l1", 99).await;
        assert_eq!(response.error.as_deref(), Some("Out of stock"));
        assert_eq!(api.state().data().unwrap().item_count(), 2);
    }
}
