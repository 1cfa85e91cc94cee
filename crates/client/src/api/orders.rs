//! Order history and checkout.

use storefront_client_core::{ApiResponse, CheckoutRequest, Order};
use tracing::instrument;

use super::segment;
use crate::client::{HttpClient, into_response};
use crate::transport::{ApiRequest, ReqwestTransport, Transport};

/// Orders for the signed-in user.
pub struct OrdersApi<'a, T = ReqwestTransport> {
    client: &'a HttpClient<T>,
}

impl<'a, T: Transport> OrdersApi<'a, T> {
    #[must_use]
    pub const fn new(client: &'a HttpClient<T>) -> Self {
        Self { client }
    }

    /// List the user's orders, newest first as returned by the server.
    #[instrument(skip(self))]
    pub async fn list(&self) -> ApiResponse<Vec<Order>> {
        into_response(self.client.get("orders").await)
    }

    /// Get one order.
    #[instrument(skip(self))]
    pub async fn get(&self, order_id: &str) -> ApiResponse<Order> {
        let path = format!("orders/{}", segment(order_id));
        into_response(self.client.get(&path).await)
    }

    /// Place an order from the current cart.
    #[instrument(skip(self, checkout))]
    pub async fn create(&self, checkout: &CheckoutRequest) -> ApiResponse<Order> {
        into_response(self.client.post("orders", checkout).await)
    }

    /// Cancel an order that has not shipped.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: &str) -> ApiResponse<Order> {
        let path = format!("orders/{}/cancel", segment(order_id));
        self.client.call(ApiRequest::post(path)).await
    }
}
