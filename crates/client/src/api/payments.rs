//! Payment intents. The provider protocol is opaque; the backend brokers it.

use serde::Serialize;
use storefront_client_core::{ApiResponse, PaymentIntent};
use tracing::instrument;

use super::segment;
use crate::client::{HttpClient, into_response};
use crate::transport::{ApiRequest, ReqwestTransport, Transport};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentBody<'a> {
    order_id: &'a str,
}

/// Payment operations.
pub struct PaymentsApi<'a, T = ReqwestTransport> {
    client: &'a HttpClient<T>,
}

impl<'a, T: Transport> PaymentsApi<'a, T> {
    #[must_use]
    pub const fn new(client: &'a HttpClient<T>) -> Self {
        Self { client }
    }

    /// Create a payment intent for an order.
    #[instrument(skip(self))]
    pub async fn create_intent(&self, order_id: &str) -> ApiResponse<PaymentIntent> {
        into_response(
            self.client
                .post("payments/intents", &IntentBody { order_id })
                .await,
        )
    }

    /// Confirm a payment intent after the provider widget completes.
    #[instrument(skip(self))]
    pub async fn confirm(&self, intent_id: &str) -> ApiResponse<PaymentIntent> {
        let path = format!("payments/intents/{}/confirm", segment(intent_id));
        self.client.call(ApiRequest::post(path)).await
    }
}
