//! Commerce payloads exchanged with the storefront backend.
//!
//! These mirror the backend's JSON (camelCase) and keep money in
//! [`Decimal`] so totals never pick up floating-point error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Cart
// =============================================================================

/// A line in the shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Line ID (used for update/remove).
    pub id: String,
    /// Product ID.
    pub product_id: String,
    /// Product name at the time it was added.
    #[serde(default)]
    pub name: Option<String>,
    /// Quantity.
    pub quantity: u32,
    /// Unit price.
    pub price: Decimal,
}

impl CartLine {
    /// Line total (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// The current user's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Cart ID, absent for a cart that has never been persisted.
    #[serde(default)]
    pub id: Option<String>,
    /// Lines in the cart.
    #[serde(default)]
    pub items: Vec<CartLine>,
}

impl Cart {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Input for adding a product to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    /// Product ID to add.
    pub product_id: String,
    /// Quantity to add.
    pub quantity: u32,
}

// =============================================================================
// Orders
// =============================================================================

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order ID.
    pub id: String,
    /// Current status.
    #[serde(default)]
    pub status: OrderStatus,
    /// Ordered lines.
    #[serde(default)]
    pub items: Vec<CartLine>,
    /// Order total as charged.
    pub total: Decimal,
    /// When the order was placed.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Shipping address for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Checkout request that turns the current cart into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Where to ship.
    pub shipping_address: ShippingAddress,
    /// Payment method identifier understood by the payment provider.
    pub payment_method: String,
}

// =============================================================================
// Products
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Units in stock.
    #[serde(default)]
    pub stock: u32,
}

/// Fields for creating a product from the admin screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

/// A page of products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    /// Products on this page.
    #[serde(default)]
    pub products: Vec<Product>,
    /// Total number of matching products.
    #[serde(default)]
    pub total: u64,
    /// 1-indexed page number.
    #[serde(default)]
    pub page: u32,
}

// =============================================================================
// Payments
// =============================================================================

/// An opaque payment intent issued by the payment provider via the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Intent ID.
    pub id: String,
    /// Secret handed to the provider's checkout widget.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Amount to charge.
    pub amount: Decimal,
    /// Provider status string (opaque to the client).
    #[serde(default)]
    pub status: String,
}
