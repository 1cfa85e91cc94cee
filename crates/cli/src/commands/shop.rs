//! Cart, order and catalog commands.

use storefront_client::api::{CartApi, OrdersApi, ProductQuery, ProductsApi};
use storefront_client::guard::FetchOutcome;
use storefront_client_core::{ApiResponse, CartLineInput};

use super::{CommandError, connect, print_response};

// =============================================================================
// Cart
// =============================================================================

/// Show the cart.
pub async fn cart_show() -> Result<(), CommandError> {
    let cart = CartApi::new(connect("/cart")?);
    match cart.fetch().await {
        FetchOutcome::Fetched(cart) => print_response(ApiResponse::ok(cart)),
        FetchOutcome::Unavailable => Err(CommandError::Failed(
            "Cart is temporarily unavailable, try again shortly".to_string(),
        )),
        FetchOutcome::Failed(message) => Err(CommandError::Failed(message)),
        FetchOutcome::Suppressed(reason) => {
            Err(CommandError::Failed(format!("Cart fetch suppressed: {reason:?}")))
        }
        FetchOutcome::Stale => Err(CommandError::Failed(
            "Session changed while loading the cart".to_string(),
        )),
    }
}

/// Add a product to the cart.
pub async fn cart_add(product_id: &str, quantity: u32) -> Result<(), CommandError> {
    let cart = CartApi::new(connect("/cart")?);
    let input = CartLineInput {
        product_id: product_id.to_string(),
        quantity,
    };
    print_response(cart.add_item(&input).await)
}

/// Change a cart line's quantity.
pub async fn cart_update(line_id: &str, quantity: u32) -> Result<(), CommandError> {
    let cart = CartApi::new(connect("/cart")?);
    print_response(cart.update_item(line_id, quantity).await)
}

/// Remove a cart line.
pub async fn cart_remove(line_id: &str) -> Result<(), CommandError> {
    let cart = CartApi::new(connect("/cart")?);
    print_response(cart.remove_item(line_id).await)
}

/// Empty the cart.
pub async fn cart_clear() -> Result<(), CommandError> {
    let cart = CartApi::new(connect("/cart")?);
    print_response(cart.clear().await)
}

// =============================================================================
// Orders
// =============================================================================

/// List orders.
pub async fn orders_list() -> Result<(), CommandError> {
    let client = connect("/orders")?;
    print_response(OrdersApi::new(&client).list().await)
}

/// Show one order.
pub async fn orders_show(id: &str) -> Result<(), CommandError> {
    let client = connect("/orders")?;
    print_response(OrdersApi::new(&client).get(id).await)
}

/// Cancel an order.
pub async fn orders_cancel(id: &str) -> Result<(), CommandError> {
    let client = connect("/orders")?;
    print_response(OrdersApi::new(&client).cancel(id).await)
}

// =============================================================================
// Products
// =============================================================================

/// List products.
pub async fn products_list(
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
) -> Result<(), CommandError> {
    let client = connect("/products")?;
    let query = ProductQuery {
        page,
        limit,
        search,
        category: None,
    };
    print_response(ProductsApi::new(&client).list(&query).await)
}

/// Show one product.
pub async fn products_show(id: &str) -> Result<(), CommandError> {
    let client = connect("/products")?;
    print_response(ProductsApi::new(&client).get(id).await)
}
