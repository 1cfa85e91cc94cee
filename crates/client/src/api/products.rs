//! Catalog reads and admin product management.

use serde::de::IgnoredAny;
use storefront_client_core::{ApiResponse, Product, ProductDraft, ProductPage};
use tracing::instrument;

use super::segment;
use crate::client::{HttpClient, into_response};
use crate::transport::{ApiRequest, MultipartForm, ReqwestTransport, Transport};

/// Filters and paging for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// 1-indexed page.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Free-text search.
    pub search: Option<String>,
    /// Category slug.
    pub category: Option<String>,
}

impl ProductQuery {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(page) = self.page {
            request = request.query("page", page.to_string());
        }
        if let Some(limit) = self.limit {
            request = request.query("limit", limit.to_string());
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            request = request.query("search", search.trim());
        }
        if let Some(category) = &self.category {
            request = request.query("category", category.as_str());
        }
        request
    }
}

/// An image to upload with a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Product operations.
pub struct ProductsApi<'a, T = ReqwestTransport> {
    client: &'a HttpClient<T>,
}

impl<'a, T: Transport> ProductsApi<'a, T> {
    #[must_use]
    pub const fn new(client: &'a HttpClient<T>) -> Self {
        Self { client }
    }

    /// List products.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &ProductQuery) -> ApiResponse<ProductPage> {
        self.client.call(query.apply(ApiRequest::get("products"))).await
    }

    /// Get one product.
    #[instrument(skip(self))]
    pub async fn get(&self, product_id: &str) -> ApiResponse<Product> {
        let path = format!("products/{}", segment(product_id));
        into_response(self.client.get(&path).await)
    }

    /// Create a product, uploading its image in the same multipart request.
    #[instrument(skip(self, draft, image), fields(name = %draft.name))]
    pub async fn create(
        &self,
        draft: &ProductDraft,
        image: Option<ProductImage>,
    ) -> ApiResponse<Product> {
        let mut form = MultipartForm::new()
            .text("name", draft.name.clone())
            .text("price", draft.price.to_string())
            .text("stock", draft.stock.to_string());
        if let Some(description) = &draft.description {
            form = form.text("description", description.clone());
        }
        if let Some(image) = image {
            form = form.file("image", image.file_name, image.content_type, image.bytes);
        }
        self.client
            .call(ApiRequest::post("products").multipart(form))
            .await
    }

    /// Delete a product.
    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: &str) -> ApiResponse<()> {
        let path = format!("products/{}", segment(product_id));
        into_response(self.client.delete::<IgnoredAny>(&path).await.map(|_| ()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use reqwest::header::CONTENT_TYPE;
    use rust_decimal::Decimal;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::config::ClientConfig;
    use crate::navigation::MemoryNavigator;
    use crate::session::SessionStore;
    use crate::testing::ScriptedTransport;
    use crate::transport::{FormValue, MULTIPART_FORM_DATA, RequestBody};

    fn client(transport: ScriptedTransport) -> HttpClient<ScriptedTransport> {
        HttpClient::with_transport(
            transport,
            ClientConfig::new(Url::parse("http://localhost:5000/api/").unwrap()),
            SessionStore::in_memory(),
            Arc::new(MemoryNavigator::new("/admin/products")),
        )
    }

    #[tokio::test]
    async fn test_list_sends_query() {
        let client = client(ScriptedTransport::json([(
            200,
            json!({"data": {"products": [{"id": "p1", "name": "Mug", "price": "9.50"}], "total": 1, "page": 2}}),
        )]));
        let query = ProductQuery {
            page: Some(2),
            search: Some("  mug ".to_string()),
            ..ProductQuery::default()
        };

        let page = ProductsApi::new(&client).list(&query).await.into_result().unwrap();

        assert_eq!(page.products[0].name, "Mug");
        assert_eq!(page.page, 2);
        assert_eq!(
            client.transport().requests()[0].query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("search".to_string(), "mug".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_create_sends_multipart() {
        let client = client(ScriptedTransport::json([(
            201,
            json!({"data": {"id": "p9", "name": "Mug", "price": "9.50", "stock": 3}}),
        )]));
        let draft = ProductDraft {
            name: "Mug".to_string(),
            price: Decimal::from_str("9.50").unwrap(),
            description: None,
            stock: 3,
        };
        let image = ProductImage {
            file_name: "mug.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, 0x50],
        };

        let product = ProductsApi::new(&client)
            .create(&draft, Some(image))
            .await
            .into_result()
            .unwrap();
        assert_eq!(product.id, "p9");

        let sent = &client.transport().requests()[0];
        assert_eq!(sent.headers[CONTENT_TYPE], MULTIPART_FORM_DATA);
        let RequestBody::Multipart(form) = &sent.body else {
            panic!("expected multipart body, got {:?}", sent.body);
        };
        let names: Vec<_> = form.parts().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["name", "price", "stock", "image"]);
        assert!(matches!(
            &form.parts()[3].value,
            FormValue::File { file_name, .. } if file_name == "mug.png"
        ));
    }

    #[tokio::test]
    async fn test_delete_ignores_body() {
        let client = client(ScriptedTransport::json([(
            200,
            json!({"success": true, "message": "Product deleted"}),
        )]));
        let response = ProductsApi::new(&client).delete("p1").await;
        assert!(response.success);
    }
}
