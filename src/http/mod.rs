//! HTTP surface: storefront routes under `/api/v1`, back office under `/api/v1/admin`.

pub mod admin_catalog;
pub mod admin_offers;
pub mod admin_orders;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod extract;
pub mod orders;
pub mod reports;
pub mod wallet;

use axum::{routing::{get, post, put}, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::db::Page;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self { data, total, page: page.page, per_page: page.per_page }
    }
}

fn storefront() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:product_id", put(cart::update_item).delete(cart::remove_item))
        .route("/cart/coupon/preview", post(coupons::preview_coupon))
        .route("/coupons", get(coupons::available_coupons))
        .route("/checkout/quote", post(checkout::quote))
        .route("/checkout", post(checkout::place_order))
        .route("/payments/verify", post(checkout::verify_payment))
        .route("/payments/webhook", post(checkout::payment_webhook))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/orders/:id/retry-payment", post(checkout::retry_payment))
        .route("/orders/:id/items/:item_id/cancel", post(orders::cancel_item))
        .route("/orders/:id/items/:item_id/return", post(orders::request_return))
        .route("/wallet", get(wallet::get_wallet))
}

fn admin() -> Router<AppState> {
    Router::new()
        .route("/products", get(admin_catalog::list_products).post(admin_catalog::create_product))
        .route("/products/:id", put(admin_catalog::update_product))
        .route("/products/:id/status", put(admin_catalog::set_product_status))
        .route("/categories", get(admin_catalog::list_categories).post(admin_catalog::create_category))
        .route("/categories/:id", put(admin_catalog::update_category))
        .route("/categories/:id/listing", put(admin_catalog::set_category_listing))
        .route("/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/coupons/:id", put(coupons::update_coupon).delete(coupons::delete_coupon))
        .route("/offers", get(admin_offers::list_offers).post(admin_offers::create_offer))
        .route("/offers/:id", put(admin_offers::update_offer).delete(admin_offers::delete_offer))
        .route("/orders", get(admin_orders::list_orders))
        .route("/orders/:id", get(admin_orders::get_order))
        .route("/orders/:id/items/:item_id/status", put(admin_orders::update_item_status))
        .route("/orders/:id/items/:item_id/return/approve", post(admin_orders::approve_return))
        .route("/orders/:id/items/:item_id/return/reject", post(admin_orders::reject_return))
        .route("/returns", get(admin_orders::list_returns))
        .route("/reports/sales", get(reports::sales_report))
        .route("/reports/sales.csv", get(reports::sales_report_csv))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .nest("/api/v1", storefront())
        .nest("/api/v1/admin", admin())
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}
