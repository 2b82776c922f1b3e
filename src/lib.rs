//! Storefront service
//!
//! Online shop backend with an admin back office.
//!
//! ## Features
//! - Catalog with categories and time-boxed offers
//! - Cart repriced on every read
//! - Coupons with per-user limits
//! - Checkout with cash on delivery, wallet or online gateway payment
//! - Per-item fulfilment, cancellation and returns with wallet refunds
//! - Sales reports with CSV export

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod http;
pub mod payment;
pub mod publisher;
pub mod state;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use http::router;
pub use state::AppState;
