//! API error type shared by every handler.
//!
//! Domain errors convert with `?`; the status code is decided here so the
//! aggregates stay free of HTTP concerns.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;
use crate::domain::aggregates::{CartError, CategoryError, CouponError, OfferError, OrderError, ProductError, WalletError};
use crate::domain::report::ReportError;
use crate::domain::status::UnknownStatus;
use crate::domain::value_objects::CouponCodeError;
use crate::payment::SignatureError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("authentication required")]
    Unauthorized,
    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    CouponCode(#[from] CouponCodeError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Offer(#[from] OfferError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Status(#[from] UnknownStatus),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_)
            | Self::Order(OrderError::NotFound | OrderError::ItemNotFound)
            | Self::Cart(CartError::ItemNotFound)
            | Self::Coupon(CouponError::NotFound)
            | Self::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Self::Coupon(CouponError::DuplicateCode(_)) | Self::Category(CategoryError::DuplicateName(_)) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Internal(_) | Self::Signature(SignatureError::MissingKey) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::ItemStatus;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from(OrderError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(OrderError::CannotCancel(ItemStatus::Shipped)).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(CouponError::DuplicateCode("SAVE10".into())).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(CategoryError::DuplicateName("Shoes".into())).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(sqlx::Error::PoolTimedOut).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let response = AppError::Internal(anyhow::anyhow!("connection string leaked")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = AppError::BadRequest("cart is empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
