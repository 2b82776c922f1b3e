//! Request extractors for caller identity and validated bodies.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;
use crate::error::AppError;
use crate::payment;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The storefront customer, identified upstream and passed in `X-User-Id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Customer(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Customer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.headers.get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Customer)
            .ok_or(AppError::Unauthorized)
    }
}

/// Proof the request carried `Authorization: Bearer <ADMIN_TOKEN>`.
#[derive(Clone, Copy, Debug)]
pub struct Admin;

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts.headers.get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        match token {
            Some(t) if payment::secrets_match(&state.config.admin_token, t) => Ok(Admin),
            _ => Err(AppError::Unauthorized),
        }
    }
}

/// JSON body that has passed its `validator` rules.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| AppError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
