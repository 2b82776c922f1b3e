//! Checkout, order placement and online payment confirmation.

use axum::{body::Bytes, extract::{Path, State}, http::{HeaderMap, StatusCode}, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;
use crate::config::AppConfig;
use crate::db;
use crate::domain::aggregates::{CartError, CouponError, Order, OrderError, PaymentMethod, PlaceOrder, ShippingAddress};
use crate::domain::checkout::{order_lines, Quote};
use crate::domain::refund::Refund;
use crate::error::{AppError, Result};
use crate::http::{cart::priced_cart, coupons::redeem, extract::{Customer, ValidJson}, orders::{lock_owned, settle_refund, OrderOutcome}};
use crate::payment::{self, WebhookAction, WebhookEvent, SIGNATURE_HEADER};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct QuoteRequest { pub coupon_code: Option<String> }

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    #[validate]
    pub shipping_address: ShippingAddress,
}

/// What the client needs to open the gateway's checkout widget.
#[derive(Debug, Serialize)]
pub struct GatewayCheckout {
    pub key_id: String,
    pub gateway_order_id: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
}

impl GatewayCheckout {
    fn for_order(order: &Order, config: &AppConfig) -> Result<Option<Self>> {
        let Some(gateway_order_id) = order.gateway_order_id() else { return Ok(None) };
        let amount = order.gateway_amount().unwrap_or_else(|| order.amount_due()).minor_units()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order amount out of range")))?;
        Ok(Some(Self { key_id: config.payment.key_id.clone(), gateway_order_id: gateway_order_id.to_string(), amount, currency: config.currency.clone() }))
    }
}

#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<GatewayCheckout>,
}

fn blank_to_none(code: Option<String>) -> Option<String> { code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) }

pub async fn quote(Customer(user_id): Customer, State(s): State<AppState>, body: Option<Json<QuoteRequest>>) -> Result<Json<Quote>> {
    let code = blank_to_none(body.and_then(|Json(b)| b.coupon_code));
    let now = Utc::now();
    let mut conn = s.db.acquire().await?;
    let (cart, summary) = priced_cart(&mut conn, user_id, now).await?;
    if cart.is_empty() { return Err(CartError::Empty.into()); }
    let applied = match code {
        Some(code) => Some(redeem(&mut conn, &code, user_id, summary.total, now).await?.1),
        None => None,
    };
    Ok(Json(Quote::build(&summary, applied.as_ref(), &s.config.pricing)))
}

#[instrument(skip_all, fields(%user_id, payment_method = r.payment_method.as_str()))]
pub async fn place_order(Customer(user_id): Customer, State(s): State<AppState>, ValidJson(r): ValidJson<PlaceOrderRequest>) -> Result<(StatusCode, Json<PlacedOrder>)> {
    let now = Utc::now();
    let policy = &s.config.pricing;
    let mut tx = s.db.begin().await?;
    db::lock_customer(&mut tx, user_id).await?;

    let (cart, summary) = priced_cart(&mut tx, user_id, now).await?;
    if cart.is_empty() { return Err(CartError::Empty.into()); }
    if summary.has_inactive_lines {
        let issues: Vec<String> = summary.lines.iter().filter(|l| !l.active).filter_map(|l| {
            l.issue.as_ref().map(|issue| format!("{}: {issue}", l.name.as_deref().unwrap_or("item")))
        }).collect();
        return Err(AppError::BadRequest(format!("some cart items cannot be ordered: {}", issues.join("; "))));
    }

    let coupon = match blank_to_none(r.coupon_code) {
        Some(code) => Some(redeem(&mut tx, &code, user_id, summary.total, now).await?),
        None => None,
    };
    let quote = Quote::build(&summary, coupon.as_ref().map(|(_, applied)| applied), policy);
    policy.ensure_payment_allowed(r.payment_method, quote.total)?;

    for line in summary.active_lines() {
        if !db::products::reserve_stock(&mut tx, line.product_id, line.quantity).await? {
            let name = line.name.as_deref().unwrap_or("item");
            return Err(AppError::BadRequest(format!("{name} does not have enough stock")));
        }
    }

    let mut order = Order::place(PlaceOrder {
        user_id,
        payment_method: r.payment_method,
        lines: order_lines(&summary)?,
        coupon: coupon.as_ref().map(|(_, applied)| applied.clone()),
        shipping_fee: quote.shipping_fee,
        tax: quote.tax,
        shipping_address: r.shipping_address,
        gateway_order_id: (r.payment_method == PaymentMethod::Online).then(payment::new_gateway_order_id),
    })?;
    if !order.reconciles() {
        return Err(AppError::Internal(anyhow::anyhow!("order {} totals do not reconcile", order.order_number())));
    }
    db::orders::insert(&mut tx, &order).await?;

    if r.payment_method == PaymentMethod::Wallet {
        let mut wallet = db::wallet::load(&mut tx, user_id).await?;
        let entry = wallet.debit(order.final_amount(), format!("Payment for order {}", order.order_number()), Some(order.id()))?;
        db::wallet::insert(&mut tx, &entry).await?;
    }
    if let Some((coupon, _)) = &coupon {
        if !db::coupons::record_usage(&mut tx, coupon.id, user_id, order.id()).await? {
            return Err(CouponError::Exhausted.into());
        }
    }
    db::carts::clear(&mut tx, user_id).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id(), order_number = order.order_number(), total = %order.final_amount(), "order placed");
    s.events.publish_all(order.take_events()).await;
    let payment = GatewayCheckout::for_order(&order, &s.config)?;
    Ok((StatusCode::CREATED, Json(PlacedOrder { order, payment })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1))]
    pub gateway_order_id: String,
    #[validate(length(min = 1))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1))]
    pub signature: String,
}

/// Confirms a client-side payment. A bad signature marks the payment failed so it can be retried.
#[instrument(skip_all, fields(%user_id, order_id = %r.order_id))]
pub async fn verify_payment(Customer(user_id): Customer, State(s): State<AppState>, ValidJson(r): ValidJson<VerifyPaymentRequest>) -> Result<Json<OrderOutcome>> {
    let mut tx = s.db.begin().await?;
    let mut order = lock_owned(&mut tx, r.order_id, user_id).await?;
    if order.gateway_order_id() != Some(r.gateway_order_id.as_str()) {
        return Err(AppError::BadRequest("payment does not belong to this order".into()));
    }
    let verified = payment::verify_checkout(&s.config.payment.key_secret, &r.gateway_order_id, &r.gateway_payment_id, &r.signature);
    let refund = match verified {
        Ok(()) => order.mark_paid(&r.gateway_payment_id)?,
        Err(payment::SignatureError::MissingKey) => return Err(payment::SignatureError::MissingKey.into()),
        Err(e) => {
            order.mark_payment_failed()?;
            db::orders::save(&mut tx, &order).await?;
            tx.commit().await?;
            tracing::warn!("payment signature rejected");
            s.events.publish_all(order.take_events()).await;
            return Err(e.into());
        }
    };
    settle_refund(&mut tx, &order, &refund, "Refund for items cancelled before payment").await?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!(gateway_payment_id = %r.gateway_payment_id, refund = %refund.total, "payment verified");
    s.events.publish_all(order.take_events()).await;
    Ok(Json(OrderOutcome { order, refund }))
}

#[instrument(skip_all, fields(%user_id, order_id = %id))]
pub async fn retry_payment(Customer(user_id): Customer, State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<GatewayCheckout>> {
    let mut tx = s.db.begin().await?;
    let mut order = lock_owned(&mut tx, id, user_id).await?;
    order.assign_gateway_order(payment::new_gateway_order_id())?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!(gateway_order_id = order.gateway_order_id().unwrap_or_default(), "payment retry started");
    let checkout = GatewayCheckout::for_order(&order, &s.config)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("gateway order missing after retry")))?;
    Ok(Json(checkout))
}

/// Server-to-server payment notifications, authenticated by an HMAC of the raw body.
#[instrument(skip_all)]
pub async fn payment_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<serde_json::Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing payment signature".into()))?;
    payment::verify(&s.config.payment.webhook_secret, &body, signature)?;
    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("invalid webhook payload: {e}")))?;

    let action = event.action().map_err(|e| AppError::BadRequest(format!("invalid webhook payload: {e}")))?;
    if action == WebhookAction::Ignored {
        tracing::debug!(event = %event.event, "webhook event ignored");
        return Ok(Json(json!({ "received": true })));
    }

    let mut tx = s.db.begin().await?;
    let Some(mut order) = db::orders::find_by_gateway_order_for_update(&mut tx, &event.gateway_order_id).await? else {
        tracing::warn!(gateway_order_id = %event.gateway_order_id, "webhook for unknown gateway order");
        return Ok(Json(json!({ "received": true })));
    };
    let outcome = match action {
        WebhookAction::Captured { gateway_payment_id } => order.mark_paid(&gateway_payment_id),
        WebhookAction::Failed => order.mark_payment_failed().map(|()| Refund::default()),
        WebhookAction::Ignored => Ok(Refund::default()),
    };
    match outcome {
        Ok(refund) => {
            settle_refund(&mut tx, &order, &refund, "Refund for items cancelled before payment").await?;
            db::orders::save(&mut tx, &order).await?;
            tx.commit().await?;
            tracing::info!(order_id = %order.id(), event = %event.event, payment_status = %order.payment_status(), "webhook applied");
            s.events.publish_all(order.take_events()).await;
        }
        // redelivery of an event already applied
        Err(OrderError::AlreadyPaid) => tracing::debug!(order_id = %order.id(), "payment already captured"),
        Err(e) => return Err(e.into()),
    }
    Ok(Json(json!({ "received": true })))
}
