//! Order Aggregate
//!
//! Every cancellation, return and fulfilment change goes through this type,
//! which re-derives the order status and works out what is owed back to the
//! customer. Persistence and wallet credits are left to the caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::events::{DomainEvent, OrderEvent, PaymentEvent};
use crate::domain::refund::{distribute_coupon, item_refund, ItemRefund, Refund};
use crate::domain::status::{derive_order_status, ItemStatus, OrderStatus};
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Cod, Online, Wallet }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Cod => "cod", Self::Online => "online", Self::Wallet => "wallet" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "cod" => Some(Self::Cod), "online" => Some(Self::Online), "wallet" => Some(Self::Wallet), _ => None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { Pending, Paid, Failed, PartiallyRefunded, Refunded }

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
        }
    }
    pub fn parse(s: &str) -> Option<Self> {
        [Self::Pending, Self::Paid, Self::Failed, Self::PartiallyRefunded, Self::Refunded].into_iter().find(|p| p.as_str() == s)
    }
    /// Money has been collected for the order.
    pub fn is_captured(&self) -> bool { matches!(self, Self::Paid | Self::PartiallyRefunded | Self::Refunded) }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str().replace('_', " ")) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 3, max = 12))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    /// List price before any offer.
    pub original_price: Money,
    /// Offer price actually charged per unit.
    pub unit_price: Money,
    pub quantity: u32,
    /// This line's part of the order's coupon discount.
    pub coupon_share: Money,
    pub status: ItemStatus,
    pub cancel_reason: Option<String>,
    pub return_reason: Option<String>,
    pub admin_note: Option<String>,
    pub refund_amount: Option<Money>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
    pub fn refund_due(&self) -> Money { item_refund(self.unit_price, self.quantity, self.coupon_share) }
    pub fn offer_savings(&self) -> Money { (self.original_price - self.unit_price).floor_zero().multiply(self.quantity) }
}

#[derive(Clone, Debug)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub original_price: Money,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Clone, Debug)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount: Money,
}

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub user_id: Uuid,
    pub payment_method: PaymentMethod,
    pub lines: Vec<NewOrderLine>,
    pub coupon: Option<AppliedCoupon>,
    pub shipping_fee: Money,
    pub tax: Money,
    pub shipping_address: ShippingAddress,
    pub gateway_order_id: Option<String>,
}

/// Every persisted field of an order, used to rebuild the aggregate.
#[derive(Clone, Debug)]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub coupon_code: Option<String>,
    pub coupon_discount: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub final_amount: Money,
    pub refunded_amount: Money,
    pub gateway_order_id: Option<String>,
    pub gateway_amount: Option<Money>,
    pub gateway_payment_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    status: OrderStatus,
    items: Vec<OrderItem>,
    subtotal: Money,
    coupon_code: Option<String>,
    coupon_discount: Money,
    shipping_fee: Money,
    tax: Money,
    final_amount: Money,
    refunded_amount: Money,
    gateway_order_id: Option<String>,
    /// What the open gateway order was created for.
    gateway_amount: Option<Money>,
    gateway_payment_id: Option<String>,
    shipping_address: ShippingAddress,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    pub fn place(cmd: PlaceOrder) -> Result<Self, OrderError> {
        if cmd.lines.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let line_totals: Vec<Money> = cmd.lines.iter().map(|l| l.unit_price.multiply(l.quantity)).collect();
        let subtotal: Money = line_totals.iter().sum();
        let coupon_discount = cmd.coupon.as_ref().map_or(Money::ZERO, |c| c.discount.min(subtotal));
        let shares = distribute_coupon(&line_totals, coupon_discount);
        let (item_status, payment_status) = match cmd.payment_method {
            PaymentMethod::Online => (ItemStatus::Pending, PaymentStatus::Pending),
            PaymentMethod::Cod => (ItemStatus::Confirmed, PaymentStatus::Pending),
            PaymentMethod::Wallet => (ItemStatus::Confirmed, PaymentStatus::Paid),
        };
        let items: Vec<OrderItem> = cmd.lines.into_iter().zip(shares).map(|(l, coupon_share)| OrderItem {
            id: Uuid::now_v7(), product_id: l.product_id, product_name: l.product_name, original_price: l.original_price,
            unit_price: l.unit_price, quantity: l.quantity, coupon_share, status: item_status, cancel_reason: None,
            return_reason: None, admin_note: None, refund_amount: None, delivered_at: None, updated_at: now,
        }).collect();

        let final_amount = subtotal - coupon_discount + cmd.shipping_fee + cmd.tax;
        let mut order = Self {
            id: Uuid::now_v7(),
            order_number: format!("ORD-{:08}", rand::random::<u32>()),
            user_id: cmd.user_id,
            payment_method: cmd.payment_method,
            payment_status,
            status: derive_order_status(items.iter().map(|i| i.status)),
            items,
            subtotal,
            coupon_code: cmd.coupon.map(|c| c.code),
            coupon_discount,
            shipping_fee: cmd.shipping_fee,
            tax: cmd.tax,
            final_amount,
            refunded_amount: Money::ZERO,
            gateway_amount: cmd.gateway_order_id.as_ref().map(|_| final_amount),
            gateway_order_id: cmd.gateway_order_id,
            gateway_payment_id: None,
            shipping_address: cmd.shipping_address,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, user_id: order.user_id, total: order.final_amount.amount(),
            payment_method: order.payment_method.as_str().to_string(),
        }));
        Ok(order)
    }

    pub fn restore(s: OrderSnapshot) -> Self {
        Self {
            id: s.id, order_number: s.order_number, user_id: s.user_id, payment_method: s.payment_method,
            payment_status: s.payment_status, status: s.status, items: s.items, subtotal: s.subtotal,
            coupon_code: s.coupon_code, coupon_discount: s.coupon_discount, shipping_fee: s.shipping_fee, tax: s.tax,
            final_amount: s.final_amount, refunded_amount: s.refunded_amount, gateway_order_id: s.gateway_order_id,
            gateway_amount: s.gateway_amount, gateway_payment_id: s.gateway_payment_id, shipping_address: s.shipping_address,
            created_at: s.created_at, updated_at: s.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> { self.items.iter().find(|i| i.id == item_id) }
    pub fn subtotal(&self) -> Money { self.subtotal }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn coupon_discount(&self) -> Money { self.coupon_discount }
    pub fn shipping_fee(&self) -> Money { self.shipping_fee }
    pub fn tax(&self) -> Money { self.tax }
    pub fn final_amount(&self) -> Money { self.final_amount }
    pub fn refunded_amount(&self) -> Money { self.refunded_amount }
    pub fn gateway_order_id(&self) -> Option<&str> { self.gateway_order_id.as_deref() }
    pub fn gateway_amount(&self) -> Option<Money> { self.gateway_amount }
    pub fn gateway_payment_id(&self) -> Option<&str> { self.gateway_payment_id.as_deref() }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == user_id }

    /// Paid before delivery, so cancellations owe money back.
    pub fn is_prepaid(&self) -> bool { self.payment_method != PaymentMethod::Cod && self.payment_status.is_captured() }

    pub fn all_inactive(&self) -> bool { self.items.iter().all(|i| i.status.is_inactive()) }

    /// Header totals agree with the amounts fixed at placement.
    pub fn reconciles(&self) -> bool {
        let lines: Money = self.items.iter().map(OrderItem::line_total).sum();
        lines == self.subtotal && self.subtotal - self.coupon_discount + self.shipping_fee + self.tax == self.final_amount
    }

    /// What an unpaid order still owes: the placed total less the net value of cancelled lines.
    pub fn amount_due(&self) -> Money {
        if self.all_inactive() { return Money::ZERO; }
        let dropped: Money = self.items.iter()
            .filter(|i| i.status.is_inactive())
            .map(|i| i.line_total() - i.coupon_share)
            .sum();
        (self.final_amount - self.refunded_amount - dropped).floor_zero()
    }

    pub fn cancel_item(&mut self, item_id: Uuid, reason: &str) -> Result<Refund, OrderError> {
        let idx = self.item_index(item_id)?;
        let status = self.items[idx].status;
        if !status.is_cancellable() { return Err(OrderError::CannotCancel(status)); }
        let line = self.cancel_line(idx, reason);
        let refund = self.settle(vec![line]);
        self.raise_event(DomainEvent::Order(OrderEvent::ItemCancelled { order_id: self.id, item_id, refund: refund.total.amount() }));
        Ok(refund)
    }

    /// Cancels every item still cancellable. Refused once anything has shipped.
    pub fn cancel(&mut self, reason: &str) -> Result<Refund, OrderError> {
        if self.items.iter().any(|i| !i.status.is_inactive() && i.status.has_shipped()) {
            return Err(OrderError::AlreadyShipped(self.status));
        }
        let cancellable: Vec<usize> = self.items.iter().enumerate().filter(|(_, i)| i.status.is_cancellable()).map(|(idx, _)| idx).collect();
        if cancellable.is_empty() { return Err(OrderError::NothingToCancel); }
        let lines = cancellable.into_iter().map(|idx| self.cancel_line(idx, reason)).collect();
        let refund = self.settle(lines);
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id, refund: refund.total.amount() }));
        Ok(refund)
    }

    pub fn request_return(&mut self, item_id: Uuid, reason: &str, now: DateTime<Utc>, window: Duration) -> Result<(), OrderError> {
        let reason = reason.trim();
        if reason.is_empty() { return Err(OrderError::MissingReason); }
        let idx = self.item_index(item_id)?;
        let item = &mut self.items[idx];
        if item.status != ItemStatus::Delivered { return Err(OrderError::NotReturnable(item.status)); }
        let delivered_at = item.delivered_at.unwrap_or(item.updated_at);
        if now > delivered_at + window { return Err(OrderError::ReturnWindowClosed); }
        item.status = ItemStatus::ReturnRequested;
        item.return_reason = Some(reason.to_string());
        item.updated_at = now;
        self.refresh_status();
        self.raise_event(DomainEvent::Order(OrderEvent::ReturnRequested { order_id: self.id, item_id, reason: reason.to_string() }));
        Ok(())
    }

    /// Accepts a pending return. A delivered item has been paid for, so the refund is always owed.
    pub fn approve_return(&mut self, item_id: Uuid) -> Result<Refund, OrderError> {
        let idx = self.item_index(item_id)?;
        let item = &mut self.items[idx];
        if item.status != ItemStatus::ReturnRequested { return Err(OrderError::NoPendingReturn(item.status)); }
        let amount = item.refund_due();
        item.status = ItemStatus::Returned;
        item.refund_amount = Some(amount);
        item.updated_at = Utc::now();
        let line = ItemRefund { item_id, product_id: item.product_id, quantity: item.quantity, amount };
        let refund = self.settle(vec![line]);
        self.raise_event(DomainEvent::Order(OrderEvent::ReturnApproved { order_id: self.id, item_id, refund: refund.total.amount() }));
        Ok(refund)
    }

    pub fn reject_return(&mut self, item_id: Uuid, note: &str) -> Result<(), OrderError> {
        let note = note.trim();
        if note.is_empty() { return Err(OrderError::MissingReason); }
        let idx = self.item_index(item_id)?;
        let item = &mut self.items[idx];
        if item.status != ItemStatus::ReturnRequested { return Err(OrderError::NoPendingReturn(item.status)); }
        item.status = ItemStatus::ReturnRejected;
        item.admin_note = Some(note.to_string());
        item.updated_at = Utc::now();
        self.refresh_status();
        self.raise_event(DomainEvent::Order(OrderEvent::ReturnRejected { order_id: self.id, item_id }));
        Ok(())
    }

    /// Moves an item forward along confirmed → processing → shipped → out for delivery → delivered.
    pub fn advance_item(&mut self, item_id: Uuid, to: ItemStatus, now: DateTime<Utc>) -> Result<ItemStatus, OrderError> {
        let idx = self.item_index(item_id)?;
        let item = &mut self.items[idx];
        let from = item.status;
        match (from.fulfilment_step(), to.fulfilment_step()) {
            (Some(current), Some(next)) if next > current => {}
            _ => return Err(OrderError::InvalidTransition { from, to }),
        }
        item.status = to;
        item.updated_at = now;
        if to == ItemStatus::Delivered {
            item.delivered_at = Some(now);
            if self.payment_method == PaymentMethod::Cod && self.payment_status == PaymentStatus::Pending {
                self.payment_status = PaymentStatus::Paid;
            }
        }
        self.refresh_status();
        self.raise_event(DomainEvent::Order(OrderEvent::ItemStatusChanged { order_id: self.id, item_id, from, to }));
        Ok(from)
    }

    /// Records a captured gateway payment. Whatever the capture covers beyond
    /// what the order still owes (lines cancelled while it was unpaid) comes
    /// back as a refund; stock for those lines was already returned.
    pub fn mark_paid(&mut self, gateway_payment_id: &str) -> Result<Refund, OrderError> {
        self.ensure_awaiting_payment()?;
        let captured = self.gateway_amount.unwrap_or(self.final_amount);
        let owed = self.amount_due();
        let overpaid = (captured - owed).floor_zero();

        self.gateway_payment_id = Some(gateway_payment_id.to_string());
        let now = Utc::now();
        for item in self.items.iter_mut() {
            match item.status {
                ItemStatus::Pending => item.status = ItemStatus::Confirmed,
                ItemStatus::Cancelled if item.refund_amount.is_none() && overpaid.is_positive() => {
                    item.refund_amount = Some(item.refund_due()).filter(Money::is_positive);
                }
                _ => continue,
            }
            item.updated_at = now;
        }

        let shipping = if self.all_inactive() { self.shipping_fee.min(overpaid) } else { Money::ZERO };
        let refund = Refund { items: vec![], shipping, total: overpaid };
        self.payment_status = if !overpaid.is_positive() {
            PaymentStatus::Paid
        } else {
            self.refunded_amount += overpaid;
            if self.all_inactive() { PaymentStatus::Refunded } else { PaymentStatus::PartiallyRefunded }
        };
        self.refresh_status();
        self.raise_event(DomainEvent::Payment(PaymentEvent::Captured { order_id: self.id, gateway_payment_id: gateway_payment_id.to_string() }));
        Ok(refund)
    }

    pub fn mark_payment_failed(&mut self) -> Result<(), OrderError> {
        self.ensure_awaiting_payment()?;
        self.payment_status = PaymentStatus::Failed;
        self.touch();
        self.raise_event(DomainEvent::Payment(PaymentEvent::Failed { order_id: self.id }));
        Ok(())
    }

    /// Starts a fresh payment attempt for an unpaid online order.
    pub fn assign_gateway_order(&mut self, gateway_order_id: String) -> Result<(), OrderError> {
        self.ensure_awaiting_payment()?;
        if self.all_inactive() { return Err(OrderError::NothingToPay); }
        self.gateway_amount = Some(self.amount_due());
        self.gateway_order_id = Some(gateway_order_id);
        self.payment_status = PaymentStatus::Pending;
        self.touch();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn ensure_awaiting_payment(&self) -> Result<(), OrderError> {
        if self.payment_method != PaymentMethod::Online { return Err(OrderError::NotOnlinePayment); }
        if self.payment_status.is_captured() { return Err(OrderError::AlreadyPaid); }
        Ok(())
    }

    fn cancel_line(&mut self, idx: usize, reason: &str) -> ItemRefund {
        let prepaid = self.is_prepaid();
        let item = &mut self.items[idx];
        let amount = if prepaid { item.refund_due() } else { Money::ZERO };
        item.status = ItemStatus::Cancelled;
        item.cancel_reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
        item.refund_amount = Some(amount).filter(Money::is_positive);
        item.updated_at = Utc::now();
        ItemRefund { item_id: item.id, product_id: item.product_id, quantity: item.quantity, amount }
    }

    /// Books the refund for lines that just became inactive, adding the
    /// shipping fee once nothing active is left on a prepaid order.
    fn settle(&mut self, lines: Vec<ItemRefund>) -> Refund {
        let mut refund = Refund { total: lines.iter().map(|l| l.amount).sum(), items: lines, shipping: Money::ZERO };
        if self.all_inactive() && self.is_prepaid() && self.shipping_fee.is_positive() {
            refund.shipping = self.shipping_fee;
            refund.total += self.shipping_fee;
        }
        if refund.is_payable() {
            self.refunded_amount += refund.total;
            self.payment_status = if self.all_inactive() { PaymentStatus::Refunded } else { PaymentStatus::PartiallyRefunded };
        }
        self.refresh_status();
        refund
    }

    fn refresh_status(&mut self) {
        self.status = derive_order_status(self.items.iter().map(|i| i.status));
        self.touch();
    }

    fn item_index(&self, item_id: Uuid) -> Result<usize, OrderError> {
        self.items.iter().position(|i| i.id == item_id).ok_or(OrderError::ItemNotFound)
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,
    #[error("order item not found")]
    ItemNotFound,
    #[error("order has no items")]
    NoItems,
    #[error("an item that is {0} cannot be cancelled")]
    CannotCancel(ItemStatus),
    #[error("order is {0} and can no longer be cancelled")]
    AlreadyShipped(OrderStatus),
    #[error("nothing left to cancel on this order")]
    NothingToCancel,
    #[error("only delivered items can be returned (item is {0})")]
    NotReturnable(ItemStatus),
    #[error("the return window for this item has closed")]
    ReturnWindowClosed,
    #[error("a reason is required")]
    MissingReason,
    #[error("no return is pending for this item (item is {0})")]
    NoPendingReturn(ItemStatus),
    #[error("cannot move an item from {from} to {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },
    #[error("order is not paid online")]
    NotOnlinePayment,
    #[error("order is already paid")]
    AlreadyPaid,
    #[error("order has nothing left to pay for")]
    NothingToPay,
    #[error("cash on delivery is not available above {0}")]
    CodLimitExceeded(Money),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: u32) -> NewOrderLine {
        NewOrderLine { product_id: Uuid::new_v4(), product_name: "Widget".into(), original_price: Money::from_major(price), unit_price: Money::from_major(price), quantity: qty }
    }

    fn place(method: PaymentMethod, lines: Vec<NewOrderLine>, coupon: Option<i64>) -> Order {
        Order::place(PlaceOrder {
            user_id: Uuid::new_v4(), payment_method: method, lines,
            coupon: coupon.map(|d| AppliedCoupon { code: "SAVE".into(), discount: Money::from_major(d) }),
            shipping_fee: Money::from_major(40), tax: Money::ZERO, shipping_address: ShippingAddress::default(),
            gateway_order_id: None,
        }).unwrap()
    }

    fn item_id(order: &Order, idx: usize) -> Uuid { order.items()[idx].id }

    fn deliver(order: &mut Order, idx: usize) {
        let id = item_id(order, idx);
        order.advance_item(id, ItemStatus::Delivered, Utc::now()).unwrap();
    }

    #[test]
    fn test_place_order_totals() {
        let order = place(PaymentMethod::Wallet, vec![line(300, 1), line(100, 2)], Some(50));
        assert_eq!(order.subtotal(), Money::from_major(500));
        assert_eq!(order.final_amount(), Money::from_major(490));
        assert_eq!(order.items().iter().map(|i| i.coupon_share).sum::<Money>(), Money::from_major(50));
        assert_eq!(order.items()[0].coupon_share, Money::from_major(30));
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert!(order.reconciles());
        let empty = PlaceOrder {
            user_id: Uuid::nil(), payment_method: PaymentMethod::Cod, lines: vec![], coupon: None,
            shipping_fee: Money::ZERO, tax: Money::ZERO, shipping_address: ShippingAddress::default(), gateway_order_id: None,
        };
        assert_eq!(Order::place(empty).unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_prepaid_item_cancel_refunds_line_less_coupon_share() {
        let mut order = place(PaymentMethod::Wallet, vec![line(300, 1), line(100, 2)], Some(50));
        let refund = order.cancel_item(item_id(&order, 0), "changed my mind").unwrap();
        assert_eq!(refund.total, Money::from_major(270));
        assert_eq!(refund.shipping, Money::ZERO);
        assert_eq!(order.status(), OrderStatus::PartiallyCancelled);
        assert_eq!(order.payment_status(), PaymentStatus::PartiallyRefunded);

        let refund = order.cancel_item(item_id(&order, 1), "").unwrap();
        assert_eq!(refund.items[0].amount, Money::from_major(180));
        assert_eq!(refund.shipping, Money::from_major(40));
        assert_eq!(refund.total, Money::from_major(220));
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert_eq!(order.refunded_amount(), order.final_amount());
        assert_eq!(order.items()[1].cancel_reason, None);
    }

    #[test]
    fn test_cod_cancel_moves_no_money() {
        let mut order = place(PaymentMethod::Cod, vec![line(300, 1)], None);
        let refund = order.cancel("ordered by mistake").unwrap();
        assert!(!refund.is_payable());
        assert_eq!(refund.items.len(), 1);
        assert_eq!(refund.items[0].quantity, 1);
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_cancel_rejected_once_shipped() {
        let mut order = place(PaymentMethod::Wallet, vec![line(300, 1), line(100, 1)], None);
        let shipped = item_id(&order, 0);
        order.advance_item(shipped, ItemStatus::Shipped, Utc::now()).unwrap();
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.cancel("late").unwrap_err(), OrderError::AlreadyShipped(OrderStatus::Shipped));
        assert_eq!(order.cancel_item(shipped, "late").unwrap_err(), OrderError::CannotCancel(ItemStatus::Shipped));
        // the unshipped item can still go on its own
        assert!(order.cancel_item(item_id(&order, 1), "late").is_ok());

        for later in [ItemStatus::OutForDelivery, ItemStatus::Delivered] {
            let mut order = place(PaymentMethod::Cod, vec![line(100, 1)], None);
            let id = item_id(&order, 0);
            order.advance_item(id, later, Utc::now()).unwrap();
            assert!(matches!(order.cancel("late"), Err(OrderError::AlreadyShipped(_))));
        }
    }

    #[test]
    fn test_return_flow_refunds_into_partial_status() {
        let mut order = place(PaymentMethod::Cod, vec![line(300, 1), line(100, 2)], Some(50));
        deliver(&mut order, 0);
        deliver(&mut order, 1);
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);

        let (first, second) = (item_id(&order, 0), item_id(&order, 1));
        order.request_return(first, "damaged", Utc::now(), Duration::days(7)).unwrap();
        order.request_return(second, "too small", Utc::now(), Duration::days(7)).unwrap();
        let refund = order.approve_return(first).unwrap();
        assert_eq!(refund.total, Money::from_major(270));
        order.reject_return(second, "used item").unwrap();
        assert_eq!(order.status(), OrderStatus::PartiallyRefunded);
        assert_eq!(order.payment_status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(order.items()[1].admin_note.as_deref(), Some("used item"));
    }

    #[test]
    fn test_full_return_of_cod_order_keeps_shipping() {
        let mut order = place(PaymentMethod::Cod, vec![line(300, 1)], None);
        deliver(&mut order, 0);
        let id = item_id(&order, 0);
        order.request_return(id, "damaged", Utc::now(), Duration::days(7)).unwrap();
        let refund = order.approve_return(id).unwrap();
        assert_eq!(refund.total, Money::from_major(300));
        assert_eq!(refund.shipping, Money::ZERO);
        assert_eq!(order.status(), OrderStatus::Refunded);
    }

    #[test]
    fn test_return_rules() {
        let mut order = place(PaymentMethod::Wallet, vec![line(300, 1)], None);
        let id = item_id(&order, 0);
        assert_eq!(order.request_return(id, "x", Utc::now(), Duration::days(7)).unwrap_err(), OrderError::NotReturnable(ItemStatus::Confirmed));
        deliver(&mut order, 0);
        assert_eq!(order.request_return(id, "  ", Utc::now(), Duration::days(7)).unwrap_err(), OrderError::MissingReason);
        assert_eq!(order.request_return(id, "late", Utc::now() + Duration::days(8), Duration::days(7)).unwrap_err(), OrderError::ReturnWindowClosed);
        assert_eq!(order.approve_return(id).unwrap_err(), OrderError::NoPendingReturn(ItemStatus::Delivered));
        assert_eq!(order.approve_return(Uuid::new_v4()).unwrap_err(), OrderError::ItemNotFound);
    }

    #[test]
    fn test_fulfilment_moves_forward_only() {
        let mut order = place(PaymentMethod::Cod, vec![line(100, 1)], None);
        let id = item_id(&order, 0);
        assert_eq!(order.advance_item(id, ItemStatus::Processing, Utc::now()), Ok(ItemStatus::Confirmed));
        assert_eq!(order.advance_item(id, ItemStatus::Confirmed, Utc::now()).unwrap_err(), OrderError::InvalidTransition { from: ItemStatus::Processing, to: ItemStatus::Confirmed });
        assert!(order.advance_item(id, ItemStatus::Returned, Utc::now()).is_err());
        assert_eq!(order.take_events().len(), 2);
    }

    #[test]
    fn test_online_payment_lifecycle() {
        let mut order = place(PaymentMethod::Online, vec![line(100, 1)], None);
        let id = item_id(&order, 0);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.advance_item(id, ItemStatus::Processing, Utc::now()).unwrap_err(), OrderError::InvalidTransition { from: ItemStatus::Pending, to: ItemStatus::Processing });
        order.mark_payment_failed().unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        order.assign_gateway_order("gw_retry".into()).unwrap();
        order.mark_paid("pay_123").unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.mark_paid("pay_124").unwrap_err(), OrderError::AlreadyPaid);
        let refund = order.cancel("no longer needed").unwrap();
        assert_eq!(refund.total, Money::from_major(140));
    }

    #[test]
    fn test_amount_due_drops_cancelled_lines() {
        let mut order = place(PaymentMethod::Online, vec![line(300, 1), line(100, 2)], Some(50));
        assert_eq!(order.amount_due(), Money::from_major(490));
        order.cancel_item(item_id(&order, 1), "not needed").unwrap();
        // 200 line less its 20 coupon share
        assert_eq!(order.amount_due(), Money::from_major(310));
    }

    #[test]
    fn test_unpaid_online_cancel_refunds_nothing() {
        let mut order = place(PaymentMethod::Online, vec![line(100, 1)], None);
        let refund = order.cancel("abandoned").unwrap();
        assert_eq!(refund.total, Money::ZERO);
        assert_eq!(order.assign_gateway_order("gw".into()).unwrap_err(), OrderError::NothingToPay);
    }

    #[test]
    fn test_capture_after_full_cancel_refunds_everything() {
        let mut order = place(PaymentMethod::Online, vec![line(100, 1)], None);
        order.cancel("abandoned").unwrap();
        let refund = order.mark_paid("pay_late").unwrap();
        assert_eq!(refund.total, Money::from_major(140));
        assert_eq!(refund.shipping, Money::from_major(40));
        assert!(refund.items.is_empty());
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert_eq!(order.refunded_amount(), order.final_amount());
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.items()[0].refund_amount, Some(Money::from_major(100)));
        assert_eq!(order.mark_paid("pay_late").unwrap_err(), OrderError::AlreadyPaid);
    }

    #[test]
    fn test_capture_after_partial_cancel_refunds_dropped_line() {
        let mut order = place(PaymentMethod::Online, vec![line(300, 1), line(100, 2)], Some(50));
        order.cancel_item(item_id(&order, 1), "not needed").unwrap();
        let refund = order.mark_paid("pay_full").unwrap();
        assert_eq!(refund.total, Money::from_major(180));
        assert_eq!(refund.shipping, Money::ZERO);
        assert_eq!(order.payment_status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(order.refunded_amount(), Money::from_major(180));
        assert_eq!(order.items()[0].status, ItemStatus::Confirmed);
        assert_eq!(order.items()[1].refund_amount, Some(Money::from_major(180)));
    }

    #[test]
    fn test_capture_of_repriced_retry_refunds_nothing() {
        let mut order = place(PaymentMethod::Online, vec![line(300, 1), line(100, 2)], Some(50));
        order.cancel_item(item_id(&order, 1), "not needed").unwrap();
        order.assign_gateway_order("gw_retry".into()).unwrap();
        assert_eq!(order.gateway_amount(), Some(Money::from_major(310)));
        let refund = order.mark_paid("pay_retry").unwrap();
        assert_eq!(refund, Refund::default());
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.refunded_amount(), Money::ZERO);
        assert_eq!(order.items()[1].refund_amount, None);
    }
}
