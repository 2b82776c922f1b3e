//! Item and order statuses, and the derivation of an order's status from its items.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Awaiting online payment.
    Pending,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    ReturnRequested,
    Returned,
    ReturnRejected,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 10] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::OutForDelivery,
        Self::Delivered, Self::Cancelled, Self::ReturnRequested, Self::Returned, Self::ReturnRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::ReturnRequested => "return_requested",
            Self::Returned => "returned",
            Self::ReturnRejected => "return_rejected",
        }
    }

    /// Cancelled and returned items no longer count towards the order.
    pub fn is_inactive(&self) -> bool { matches!(self, Self::Cancelled | Self::Returned) }

    pub fn is_cancellable(&self) -> bool { matches!(self, Self::Pending | Self::Confirmed | Self::Processing) }

    /// The item has left the warehouse.
    pub fn has_shipped(&self) -> bool {
        matches!(self, Self::Shipped | Self::OutForDelivery | Self::Delivered | Self::ReturnRequested | Self::ReturnRejected)
    }

    /// Rank used when picking the order status from active items.
    fn precedence(&self) -> Option<u8> {
        match self {
            Self::Delivered | Self::ReturnRejected => Some(6),
            Self::OutForDelivery => Some(5),
            Self::Shipped => Some(4),
            Self::Processing => Some(3),
            Self::Confirmed => Some(2),
            Self::ReturnRequested => Some(1),
            Self::Pending => Some(0),
            Self::Cancelled | Self::Returned => None,
        }
    }

    /// Position on the fulfilment chain an admin moves items along.
    pub fn fulfilment_step(&self) -> Option<u8> {
        match self {
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::OutForDelivery => Some(4),
            Self::Delivered => Some(5),
            _ => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str().replace('_', " ")) }
}

impl FromStr for ItemStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    ReturnRequested,
    Cancelled,
    PartiallyCancelled,
    Refunded,
    PartiallyRefunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 11] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::OutForDelivery, Self::Delivered,
        Self::ReturnRequested, Self::Cancelled, Self::PartiallyCancelled, Self::Refunded, Self::PartiallyRefunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::ReturnRequested => "return_requested",
            Self::Cancelled => "cancelled",
            Self::PartiallyCancelled => "partially_cancelled",
            Self::Refunded => "refunded",
            Self::PartiallyRefunded => "partially_refunded",
        }
    }

    fn from_item(status: ItemStatus) -> Self {
        match status {
            ItemStatus::Pending => Self::Pending,
            ItemStatus::Confirmed => Self::Confirmed,
            ItemStatus::Processing => Self::Processing,
            ItemStatus::Shipped => Self::Shipped,
            ItemStatus::OutForDelivery => Self::OutForDelivery,
            ItemStatus::Delivered | ItemStatus::ReturnRejected => Self::Delivered,
            ItemStatus::ReturnRequested => Self::ReturnRequested,
            ItemStatus::Cancelled => Self::Cancelled,
            ItemStatus::Returned => Self::Refunded,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str().replace('_', " ")) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Aggregate status of an order given the status of each of its items.
pub fn derive_order_status<I>(items: I) -> OrderStatus
where
    I: IntoIterator<Item = ItemStatus>,
{
    let statuses: Vec<ItemStatus> = items.into_iter().collect();
    if statuses.is_empty() { return OrderStatus::Pending; }

    let count = |wanted: ItemStatus| statuses.iter().filter(|s| **s == wanted).count();
    let (cancelled, returned, rejected) = (count(ItemStatus::Cancelled), count(ItemStatus::Returned), count(ItemStatus::ReturnRejected));

    if cancelled == statuses.len() { return OrderStatus::Cancelled; }
    if cancelled > 0 { return OrderStatus::PartiallyCancelled; }
    if returned == statuses.len() { return OrderStatus::Refunded; }
    // only returned and return-rejected items, at least one of each
    if returned > 0 && rejected > 0 && returned + rejected == statuses.len() { return OrderStatus::PartiallyRefunded; }

    statuses
        .iter()
        .filter_map(|s| s.precedence().map(|rank| (rank, *s)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, s)| OrderStatus::from_item(s))
        .unwrap_or(OrderStatus::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn test_all_cancelled_or_returned() {
        assert_eq!(derive_order_status([Cancelled, Cancelled]), OrderStatus::Cancelled);
        assert_eq!(derive_order_status([Returned, Returned]), OrderStatus::Refunded);
    }

    #[test]
    fn test_partial_outcomes() {
        assert_eq!(derive_order_status([Cancelled, Confirmed]), OrderStatus::PartiallyCancelled);
        assert_eq!(derive_order_status([Cancelled, Shipped]), OrderStatus::PartiallyCancelled);
        assert_eq!(derive_order_status([Returned, ReturnRejected]), OrderStatus::PartiallyRefunded);
        assert_eq!(derive_order_status([Returned, ReturnRejected, ReturnRejected]), OrderStatus::PartiallyRefunded);
    }

    #[test]
    fn test_cancellation_outranks_returns() {
        assert_eq!(derive_order_status([Cancelled, Returned]), OrderStatus::PartiallyCancelled);
        assert_eq!(derive_order_status([Returned, Cancelled, ReturnRejected]), OrderStatus::PartiallyCancelled);
    }

    #[test]
    fn test_returned_items_leave_active_items_in_charge() {
        assert_eq!(derive_order_status([Returned, Delivered]), OrderStatus::Delivered);
        assert_eq!(derive_order_status([Returned, Shipped]), OrderStatus::Shipped);
        assert_eq!(derive_order_status([Returned, ReturnRequested]), OrderStatus::ReturnRequested);
        assert_eq!(derive_order_status([Returned, Processing]), OrderStatus::Processing);
    }

    #[test]
    fn test_precedence_among_active_items() {
        assert_eq!(derive_order_status([Confirmed, Delivered, Shipped]), OrderStatus::Delivered);
        assert_eq!(derive_order_status([Processing, OutForDelivery]), OrderStatus::OutForDelivery);
        assert_eq!(derive_order_status([Confirmed, ReturnRequested]), OrderStatus::Confirmed);
        assert_eq!(derive_order_status([ReturnRequested, ReturnRequested]), OrderStatus::ReturnRequested);
        assert_eq!(derive_order_status([Pending, Pending]), OrderStatus::Pending);
        assert_eq!(derive_order_status([ReturnRejected]), OrderStatus::Delivered);
        assert_eq!(derive_order_status(Vec::new()),OrderStatus::Pending);
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let vectors: [&[ItemStatus]; 4] = [
            &[Confirmed, Processing],
            &[Cancelled, Delivered, ReturnRequested],
            &[Returned, ReturnRejected, Delivered],
            &[Pending],
        ];
        for v in vectors {
            assert_eq!(derive_order_status(v.iter().copied()), derive_order_status(v.iter().copied()));
        }
    }

    #[test]
    fn test_status_strings_round_trip() {
        for s in ItemStatus::ALL { assert_eq!(s.as_str().parse::<ItemStatus>(), Ok(s)); }
        assert_eq!(OrderStatus::PartiallyRefunded.to_string(), "partially refunded");
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
