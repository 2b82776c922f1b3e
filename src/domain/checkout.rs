//! Checkout pricing: turning a priced cart into order totals.

use rust_decimal::Decimal;
use serde::Serialize;
use crate::domain::aggregates::cart::CartSummary;
use crate::domain::aggregates::order::{AppliedCoupon, NewOrderLine, OrderError, PaymentMethod};
use crate::domain::value_objects::Money;

/// Store-wide pricing and fulfilment rules.
#[derive(Clone, Debug)]
pub struct PricingPolicy {
    pub shipping_fee: Money,
    /// Orders worth at least this much after coupons ship free.
    pub free_shipping_min: Money,
    /// Percent applied to the discounted subtotal.
    pub tax_rate: Decimal,
    pub cod_max_amount: Money,
    pub max_quantity_per_item: u32,
    pub return_window_days: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            shipping_fee: Money::from_major(50),
            free_shipping_min: Money::from_major(500),
            tax_rate: Decimal::ZERO,
            cod_max_amount: Money::from_major(1000),
            max_quantity_per_item: 10,
            return_window_days: 7,
        }
    }
}

impl PricingPolicy {
    pub fn shipping_for(&self, discounted_subtotal: Money) -> Money {
        if !discounted_subtotal.is_positive() || discounted_subtotal >= self.free_shipping_min { Money::ZERO } else { self.shipping_fee }
    }

    pub fn tax_for(&self, discounted_subtotal: Money) -> Money {
        discounted_subtotal.floor_zero().percent(self.tax_rate)
    }

    pub fn ensure_payment_allowed(&self, method: PaymentMethod, total: Money) -> Result<(), OrderError> {
        if method == PaymentMethod::Cod && total > self.cod_max_amount {
            return Err(OrderError::CodLimitExceeded(self.cod_max_amount));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Quote {
    /// Active cart lines at offer price.
    pub subtotal: Money,
    pub offer_savings: Money,
    pub coupon_code: Option<String>,
    pub coupon_discount: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub total: Money,
}

impl Quote {
    pub fn build(summary: &CartSummary, coupon: Option<&AppliedCoupon>, policy: &PricingPolicy) -> Self {
        let subtotal = summary.total;
        let coupon_discount = coupon.map_or(Money::ZERO, |c| c.discount.min(subtotal));
        let discounted = subtotal - coupon_discount;
        let shipping_fee = policy.shipping_for(discounted);
        let tax = policy.tax_for(discounted);
        Self {
            subtotal,
            offer_savings: summary.offer_savings,
            coupon_code: coupon.map(|c| c.code.clone()),
            coupon_discount,
            shipping_fee,
            tax,
            total: discounted + shipping_fee + tax,
        }
    }
}

/// Order lines for every active cart line, in cart order.
pub fn order_lines(summary: &CartSummary) -> Result<Vec<NewOrderLine>, OrderError> {
    if summary.lines.is_empty() { return Err(OrderError::NoItems); }
    Ok(summary
        .active_lines()
        .map(|l| NewOrderLine {
            product_id: l.product_id,
            product_name: l.name.clone().unwrap_or_default(),
            original_price: l.list_price,
            unit_price: l.unit_price,
            quantity: l.quantity,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::CartLine;
    use uuid::Uuid;

    fn summary(totals: &[i64]) -> CartSummary {
        let lines: Vec<CartLine> = totals.iter().map(|t| CartLine {
            product_id: Uuid::new_v4(), name: Some("Item".into()), image: None, quantity: 1,
            list_price: Money::from_major(*t), discount_percent: Decimal::ZERO, unit_price: Money::from_major(*t),
            line_total: Money::from_major(*t), active: true, issue: None,
        }).collect();
        let total: Money = lines.iter().map(|l| l.line_total).sum();
        CartSummary { item_count: lines.len() as u32, subtotal: total, offer_savings: Money::ZERO, total, has_inactive_lines: false, lines }
    }

    #[test]
    fn test_quote_adds_shipping_below_threshold() {
        let policy = PricingPolicy::default();
        let quote = Quote::build(&summary(&[200, 150]), None, &policy);
        assert_eq!(quote.shipping_fee, Money::from_major(50));
        assert_eq!(quote.total, Money::from_major(400));

        let coupon = AppliedCoupon { code: "SAVE".into(), discount: Money::from_major(100) };
        let quote = Quote::build(&summary(&[400, 150]), Some(&coupon), &policy);
        assert_eq!(quote.coupon_discount, Money::from_major(100));
        assert_eq!(quote.shipping_fee, Money::from_major(50));
        assert_eq!(quote.total, Money::from_major(500));
    }

    #[test]
    fn test_quote_tax_and_free_shipping() {
        let policy = PricingPolicy { tax_rate: Decimal::from(5), ..PricingPolicy::default() };
        let quote = Quote::build(&summary(&[1000]), None, &policy);
        assert_eq!(quote.shipping_fee, Money::ZERO);
        assert_eq!(quote.tax, Money::from_major(50));
        assert_eq!(quote.total, Money::from_major(1050));
    }

    #[test]
    fn test_cod_limit() {
        let policy = PricingPolicy::default();
        assert!(policy.ensure_payment_allowed(PaymentMethod::Cod, Money::from_major(1000)).is_ok());
        assert_eq!(policy.ensure_payment_allowed(PaymentMethod::Cod, Money::from_major(1001)), Err(OrderError::CodLimitExceeded(Money::from_major(1000))));
        assert!(policy.ensure_payment_allowed(PaymentMethod::Online, Money::from_major(5000)).is_ok());
    }

    #[test]
    fn test_order_lines_require_items() {
        assert_eq!(order_lines(&summary(&[])).unwrap_err(), OrderError::NoItems);
        assert_eq!(order_lines(&summary(&[10, 20])).unwrap().len(), 2);
    }
}
