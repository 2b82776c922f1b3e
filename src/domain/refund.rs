//! Refund arithmetic and coupon distribution.

use serde::Serialize;
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// Amount refunded for one order line: line total less its coupon share,
/// never negative, in whole currency units.
pub fn item_refund(unit_price: Money, quantity: u32, coupon_share: Money) -> Money {
    (unit_price.multiply(quantity) - coupon_share).floor_zero().round_whole()
}

/// Splits a cart-level coupon discount over the lines in proportion to
/// their totals. Shares are rounded to cents; the rounding remainder is
/// settled on the largest lines first. Every share lies within its line, and
/// the shares add up to `discount` capped at the cart total.
pub fn distribute_coupon(line_totals: &[Money], discount: Money) -> Vec<Money> {
    let total: Money = line_totals.iter().sum();
    if !discount.is_positive() || !total.is_positive() {
        return vec![Money::ZERO; line_totals.len()];
    }
    let discount = discount.min(total);
    let mut shares: Vec<Money> = line_totals
        .iter()
        .map(|line| Money::new(discount.amount() * line.amount() / total.amount()).round_cents().min(*line).floor_zero())
        .collect();

    let mut order: Vec<usize> = (0..line_totals.len()).collect();
    order.sort_by(|&a, &b| line_totals[b].cmp(&line_totals[a]));
    let mut remainder = discount - shares.iter().sum::<Money>();
    for i in order {
        if remainder.is_zero() { break; }
        let step = if remainder.is_positive() {
            remainder.min(line_totals[i] - shares[i])
        } else {
            Money::ZERO - (Money::ZERO - remainder).min(shares[i])
        };
        shares[i] += step;
        remainder -= step;
    }
    shares
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemRefund {
    pub item_id: Uuid,
    pub product_id: Uuid,
    /// Units going back to stock.
    pub quantity: u32,
    pub amount: Money,
}

/// Outcome of a cancellation or an approved return.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Refund {
    pub items: Vec<ItemRefund>,
    pub shipping: Money,
    pub total: Money,
}

impl Refund {
    pub fn is_payable(&self) -> bool { self.total.is_positive() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_item_refund_formula() {
        // max(0, round(price * quantity - share))
        let cases = [
            (Decimal::new(49999, 2), 2, Decimal::new(3333, 2), Decimal::from(967)),
            (Decimal::from(100), 1, Decimal::new(5050, 2), Decimal::from(50)),
            (Decimal::from(100), 1, Decimal::new(4950, 2), Decimal::from(51)),
            (Decimal::from(10), 1, Decimal::from(25), Decimal::ZERO),
            (Decimal::from(250), 3, Decimal::ZERO, Decimal::from(750)),
        ];
        for (price, qty, share, expected) in cases {
            assert_eq!(item_refund(Money::new(price), qty, Money::new(share)), Money::new(expected));
        }
    }

    #[test]
    fn test_shares_sum_to_discount() {
        let lines = [Money::new(Decimal::new(33333, 2)), Money::from_major(100), Money::new(Decimal::new(6667, 2))];
        let discount = Money::from_major(50);
        let shares = distribute_coupon(&lines, discount);
        assert_eq!(shares.iter().sum::<Money>(), discount);
        assert_eq!(shares[0], Money::new(Decimal::new(3333, 2)));
        assert_eq!(shares[1], Money::from_major(10));
        assert_eq!(shares[2], Money::new(Decimal::new(667, 2)));
    }

    #[test]
    fn test_shares_stay_within_their_lines() {
        let cent = Money::new(Decimal::new(1, 2));
        let lines = [cent, cent, cent];
        let shares = distribute_coupon(&lines, Money::new(Decimal::new(2, 2)));
        assert_eq!(shares.iter().sum::<Money>(), Money::new(Decimal::new(2, 2)));
        assert!(shares.iter().all(|s| *s >= Money::ZERO && *s <= cent));

        let lines = [Money::new(Decimal::new(1, 2)), Money::from_major(100)];
        let shares = distribute_coupon(&lines, Money::from_major(30));
        assert_eq!(shares, vec![Money::ZERO, Money::from_major(30)]);

        let lines = [Money::from_major(10), Money::from_major(5)];
        let shares = distribute_coupon(&lines, Money::from_major(40));
        assert_eq!(shares, vec![Money::from_major(10), Money::from_major(5)]);
    }

    #[test]
    fn test_no_discount_gives_zero_shares() {
        assert_eq!(distribute_coupon(&[Money::from_major(10), Money::from_major(20)], Money::ZERO), vec![Money::ZERO, Money::ZERO]);
        assert!(distribute_coupon(&[], Money::from_major(5)).is_empty());
    }
}
