//! Cart Aggregate

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::offer::{best_discount, offer_price, Offer};
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Money, Quantity, QuantityError};

#[derive(Clone, Debug)]
pub struct Cart {
    user_id: Uuid,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Offer price at the time the item was added or last changed.
    pub price: Money,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

impl Cart {
    pub fn for_customer(user_id: Uuid) -> Self { Self::restore(user_id, vec![]) }

    pub fn restore(user_id: Uuid, items: Vec<CartItem>) -> Self { Self { user_id, items, updated_at: Utc::now() } }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn item(&self, product_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.product_id == product_id) }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Adds `qty` of `product`, merging with an existing line.
    pub fn add_item(&mut self, product: &Product, qty: u32, unit_price: Money, max_per_item: u32) -> Result<&CartItem, CartError> {
        if !product.is_available() { return Err(CartError::Unavailable); }
        let current = self.item(product.id).map_or(0, |i| i.quantity);
        let wanted = Self::checked_quantity(product, current.saturating_add(qty), max_per_item)?;
        let idx = match self.items.iter().position(|i| i.product_id == product.id) {
            Some(idx) => {
                self.items[idx].quantity = wanted;
                self.items[idx].price = unit_price;
                idx
            }
            None => {
                self.items.push(CartItem { product_id: product.id, quantity: wanted, price: unit_price, added_at: Utc::now() });
                self.items.len() - 1
            }
        };
        self.touch();
        Ok(&self.items[idx])
    }

    /// Sets the quantity of an existing line; zero removes it.
    pub fn update_quantity(&mut self, product: &Product, qty: u32, unit_price: Money, max_per_item: u32) -> Result<Option<&CartItem>, CartError> {
        let idx = self.items.iter().position(|i| i.product_id == product.id).ok_or(CartError::ItemNotFound)?;
        if qty == 0 {
            self.items.remove(idx);
            self.touch();
            return Ok(None);
        }
        if !product.is_listed() { return Err(CartError::Unavailable); }
        let wanted = Self::checked_quantity(product, qty, max_per_item)?;
        self.items[idx].quantity = wanted;
        self.items[idx].price = unit_price;
        self.touch();
        Ok(Some(&self.items[idx]))
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    /// Re-prices every line against current products and live offers.
    pub fn summarize(&self, products: &HashMap<Uuid, Product>, offers: &[Offer], now: DateTime<Utc>) -> CartSummary {
        let lines: Vec<CartLine> = self.items.iter().map(|item| CartLine::price(item, products.get(&item.product_id), offers, now)).collect();
        let active = || lines.iter().filter(|l| l.active);
        let subtotal: Money = active().map(|l| l.list_price.multiply(l.quantity)).sum();
        let total: Money = active().map(|l| l.line_total).sum();
        CartSummary {
            item_count: active().map(|l| l.quantity).sum(),
            has_inactive_lines: lines.iter().any(|l| !l.active),
            offer_savings: subtotal - total,
            subtotal,
            total,
            lines,
        }
    }

    fn checked_quantity(product: &Product, qty: u32, max_per_item: u32) -> Result<u32, CartError> {
        let qty = Quantity::bounded(qty, max_per_item)?.value();
        if qty > product.stock { return Err(CartError::ExceedsStock { available: product.stock }); }
        Ok(qty)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub quantity: u32,
    pub list_price: Money,
    pub discount_percent: Decimal,
    pub unit_price: Money,
    pub line_total: Money,
    /// Counted in the cart total; false when the product is gone, unlisted, or short on stock.
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

impl CartLine {
    fn price(item: &CartItem, product: Option<&Product>, offers: &[Offer], now: DateTime<Utc>) -> Self {
        let Some(product) = product else {
            return Self {
                product_id: item.product_id, name: None, image: None, quantity: item.quantity,
                list_price: item.price, discount_percent: Decimal::ZERO, unit_price: item.price,
                line_total: item.line_total(), active: false, issue: Some("product no longer exists".into()),
            };
        };
        let discount_percent = best_discount(offers, product.id, product.category_id, now);
        let unit_price = offer_price(product.price, discount_percent);
        let issue = if !product.is_listed() {
            Some("product is not available".to_string())
        } else if product.stock < item.quantity {
            Some(format!("only {} left in stock", product.stock))
        } else {
            None
        };
        Self {
            product_id: product.id, name: Some(product.name.clone()), image: product.images.first().cloned(),
            quantity: item.quantity, list_price: product.price, discount_percent, unit_price,
            line_total: unit_price.multiply(item.quantity), active: issue.is_none(), issue,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    /// Active lines at list price.
    pub subtotal: Money,
    pub offer_savings: Money,
    /// Active lines at offer price.
    pub total: Money,
    pub has_inactive_lines: bool,
}

impl CartSummary {
    pub fn active_lines(&self) -> impl Iterator<Item = &CartLine> { self.lines.iter().filter(|l| l.active) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("item not found in cart")]
    ItemNotFound,
    #[error("product is not available")]
    Unavailable,
    #[error("only {available} left in stock")]
    ExceedsStock { available: u32 },
    #[error(transparent)]
    Quantity(#[from] QuantityError),
    #[error("cart is empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::offer::{OfferTarget, OfferTerms};
    use crate::domain::aggregates::product::ProductDetails;
    use chrono::Duration;

    fn product(price: i64, stock: u32) -> Product {
        Product::create(ProductDetails { name: "Widget".into(), description: String::new(), category_id: Uuid::new_v4(), price: Money::from_major(price), stock, images: vec![] }, true).unwrap()
    }

    #[test]
    fn test_cart_operations() {
        let p = product(10, 20);
        let mut cart = Cart::for_customer(Uuid::new_v4());
        cart.add_item(&p, 2, p.price, 5).unwrap();
        cart.add_item(&p, 1, p.price, 5).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert_eq!(cart.add_item(&p, 3, p.price, 5).unwrap_err(), CartError::Quantity(QuantityError::AboveLimit(5)));
        assert!(cart.update_quantity(&p, 0, p.price, 5).unwrap().is_none());
        assert!(cart.is_empty());
        assert_eq!(cart.remove_item(p.id).unwrap_err(), CartError::ItemNotFound);
    }

    #[test]
    fn test_add_respects_stock() {
        let p = product(10, 2);
        let mut cart = Cart::for_customer(Uuid::new_v4());
        assert_eq!(cart.add_item(&p, 3, p.price, 10).unwrap_err(), CartError::ExceedsStock { available: 2 });
        let mut hidden = p.clone();
        hidden.set_active(false);
        assert_eq!(cart.add_item(&hidden, 1, p.price, 10).unwrap_err(), CartError::Unavailable);
    }

    #[test]
    fn test_total_is_sum_of_active_offer_adjusted_lines() {
        let now = Utc::now();
        let discounted = product(200, 10);
        let plain = product(50, 10);
        let short = product(30, 1);
        let gone = Uuid::new_v4();
        let offers = vec![Offer::create(OfferTerms {
            name: "Sale".into(), target: OfferTarget::Category(discounted.category_id), discount_percent: Decimal::from(25),
            starts_at: now - Duration::days(1), ends_at: now + Duration::days(1),
        }).unwrap()];

        let mut cart = Cart::for_customer(Uuid::new_v4());
        cart.add_item(&discounted, 2, discounted.price, 10).unwrap();
        cart.add_item(&plain, 3, plain.price, 10).unwrap();
        let mut items = cart.items().to_vec();
        items.push(CartItem { product_id: short.id, quantity: 4, price: short.price, added_at: now });
        items.push(CartItem { product_id: gone, quantity: 1, price: Money::from_major(99), added_at: now });
        let cart = Cart::restore(cart.user_id(), items);

        let products: HashMap<Uuid, Product> = [discounted.clone(), plain.clone(), short.clone()].into_iter().map(|p| (p.id, p)).collect();
        let summary = cart.summarize(&products, &offers, now);

        let expected: Money = summary.active_lines().map(|l| l.unit_price.multiply(l.quantity)).sum();
        assert_eq!(summary.total, expected);
        assert_eq!(summary.total, Money::from_major(150 * 2 + 50 * 3));
        assert_eq!(summary.subtotal, Money::from_major(200 * 2 + 50 * 3));
        assert_eq!(summary.offer_savings, Money::from_major(100));
        assert_eq!(summary.item_count, 5);
        assert!(summary.has_inactive_lines);
        assert_eq!(summary.lines.iter().filter(|l| !l.active).count(), 2);
    }
}
