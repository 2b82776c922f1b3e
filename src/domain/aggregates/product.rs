//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category_id: Uuid,
    /// Whether the owning category is listed; loaded alongside the product.
    pub category_listed: bool,
    pub price: Money,
    pub stock: u32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable product fields, shared by create and update.
#[derive(Clone, Debug)]
pub struct ProductDetails {
    pub name: String,
    pub description: String,
    pub category_id: Uuid,
    pub price: Money,
    pub stock: u32,
    pub images: Vec<String>,
}

impl ProductDetails {
    fn validated(mut self) -> Result<Self, ProductError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() { return Err(ProductError::MissingName); }
        if !self.price.is_positive() { return Err(ProductError::InvalidPrice); }
        Ok(self)
    }
}

impl Product {
    pub fn create(details: ProductDetails, category_listed: bool) -> Result<Self, ProductError> {
        let d = details.validated()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), name: d.name, description: d.description, category_id: d.category_id,
            category_listed, price: d.price, stock: d.stock, images: d.images, is_active: true,
            created_at: now, updated_at: now,
        })
    }

    pub fn update(&mut self, details: ProductDetails, category_listed: bool) -> Result<(), ProductError> {
        let d = details.validated()?;
        self.name = d.name;
        self.description = d.description;
        self.category_id = d.category_id;
        self.category_listed = category_listed;
        self.price = d.price;
        self.stock = d.stock;
        self.images = d.images;
        self.touch();
        Ok(())
    }

    /// Visible and purchasable on the storefront.
    pub fn is_listed(&self) -> bool { self.is_active && self.category_listed }
    pub fn is_available(&self) -> bool { self.is_listed() && self.stock > 0 }

    pub fn set_active(&mut self, active: bool) { self.is_active = active; self.touch(); }

    pub fn reserve(&mut self, qty: u32) -> Result<(), ProductError> {
        if qty > self.stock { return Err(ProductError::InsufficientStock { name: self.name.clone(), available: self.stock }); }
        self.stock -= qty;
        self.touch();
        Ok(())
    }

    pub fn restock(&mut self, qty: u32) { self.stock = self.stock.saturating_add(qty); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("product name is required")]
    MissingName,
    #[error("price must be greater than zero")]
    InvalidPrice,
    #[error("only {available} of {name} left in stock")]
    InsufficientStock { name: String, available: u32 },
    #[error("product is not available")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> ProductDetails {
        ProductDetails { name: " Desk Lamp ".into(), description: String::new(), category_id: Uuid::nil(), price: Money::from_major(40), stock: 3, images: vec![] }
    }

    #[test]
    fn test_product_create() {
        let p = Product::create(details(), true).unwrap();
        assert_eq!(p.name, "Desk Lamp");
        assert!(p.is_available());
        let err = Product::create(ProductDetails { price: Money::ZERO, ..details() }, true).unwrap_err();
        assert_eq!(err, ProductError::InvalidPrice);
    }

    #[test]
    fn test_stock() {
        let mut p = Product::create(details(), true).unwrap();
        assert!(matches!(p.reserve(4), Err(ProductError::InsufficientStock { available: 3, .. })));
        p.reserve(3).unwrap();
        assert!(!p.is_available());
        p.restock(2);
        assert_eq!(p.stock, 2);
    }

    #[test]
    fn test_unlisted_category_hides_product() {
        let p = Product::create(details(), false).unwrap();
        assert!(!p.is_listed());
        assert!(!p.is_available());
    }
}
