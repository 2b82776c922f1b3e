//! Aggregates module
pub mod product;
pub mod category;
pub mod offer;
pub mod cart;
pub mod coupon;
pub mod order;
pub mod wallet;

pub use product::{Product, ProductDetails, ProductError};
pub use category::{Category, CategoryError};
pub use offer::{best_discount, offer_price, Offer, OfferError, OfferTarget, OfferTerms};
pub use cart::{Cart, CartError, CartItem, CartLine, CartSummary};
pub use coupon::{Coupon, CouponDiscount, CouponError, CouponTerms};
pub use order::{AppliedCoupon, NewOrderLine, Order, OrderError, OrderItem, OrderSnapshot, PaymentMethod, PaymentStatus, PlaceOrder, ShippingAddress};
pub use wallet::{EntryKind, Wallet, WalletEntry, WalletError};
