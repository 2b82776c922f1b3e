//! Pure domain layer: aggregates, pricing and refund rules. No I/O.

pub mod aggregates;
pub mod checkout;
pub mod events;
pub mod refund;
pub mod report;
pub mod status;
pub mod value_objects;
