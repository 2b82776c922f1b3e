//! Wallet Aggregate
//!
//! The wallet is an append-only ledger; the balance is derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind { Credit, Debit }

impl EntryKind {
    pub fn as_str(&self) -> &'static str { match self { Self::Credit => "credit", Self::Debit => "debit" } }
    pub fn parse(s: &str) -> Option<Self> { match s { "credit" => Some(Self::Credit), "debit" => Some(Self::Debit), _ => None } }
}

#[derive(Clone, Debug, Serialize)]
pub struct WalletEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WalletEntry {
    fn signed_amount(&self) -> Money {
        match self.kind { EntryKind::Credit => self.amount, EntryKind::Debit => Money::ZERO - self.amount }
    }
}

#[derive(Clone, Debug)]
pub struct Wallet {
    user_id: Uuid,
    balance: Money,
}

impl Wallet {
    pub fn new(user_id: Uuid, balance: Money) -> Self { Self { user_id, balance } }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn balance(&self) -> Money { self.balance }

    pub fn credit(&mut self, amount: Money, description: impl Into<String>, order_id: Option<Uuid>) -> Result<WalletEntry, WalletError> {
        self.post(EntryKind::Credit, amount, description.into(), order_id)
    }

    pub fn debit(&mut self, amount: Money, description: impl Into<String>, order_id: Option<Uuid>) -> Result<WalletEntry, WalletError> {
        if amount > self.balance { return Err(WalletError::InsufficientBalance { balance: self.balance }); }
        self.post(EntryKind::Debit, amount, description.into(), order_id)
    }

    fn post(&mut self, kind: EntryKind, amount: Money, description: String, order_id: Option<Uuid>) -> Result<WalletEntry, WalletError> {
        if !amount.is_positive() { return Err(WalletError::InvalidAmount); }
        let entry = WalletEntry { id: Uuid::now_v7(), user_id: self.user_id, kind, amount, description, order_id, created_at: Utc::now() };
        self.balance += entry.signed_amount();
        Ok(entry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("insufficient wallet balance ({balance} available)")]
    InsufficientBalance { balance: Money },
    #[error("wallet amount must be greater than zero")]
    InvalidAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_never_negative() {
        let mut wallet = Wallet::new(Uuid::new_v4(), Money::ZERO);
        assert_eq!(wallet.debit(Money::from_major(1), "order", None).unwrap_err(), WalletError::InsufficientBalance { balance: Money::ZERO });
        let credit = wallet.credit(Money::from_major(120), "refund", Some(Uuid::new_v4())).unwrap();
        let debit = wallet.debit(Money::from_major(100), "order", None).unwrap();
        assert_eq!(wallet.balance(), Money::from_major(20));
        assert!(wallet.debit(Money::from_major(21), "order", None).is_err());
        assert_eq!(credit.signed_amount() + debit.signed_amount(), Money::from_major(20));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut wallet = Wallet::new(Uuid::new_v4(), Money::from_major(5));
        assert_eq!(wallet.credit(Money::ZERO, "noop", None).unwrap_err(), WalletError::InvalidAmount);
    }
}
