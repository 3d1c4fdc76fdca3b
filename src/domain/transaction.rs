use super::identity::{LinkKey, MerchantId, UserId};
use super::link::Link;
use super::money::{Amount, Money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Time-ordered transaction identifier (UUIDv7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// An immutable ledger entry. Never updated or deleted once committed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub merchant_id: MerchantId,
    pub user_id: UserId,
    pub amount: Amount,
    pub direction: Direction,
    pub description: String,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Records the movement that produced `after`.
    pub(crate) fn record(
        after: &Link,
        amount: Amount,
        direction: Direction,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            merchant_id: after.merchant_id.clone(),
            user_id: after.user_id.clone(),
            amount,
            direction,
            description: description.into(),
            balance_after: after.balance,
            created_at,
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.merchant_id.clone(), self.user_id.clone())
    }

    /// Positive for credits, negative for debits.
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount.value(),
            Direction::Debit => -self.amount.value(),
        }
    }
}

/// Rebuilds a balance from history in any order.
///
/// Entries are folded oldest first; the result is the net of credits minus
/// debits.
pub fn replay<'a>(history: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    let mut entries: Vec<&Transaction> = history.into_iter().collect();
    entries.sort_by_key(|tx| tx.id);
    entries.iter().map(|tx| tx.signed_amount()).sum()
}
