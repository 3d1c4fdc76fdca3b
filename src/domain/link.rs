use super::identity::{LinkKey, MerchantId, UserId};
use super::money::{Amount, Money};
use super::secret::SecretHash;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Removed,
}

/// The account a merchant and a user share.
///
/// Every successful write produces a copy with `version` bumped by one; the
/// store only accepts a write whose expected version matches what it holds.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Link {
    pub merchant_id: MerchantId,
    pub user_id: UserId,
    pub balance: Money,
    pub(crate) pin_hash: SecretHash,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Link {
    /// A fresh active link with a zero balance.
    ///
    /// `version` continues from any removed link previously stored under the
    /// same key so a stale writer can never match the new row.
    pub(crate) fn open(
        key: LinkKey,
        pin_hash: SecretHash,
        version: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            merchant_id: key.merchant_id,
            user_id: key.user_id,
            balance: Money::ZERO,
            pin_hash,
            status: LinkStatus::Active,
            created_at,
            version,
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.merchant_id.clone(), self.user_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.status == LinkStatus::Active
    }

    pub(crate) fn credited(&self, amount: Amount) -> Result<Self> {
        Ok(Self {
            balance: self.balance.credit(amount)?,
            version: self.version + 1,
            ..self.clone()
        })
    }

    pub(crate) fn debited(&self, amount: Amount) -> Result<Self> {
        let balance = self
            .balance
            .debit(amount)
            .ok_or(LedgerError::InsufficientBalance {
                current: self.balance,
            })?;
        Ok(Self {
            balance,
            version: self.version + 1,
            ..self.clone()
        })
    }

    pub(crate) fn removed(&self) -> Self {
        Self {
            status: LinkStatus::Removed,
            version: self.version + 1,
            ..self.clone()
        }
    }
}
