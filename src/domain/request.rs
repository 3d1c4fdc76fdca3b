use super::identity::{LinkKey, MerchantId, Party, Role, UserId};
use super::money::Amount;
use super::secret::{Pin, SecretHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        })
    }
}

/// What a stored request proposes.
///
/// A link request keeps the PIN only in hashed form; the hash becomes the
/// Link's PIN when the merchant accepts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestKind {
    Link {
        pin_hash: SecretHash,
    },
    Balance {
        amount: Amount,
        description: Option<String>,
    },
    Pay {
        amount: Amount,
        description: Option<String>,
    },
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Link { .. } => "link",
            RequestKind::Balance { .. } => "balance",
            RequestKind::Pay { .. } => "pay",
        }
    }

    pub fn amount(&self) -> Option<Amount> {
        match self {
            RequestKind::Link { .. } => None,
            RequestKind::Balance { amount, .. } | RequestKind::Pay { amount, .. } => Some(*amount),
        }
    }

    /// The side that raises this kind of request.
    pub fn requester(&self) -> Role {
        match self {
            RequestKind::Link { .. } | RequestKind::Balance { .. } => Role::User,
            RequestKind::Pay { .. } => Role::Merchant,
        }
    }

    /// The side that must accept or reject it.
    pub fn responder(&self) -> Role {
        match self.requester() {
            Role::User => Role::Merchant,
            Role::Merchant => Role::User,
        }
    }
}

/// Caller input for a new request, before the PIN is hashed.
#[derive(Debug, Clone)]
pub enum NewRequest {
    /// Raised by the user; accepted by the merchant.
    Link { pin: Pin },
    /// Raised by the user asking the merchant to credit `amount`.
    Balance {
        amount: Amount,
        description: Option<String>,
    },
    /// Raised by the merchant asking the user to pay `amount`.
    Pay {
        amount: Amount,
        description: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Request {
    pub id: RequestId,
    pub merchant_id: MerchantId,
    pub user_id: UserId,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Request {
    pub(crate) fn pending(key: LinkKey, kind: RequestKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::generate(),
            merchant_id: key.merchant_id,
            user_id: key.user_id,
            kind,
            status: RequestStatus::Pending,
            created_at,
            responded_at: None,
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.merchant_id.clone(), self.user_id.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn requester(&self) -> Party {
        self.key().party(self.kind.requester())
    }

    pub fn counter_party(&self) -> Party {
        self.key().party(self.kind.responder())
    }

    /// Terminal copy of a pending request. `responded_at` is set here and
    /// nowhere else.
    pub(crate) fn resolved(&self, status: RequestStatus, at: DateTime<Utc>) -> Self {
        debug_assert!(status != RequestStatus::Pending);
        Self {
            status,
            responded_at: Some(at),
            ..self.clone()
        }
    }

    /// True when `other` would be a second pending proposal of the same kind
    /// for the same pair.
    pub fn duplicates(&self, other: &Request) -> bool {
        self.id != other.id
            && self.is_pending()
            && other.is_pending()
            && self.merchant_id == other.merchant_id
            && self.user_id == other.user_id
            && self.kind.name() == other.kind.name()
    }
}
