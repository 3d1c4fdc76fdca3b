use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a registered merchant (issued outside this crate).
    MerchantId
);
string_id!(
    /// Identifier of a registered user (issued outside this crate).
    UserId
);

/// Which side of a Link an actor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Merchant,
    User,
}

/// An already-authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Party {
    Merchant(MerchantId),
    User(UserId),
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Merchant(id) => write!(f, "merchant {id}"),
            Party::User(id) => write!(f, "user {id}"),
        }
    }
}

/// The (merchant, user) pair that identifies a Link and its history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub merchant_id: MerchantId,
    pub user_id: UserId,
}

impl LinkKey {
    pub fn new(merchant_id: impl Into<MerchantId>, user_id: impl Into<UserId>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            user_id: user_id.into(),
        }
    }

    /// The party occupying `role` on this pair.
    pub fn party(&self, role: Role) -> Party {
        match role {
            Role::Merchant => Party::Merchant(self.merchant_id.clone()),
            Role::User => Party::User(self.user_id.clone()),
        }
    }

    pub fn involves(&self, party: &Party) -> bool {
        match party {
            Party::Merchant(id) => &self.merchant_id == id,
            Party::User(id) => &self.user_id == id,
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.merchant_id, self.user_id)
    }
}
