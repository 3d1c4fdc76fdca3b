use crate::domain::secret::{Pin, SecretHash};
use crate::error::{LedgerError, Result};

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// bcrypt for every low-entropy secret. Passwords and PINs share this
/// primitive.
///
/// The cost and salt travel inside the modular-crypt string, so old hashes
/// keep verifying after the configured cost changes.
///
/// Rate limiting of verification attempts belongs to the caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationGate {
    cost: u32,
}

impl AuthorizationGate {
    /// `cost` is bcrypt's log2 work factor, clamped to what bcrypt accepts.
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash_secret(&self, secret: &[u8]) -> Result<SecretHash> {
        bcrypt::hash(secret, self.cost)
            .map(SecretHash::from_encoded)
            .map_err(|err| LedgerError::Internal(Box::new(err)))
    }

    /// False on mismatch and on any hash that does not parse.
    pub fn verify_secret(&self, secret: &[u8], hash: &SecretHash) -> bool {
        bcrypt::verify(secret, hash.encoded()).unwrap_or(false)
    }

    pub fn hash_pin(&self, pin: &Pin) -> Result<SecretHash> {
        self.hash_secret(pin.as_bytes())
    }

    /// Same check as [`verify_secret`](Self::verify_secret) but as a result
    /// the caller has to handle.
    pub fn verify_pin(&self, pin: &Pin, hash: &SecretHash) -> Result<()> {
        if self.verify_secret(pin.as_bytes(), hash) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }
}
