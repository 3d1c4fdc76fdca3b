use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A plaintext PIN of 4 to 6 ASCII digits.
///
/// Deliberately has no `Display` or `Serialize` so it cannot end up in a log
/// line or a stored row.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub const MIN_LEN: usize = 4;
    pub const MAX_LEN: usize = 6;

    pub fn parse(raw: &str) -> Result<Self> {
        let valid = (Self::MIN_LEN..=Self::MAX_LEN).contains(&raw.len())
            && raw.bytes().all(|b| b.is_ascii_digit());
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(LedgerError::InvalidPin)
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for Pin {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin([REDACTED])")
    }
}

/// Encoded output of the authorization gate's slow hash.
///
/// Opaque outside the crate: only the gate produces or inspects one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretHash(String);

impl SecretHash {
    pub(crate) fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    pub(crate) fn encoded(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_shape() {
        assert!(Pin::parse("1234").is_ok());
        assert!(Pin::parse("000000").is_ok());
        assert!(matches!(Pin::parse("123"), Err(LedgerError::InvalidPin)));
        assert!(matches!(Pin::parse("1234567"), Err(LedgerError::InvalidPin)));
        assert!(matches!(Pin::parse("12a4"), Err(LedgerError::InvalidPin)));
        // Non-ASCII digits are not accepted even though they are numeric.
        assert!(matches!(Pin::parse("١٢٣٤"), Err(LedgerError::InvalidPin)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let pin: Pin = "4321".parse().unwrap();
        assert!(!format!("{pin:?}").contains("4321"));

        let hash = SecretHash::from_encoded("$ps256$4$00$00".to_string());
        assert!(!format!("{hash:?}").contains("ps256"));
    }
}
