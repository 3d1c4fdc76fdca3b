#![allow(dead_code)]

use paylink::application::engine::PayLinkEngine;
use paylink::config::LedgerConfig;
use paylink::domain::money::Amount;
use paylink::domain::secret::Pin;
use paylink::infrastructure::in_memory::{InMemoryDirectory, InMemoryStore};
use rust_decimal::Decimal;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;

/// Cheap hashing so tests don't spend their time in the PIN gate.
pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        hash_cost: 4,
        ..LedgerConfig::default()
    }
}

/// Engine over a fresh in-memory store with merchants M1, M2 and users
/// U1, U2 registered.
pub async fn engine_with(config: LedgerConfig) -> PayLinkEngine {
    let directory = InMemoryDirectory::new();
    for merchant in ["M1", "M2"] {
        directory.register_merchant(merchant).await;
    }
    for user in ["U1", "U2"] {
        directory.register_user(user).await;
    }
    PayLinkEngine::new(Arc::new(InMemoryStore::new()), Arc::new(directory), config)
}

pub async fn engine() -> PayLinkEngine {
    engine_with(test_config()).await
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

pub fn pin(raw: &str) -> Pin {
    Pin::parse(raw).unwrap()
}

pub fn write_script(path: &Path, rows: &[&str]) -> Result<(), Error> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "op,merchant,user,amount,pin,description")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(())
}
