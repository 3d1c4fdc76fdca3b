use super::csv::script_reader::{Operation, ScriptRow};
use crate::application::engine::PayLinkEngine;
use crate::domain::identity::LinkKey;
use crate::domain::money::Amount;
use crate::domain::secret::Pin;
use crate::error::{LedgerError, Result};
use crate::infrastructure::in_memory::InMemoryDirectory;

const CREDIT_DESCRIPTION: &str = "Credit";
const DEBIT_DESCRIPTION: &str = "Debit";
const PURCHASE_DESCRIPTION: &str = "Purchase";

/// Applies script rows to an engine.
///
/// Identities are registered by the script itself, so the runner owns the
/// directory the engine was built with.
pub struct ScriptRunner {
    engine: PayLinkEngine,
    directory: InMemoryDirectory,
}

impl ScriptRunner {
    pub fn new(engine: PayLinkEngine, directory: InMemoryDirectory) -> Self {
        Self { engine, directory }
    }

    pub fn engine(&self) -> &PayLinkEngine {
        &self.engine
    }

    pub async fn apply(&self, row: ScriptRow) -> Result<()> {
        match row.op {
            Operation::RegisterMerchant => {
                self.directory.register_merchant(required(row.merchant, "merchant")?).await;
            }
            Operation::RegisterUser => {
                self.directory.register_user(required(row.user, "user")?).await;
            }
            Operation::Link => {
                let key = key(&row)?;
                self.engine.create_link(&key, &pin(&row)?).await?;
            }
            Operation::Credit => {
                let key = key(&row)?;
                let description = row.description.as_deref().unwrap_or(CREDIT_DESCRIPTION);
                self.engine.apply_credit(&key, amount(&row)?, description).await?;
            }
            Operation::Debit => {
                let key = key(&row)?;
                let description = row.description.as_deref().unwrap_or(DEBIT_DESCRIPTION);
                self.engine.apply_debit(&key, amount(&row)?, description).await?;
            }
            Operation::Purchase => {
                let key = key(&row)?;
                let description = row.description.as_deref().unwrap_or(PURCHASE_DESCRIPTION);
                self.engine
                    .purchase(&key, amount(&row)?, description, &pin(&row)?)
                    .await?;
            }
            Operation::Delink => {
                let key = key(&row)?;
                self.engine.delink(&key, &pin(&row)?).await?;
            }
        }
        Ok(())
    }
}

fn required(field: Option<String>, name: &'static str) -> Result<String> {
    field
        .filter(|value| !value.is_empty())
        .ok_or(LedgerError::MissingField(name))
}

fn key(row: &ScriptRow) -> Result<LinkKey> {
    Ok(LinkKey::new(
        required(row.merchant.clone(), "merchant")?,
        required(row.user.clone(), "user")?,
    ))
}

fn amount(row: &ScriptRow) -> Result<Amount> {
    Amount::new(row.amount.ok_or(LedgerError::MissingField("amount"))?)
}

fn pin(row: &ScriptRow) -> Result<Pin> {
    Pin::parse(row.pin.as_deref().ok_or(LedgerError::MissingField("pin"))?)
}
