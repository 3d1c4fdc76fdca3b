//! Commit precondition rules shared by every [`LedgerStore`] backend.
//!
//! [`LedgerStore`]: crate::domain::ports::LedgerStore

use crate::domain::link::Link;
use crate::domain::ports::{LinkPrecondition, RequestPrecondition};
use crate::domain::request::Request;
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};

pub(crate) fn check_link(
    current: Option<&Link>,
    next: &Link,
    expect: LinkPrecondition,
) -> Result<()> {
    match expect {
        LinkPrecondition::Vacant => match current {
            Some(existing) if existing.is_active() => Err(LedgerError::Conflict(format!(
                "link {} already exists",
                next.key()
            ))),
            _ => Ok(()),
        },
        LinkPrecondition::AtVersion(version) => match current {
            Some(existing) if existing.is_active() && existing.version == version => Ok(()),
            _ => Err(LedgerError::RetryableConflict),
        },
    }
}

/// `has_duplicate` is only consulted for new requests.
pub(crate) fn check_request(
    current: Option<&Request>,
    next: &Request,
    expect: RequestPrecondition,
    has_duplicate: impl FnOnce() -> Result<bool>,
) -> Result<()> {
    match expect {
        RequestPrecondition::New => {
            if current.is_some() {
                return Err(LedgerError::Conflict(format!("request {} exists", next.id)));
            }
            if has_duplicate()? {
                return Err(LedgerError::Conflict(format!(
                    "a {} request for {} is already pending",
                    next.kind.name(),
                    next.key()
                )));
            }
            Ok(())
        }
        RequestPrecondition::Pending => match current {
            None => Err(LedgerError::NotFound(format!("request {}", next.id))),
            Some(stored) if !stored.is_pending() => Err(LedgerError::Conflict(format!(
                "request {} already {}",
                stored.id, stored.status
            ))),
            Some(_) => Ok(()),
        },
    }
}

pub(crate) fn newest_first(mut transactions: Vec<Transaction>, limit: usize) -> Vec<Transaction> {
    transactions.sort_by(|a, b| b.id.cmp(&a.id));
    transactions.truncate(limit);
    transactions
}
