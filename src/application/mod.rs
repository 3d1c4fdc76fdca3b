//! Application layer: the ledger core.
//!
//! [`gate`] hashes and checks secrets, [`registry`] owns Link lifecycle,
//! [`ledger`] owns balance movement, and [`workflow`] resolves requests by
//! combining the two. [`engine::PayLinkEngine`] bundles them behind one
//! entry point for the API layer.

pub mod engine;
pub mod gate;
pub mod ledger;
pub mod registry;
mod retry;
pub mod workflow;

use crate::domain::identity::LinkKey;
use crate::domain::link::Link;
use crate::domain::ports::LedgerStore;
use crate::error::{LedgerError, Result};

pub(crate) async fn load_active_link(store: &dyn LedgerStore, key: &LinkKey) -> Result<Link> {
    store
        .link(key)
        .await?
        .filter(Link::is_active)
        .ok_or_else(|| LedgerError::NotFound(format!("link {key}")))
}
