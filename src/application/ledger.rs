use super::load_active_link;
use super::retry::with_retry;
use crate::config::LedgerConfig;
use crate::domain::identity::{LinkKey, UserId};
use crate::domain::link::Link;
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{Commit, LedgerStoreRef, LinkPrecondition, TransactionQuery};
use crate::domain::transaction::{Direction, Transaction};
use crate::error::Result;
use chrono::Utc;
use tracing::instrument;

/// Owns balance mutation and the append-only history of every Link.
///
/// A balance change and its transaction are always written in one
/// [`Commit`] guarded by the link's version, so either both are observable
/// or neither is. Losing a race is retried up to `max_retries` times.
#[derive(Clone)]
pub struct LedgerEngine {
    store: LedgerStoreRef,
    config: LedgerConfig,
}

impl LedgerEngine {
    pub fn new(store: LedgerStoreRef, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Builds the commit that credits `link` without applying it.
    pub(crate) fn prepare_credit(
        &self,
        link: &Link,
        amount: Amount,
        description: &str,
    ) -> Result<(Commit, Transaction)> {
        let after = link.credited(amount)?;
        let tx = Transaction::record(&after, amount, Direction::Credit, description, Utc::now());
        let commit = Commit::new()
            .put_link(after, LinkPrecondition::AtVersion(link.version))
            .append(tx.clone());
        Ok((commit, tx))
    }

    /// Builds the commit that debits `link` without applying it.
    pub(crate) fn prepare_debit(
        &self,
        link: &Link,
        amount: Amount,
        description: &str,
    ) -> Result<(Commit, Transaction)> {
        let after = link.debited(amount)?;
        let tx = Transaction::record(&after, amount, Direction::Debit, description, Utc::now());
        let commit = Commit::new()
            .put_link(after, LinkPrecondition::AtVersion(link.version))
            .append(tx.clone());
        Ok((commit, tx))
    }

    #[instrument(skip_all, fields(key = %key, amount = %amount))]
    pub async fn apply_credit(
        &self,
        key: &LinkKey,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let tx = with_retry("credit", self.config.max_retries, move || async move {
            let link = load_active_link(self.store.as_ref(), key).await?;
            let (commit, tx) = self.prepare_credit(&link, amount, description)?;
            self.store.commit(commit).await?;
            Ok(tx)
        })
        .await?;
        tracing::info!(tx = %tx.id, balance = %tx.balance_after, "credit applied");
        Ok(tx)
    }

    #[instrument(skip_all, fields(key = %key, amount = %amount))]
    pub async fn apply_debit(
        &self,
        key: &LinkKey,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let tx = with_retry("debit", self.config.max_retries, move || async move {
            let link = load_active_link(self.store.as_ref(), key).await?;
            let (commit, tx) = self.prepare_debit(&link, amount, description)?;
            self.store.commit(commit).await?;
            Ok(tx)
        })
        .await?;
        tracing::info!(tx = %tx.id, balance = %tx.balance_after, "debit applied");
        Ok(tx)
    }

    pub async fn get_balance(&self, key: &LinkKey) -> Result<Money> {
        Ok(load_active_link(self.store.as_ref(), key).await?.balance)
    }

    /// Newest-first history of a pair. Still answers after the link is
    /// removed.
    pub async fn list_transactions(
        &self,
        key: &LinkKey,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let limit = limit.unwrap_or(self.config.default_history_limit);
        self.history(&TransactionQuery::new(key.clone(), limit)).await
    }

    pub async fn history(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        self.store.transactions(query).await
    }

    /// Newest-first history of a user across all merchants.
    pub async fn user_history(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let limit = limit.unwrap_or(self.config.default_user_history_limit);
        self.store.user_transactions(user_id, limit).await
    }
}
