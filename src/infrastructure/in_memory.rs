use super::preconditions::{check_link, check_request, newest_first};
use crate::domain::identity::{LinkKey, MerchantId, Party, UserId};
use crate::domain::link::Link;
use crate::domain::ports::{
    Commit, IdentityDirectory, LedgerStore, Mutation, TransactionQuery,
};
use crate::domain::request::{Request, RequestId};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Default)]
struct State {
    links: HashMap<LinkKey, Link>,
    /// Per pair, in commit order.
    transactions: HashMap<LinkKey, Vec<Transaction>>,
    requests: HashMap<RequestId, Request>,
}

impl State {
    /// Checks one mutation against the current state without changing it.
    fn check(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::PutLink { link, expect } => {
                let current = self.links.get(&link.key());
                check_link(current, link, *expect)
            }
            Mutation::AppendTransaction(_) => Ok(()),
            Mutation::PutRequest { request, expect } => {
                check_request(self.requests.get(&request.id), request, *expect, || {
                    Ok(self.requests.values().any(|other| request.duplicates(other)))
                })
            }
        }
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::PutLink { link, .. } => {
                self.links.insert(link.key(), link);
            }
            Mutation::AppendTransaction(tx) => {
                self.transactions.entry(tx.key()).or_default().push(tx);
            }
            Mutation::PutRequest { request, .. } => {
                self.requests.insert(request.id, request);
            }
        }
    }
}

/// A thread-safe in-memory ledger store.
///
/// Uses `Arc<RwLock<..>>` so clones share one state. Commits validate every
/// mutation under the write lock before applying any, which makes each
/// commit all-or-nothing. Lock waits are bounded; a timeout surfaces as
/// `RetryableConflict`.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    lock_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            lock_timeout,
        }
    }

    async fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        tokio::time::timeout(self.lock_timeout, self.state.read())
            .await
            .map_err(|_| LedgerError::RetryableConflict)
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        tokio::time::timeout(self.lock_timeout, self.state.write())
            .await
            .map_err(|_| LedgerError::RetryableConflict)
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn link(&self, key: &LinkKey) -> Result<Option<Link>> {
        Ok(self.read().await?.links.get(key).cloned())
    }

    async fn links_for_merchant(&self, merchant_id: &MerchantId) -> Result<Vec<Link>> {
        let state = self.read().await?;
        Ok(state
            .links
            .values()
            .filter(|link| &link.merchant_id == merchant_id)
            .cloned()
            .collect())
    }

    async fn links_for_user(&self, user_id: &UserId) -> Result<Vec<Link>> {
        let state = self.read().await?;
        Ok(state
            .links
            .values()
            .filter(|link| &link.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn all_links(&self) -> Result<Vec<Link>> {
        Ok(self.read().await?.links.values().cloned().collect())
    }

    async fn transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let state = self.read().await?;
        let matching = state
            .transactions
            .get(&query.key)
            .map(|history| {
                history
                    .iter()
                    .filter(|tx| query.matches(tx))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(newest_first(matching, query.limit))
    }

    async fn user_transactions(&self, user_id: &UserId, limit: usize) -> Result<Vec<Transaction>> {
        let state = self.read().await?;
        let matching = state
            .transactions
            .iter()
            .filter(|(key, _)| &key.user_id == user_id)
            .flat_map(|(_, history)| history.iter().cloned())
            .collect();
        Ok(newest_first(matching, limit))
    }

    async fn request(&self, id: RequestId) -> Result<Option<Request>> {
        Ok(self.read().await?.requests.get(&id).cloned())
    }

    async fn requests_for(&self, party: &Party) -> Result<Vec<Request>> {
        let state = self.read().await?;
        Ok(state
            .requests
            .values()
            .filter(|request| request.key().involves(party))
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        let mut state = self.write().await?;
        for mutation in commit.mutations() {
            state.check(mutation)?;
        }
        for mutation in commit.into_mutations() {
            state.apply(mutation);
        }
        Ok(())
    }
}

/// In-memory identity lookup for tests and the batch tool.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    merchants: Arc<RwLock<HashSet<MerchantId>>>,
    users: Arc<RwLock<HashSet<UserId>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_merchant(&self, id: impl Into<MerchantId>) {
        self.merchants.write().await.insert(id.into());
    }

    pub async fn register_user(&self, id: impl Into<UserId>) {
        self.users.write().await.insert(id.into());
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn merchant_exists(&self, merchant_id: &MerchantId) -> Result<bool> {
        Ok(self.merchants.read().await.contains(merchant_id))
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.users.read().await.contains(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{LinkPrecondition, RequestPrecondition};
    use crate::domain::money::Amount;
    use crate::domain::request::{RequestKind, RequestStatus};
    use crate::domain::secret::SecretHash;
    use crate::domain::transaction::Direction;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn open_link() -> Link {
        Link::open(
            LinkKey::new("M1", "U1"),
            SecretHash::from_encoded("x".to_string()),
            0,
            Utc::now(),
        )
    }

    fn credit(link: &Link, value: rust_decimal::Decimal) -> (Link, Transaction) {
        let amount = Amount::new(value).unwrap();
        let after = link.credited(amount).unwrap();
        let tx = Transaction::record(&after, amount, Direction::Credit, "test", Utc::now());
        (after, tx)
    }

    #[tokio::test]
    async fn test_commit_and_read_back() {
        let store = InMemoryStore::new();
        let link = open_link();
        store
            .commit(Commit::new().put_link(link.clone(), LinkPrecondition::Vacant))
            .await
            .unwrap();
        assert_eq!(store.link(&link.key()).await.unwrap(), Some(link.clone()));
        assert!(store.link(&LinkKey::new("M2", "U1")).await.unwrap().is_none());

        let (after, tx) = credit(&link, dec!(10));
        store
            .commit(
                Commit::new()
                    .put_link(after.clone(), LinkPrecondition::AtVersion(0))
                    .append(tx.clone()),
            )
            .await
            .unwrap();
        let history = store
            .transactions(&TransactionQuery::new(link.key(), 10))
            .await
            .unwrap();
        assert_eq!(history, vec![tx]);
    }

    #[tokio::test]
    async fn test_stale_version_writes_nothing() {
        let store = InMemoryStore::new();
        let link = open_link();
        store
            .commit(Commit::new().put_link(link.clone(), LinkPrecondition::Vacant))
            .await
            .unwrap();

        let (first, first_tx) = credit(&link, dec!(10));
        store
            .commit(
                Commit::new()
                    .put_link(first.clone(), LinkPrecondition::AtVersion(0))
                    .append(first_tx),
            )
            .await
            .unwrap();

        // Built from the same stale snapshot; the transaction is listed
        // first so a partial apply would be visible.
        let (stale, stale_tx) = credit(&link, dec!(99));
        let result = store
            .commit(
                Commit::new()
                    .append(stale_tx)
                    .put_link(stale, LinkPrecondition::AtVersion(0)),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::RetryableConflict)));

        assert_eq!(store.link(&link.key()).await.unwrap(), Some(first));
        let history = store
            .transactions(&TransactionQuery::new(link.key(), 10))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_request_transitions_once() {
        let store = InMemoryStore::new();
        let request = Request::pending(
            LinkKey::new("M1", "U1"),
            RequestKind::Balance {
                amount: Amount::new(dec!(5)).unwrap(),
                description: None,
            },
            Utc::now(),
        );
        store
            .commit(Commit::new().put_request(request.clone(), RequestPrecondition::New))
            .await
            .unwrap();

        let accepted = request.resolved(RequestStatus::Accepted, Utc::now());
        let rejected = request.resolved(RequestStatus::Rejected, Utc::now());
        store
            .commit(Commit::new().put_request(accepted.clone(), RequestPrecondition::Pending))
            .await
            .unwrap();
        assert!(matches!(
            store
                .commit(Commit::new().put_request(rejected, RequestPrecondition::Pending))
                .await,
            Err(LedgerError::Conflict(_))
        ));
        assert_eq!(store.request(request.id).await.unwrap(), Some(accepted));
    }

    #[tokio::test]
    async fn test_lock_wait_is_bounded() {
        let store = InMemoryStore::with_lock_timeout(Duration::from_millis(20));
        let _held = store.state.write().await;
        let result = store
            .commit(Commit::new().put_link(open_link(), LinkPrecondition::Vacant))
            .await;
        assert!(matches!(result, Err(LedgerError::RetryableConflict)));
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = InMemoryDirectory::new();
        directory.register_merchant("M1").await;
        assert!(directory.merchant_exists(&"M1".into()).await.unwrap());
        assert!(!directory.merchant_exists(&"M2".into()).await.unwrap());
        assert!(!directory.user_exists(&"M1".into()).await.unwrap());
    }
}
