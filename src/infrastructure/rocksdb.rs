use super::preconditions::{check_link, check_request, newest_first};
use crate::domain::identity::{LinkKey, MerchantId, Party, UserId};
use crate::domain::link::Link;
use crate::domain::ports::{Commit, LedgerStore, Mutation, RequestPrecondition, TransactionQuery};
use crate::domain::request::{Request, RequestId};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Column Family for link state, keyed by pair.
pub const CF_LINKS: &str = "links";
/// Column Family for transaction history, keyed by pair then transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for requests, keyed by request id.
pub const CF_REQUESTS: &str = "requests";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Length-prefixed so that no merchant id is a byte prefix of another pair.
fn merchant_prefix(merchant_id: &MerchantId) -> Vec<u8> {
    let bytes = merchant_id.as_str().as_bytes();
    let mut key = Vec::with_capacity(4 + bytes.len());
    key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(bytes);
    key
}

fn pair_key(key: &LinkKey) -> Vec<u8> {
    let mut out = merchant_prefix(&key.merchant_id);
    let user = key.user_id.as_str().as_bytes();
    out.extend_from_slice(&(user.len() as u32).to_be_bytes());
    out.extend_from_slice(user);
    out
}

/// Transaction ids are UUIDv7, so keys under a pair sort by creation time.
fn transaction_key(tx: &Transaction) -> Vec<u8> {
    let mut key = pair_key(&tx.key());
    key.extend_from_slice(tx.id.as_bytes());
    key
}

/// A persistent store implementation using RocksDB.
///
/// Links, transactions and requests live in separate Column Families. A
/// commit is validated and then written as a single `WriteBatch` while
/// holding the commit lock, so concurrent commits on clones of the store
/// never interleave.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
    lock_timeout: Duration,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_LINKS, CF_TRANSACTIONS, CF_REQUESTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
            lock_timeout,
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::internal(format!("column family {name} not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every value under `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let mode = IteratorMode::From(prefix, rocksdb::Direction::Forward);
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn has_pending_duplicate(&self, request: &Request) -> Result<bool> {
        let existing: Vec<Request> = self.scan(CF_REQUESTS, &[])?;
        Ok(existing.iter().any(|other| request.duplicates(other)))
    }

    fn check(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::PutLink { link, expect } => {
                let current: Option<Link> = self.get(CF_LINKS, &pair_key(&link.key()))?;
                check_link(current.as_ref(), link, *expect)
            }
            Mutation::AppendTransaction(_) => Ok(()),
            Mutation::PutRequest { request, expect } => {
                let current: Option<Request> = self.get(CF_REQUESTS, request.id.as_bytes())?;
                check_request(current.as_ref(), request, *expect, || {
                    match expect {
                        RequestPrecondition::New => self.has_pending_duplicate(request),
                        RequestPrecondition::Pending => Ok(false),
                    }
                })
            }
        }
    }

    fn stage(&self, batch: &mut WriteBatch, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::PutLink { link, .. } => {
                batch.put_cf(self.cf(CF_LINKS)?, pair_key(&link.key()), serde_json::to_vec(link)?);
            }
            Mutation::AppendTransaction(tx) => {
                batch.put_cf(
                    self.cf(CF_TRANSACTIONS)?,
                    transaction_key(tx),
                    serde_json::to_vec(tx)?,
                );
            }
            Mutation::PutRequest { request, .. } => {
                batch.put_cf(
                    self.cf(CF_REQUESTS)?,
                    request.id.as_bytes(),
                    serde_json::to_vec(request)?,
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn link(&self, key: &LinkKey) -> Result<Option<Link>> {
        self.get(CF_LINKS, &pair_key(key))
    }

    async fn links_for_merchant(&self, merchant_id: &MerchantId) -> Result<Vec<Link>> {
        self.scan(CF_LINKS, &merchant_prefix(merchant_id))
    }

    async fn links_for_user(&self, user_id: &UserId) -> Result<Vec<Link>> {
        let links: Vec<Link> = self.scan(CF_LINKS, &[])?;
        Ok(links
            .into_iter()
            .filter(|link| &link.user_id == user_id)
            .collect())
    }

    async fn all_links(&self) -> Result<Vec<Link>> {
        self.scan(CF_LINKS, &[])
    }

    async fn transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let history: Vec<Transaction> = self.scan(CF_TRANSACTIONS, &pair_key(&query.key))?;
        let matching = history.into_iter().filter(|tx| query.matches(tx)).collect();
        Ok(newest_first(matching, query.limit))
    }

    async fn user_transactions(&self, user_id: &UserId, limit: usize) -> Result<Vec<Transaction>> {
        let history: Vec<Transaction> = self.scan(CF_TRANSACTIONS, &[])?;
        let matching = history
            .into_iter()
            .filter(|tx| &tx.user_id == user_id)
            .collect();
        Ok(newest_first(matching, limit))
    }

    async fn request(&self, id: RequestId) -> Result<Option<Request>> {
        self.get(CF_REQUESTS, id.as_bytes())
    }

    async fn requests_for(&self, party: &Party) -> Result<Vec<Request>> {
        let requests: Vec<Request> = self.scan(CF_REQUESTS, &[])?;
        Ok(requests
            .into_iter()
            .filter(|request| request.key().involves(party))
            .collect())
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        let _guard = tokio::time::timeout(self.lock_timeout, self.commit_lock.lock())
            .await
            .map_err(|_| LedgerError::RetryableConflict)?;

        for mutation in commit.mutations() {
            self.check(mutation)?;
        }
        let mut batch = WriteBatch::default();
        for mutation in commit.mutations() {
            self.stage(&mut batch, mutation)?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::ports::LinkPrecondition;
    use crate::domain::request::{RequestKind, RequestStatus};
    use crate::domain::secret::SecretHash;
    use crate::domain::transaction::Direction;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn open_link(merchant: &str, user: &str) -> Link {
        Link::open(
            LinkKey::new(merchant, user),
            SecretHash::from_encoded("x".to_string()),
            0,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_LINKS).is_some());
        assert!(store.db.cf_handle(CF_TRANSACTIONS).is_some());
        assert!(store.db.cf_handle(CF_REQUESTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_commit_and_scan() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let link = open_link("M1", "U1");
        // "M1" must not pick up links of "M10".
        let other = open_link("M10", "U1");
        store
            .commit(
                Commit::new()
                    .put_link(link.clone(), LinkPrecondition::Vacant)
                    .put_link(other, LinkPrecondition::Vacant),
            )
            .await
            .unwrap();

        let amount = Amount::new(dec!(12.50)).unwrap();
        let after = link.credited(amount).unwrap();
        let tx = Transaction::record(&after, amount, Direction::Credit, "top-up", Utc::now());
        store
            .commit(
                Commit::new()
                    .put_link(after.clone(), LinkPrecondition::AtVersion(0))
                    .append(tx.clone()),
            )
            .await
            .unwrap();

        assert_eq!(store.link(&link.key()).await.unwrap(), Some(after));
        assert_eq!(store.links_for_merchant(&"M1".into()).await.unwrap().len(), 1);
        assert_eq!(store.links_for_user(&"U1".into()).await.unwrap().len(), 2);
        let history = store
            .transactions(&TransactionQuery::new(link.key(), 10))
            .await
            .unwrap();
        assert_eq!(history, vec![tx]);
    }

    #[tokio::test]
    async fn test_rocksdb_failed_precondition_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let link = open_link("M1", "U1");
        store
            .commit(Commit::new().put_link(link.clone(), LinkPrecondition::Vacant))
            .await
            .unwrap();

        let request = Request::pending(
            link.key(),
            RequestKind::Balance {
                amount: Amount::new(dec!(5)).unwrap(),
                description: None,
            },
            Utc::now(),
        );
        let result = store
            .commit(
                Commit::new()
                    .put_request(request.clone(), RequestPrecondition::New)
                    .put_link(link.clone(), LinkPrecondition::AtVersion(7)),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::RetryableConflict)));
        assert!(store.request(request.id).await.unwrap().is_none());

        store
            .commit(Commit::new().put_request(request.clone(), RequestPrecondition::New))
            .await
            .unwrap();
        let accepted = request.resolved(RequestStatus::Accepted, Utc::now());
        store
            .commit(Commit::new().put_request(accepted.clone(), RequestPrecondition::Pending))
            .await
            .unwrap();
        assert_eq!(
            store.requests_for(&Party::User("U1".into())).await.unwrap(),
            vec![accepted]
        );
    }
}
