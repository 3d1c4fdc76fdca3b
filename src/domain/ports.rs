use super::identity::{LinkKey, MerchantId, Party, UserId};
use super::link::Link;
use super::request::{Request, RequestId};
use super::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What the store must hold before a link write is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPrecondition {
    /// No active link under the key. A removed one may be overwritten.
    Vacant,
    /// The stored link is active and still at this version.
    AtVersion(u64),
}

/// What the store must hold before a request write is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPrecondition {
    /// The id is unused and no other pending request of the same kind
    /// exists for the pair.
    New,
    /// The stored request exists and is still pending.
    Pending,
}

#[derive(Debug, Clone)]
pub enum Mutation {
    PutLink {
        link: Link,
        expect: LinkPrecondition,
    },
    AppendTransaction(Transaction),
    PutRequest {
        request: Request,
        expect: RequestPrecondition,
    },
}

/// A set of writes that land together or not at all.
///
/// Stores check every precondition before applying the first write. A
/// version mismatch on a link fails with `RetryableConflict`; an occupied
/// key or an already resolved request fails with `Conflict`.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    mutations: Vec<Mutation>,
}

impl Commit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_link(mut self, link: Link, expect: LinkPrecondition) -> Self {
        self.mutations.push(Mutation::PutLink { link, expect });
        self
    }

    pub fn append(mut self, tx: Transaction) -> Self {
        self.mutations.push(Mutation::AppendTransaction(tx));
        self
    }

    pub fn put_request(mut self, request: Request, expect: RequestPrecondition) -> Self {
        self.mutations.push(Mutation::PutRequest { request, expect });
        self
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// Filter for the history of one (merchant, user) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    pub key: LinkKey,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl TransactionQuery {
    pub fn new(key: LinkKey, limit: usize) -> Self {
        Self {
            key,
            from: None,
            to: None,
            limit,
        }
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        tx.merchant_id == self.key.merchant_id
            && tx.user_id == self.key.user_id
            && self.from.is_none_or(|from| tx.created_at >= from)
            && self.to.is_none_or(|to| tx.created_at < to)
    }
}

/// Durable storage for links, transactions and requests.
///
/// Reads return newest-first sequences where ordering applies. All writes go
/// through [`LedgerStore::commit`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn link(&self, key: &LinkKey) -> Result<Option<Link>>;
    async fn links_for_merchant(&self, merchant_id: &MerchantId) -> Result<Vec<Link>>;
    async fn links_for_user(&self, user_id: &UserId) -> Result<Vec<Link>>;
    async fn all_links(&self) -> Result<Vec<Link>>;
    async fn transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;
    async fn user_transactions(&self, user_id: &UserId, limit: usize) -> Result<Vec<Transaction>>;
    async fn request(&self, id: RequestId) -> Result<Option<Request>>;
    async fn requests_for(&self, party: &Party) -> Result<Vec<Request>>;
    async fn commit(&self, commit: Commit) -> Result<()>;
}

/// Lookup of identities registered outside this crate.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn merchant_exists(&self, merchant_id: &MerchantId) -> Result<bool>;
    async fn user_exists(&self, user_id: &UserId) -> Result<bool>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type IdentityDirectoryRef = Arc<dyn IdentityDirectory>;
