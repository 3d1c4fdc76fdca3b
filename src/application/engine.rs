use super::gate::AuthorizationGate;
use super::ledger::LedgerEngine;
use super::load_active_link;
use super::registry::AccountLinkRegistry;
use super::retry::with_retry;
use super::workflow::RequestWorkflow;
use crate::config::LedgerConfig;
use crate::domain::identity::{LinkKey, Party, UserId};
use crate::domain::link::Link;
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{IdentityDirectoryRef, LedgerStoreRef, TransactionQuery};
use crate::domain::request::{NewRequest, Request, RequestId};
use crate::domain::secret::Pin;
use crate::domain::transaction::Transaction;
use crate::error::Result;
use tracing::instrument;

/// The entry point the API layer drives.
///
/// `PayLinkEngine` wires the authorization gate, link registry, ledger and
/// request workflow over one store. Every method takes an actor that has
/// already been authenticated upstream.
#[derive(Clone)]
pub struct PayLinkEngine {
    store: LedgerStoreRef,
    config: LedgerConfig,
    registry: AccountLinkRegistry,
    ledger: LedgerEngine,
    workflow: RequestWorkflow,
}

impl PayLinkEngine {
    /// Creates a new `PayLinkEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - Durable storage for links, transactions and requests.
    /// * `directory` - Lookup of merchants and users registered elsewhere.
    /// * `config` - Retry, timeout and hashing parameters.
    pub fn new(store: LedgerStoreRef, directory: IdentityDirectoryRef, config: LedgerConfig) -> Self {
        let gate = AuthorizationGate::new(config.hash_cost);
        let registry =
            AccountLinkRegistry::new(store.clone(), directory, gate, config.clone());
        let ledger = LedgerEngine::new(store.clone(), config.clone());
        let workflow = RequestWorkflow::new(
            store.clone(),
            registry.clone(),
            ledger.clone(),
            gate,
            config.clone(),
        );
        Self {
            store,
            config,
            registry,
            ledger,
            workflow,
        }
    }

    pub fn registry(&self) -> &AccountLinkRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &LedgerEngine {
        &self.ledger
    }

    pub fn workflow(&self) -> &RequestWorkflow {
        &self.workflow
    }

    pub async fn create_link(&self, key: &LinkKey, pin: &Pin) -> Result<Link> {
        self.registry.create_link(key, pin).await
    }

    pub fn verify_pin(&self, link: &Link, pin: &Pin) -> Result<()> {
        self.registry.verify_pin(link, pin)
    }

    pub async fn delink(&self, key: &LinkKey, pin: &Pin) -> Result<()> {
        self.registry.delink(key, pin).await
    }

    pub async fn apply_credit(
        &self,
        key: &LinkKey,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        self.ledger.apply_credit(key, amount, description).await
    }

    pub async fn apply_debit(
        &self,
        key: &LinkKey,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        self.ledger.apply_debit(key, amount, description).await
    }

    /// Debit the user authorizes at the counter by entering the link PIN.
    ///
    /// The PIN is checked against the same link version the debit commits
    /// on, so a re-link in between is checked again on retry.
    #[instrument(skip_all, fields(key = %key, amount = %amount))]
    pub async fn purchase(
        &self,
        key: &LinkKey,
        amount: Amount,
        description: &str,
        pin: &Pin,
    ) -> Result<Transaction> {
        let tx = with_retry("purchase", self.config.max_retries, move || async move {
            let link = load_active_link(self.store.as_ref(), key).await?;
            if let Err(err) = self.registry.verify_pin(&link, pin) {
                tracing::warn!("purchase refused: PIN mismatch");
                return Err(err);
            }
            let (commit, tx) = self.ledger.prepare_debit(&link, amount, description)?;
            self.store.commit(commit).await?;
            Ok(tx)
        })
        .await?;
        tracing::info!(tx = %tx.id, balance = %tx.balance_after, "purchase applied");
        Ok(tx)
    }

    pub async fn get_balance(&self, key: &LinkKey) -> Result<Money> {
        self.ledger.get_balance(key).await
    }

    pub async fn list_transactions(
        &self,
        key: &LinkKey,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        self.ledger.list_transactions(key, limit).await
    }

    pub async fn history(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        self.ledger.history(query).await
    }

    pub async fn user_history(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        self.ledger.user_history(user_id, limit).await
    }

    pub async fn create_request(&self, key: &LinkKey, new: NewRequest) -> Result<Request> {
        self.workflow.create(key, new).await
    }

    pub async fn accept_request(
        &self,
        id: RequestId,
        acting: &Party,
        supplied_pin: Option<&Pin>,
    ) -> Result<Request> {
        self.workflow.accept(id, acting, supplied_pin).await
    }

    pub async fn reject_request(&self, id: RequestId, acting: &Party) -> Result<Request> {
        self.workflow.reject(id, acting).await
    }

    /// Every active link, ordered by merchant then user.
    pub async fn active_links(&self) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = self
            .store
            .all_links()
            .await?
            .into_iter()
            .filter(Link::is_active)
            .collect();
        links.sort_by_key(Link::key);
        Ok(links)
    }
}
