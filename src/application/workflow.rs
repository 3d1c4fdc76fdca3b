use super::gate::AuthorizationGate;
use super::ledger::LedgerEngine;
use super::load_active_link;
use super::registry::AccountLinkRegistry;
use super::retry::with_retry;
use crate::config::LedgerConfig;
use crate::domain::identity::{LinkKey, Party};
use crate::domain::ports::{Commit, LedgerStoreRef, RequestPrecondition};
use crate::domain::request::{NewRequest, Request, RequestId, RequestKind, RequestStatus};
use crate::domain::secret::Pin;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use tracing::instrument;

const BALANCE_DESCRIPTION: &str = "Balance top-up";
const PAY_DESCRIPTION: &str = "Payment request";

/// Pending -> accepted | rejected, exactly once per request.
///
/// Accepting hands the kind-specific side effect to the registry or the
/// ledger and writes it in the same commit as the status change, so a
/// failed side effect leaves the request pending.
#[derive(Clone)]
pub struct RequestWorkflow {
    store: LedgerStoreRef,
    registry: AccountLinkRegistry,
    ledger: LedgerEngine,
    gate: AuthorizationGate,
    config: LedgerConfig,
}

impl RequestWorkflow {
    pub fn new(
        store: LedgerStoreRef,
        registry: AccountLinkRegistry,
        ledger: LedgerEngine,
        gate: AuthorizationGate,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            ledger,
            gate,
            config,
        }
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn create(&self, key: &LinkKey, new: NewRequest) -> Result<Request> {
        let kind = match new {
            NewRequest::Link { pin } => {
                self.registry.ensure_identities(key).await?;
                self.registry.ensure_vacant(key).await?;
                RequestKind::Link {
                    pin_hash: self.gate.hash_pin(&pin)?,
                }
            }
            NewRequest::Balance {
                amount,
                description,
            } => {
                load_active_link(self.store.as_ref(), key).await?;
                RequestKind::Balance {
                    amount,
                    description,
                }
            }
            NewRequest::Pay {
                amount,
                description,
            } => {
                let link = load_active_link(self.store.as_ref(), key).await?;
                if !link.balance.covers(amount) {
                    return Err(LedgerError::InvalidAmount(format!(
                        "requested {amount} exceeds available balance {}",
                        link.balance
                    )));
                }
                RequestKind::Pay {
                    amount,
                    description,
                }
            }
        };

        let request = Request::pending(key.clone(), kind, Utc::now());
        self.store
            .commit(Commit::new().put_request(request.clone(), RequestPrecondition::New))
            .await?;
        tracing::info!(request = %request.id, kind = request.kind.name(), "request created");
        Ok(request)
    }

    pub async fn get(&self, id: RequestId) -> Result<Request> {
        self.store
            .request(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("request {id}")))
    }

    /// Pending requests raised by or addressed to `party`, newest first.
    pub async fn pending_for(&self, party: &Party) -> Result<Vec<Request>> {
        let mut pending: Vec<Request> = self
            .store
            .requests_for(party)
            .await?
            .into_iter()
            .filter(Request::is_pending)
            .collect();
        pending.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(pending)
    }

    /// Loads a request that `acting` may still resolve.
    async fn resolvable(&self, id: RequestId, acting: &Party) -> Result<Request> {
        let request = self.get(id).await?;
        if !request.is_pending() {
            return Err(LedgerError::Conflict(format!(
                "request {id} already {}",
                request.status
            )));
        }
        if &request.counter_party() != acting {
            tracing::warn!(request = %id, %acting, "resolution by wrong party refused");
            return Err(LedgerError::Unauthorized);
        }
        Ok(request)
    }

    #[instrument(skip_all, fields(request = %id, acting = %acting))]
    pub async fn accept(
        &self,
        id: RequestId,
        acting: &Party,
        supplied_pin: Option<&Pin>,
    ) -> Result<Request> {
        let accepted = with_retry("accept", self.config.max_retries, move || async move {
            let request = self.resolvable(id, acting).await?;
            let key = request.key();
            let side_effect = match &request.kind {
                RequestKind::Link { pin_hash } => {
                    self.registry.prepare_link(&key, pin_hash.clone()).await?.0
                }
                RequestKind::Balance {
                    amount,
                    description,
                } => {
                    let link = load_active_link(self.store.as_ref(), &key).await?;
                    let description = description.as_deref().unwrap_or(BALANCE_DESCRIPTION);
                    self.ledger.prepare_credit(&link, *amount, description)?.0
                }
                RequestKind::Pay {
                    amount,
                    description,
                } => {
                    let link = load_active_link(self.store.as_ref(), &key).await?;
                    let pin = supplied_pin.ok_or(LedgerError::Unauthorized)?;
                    self.registry.verify_pin(&link, pin)?;
                    let description = description.as_deref().unwrap_or(PAY_DESCRIPTION);
                    self.ledger.prepare_debit(&link, *amount, description)?.0
                }
            };
            let accepted = request.resolved(RequestStatus::Accepted, Utc::now());
            let commit = side_effect.put_request(accepted.clone(), RequestPrecondition::Pending);
            self.store.commit(commit).await?;
            Ok(accepted)
        })
        .await?;
        tracing::info!(kind = accepted.kind.name(), "request accepted");
        Ok(accepted)
    }

    #[instrument(skip_all, fields(request = %id, acting = %acting))]
    pub async fn reject(&self, id: RequestId, acting: &Party) -> Result<Request> {
        let request = self.resolvable(id, acting).await?;
        let rejected = request.resolved(RequestStatus::Rejected, Utc::now());
        self.store
            .commit(Commit::new().put_request(rejected.clone(), RequestPrecondition::Pending))
            .await?;
        tracing::info!(kind = rejected.kind.name(), "request rejected");
        Ok(rejected)
    }
}
