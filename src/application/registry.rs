use super::gate::AuthorizationGate;
use super::load_active_link;
use super::retry::with_retry;
use crate::config::LedgerConfig;
use crate::domain::identity::{LinkKey, MerchantId, UserId};
use crate::domain::link::Link;
use crate::domain::ports::{Commit, IdentityDirectoryRef, LedgerStoreRef, LinkPrecondition};
use crate::domain::secret::{Pin, SecretHash};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use tracing::instrument;

/// Creates, looks up and removes merchant-user links.
#[derive(Clone)]
pub struct AccountLinkRegistry {
    store: LedgerStoreRef,
    directory: IdentityDirectoryRef,
    gate: AuthorizationGate,
    config: LedgerConfig,
}

impl AccountLinkRegistry {
    pub fn new(
        store: LedgerStoreRef,
        directory: IdentityDirectoryRef,
        gate: AuthorizationGate,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            directory,
            gate,
            config,
        }
    }

    pub async fn ensure_identities(&self, key: &LinkKey) -> Result<()> {
        if !self.directory.merchant_exists(&key.merchant_id).await? {
            return Err(LedgerError::NotFound(format!("merchant {}", key.merchant_id)));
        }
        if !self.directory.user_exists(&key.user_id).await? {
            return Err(LedgerError::NotFound(format!("user {}", key.user_id)));
        }
        Ok(())
    }

    /// Fails with `Conflict` while an active link holds the key.
    pub(crate) async fn ensure_vacant(&self, key: &LinkKey) -> Result<Option<Link>> {
        match self.store.link(key).await? {
            Some(link) if link.is_active() => Err(LedgerError::Conflict(format!(
                "link {key} already exists"
            ))),
            previous => Ok(previous),
        }
    }

    /// Builds the commit that opens a link with an already hashed PIN.
    pub(crate) async fn prepare_link(
        &self,
        key: &LinkKey,
        pin_hash: SecretHash,
    ) -> Result<(Commit, Link)> {
        self.ensure_identities(key).await?;
        let previous = self.ensure_vacant(key).await?;
        let version = previous.map_or(0, |removed| removed.version + 1);
        let link = Link::open(key.clone(), pin_hash, version, Utc::now());
        let commit = Commit::new().put_link(link.clone(), LinkPrecondition::Vacant);
        Ok((commit, link))
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn create_link(&self, key: &LinkKey, pin: &Pin) -> Result<Link> {
        let (commit, link) = self.prepare_link(key, self.gate.hash_pin(pin)?).await?;
        self.store.commit(commit).await?;
        tracing::info!("link created");
        Ok(link)
    }

    pub fn verify_pin(&self, link: &Link, pin: &Pin) -> Result<()> {
        self.gate.verify_pin(pin, &link.pin_hash)
    }

    /// Removes the link after checking its PIN. Transactions recorded under
    /// the key stay queryable.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn delink(&self, key: &LinkKey, pin: &Pin) -> Result<()> {
        with_retry("delink", self.config.max_retries, move || async move {
            let link = load_active_link(self.store.as_ref(), key).await?;
            if let Err(err) = self.verify_pin(&link, pin) {
                tracing::warn!("delink refused: PIN mismatch");
                return Err(err);
            }
            let commit =
                Commit::new().put_link(link.removed(), LinkPrecondition::AtVersion(link.version));
            self.store.commit(commit).await
        })
        .await?;
        tracing::info!("link removed");
        Ok(())
    }

    pub async fn get_link(&self, key: &LinkKey) -> Result<Link> {
        load_active_link(self.store.as_ref(), key).await
    }

    /// Active links of a merchant, newest first.
    pub async fn links_for_merchant(&self, merchant_id: &MerchantId) -> Result<Vec<Link>> {
        let links = self.store.links_for_merchant(merchant_id).await?;
        Ok(newest_active(links))
    }

    /// Active links of a user, newest first.
    pub async fn links_for_user(&self, user_id: &UserId) -> Result<Vec<Link>> {
        let links = self.store.links_for_user(user_id).await?;
        Ok(newest_active(links))
    }
}

fn newest_active(links: Vec<Link>) -> Vec<Link> {
    let mut active: Vec<Link> = links.into_iter().filter(Link::is_active).collect();
    active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    active
}
