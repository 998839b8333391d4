use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use coffer_crypto::{generate_share_token, is_well_formed_token, token_hint};
use coffer_types::models::{LinkState, ShareLink};

use crate::error::{Error, Result};
use crate::store::{BlobStore, MetadataStore};
use crate::vault::FileVault;

/// Fresh tokens tried before giving up on a unique one.
const TOKEN_ATTEMPTS: usize = 3;

/// 9999-12-31T23:59:59Z. Later deadlines no longer fit the stored
/// four-digit-year timestamp format.
const LATEST_EXPIRY_SECS: i64 = 253_402_300_799;

/// Issues share links and enforces their expiry and download limits.
///
/// A link is `Active` until its deadline passes, its counter reaches the cap,
/// or its owner deletes it. Callers outside the owning account should not be
/// told which of those happened; see [`Error::is_dead_link`].
pub struct ShareLinkManager<M> {
    meta: Arc<M>,
}

impl<M: MetadataStore> ShareLinkManager<M> {
    pub fn new(meta: Arc<M>) -> Self {
        Self { meta }
    }

    /// Mint a link for `file_id`.
    ///
    /// Ownership of the file is the caller's responsibility. A non-positive
    /// `expires_in_minutes` means no deadline.
    pub fn issue(
        &self,
        file_id: Uuid,
        owner_id: Uuid,
        expires_in_minutes: Option<i64>,
        max_downloads: Option<u32>,
    ) -> Result<ShareLink> {
        self.issue_at(file_id, owner_id, expires_in_minutes, max_downloads, Utc::now())
    }

    pub fn issue_at(
        &self,
        file_id: Uuid,
        owner_id: Uuid,
        expires_in_minutes: Option<i64>,
        max_downloads: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<ShareLink> {
        if max_downloads == Some(0) {
            return Err(Error::Validation("max_downloads must be at least 1"));
        }

        // Timestamps are stored with microsecond precision.
        let now = now.trunc_subsecs(6);
        let expires_at = match expires_in_minutes {
            Some(minutes) if minutes > 0 => Some(
                TimeDelta::try_minutes(minutes)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .filter(|at| at.timestamp() <= LATEST_EXPIRY_SECS)
                    .ok_or(Error::Validation("expiry is out of range"))?,
            ),
            _ => None,
        };

        for _ in 0..TOKEN_ATTEMPTS {
            let link = ShareLink {
                token: generate_share_token(),
                file_id,
                expires_at,
                max_downloads,
                downloads: 0,
                created_by: owner_id,
                created_at: now,
            };
            if self.meta.create_share_link(&link)? {
                info!(
                    token = token_hint(&link.token),
                    file_id = %file_id,
                    ?expires_at,
                    ?max_downloads,
                    "Issued share link"
                );
                return Ok(link);
            }
            warn!("Share token collision, retrying");
        }

        Err(Error::Internal(anyhow!(
            "no unique share token after {TOKEN_ATTEMPTS} attempts"
        )))
    }

    /// Count one download against the link and return it.
    pub fn validate_and_consume(&self, token: &str) -> Result<ShareLink> {
        self.validate_and_consume_at(token, Utc::now())
    }

    /// Check and increment happen in one conditional store update, so
    /// concurrent callers can never push `downloads` past `max_downloads`.
    /// The follow-up read only decides which error to report.
    pub fn validate_and_consume_at(&self, token: &str, now: DateTime<Utc>) -> Result<ShareLink> {
        if !is_well_formed_token(token) {
            return Err(Error::Validation("malformed share token"));
        }

        if let Some(link) = self.meta.consume_share_link(token, now)? {
            debug!(
                token = token_hint(token),
                downloads = link.downloads,
                max_downloads = ?link.max_downloads,
                "Share link consumed"
            );
            return Ok(link);
        }

        let err = match self.meta.find_share_link(token)? {
            None => Error::NotFound,
            Some(link) => match link.state(now) {
                LinkState::Expired => Error::Expired,
                // Active here means the counter moved past us between the
                // failed update and this read.
                LinkState::Exhausted | LinkState::Active => Error::Exhausted,
            },
        };
        debug!(token = token_hint(token), "Share link rejected: {err}");
        Err(err)
    }

    /// Only the creator may delete a link; anyone else gets `NotFound`.
    pub fn delete(&self, token: &str, owner_id: Uuid) -> Result<()> {
        if !is_well_formed_token(token) || !self.meta.delete_share_link(token, owner_id)? {
            return Err(Error::NotFound);
        }
        info!(token = token_hint(token), "Deleted share link");
        Ok(())
    }

    /// Links created by `owner_id`, newest first, dead ones included.
    pub fn list(&self, owner_id: Uuid) -> Result<Vec<ShareLink>> {
        Ok(self.meta.list_share_links(owner_id)?)
    }

    /// Drop rows for links that can never be consumed again.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.meta.prune_share_links(now)?)
    }

    /// Consume a link and decrypt the file it points at with `password`.
    ///
    /// The download is counted even if the password turns out to be wrong,
    /// but an empty password is refused before the link is touched.
    pub async fn redeem<B: BlobStore>(
        &self,
        vault: &FileVault<M, B>,
        token: &str,
        password: &str,
    ) -> Result<(Vec<u8>, String)> {
        if password.is_empty() {
            return Err(Error::Validation("password is required"));
        }
        let link = self.validate_and_consume(token)?;
        vault.retrieve(link.created_by, link.file_id, password).await
    }
}
