use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for one file stored encrypted at rest.
///
/// Neither the password nor the derived key is ever part of this record; the
/// salt and nonce needed for decryption travel inside the blob itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Display name from the upload. Never used to locate storage.
    pub filename: String,
    /// Opaque blob store reference, exclusively owned by this record.
    #[serde(skip)]
    pub blob_ref: String,
    /// Length of the stored envelope, not of the plaintext.
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bearer token granting time and count limited download access to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub token: String,
    pub file_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: Option<u32>,
    pub downloads: u32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Active,
    Expired,
    Exhausted,
}

impl ShareLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_downloads.is_some_and(|max| self.downloads >= max)
    }

    /// `None` means unlimited.
    pub fn remaining_downloads(&self) -> Option<u32> {
        self.max_downloads.map(|max| max.saturating_sub(self.downloads))
    }

    /// Expiry is checked before usage, matching the order the consume path reports.
    pub fn state(&self, now: DateTime<Utc>) -> LinkState {
        if self.is_expired(now) {
            LinkState::Expired
        } else if self.is_exhausted() {
            LinkState::Exhausted
        } else {
            LinkState::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(expires_at: Option<DateTime<Utc>>, max: Option<u32>, downloads: u32) -> ShareLink {
        ShareLink {
            token: "t".into(),
            file_id: Uuid::new_v4(),
            expires_at,
            max_downloads: max,
            downloads,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unlimited_link_stays_active() {
        let now = Utc::now();
        let l = link(None, None, 10_000);
        assert_eq!(l.state(now), LinkState::Active);
        assert_eq!(l.remaining_downloads(), None);
    }

    #[test]
    fn download_limit_boundary() {
        let now = Utc::now();
        assert_eq!(link(None, Some(2), 1).state(now), LinkState::Active);
        assert_eq!(link(None, Some(2), 2).state(now), LinkState::Exhausted);
        assert_eq!(link(None, Some(2), 1).remaining_downloads(), Some(1));
    }

    #[test]
    fn expiry_wins_over_remaining_downloads() {
        let now = Utc::now();
        let l = link(Some(now - Duration::minutes(1)), Some(5), 0);
        assert_eq!(l.state(now), LinkState::Expired);

        let exhausted_and_expired = link(Some(now - Duration::minutes(1)), Some(1), 1);
        assert_eq!(exhausted_and_expired.state(now), LinkState::Expired);
    }

    #[test]
    fn deadline_itself_is_still_valid() {
        let now = Utc::now();
        assert_eq!(link(Some(now), None, 0).state(now), LinkState::Active);
    }

    #[test]
    fn blob_ref_is_not_serialized() {
        let file = EncryptedFile {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            filename: "report.pdf".into(),
            blob_ref: "secret-location.enc".into(),
            size: 128,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&file).unwrap();
        assert!(!json.contains("blob_ref"));
        assert!(!json.contains("secret-location"));
    }
}
