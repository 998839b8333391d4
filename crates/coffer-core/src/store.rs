use std::future::Future;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use coffer_db::models::{FileRow, ShareLinkRow};
use coffer_db::{Database, format_timestamp, parse_timestamp};
use coffer_types::models::{EncryptedFile, ShareLink};

/// Record persistence for files and share links.
///
/// Implementations must enforce uniqueness of file ids, blob refs and share
/// tokens, and must make [`MetadataStore::consume_share_link`] a single
/// conditional update.
pub trait MetadataStore: Send + Sync + 'static {
    fn create_file(&self, file: &EncryptedFile) -> Result<()>;

    /// `None` both when the id is unknown and when it belongs to another owner.
    fn find_file(&self, id: Uuid, owner_id: Uuid) -> Result<Option<EncryptedFile>>;

    /// Newest first.
    fn list_files(&self, owner_id: Uuid) -> Result<Vec<EncryptedFile>>;

    fn touch_file(
        &self,
        id: Uuid,
        owner_id: Uuid,
        size: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Must also drop every share link pointing at the file.
    fn delete_file(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;

    /// `Ok(false)` means the token is already taken.
    fn create_share_link(&self, link: &ShareLink) -> Result<bool>;

    fn find_share_link(&self, token: &str) -> Result<Option<ShareLink>>;

    /// Increment the download counter only if the link is live at `now`,
    /// returning the updated link. Check and increment are one atomic step.
    fn consume_share_link(&self, token: &str, now: DateTime<Utc>) -> Result<Option<ShareLink>>;

    fn list_share_links(&self, created_by: Uuid) -> Result<Vec<ShareLink>>;

    fn delete_share_link(&self, token: &str, created_by: Uuid) -> Result<bool>;

    fn prune_share_links(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Storage for ciphertext envelopes, addressed by refs the vault chooses.
pub trait BlobStore: Send + Sync + 'static {
    /// Create or replace. Readers see either the old or the new bytes.
    fn write(&self, blob_ref: &str, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// `None` if nothing is stored under `blob_ref`.
    fn read(&self, blob_ref: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Deleting a missing blob succeeds.
    fn delete(&self, blob_ref: &str) -> impl Future<Output = Result<()>> + Send;
}

impl MetadataStore for Database {
    fn create_file(&self, file: &EncryptedFile) -> Result<()> {
        self.insert_file(&FileRow {
            id: file.id.to_string(),
            owner_id: file.owner_id.to_string(),
            filename: file.filename.clone(),
            blob_ref: file.blob_ref.clone(),
            size: i64::try_from(file.size)?,
            created_at: format_timestamp(file.created_at),
            updated_at: format_timestamp(file.updated_at),
        })
    }

    fn find_file(&self, id: Uuid, owner_id: Uuid) -> Result<Option<EncryptedFile>> {
        self.get_file(&id.to_string(), &owner_id.to_string())?
            .map(file_from_row)
            .transpose()
    }

    fn list_files(&self, owner_id: Uuid) -> Result<Vec<EncryptedFile>> {
        Database::list_files(self, &owner_id.to_string())?
            .into_iter()
            .map(file_from_row)
            .collect()
    }

    fn touch_file(
        &self,
        id: Uuid,
        owner_id: Uuid,
        size: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        Database::touch_file(
            self,
            &id.to_string(),
            &owner_id.to_string(),
            i64::try_from(size)?,
            &format_timestamp(updated_at),
        )
    }

    fn delete_file(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        Database::delete_file(self, &id.to_string(), &owner_id.to_string())
    }

    fn create_share_link(&self, link: &ShareLink) -> Result<bool> {
        self.insert_share_link(&ShareLinkRow {
            token: link.token.clone(),
            file_id: link.file_id.to_string(),
            expires_at: link.expires_at.map(format_timestamp),
            max_downloads: link.max_downloads.map(i64::from),
            downloads: i64::from(link.downloads),
            created_by: link.created_by.to_string(),
            created_at: format_timestamp(link.created_at),
        })
    }

    fn find_share_link(&self, token: &str) -> Result<Option<ShareLink>> {
        self.get_share_link(token)?.map(link_from_row).transpose()
    }

    fn consume_share_link(&self, token: &str, now: DateTime<Utc>) -> Result<Option<ShareLink>> {
        Database::consume_share_link(self, token, &format_timestamp(now))?
            .map(link_from_row)
            .transpose()
    }

    fn list_share_links(&self, created_by: Uuid) -> Result<Vec<ShareLink>> {
        Database::list_share_links(self, &created_by.to_string())?
            .into_iter()
            .map(link_from_row)
            .collect()
    }

    fn delete_share_link(&self, token: &str, created_by: Uuid) -> Result<bool> {
        Database::delete_share_link(self, token, &created_by.to_string())
    }

    fn prune_share_links(&self, now: DateTime<Utc>) -> Result<usize> {
        Database::prune_share_links(self, &format_timestamp(now))
    }
}

fn file_from_row(row: FileRow) -> Result<EncryptedFile> {
    Ok(EncryptedFile {
        id: Uuid::parse_str(&row.id).context("file id")?,
        owner_id: Uuid::parse_str(&row.owner_id).context("file owner id")?,
        filename: row.filename,
        blob_ref: row.blob_ref,
        size: u64::try_from(row.size).context("file size")?,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

fn link_from_row(row: ShareLinkRow) -> Result<ShareLink> {
    Ok(ShareLink {
        file_id: Uuid::parse_str(&row.file_id).context("link file id")?,
        expires_at: row.expires_at.as_deref().map(parse_timestamp).transpose()?,
        max_downloads: row
            .max_downloads
            .map(u32::try_from)
            .transpose()
            .context("link max_downloads")?,
        downloads: u32::try_from(row.downloads).context("link downloads")?,
        created_by: Uuid::parse_str(&row.created_by).context("link creator id")?,
        created_at: parse_timestamp(&row.created_at)?,
        token: row.token,
    })
}
