use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use coffer_crypto::{Cipher, CryptoError};
use coffer_types::models::EncryptedFile;

use crate::error::{Error, Result};
use crate::store::{BlobStore, MetadataStore};

/// Shortest password accepted when a file is stored or re-keyed.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Longest display name, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Maps a file id to its metadata record and ciphertext blob.
///
/// Every lookup is scoped to an owner, so another owner's file behaves exactly
/// like a missing one.
pub struct FileVault<M, B> {
    meta: Arc<M>,
    blobs: Arc<B>,
    cipher: Cipher,
}

impl<M: MetadataStore, B: BlobStore> FileVault<M, B> {
    pub fn new(meta: Arc<M>, blobs: Arc<B>, cipher: Cipher) -> Self {
        Self {
            meta,
            blobs,
            cipher,
        }
    }

    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// Encrypt `plaintext` under `password` and persist it.
    ///
    /// The blob is written before the record. If the record cannot be
    /// created the blob is removed again before the error is returned.
    pub async fn store(
        &self,
        owner_id: Uuid,
        filename: &str,
        plaintext: Vec<u8>,
        password: &str,
    ) -> Result<EncryptedFile> {
        if plaintext.is_empty() {
            return Err(Error::Validation("file is empty"));
        }
        validate_filename(filename)?;
        validate_password(password)?;

        let envelope = self.seal(plaintext, password).await?;
        let blob_ref = format!("{}.enc", Uuid::new_v4());
        self.blobs.write(&blob_ref, &envelope).await?;

        let now = Utc::now();
        let record = EncryptedFile {
            id: Uuid::new_v4(),
            owner_id,
            filename: filename.to_string(),
            blob_ref,
            size: envelope.len() as u64,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.meta.create_file(&record) {
            if let Err(cleanup) = self.blobs.delete(&record.blob_ref).await {
                warn!(
                    blob_ref = %record.blob_ref,
                    "Failed to remove blob after metadata error: {cleanup:#}"
                );
            }
            return Err(Error::Storage(e));
        }

        info!(file_id = %record.id, owner_id = %owner_id, size = record.size, "Stored file");
        Ok(record)
    }

    /// Decrypt a file. Unknown id, foreign owner, missing blob and wrong
    /// password all come back as [`Error::AccessDenied`].
    pub async fn retrieve(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        password: &str,
    ) -> Result<(Vec<u8>, String)> {
        let (record, mut plaintext) = self.open(owner_id, file_id, password).await?;
        debug!(file_id = %file_id, "Decrypted file");
        Ok((std::mem::take(&mut *plaintext), record.filename))
    }

    /// Re-encrypt a file under a new password with a fresh salt and nonce.
    ///
    /// The blob overwrite is the last externally visible step; the record
    /// only gets its size and `updated_at` bumped afterwards.
    pub async fn rekey(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        validate_password(new_password)?;

        let (record, plaintext) = self.open(owner_id, file_id, old_password).await?;
        let envelope = self.seal(plaintext, new_password).await?;
        self.blobs.write(&record.blob_ref, &envelope).await?;

        if !self
            .meta
            .touch_file(file_id, owner_id, envelope.len() as u64, Utc::now())?
        {
            // Deleted between the read and the write-back.
            warn!(file_id = %file_id, "File record vanished during re-key");
            return Err(Error::AccessDenied);
        }

        info!(file_id = %file_id, owner_id = %owner_id, "Re-keyed file");
        Ok(())
    }

    /// Remove the blob, then the record.
    pub async fn delete(&self, owner_id: Uuid, file_id: Uuid) -> Result<()> {
        let record = self
            .meta
            .find_file(file_id, owner_id)?
            .ok_or(Error::NotFound)?;

        self.blobs.delete(&record.blob_ref).await?;
        if !self.meta.delete_file(file_id, owner_id)? {
            return Err(Error::NotFound);
        }

        info!(file_id = %file_id, owner_id = %owner_id, "Deleted file");
        Ok(())
    }

    /// Newest first.
    pub fn list(&self, owner_id: Uuid) -> Result<Vec<EncryptedFile>> {
        Ok(self.meta.list_files(owner_id)?)
    }

    /// Record lookup without decryption.
    pub fn find(&self, owner_id: Uuid, file_id: Uuid) -> Result<Option<EncryptedFile>> {
        Ok(self.meta.find_file(file_id, owner_id)?)
    }

    async fn open(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        password: &str,
    ) -> Result<(EncryptedFile, Zeroizing<Vec<u8>>)> {
        let Some(record) = self.meta.find_file(file_id, owner_id)? else {
            return Err(Error::AccessDenied);
        };
        let Some(envelope) = self.blobs.read(&record.blob_ref).await? else {
            warn!(file_id = %file_id, blob_ref = %record.blob_ref, "Blob missing for file record");
            return Err(Error::AccessDenied);
        };
        let plaintext = self.unseal(envelope, password).await?;
        Ok((record, plaintext))
    }

    async fn seal(
        &self,
        plaintext: impl Into<Zeroizing<Vec<u8>>>,
        password: &str,
    ) -> Result<Vec<u8>> {
        let cipher = self.cipher;
        let plaintext = plaintext.into();
        let password = Zeroizing::new(password.to_owned());
        tokio::task::spawn_blocking(move || cipher.encrypt(&plaintext, &password))
            .await
            .map_err(|e| Error::Internal(e.into()))?
            .map_err(crypto_error)
    }

    async fn unseal(&self, envelope: Vec<u8>, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let cipher = self.cipher;
        let password = Zeroizing::new(password.to_owned());
        tokio::task::spawn_blocking(move || {
            cipher.decrypt(&envelope, &password).map(Zeroizing::new)
        })
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .map_err(crypto_error)
    }
}

fn crypto_error(err: CryptoError) -> Error {
    match err {
        CryptoError::Format | CryptoError::Authentication => Error::AccessDenied,
        CryptoError::KeyDerivation | CryptoError::Encryption => Error::Internal(anyhow!(err)),
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(Error::Validation("filename is empty"));
    }
    if filename.len() > MAX_FILENAME_LEN {
        return Err(Error::Validation("filename is too long"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation("password must be at least 6 characters"));
    }
    Ok(())
}
