use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::BlobStore;

/// Envelopes stored as flat files at `{dir}/{blob_ref}`.
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a blob ref. Refs are single file names; anything that could
    /// escape the storage directory is refused.
    pub fn blob_path(&self, blob_ref: &str) -> Result<PathBuf> {
        let valid = !blob_ref.is_empty()
            && !blob_ref.starts_with('.')
            && blob_ref
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if !valid {
            bail!("Invalid blob ref {:?}", blob_ref);
        }
        Ok(self.dir.join(blob_ref))
    }
}

impl BlobStore for LocalBlobStore {
    async fn write(&self, blob_ref: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(blob_ref)?;
        // Stage next to the target and rename over it, so a replaced blob is
        // never visible half-written. Unique name per writer.
        let staging = self.dir.join(format!("{}.{}.tmp", blob_ref, Uuid::new_v4()));

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let result = async {
            let mut file = options.open(&staging).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&staging, &path).await
        }
        .await;

        if let Err(e) = result {
            fs::remove_file(&staging).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn read(&self, blob_ref: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(blob_ref)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, blob_ref: &str) -> Result<()> {
        let path = self.blob_path(blob_ref)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", blob_ref);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", blob_ref);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
