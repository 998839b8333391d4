use std::sync::Arc;

use coffer_core::{Cipher, FileVault, LocalBlobStore, ShareLinkManager};
use coffer_db::Database;

pub type Vault = FileVault<Database, LocalBlobStore>;
pub type Shares = ShareLinkManager<Database>;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub vault: Vault,
    pub shares: Shares,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Request body cap for uploads, multipart framing included.
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        blobs: Arc<LocalBlobStore>,
        cipher: Cipher,
        jwt_secret: String,
        token_ttl_hours: i64,
        max_upload_bytes: usize,
    ) -> AppState {
        Arc::new(Self {
            vault: FileVault::new(db.clone(), blobs, cipher),
            shares: ShareLinkManager::new(db.clone()),
            db,
            jwt_secret,
            token_ttl_hours,
            max_upload_bytes,
        })
    }
}
