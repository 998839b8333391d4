#![allow(dead_code)]

use std::sync::Arc;

use coffer_core::{Cipher, FileVault, KdfParams, LocalBlobStore, ShareLinkManager};
use coffer_db::Database;
use tempfile::TempDir;

pub type Vault = FileVault<Database, LocalBlobStore>;

pub struct Fixture {
    pub dir: TempDir,
    pub db: Arc<Database>,
    pub blobs: Arc<LocalBlobStore>,
    pub vault: Arc<Vault>,
    pub shares: Arc<ShareLinkManager<Database>>,
}

/// Low scrypt cost so each derivation takes microseconds.
pub fn fast_cipher() -> Cipher {
    Cipher::new(KdfParams::new(4, 8, 1).unwrap())
}

pub async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let blobs = Arc::new(
        LocalBlobStore::new(dir.path().join("blobs"))
            .await
            .unwrap(),
    );
    let vault = Arc::new(FileVault::new(db.clone(), blobs.clone(), fast_cipher()));
    let shares = Arc::new(ShareLinkManager::new(db.clone()));
    Fixture {
        dir,
        db,
        blobs,
        vault,
        shares,
    }
}

/// Names of everything in the blob directory.
pub fn blob_files(fx: &Fixture) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(fx.blobs.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
