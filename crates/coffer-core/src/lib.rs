//! Encrypted file vault and share link lifecycle.
//!
//! [`FileVault`] keeps each file as a metadata record plus one ciphertext
//! blob, encrypted under a password that is never persisted.
//! [`ShareLinkManager`] issues bearer tokens that let third parties download
//! a file a limited number of times before a deadline; the password still
//! travels with each download request.
//!
//! Storage is reached only through the [`MetadataStore`] and [`BlobStore`]
//! traits.

pub mod blob;
pub mod error;
pub mod share;
pub mod store;
pub mod vault;

pub use blob::LocalBlobStore;
pub use coffer_crypto::{Cipher, KdfParams};
pub use error::{Error, Result};
pub use share::ShareLinkManager;
pub use store::{BlobStore, MetadataStore};
pub use vault::FileVault;
