use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the vault and the share link manager.
///
/// Messages never carry passwords, keys or file contents.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input; safe to report back verbatim.
    #[error("invalid input: {0}")]
    Validation(&'static str),

    /// Wrong password, unknown file, file owned by someone else, missing
    /// blob or failed tag check. One variant so callers cannot tell them apart.
    #[error("access denied")]
    AccessDenied,

    #[error("not found")]
    NotFound,

    #[error("share link expired")]
    Expired,

    #[error("share link download limit reached")]
    Exhausted,

    /// A backing store failed. Not retried here.
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl Error {
    /// True for the outcomes a share link holder must not be able to tell apart.
    pub fn is_dead_link(&self) -> bool {
        matches!(self, Error::NotFound | Error::Expired | Error::Exhausted)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Storage(err)
    }
}
