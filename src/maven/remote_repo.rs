use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::RemoteRepository;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// the remote does not have the requested file (404 / 410)
    #[error("not found on remote")]
    NotFound,
    #[error("remote answered with HTTP status {0}")]
    Status(u16),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    /// the body did not match a checksum the remote announced for it
    #[error("integrity check failed: {0}")]
    Integrity(String),
    #[error("invalid remote URL: {0}")]
    InvalidUrl(String),
}
/// Network access to remote repositories.
///
/// Implementations must honor the timeout for the whole request including the body, and
///  must be cancellation safe: dropping the returned future aborts the request.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetches `path`, relative to the remote's base URL
    async fn fetch(&self, remote: &RemoteRepository, path: &str, timeout: Duration) -> Result<Bytes, TransportError>;
}

/// joins a remote's base URL and a repository relative path
pub fn remote_url(base_url: &str, path: &str) -> String {
    let mut url = base_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(path.trim_start_matches('/'));
    url
}
