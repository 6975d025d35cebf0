use hyper::StatusCode;

use crate::maven::remote_repo::TransportError;

/// Outcome of a failed resolution or deployment, as surfaced to the serving layer.
///
/// Clone because the result of a single in-flight fetch is shared by every waiting caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// the requested repository or group id does not exist
    #[error("unknown repository {0}")]
    UnknownRepository(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("fetching from remote {remote} failed: {source}")]
    UpstreamTransport {
        remote: String,
        #[source]
        source: TransportError,
    },
    #[error("checksum validation of {path} from remote {remote} failed: {reason}")]
    ChecksumValidationFailed {
        remote: String,
        path: String,
        reason: String,
    },
    /// server misconfiguration, e.g. a connector or group referencing a repository that does not exist
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("writing {path} failed: {reason}")]
    StorageWrite {
        path: String,
        reason: String,
    },
    #[error("redeployment of release artifact {0} is blocked")]
    RedeploymentBlocked(String),
    #[error("repository {repository} does not accept {path}: {reason}")]
    ArtifactNotAccepted {
        repository: String,
        path: String,
        reason: String,
    },
    #[error("internal error: {0}")]
    Internal(String),
}
impl ResolveError {
    pub fn not_found(path: &str) -> ResolveError {
        ResolveError::NotFound(path.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolveError::UnknownRepository(_) | ResolveError::NotFound(_) => StatusCode::NOT_FOUND,
            ResolveError::UpstreamTransport { .. } | ResolveError::ChecksumValidationFailed { .. } => StatusCode::BAD_GATEWAY,
            ResolveError::RedeploymentBlocked(_) => StatusCode::CONFLICT,
            ResolveError::ArtifactNotAccepted { .. } => StatusCode::BAD_REQUEST,
            ResolveError::Configuration(_) | ResolveError::StorageWrite { .. } | ResolveError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
