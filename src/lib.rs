//! A caching proxy for Maven repositories.
//!
//! Managed repositories are held in local storage and completed on demand from remote
//!  repositories through ordered, policy-governed proxy connectors. Repository groups serve
//!  several managed repositories under one name, merging their metadata documents.

pub mod config;
pub mod error;
pub mod maven;
pub mod policy;
pub mod proxy;
pub mod storage;
pub mod util;

pub use error::ResolveError;
pub use proxy::{RepositoryEngine, ResolvedFile};
