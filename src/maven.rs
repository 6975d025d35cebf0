//! Maven repository domain: coordinates, the two repository layouts, version ordering,
//!  maven-metadata.xml documents and access to remote repositories.

pub mod coordinates;
pub mod metadata_merge;
pub mod metadata_xml;
pub mod paths;
pub mod remote_repo;
pub mod version;

pub use coordinates::{MavenArtifactRef, MavenClassifier, MavenVersion};
pub use paths::{LayoutTranslator, PathKind, RepositoryLayout};
pub use remote_repo::{RemoteClient, TransportError};
