//! Domain model (ids, blocks, snapshots, artifacts, retention, errors).
//!
//! Nothing in here performs I/O; the ports and app layers build on these types.

pub mod artifact;
pub mod block;
pub mod errors;
pub mod ids;
pub mod page;
pub mod retention;

pub use self::artifact::{ArtifactDescriptor, ArtifactLocation, artifact_name, parse_artifact_name};
pub use self::block::{BlockKind, ContentBlock};
pub use self::errors::{ErrorKind, EvictionFailure, RestoreStep, VaultError};
pub use self::ids::{BlockId, PageId};
pub use self::page::{PageRecord, PageSnapshot, Properties};
pub use self::retention::RetentionPolicy;
