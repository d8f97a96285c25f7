//! Storage-facing half of postlink.
//!
//! [`Engine::parse_and_persist`] runs a body through
//! [`postlink_syntax::parse`], checks its references against a
//! [`StorageGateway`] and commits the resulting backlink delta. The stages
//! are also exposed individually ([`resolve()`], [`backlinks::sync`]) for
//! callers that need to drive them separately.

pub mod backlinks;
pub mod lanes;
pub mod memory;
pub mod pipeline;
pub mod resolve;
pub mod storage;

// Re-export key types for easier usage
pub use backlinks::{BacklinkDelta, SyncError, SyncOutcome};
pub use lanes::{LaneGuard, PostLanes};
pub use memory::MemoryStore;
pub use pipeline::{Engine, ParseFailure, ParseResult};
pub use resolve::{ReferenceCandidate, Resolution, ResolveError, resolve};
pub use storage::{BacklinkUpdate, ResolvedReference, StorageError, StorageGateway};
