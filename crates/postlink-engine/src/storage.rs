//! What the engine needs from persistent post storage.

use std::collections::BTreeSet;

use async_trait::async_trait;
use postlink_syntax::{PostId, ThreadId};
use serde::{Deserialize, Serialize};

/// A reference from `source` to `target`, confirmed to exist at resolution
/// time. Stored on the target post as a backlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub source: PostId,
    pub target: PostId,
    pub thread: ThreadId,
}

/// Backlink changes for a single target post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklinkUpdate {
    pub target: PostId,
    pub add: BTreeSet<ResolvedReference>,
    pub remove: BTreeSet<ResolvedReference>,
}

impl BacklinkUpdate {
    pub fn new(target: PostId) -> Self {
        Self {
            target,
            add: BTreeSet::new(),
            remove: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Backlink update for post {target} rejected: {reason}")]
    Rejected { target: PostId, reason: String },
}

/// Narrow view of the post store.
///
/// `apply_backlinks` receives every per-target update produced by one sync
/// and must commit all of them or none of them. Applying the same batch
/// twice must leave storage as it was after the first time.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// The thread owning `post`, or `None` if there is no such post.
    async fn post_exists(&self, post: PostId) -> Result<Option<ThreadId>, StorageError>;

    async fn apply_backlinks(&self, updates: &[BacklinkUpdate]) -> Result<(), StorageError>;

    /// Backlinks currently recorded on `post`.
    async fn backlinks(&self, post: PostId) -> Result<BTreeSet<ResolvedReference>, StorageError>;
}
