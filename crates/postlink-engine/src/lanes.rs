//! Per-post serialization.
//!
//! Work on the same post runs one at a time, in the order it asked for the
//! lane (tokio's mutex is fair). Different posts never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use postlink_syntax::PostId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct PostLanes {
    lanes: Mutex<HashMap<PostId, Arc<AsyncMutex<()>>>>,
}

/// Exclusive hold on one post's lane. Released on drop.
#[must_use]
#[derive(Debug)]
pub struct LaneGuard {
    post: PostId,
    _guard: OwnedMutexGuard<()>,
}

impl LaneGuard {
    pub fn post(&self) -> PostId {
        self.post
    }
}

impl PostLanes {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, post: PostId) -> LaneGuard {
        let lane = {
            let mut lanes = self.lanes.lock();
            // Lanes only the map still points at are idle
            lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
            Arc::clone(lanes.entry(post).or_default())
        };
        LaneGuard {
            post,
            _guard: lane.lock_owned().await,
        }
    }

    /// Number of lanes currently tracked, idle ones included until the next
    /// `acquire` prunes them.
    pub fn len(&self) -> usize {
        self.lanes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
