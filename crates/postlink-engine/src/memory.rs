//! In-process [`StorageGateway`], used by the CLI and the tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use postlink_syntax::{PostId, ThreadId};

use crate::storage::{BacklinkUpdate, ResolvedReference, StorageError, StorageGateway};

#[derive(Debug, Default)]
struct State {
    posts: HashMap<PostId, ThreadId>,
    backlinks: HashMap<PostId, BTreeSet<ResolvedReference>>,
}

/// Posts and backlinks held in memory.
///
/// Besides the gateway itself it records which posts were queried and which
/// batches were written, and can be told to fail reads or writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    queried: Mutex<Vec<PostId>>,
    batches: Mutex<Vec<Vec<BacklinkUpdate>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post(self, post: PostId, thread: ThreadId) -> Self {
        self.insert_post(post, thread);
        self
    }

    pub fn insert_post(&self, post: PostId, thread: ThreadId) {
        self.state.write().posts.insert(post, thread);
    }

    /// Forget a post. Backlinks pointing at it are kept, as a real store
    /// would keep them until the caller cleans up.
    pub fn remove_post(&self, post: PostId) {
        self.state.write().posts.remove(&post);
    }

    /// Every `post_exists` argument, in call order.
    pub fn queried(&self) -> Vec<PostId> {
        self.queried.lock().clone()
    }

    /// Every batch that was committed, in commit order.
    pub fn batches(&self) -> Vec<Vec<BacklinkUpdate>> {
        self.batches.lock().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn backlinks_of(&self, post: PostId) -> BTreeSet<ResolvedReference> {
        self.state
            .read()
            .backlinks
            .get(&post)
            .cloned()
            .unwrap_or_default()
    }

    fn validate(update: &BacklinkUpdate) -> Result<(), StorageError> {
        let misplaced = update
            .add
            .iter()
            .chain(&update.remove)
            .find(|reference| reference.target != update.target);
        match misplaced {
            Some(reference) => Err(StorageError::Rejected {
                target: update.target,
                reason: format!("entry targets post {}", reference.target),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageGateway for MemoryStore {
    async fn post_exists(&self, post: PostId) -> Result<Option<ThreadId>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".to_string()));
        }
        self.queried.lock().push(post);
        Ok(self.state.read().posts.get(&post).copied())
    }

    async fn apply_backlinks(&self, updates: &[BacklinkUpdate]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        // Check the whole batch before touching anything
        for update in updates {
            Self::validate(update)?;
        }

        let mut state = self.state.write();
        for update in updates {
            let set = state.backlinks.entry(update.target).or_default();
            for reference in &update.remove {
                set.remove(reference);
            }
            set.extend(update.add.iter().copied());
            if set.is_empty() {
                state.backlinks.remove(&update.target);
            }
        }
        drop(state);

        self.batches.lock().push(updates.to_vec());
        Ok(())
    }

    async fn backlinks(&self, post: PostId) -> Result<BTreeSet<ResolvedReference>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".to_string()));
        }
        Ok(self.backlinks_of(post))
    }
}
