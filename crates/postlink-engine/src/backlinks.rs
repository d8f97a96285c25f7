//! Keeping backlinks on referenced posts in step with a post's references.

use std::collections::{BTreeMap, BTreeSet};

use postlink_syntax::PostId;

use crate::storage::{BacklinkUpdate, ResolvedReference, StorageError, StorageGateway};

/// Additions and removals caused by one post's references changing,
/// grouped per target post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklinkDelta {
    updates: BTreeMap<PostId, BacklinkUpdate>,
}

impl BacklinkDelta {
    /// Difference between `previous` and `new`. Entries written by other
    /// posts are ignored, since a post only owns its own contribution.
    pub fn between(
        source: PostId,
        previous: &[ResolvedReference],
        new: &[ResolvedReference],
    ) -> Self {
        let own = |refs: &[ResolvedReference]| -> BTreeSet<ResolvedReference> {
            refs.iter()
                .filter(|reference| reference.source == source)
                .copied()
                .collect()
        };
        let previous = own(previous);
        let new = own(new);

        let mut delta = Self::default();
        for removed in previous.difference(&new) {
            delta.entry(removed.target).remove.insert(*removed);
        }
        for added in new.difference(&previous) {
            delta.entry(added.target).add.insert(*added);
        }
        delta
    }

    fn entry(&mut self, target: PostId) -> &mut BacklinkUpdate {
        self.updates
            .entry(target)
            .or_insert_with(|| BacklinkUpdate::new(target))
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn updates(&self) -> impl Iterator<Item = &BacklinkUpdate> {
        self.updates.values()
    }

    pub fn additions(&self) -> usize {
        self.updates().map(|update| update.add.len()).sum()
    }

    pub fn removals(&self) -> usize {
        self.updates().map(|update| update.remove.len()).sum()
    }

    pub fn into_updates(self) -> Vec<BacklinkUpdate> {
        self.updates.into_values().collect()
    }
}

/// What a successful sync changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    pub added: usize,
    pub removed: usize,
    /// Number of target posts touched
    pub targets: usize,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.targets == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Backlink sync failed: {0}")]
    Storage(#[from] StorageError),
}

/// Apply the delta from `previous` to `new` as one storage batch.
///
/// Safe to retry with the same arguments: the batch has set semantics.
pub async fn sync(
    gateway: &dyn StorageGateway,
    source: PostId,
    previous: &[ResolvedReference],
    new: &[ResolvedReference],
) -> Result<SyncOutcome, SyncError> {
    let delta = BacklinkDelta::between(source, previous, new);
    if delta.is_empty() {
        log::debug!("post {source}: backlinks unchanged");
        return Ok(SyncOutcome::default());
    }

    let outcome = SyncOutcome {
        added: delta.additions(),
        removed: delta.removals(),
        targets: delta.updates.len(),
    };
    gateway
        .apply_backlinks(&delta.into_updates())
        .await
        .inspect_err(|err| log::warn!("post {source}: backlink commit failed: {err}"))?;

    log::debug!(
        "post {source}: {} backlink(s) added, {} removed across {} post(s)",
        outcome.added,
        outcome.removed,
        outcome.targets
    );
    Ok(outcome)
}

/// Withdraw every backlink `source` contributed, for when it is deleted.
pub async fn remove_all(
    gateway: &dyn StorageGateway,
    source: PostId,
    previous: &[ResolvedReference],
) -> Result<SyncOutcome, SyncError> {
    sync(gateway, source, previous, &[]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use postlink_syntax::ThreadId;
    use pretty_assertions::assert_eq;

    const SOURCE: PostId = PostId(10);

    fn to(target: u64) -> ResolvedReference {
        ResolvedReference {
            source: SOURCE,
            target: PostId(target),
            thread: ThreadId(1),
        }
    }

    #[test]
    fn delta_between_overlapping_sets() {
        let delta = BacklinkDelta::between(SOURCE, &[to(1), to(2)], &[to(2), to(3)]);

        let updates = delta.clone().into_updates();
        assert_eq!(
            updates,
            vec![
                BacklinkUpdate {
                    remove: BTreeSet::from([to(1)]),
                    ..BacklinkUpdate::new(PostId(1))
                },
                BacklinkUpdate {
                    add: BTreeSet::from([to(3)]),
                    ..BacklinkUpdate::new(PostId(3))
                },
            ]
        );
        assert_eq!((delta.additions(), delta.removals()), (1, 1));
    }

    #[test]
    fn creation_is_pure_addition() {
        let delta = BacklinkDelta::between(SOURCE, &[], &[to(1), to(2)]);
        assert_eq!((delta.additions(), delta.removals()), (2, 0));
    }

    #[test]
    fn foreign_entries_are_ignored() {
        let foreign = ResolvedReference {
            source: PostId(99),
            ..to(4)
        };
        let delta = BacklinkDelta::between(SOURCE, &[foreign], &[]);
        assert!(delta.is_empty());
    }

    #[tokio::test]
    async fn unchanged_references_skip_storage() {
        let store = MemoryStore::new();
        let outcome = sync(&store, SOURCE, &[to(1)], &[to(1)]).await.unwrap();
        assert!(outcome.is_noop());
        assert!(store.batches().is_empty());
    }

    #[tokio::test]
    async fn whole_delta_goes_in_one_batch() {
        let store = MemoryStore::new();
        sync(&store, SOURCE, &[], &[to(1), to(2)]).await.unwrap();
        let outcome = sync(&store, SOURCE, &[to(1), to(2)], &[to(2), to(3)])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SyncOutcome {
                added: 1,
                removed: 1,
                targets: 2
            }
        );
        assert_eq!(store.batches().len(), 2);
        assert!(store.backlinks_of(PostId(1)).is_empty());
        assert_eq!(store.backlinks_of(PostId(2)), BTreeSet::from([to(2)]));
        assert_eq!(store.backlinks_of(PostId(3)), BTreeSet::from([to(3)]));
    }

    #[tokio::test]
    async fn repeating_a_sync_changes_nothing() {
        let store = MemoryStore::new();
        sync(&store, SOURCE, &[], &[to(1), to(2)]).await.unwrap();
        sync(&store, SOURCE, &[to(1), to(2)], &[to(2), to(3)])
            .await
            .unwrap();
        let snapshot = |store: &MemoryStore| {
            [1, 2, 3].map(|post| store.backlinks_of(PostId(post)))
        };
        let after_first = snapshot(&store);

        sync(&store, SOURCE, &[to(1), to(2)], &[to(2), to(3)])
            .await
            .unwrap();

        assert_eq!(snapshot(&store), after_first);
        assert_eq!(
            after_first,
            [
                BTreeSet::new(),
                BTreeSet::from([to(2)]),
                BTreeSet::from([to(3)]),
            ]
        );
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let result = sync(&store, SOURCE, &[], &[to(1), to(2)]).await;

        assert!(matches!(result, Err(SyncError::Storage(_))));
        assert!(store.backlinks_of(PostId(1)).is_empty());
        assert!(store.backlinks_of(PostId(2)).is_empty());
    }

    #[tokio::test]
    async fn remove_all_clears_contribution_only() {
        let store = MemoryStore::new();
        let other = ResolvedReference {
            source: PostId(11),
            ..to(1)
        };
        sync(&store, PostId(11), &[], &[other]).await.unwrap();
        sync(&store, SOURCE, &[], &[to(1)]).await.unwrap();

        remove_all(&store, SOURCE, &[to(1)]).await.unwrap();

        assert_eq!(store.backlinks_of(PostId(1)), BTreeSet::from([other]));
    }
}
