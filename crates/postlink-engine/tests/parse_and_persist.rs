use std::collections::BTreeSet;
use std::sync::Arc;

use postlink_config::{BoardConfigs, BoardId, ConfigStore};
use postlink_engine::{Engine, MemoryStore, ParseFailure, ResolvedReference, StorageGateway};
use postlink_syntax::{
    BlockGroup, DiagnosticKind, Node, PostId, Reference, ReferenceState, Span, ThreadId,
};
use pretty_assertions::assert_eq;

fn setup(store: MemoryStore) -> (Arc<MemoryStore>, Engine) {
    let store = Arc::new(store);
    let configs = Arc::new(ConfigStore::new(BoardConfigs::default()));
    let engine = Engine::new(configs, Arc::clone(&store) as Arc<dyn StorageGateway>);
    (store, engine)
}

fn board() -> BoardId {
    BoardId::from("a")
}

fn reference(source: u64, target: u64, thread: u64) -> ResolvedReference {
    ResolvedReference {
        source: PostId(source),
        target: PostId(target),
        thread: ThreadId(thread),
    }
}

#[tokio::test]
async fn existing_target_is_confirmed() {
    let (store, engine) = setup(MemoryStore::new().with_post(PostId(42), ThreadId(7)));
    let input = "see >>42 and [spoiler]hi[/spoiler]";

    let result = engine
        .parse_and_persist(input, &board(), PostId(100), &[])
        .await
        .unwrap();

    assert_eq!(
        result.document.nodes(),
        &[
            Node::text("see ", Span::new(0, 4)),
            Node::Reference(Reference {
                raw: ">>42".to_string(),
                span: Span::new(4, 8),
                target: Some(PostId(42)),
                state: ReferenceState::Confirmed {
                    thread: ThreadId(7)
                },
            }),
            Node::text(" and ", Span::new(8, 13)),
            Node::Spoiler(BlockGroup {
                open: "[spoiler]".to_string(),
                close: "[/spoiler]".to_string(),
                span: Span::new(13, 34),
                children: vec![Node::text("hi", Span::new(22, 24))],
            }),
        ]
    );
    assert_eq!(result.references, vec![reference(100, 42, 7)]);
    assert!(result.diagnostics.is_empty());
    assert_eq!(
        store.backlinks_of(PostId(42)),
        BTreeSet::from([reference(100, 42, 7)])
    );
}

#[tokio::test]
async fn missing_target_is_downgraded() {
    let (store, engine) = setup(MemoryStore::new());
    let input = "see >>42 and [spoiler]hi[/spoiler]";

    let result = engine
        .parse_and_persist(input, &board(), PostId(100), &[])
        .await
        .unwrap();

    assert_eq!(result.document.nodes()[1], Node::text(">>42", Span::new(4, 8)));
    assert!(result.references.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnknownTarget);
    assert_eq!(result.document.to_source(), input);
    assert!(store.batches().is_empty());
}

#[tokio::test]
async fn repeated_mentions_cost_one_query() {
    let (store, engine) = setup(MemoryStore::new().with_post(PostId(5), ThreadId(1)));
    let input = ">>5\n".repeat(50);

    let result = engine
        .parse_and_persist(&input, &board(), PostId(6), &[])
        .await
        .unwrap();

    assert_eq!(store.queried(), vec![PostId(5)]);
    assert_eq!(result.references, vec![reference(6, 5, 1)]);
}

#[tokio::test]
async fn self_reference_creates_no_backlink() {
    let (store, engine) = setup(MemoryStore::new().with_post(PostId(8), ThreadId(1)));

    let result = engine
        .parse_and_persist(">>8 is me", &board(), PostId(8), &[])
        .await
        .unwrap();

    assert!(result.references.is_empty());
    assert!(store.backlinks_of(PostId(8)).is_empty());
    assert!(store.batches().is_empty());
}

#[tokio::test]
async fn edit_moves_backlinks() {
    let store = MemoryStore::new()
        .with_post(PostId(1), ThreadId(1))
        .with_post(PostId(2), ThreadId(1))
        .with_post(PostId(3), ThreadId(1));
    let (store, engine) = setup(store);

    let created = engine
        .parse_and_persist(">>1 >>2", &board(), PostId(10), &[])
        .await
        .unwrap();
    let edited = engine
        .parse_and_persist(">>2 >>3", &board(), PostId(10), &created.references)
        .await
        .unwrap();

    assert!(store.backlinks_of(PostId(1)).is_empty());
    assert_eq!(
        store.backlinks_of(PostId(2)),
        BTreeSet::from([reference(10, 2, 1)])
    );
    assert_eq!(
        store.backlinks_of(PostId(3)),
        BTreeSet::from([reference(10, 3, 1)])
    );

    let last = store.batches().pop().unwrap();
    let removed: usize = last.iter().map(|u| u.remove.len()).sum();
    let added: usize = last.iter().map(|u| u.add.len()).sum();
    assert_eq!((removed, added), (1, 1));

    // Re-submitting the same body changes nothing
    let batches = store.batches().len();
    engine
        .parse_and_persist(">>2 >>3", &board(), PostId(10), &edited.references)
        .await
        .unwrap();
    assert_eq!(store.batches().len(), batches);
}

#[tokio::test]
async fn deletion_withdraws_every_backlink() {
    let store = MemoryStore::new()
        .with_post(PostId(1), ThreadId(1))
        .with_post(PostId(2), ThreadId(2));
    let (store, engine) = setup(store);

    let created = engine
        .parse_and_persist(">>1 >>2", &board(), PostId(10), &[])
        .await
        .unwrap();
    let outcome = engine
        .delete_post(PostId(10), &created.references)
        .await
        .unwrap();

    assert_eq!(outcome.removed, 2);
    assert!(store.backlinks_of(PostId(1)).is_empty());
    assert!(store.backlinks_of(PostId(2)).is_empty());
}

#[tokio::test]
async fn unavailable_storage_during_resolution() {
    let store = MemoryStore::new().with_post(PostId(1), ThreadId(1));
    store.fail_reads(true);
    let (_, engine) = setup(store);

    let err = engine
        .parse_and_persist(">>1", &board(), PostId(2), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, ParseFailure::ResolutionUnavailable(_)));
}

#[tokio::test]
async fn failed_commit_can_be_retried() {
    let store = MemoryStore::new().with_post(PostId(1), ThreadId(1));
    store.fail_writes(true);
    let (store, engine) = setup(store);

    let err = engine
        .parse_and_persist(">>1", &board(), PostId(2), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ParseFailure::SyncFailure(_)));
    assert!(store.backlinks_of(PostId(1)).is_empty());

    store.fail_writes(false);
    engine
        .parse_and_persist(">>1", &board(), PostId(2), &[])
        .await
        .unwrap();
    assert_eq!(
        store.backlinks_of(PostId(1)),
        BTreeSet::from([reference(2, 1, 1)])
    );
}

#[tokio::test]
async fn config_reload_applies_to_later_parses() {
    let (_, engine) = setup(MemoryStore::new());
    let body = "x".repeat(30);

    engine
        .parse_and_persist(&body, &board(), PostId(1), &[])
        .await
        .unwrap();

    let mut defaults = engine.configs().snapshot().defaults().clone();
    defaults.max_body_length = 10;
    engine.configs().replace(BoardConfigs::new(defaults));

    let err = engine
        .parse_and_persist(&body, &board(), PostId(1), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ParseFailure::BodyTooLong { len: 30, max: 10 }));
}

#[tokio::test]
async fn same_post_commits_in_submission_order() {
    let store = MemoryStore::new()
        .with_post(PostId(1), ThreadId(1))
        .with_post(PostId(2), ThreadId(1));
    let (store, engine) = setup(store);
    let engine = Arc::new(engine);

    let bodies = [">>1", ">>1 >>2", ">>2"];
    let mut tasks = Vec::new();
    let mut previous: Vec<ResolvedReference> = Vec::new();
    for body in bodies {
        // Each edit is submitted with the references the previous one will produce
        let next: Vec<_> = body
            .split_whitespace()
            .map(|r| reference(9, r.trim_start_matches(">>").parse().unwrap(), 1))
            .collect();
        let engine = Arc::clone(&engine);
        let prev = std::mem::replace(&mut previous, next);
        tasks.push(tokio::spawn(async move {
            engine
                .parse_and_persist(body, &BoardId::from("a"), PostId(9), &prev)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let targets: Vec<Vec<(u64, usize, usize)>> = store
        .batches()
        .iter()
        .map(|batch| {
            batch
                .iter()
                .map(|u| (u.target.0, u.add.len(), u.remove.len()))
                .collect()
        })
        .collect();
    assert_eq!(
        targets,
        vec![
            vec![(1, 1, 0)],
            vec![(2, 1, 0)],
            vec![(1, 0, 1)],
        ]
    );
    assert!(store.backlinks_of(PostId(1)).is_empty());
    assert_eq!(
        store.backlinks_of(PostId(2)),
        BTreeSet::from([reference(9, 2, 1)])
    );
}
