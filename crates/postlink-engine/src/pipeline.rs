//! The entry point callers use: parse a body, resolve it, commit backlinks.

use std::sync::Arc;

use postlink_config::{BoardId, ConfigStore};
use postlink_syntax::{Assembly, Diagnostic, Document, PostId};
use serde::Serialize;

use crate::backlinks::{self, SyncError, SyncOutcome};
use crate::lanes::{LaneGuard, PostLanes};
use crate::resolve::{ResolveError, resolve};
use crate::storage::{ResolvedReference, StorageError, StorageGateway};

/// Outcome of a successful [`Engine::parse_and_persist`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub document: Document,
    pub references: Vec<ResolvedReference>,
    /// Markup and reference problems, in the order they were found
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    #[error("Post body is {len} bytes, board limit is {max}")]
    BodyTooLong { len: usize, max: usize },

    #[error("Could not resolve references: {0}")]
    ResolutionUnavailable(#[source] StorageError),

    #[error("Could not commit backlinks: {0}")]
    SyncFailure(#[source] StorageError),

    /// The commit task panicked or was cancelled by runtime shutdown.
    /// Storage is left as the gateway's atomic batch left it.
    #[error("Backlink commit was interrupted")]
    Interrupted,
}

impl From<ResolveError> for ParseFailure {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Unavailable(err) => Self::ResolutionUnavailable(err),
        }
    }
}

impl From<SyncError> for ParseFailure {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Storage(err) => Self::SyncFailure(err),
        }
    }
}

/// Parses post bodies and keeps backlinks consistent with them.
///
/// Safe to share between tasks. Calls for the same post are applied in the
/// order they were made; calls for different posts run independently.
pub struct Engine {
    configs: Arc<ConfigStore>,
    storage: Arc<dyn StorageGateway>,
    lanes: PostLanes,
}

impl Engine {
    pub fn new(configs: Arc<ConfigStore>, storage: Arc<dyn StorageGateway>) -> Self {
        Self {
            configs,
            storage,
            lanes: PostLanes::new(),
        }
    }

    pub fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    /// Parse `raw` as post `source` on `board`, resolve its references and
    /// move the post's backlinks from `previous` to the new set.
    ///
    /// `previous` is what the last successful call for this post returned
    /// (empty for a new post). Dropping the returned future before the commit
    /// starts has no side effects; once the commit starts it runs to the end.
    pub async fn parse_and_persist(
        &self,
        raw: &str,
        board: &BoardId,
        source: PostId,
        previous: &[ResolvedReference],
    ) -> Result<ParseResult, ParseFailure> {
        let configs = self.configs.snapshot();
        let config = configs.board(board);
        if raw.len() > config.max_body_length {
            return Err(ParseFailure::BodyTooLong {
                len: raw.len(),
                max: config.max_body_length,
            });
        }
        let grammar = config.grammar();

        let lane = self.lanes.acquire(source).await;

        let Assembly {
            document,
            mut diagnostics,
        } = postlink_syntax::parse(raw, &grammar);
        log::debug!(
            "post {source} on /{board}/: {} node(s), {} markup diagnostic(s)",
            document.nodes().len(),
            diagnostics.len()
        );

        let resolution = resolve(document, source, self.storage.as_ref()).await?;
        diagnostics.extend(resolution.diagnostics);

        self.commit(lane, previous.to_vec(), resolution.references.clone())
            .await?;

        Ok(ParseResult {
            document: resolution.document,
            references: resolution.references,
            diagnostics,
        })
    }

    /// Withdraw the backlinks of a deleted post.
    pub async fn delete_post(
        &self,
        source: PostId,
        previous: &[ResolvedReference],
    ) -> Result<SyncOutcome, ParseFailure> {
        let lane = self.lanes.acquire(source).await;
        self.commit(lane, previous.to_vec(), Vec::new()).await
    }

    /// Runs the sync on its own task, holding the lane, so a caller that
    /// goes away mid-commit cannot cut it short.
    async fn commit(
        &self,
        lane: LaneGuard,
        previous: Vec<ResolvedReference>,
        new: Vec<ResolvedReference>,
    ) -> Result<SyncOutcome, ParseFailure> {
        let storage = Arc::clone(&self.storage);
        let task = tokio::spawn(async move {
            let source = lane.post();
            let outcome = backlinks::sync(storage.as_ref(), source, &previous, &new).await;
            drop(lane);
            outcome
        });

        match task.await {
            Ok(outcome) => Ok(outcome?),
            Err(err) => {
                log::error!("backlink commit task failed: {err}");
                Err(ParseFailure::Interrupted)
            }
        }
    }
}
