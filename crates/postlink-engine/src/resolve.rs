//! Checking placeholder references against storage.
//!
//! Every `Reference` node the assembler produced is looked up once per
//! distinct target. Confirmed targets become `Confirmed` nodes plus a
//! [`ResolvedReference`]; anything else goes back to plain text with a
//! diagnostic so the raw `>>123` is never lost.

use std::collections::{BTreeSet, HashMap, HashSet};

use postlink_syntax::{
    Diagnostic, DiagnosticKind, Document, Node, PostId, Reference, ReferenceState, Span, ThreadId,
};

use crate::storage::{ResolvedReference, StorageError, StorageGateway};

/// A reference found in a document, before storage has been asked about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCandidate {
    pub target: Option<PostId>,
    pub raw: String,
    pub span: Span,
}

impl From<&Reference> for ReferenceCandidate {
    fn from(reference: &Reference) -> Self {
        Self {
            target: reference.target,
            raw: reference.raw.clone(),
            span: reference.span,
        }
    }
}

/// Reference candidates in document order.
pub fn candidates(document: &Document) -> Vec<ReferenceCandidate> {
    document
        .references()
        .into_iter()
        .map(ReferenceCandidate::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub document: Document,
    /// One entry per distinct confirmed target, in order of first mention
    pub references: Vec<ResolvedReference>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Reference resolution unavailable: {0}")]
    Unavailable(#[source] StorageError),
}

/// Resolve the references of `document`, written by post `source`.
pub async fn resolve(
    mut document: Document,
    source: PostId,
    gateway: &dyn StorageGateway,
) -> Result<Resolution, ResolveError> {
    let targets: BTreeSet<PostId> = candidates(&document)
        .into_iter()
        .filter_map(|candidate| candidate.target)
        .filter(|target| target.is_valid() && *target != source)
        .collect();

    let mut threads: HashMap<PostId, Option<ThreadId>> = HashMap::with_capacity(targets.len());
    for target in targets {
        let thread = gateway.post_exists(target).await.map_err(|err| {
            log::warn!("existence check for post {target} failed: {err}");
            ResolveError::Unavailable(err)
        })?;
        threads.insert(target, thread);
    }

    let mut references = Vec::new();
    let mut seen = HashSet::new();
    let mut diagnostics = Vec::new();

    document.rewrite_references(|reference| {
        let target = match reference.target {
            Some(target) if target.is_valid() => target,
            _ => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MalformedReference,
                    reference.span,
                    reference.raw.clone(),
                ));
                return Node::text(reference.raw, reference.span);
            }
        };

        if target == source {
            return Node::Reference(Reference {
                state: ReferenceState::OwnPost,
                ..reference
            });
        }

        match threads.get(&target).copied().flatten() {
            Some(thread) => {
                if seen.insert(target) {
                    references.push(ResolvedReference {
                        source,
                        target,
                        thread,
                    });
                }
                Node::Reference(Reference {
                    state: ReferenceState::Confirmed { thread },
                    ..reference
                })
            }
            None => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnknownTarget,
                    reference.span,
                    reference.raw.clone(),
                ));
                Node::text(reference.raw, reference.span)
            }
        }
    });

    log::debug!(
        "post {source}: {} reference(s) resolved, {} downgraded",
        references.len(),
        diagnostics.len()
    );

    Ok(Resolution {
        document,
        references,
        diagnostics,
    })
}
