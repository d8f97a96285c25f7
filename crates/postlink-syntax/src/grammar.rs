//! Per-board grammar: which markup kinds are recognized and what their
//! delimiters look like.
//!
//! The lexer and assembler never read configuration files themselves; the
//! config layer builds a [`Grammar`] and hands it down. A `Grammar` is plain
//! data, so two parses with equal grammars over the same input always produce
//! the same tokens.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Kinds of markup a board can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupKind {
    /// Line-prefixed quotation (`>text`)
    Quote,
    /// Paired spoiler markers (`[spoiler]..[/spoiler]`)
    Spoiler,
    /// Inline code span, a raw zone with no markup inside
    Code,
    /// Embedded URLs and cross-board links (`>>>/a/`)
    Link,
    /// Cross-post references (`>>123`)
    Reference,
}

impl MarkupKind {
    pub const ALL: [MarkupKind; 5] = [
        MarkupKind::Quote,
        MarkupKind::Spoiler,
        MarkupKind::Code,
        MarkupKind::Link,
        MarkupKind::Reference,
    ];

    /// Returns true for kinds that open a container node.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Quote | Self::Spoiler)
    }
}

/// What to do with an identical delimiter opened inside itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingPolicy {
    /// A nested identical opener is plain text.
    Reject,
    /// Up to N levels of the same kind may be open at once.
    AllowDepth(usize),
}

impl NestingPolicy {
    /// Maximum number of simultaneously open delimiters of one kind.
    pub fn limit(self) -> usize {
        match self {
            Self::Reject => 1,
            Self::AllowDepth(n) => n.max(1),
        }
    }
}

/// Delimiter strings and limits used by the lexer and assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub allowed: BTreeSet<MarkupKind>,
    pub reference_sigil: String,
    pub quote_prefix: String,
    pub code_marker: String,
    pub spoiler_open: String,
    pub spoiler_close: String,
    pub nesting: NestingPolicy,
    /// Cap on the total number of open containers, across all kinds.
    pub max_depth: usize,
}

impl Grammar {
    pub fn allows(&self, kind: MarkupKind) -> bool {
        self.allowed.contains(&kind)
    }

    /// Builder-style helper, mostly for tests.
    pub fn without(mut self, kind: MarkupKind) -> Self {
        self.allowed.remove(&kind);
        self
    }

    pub fn with_nesting(mut self, nesting: NestingPolicy) -> Self {
        self.nesting = nesting;
        self
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self {
            allowed: MarkupKind::ALL.into_iter().collect(),
            reference_sigil: ">>".to_string(),
            quote_prefix: ">".to_string(),
            code_marker: "`".to_string(),
            spoiler_open: "[spoiler]".to_string(),
            spoiler_close: "[/spoiler]".to_string(),
            nesting: NestingPolicy::AllowDepth(4),
            max_depth: 16,
        }
    }
}
