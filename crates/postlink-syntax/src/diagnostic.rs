//! Non-fatal findings attached to a parse.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Span;
use crate::grammar::MarkupKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A delimiter was opened and never closed; it was kept as text
    UnclosedDelimiter(MarkupKind),
    /// Opening another container would exceed the board's depth cap
    DepthExceeded,
    /// Reference digits that do not form a valid post ID
    MalformedReference,
    /// Reference to a post storage does not know about
    UnknownTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    /// Source text the diagnostic is about
    pub raw: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span, raw: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            raw: raw.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.span.start;
        match self.kind {
            DiagnosticKind::UnclosedDelimiter(kind) => {
                write!(f, "unclosed {kind:?} delimiter {:?} at byte {at}", self.raw)
            }
            DiagnosticKind::DepthExceeded => {
                write!(f, "nesting too deep at byte {at}, {:?} kept as text", self.raw)
            }
            DiagnosticKind::MalformedReference => {
                write!(f, "malformed reference {:?} at byte {at}", self.raw)
            }
            DiagnosticKind::UnknownTarget => {
                write!(f, "reference {:?} at byte {at} points to no known post", self.raw)
            }
        }
    }
}
