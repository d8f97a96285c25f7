//! The document tree produced by the assembler.
//!
//! Every node keeps the raw text it was built from (including delimiters), so
//! [`Document::to_source`] reproduces the original body byte for byte no
//! matter how much markup was recognized, rejected or downgraded.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A byte range `[start, end)` into the post body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Post identifier. Zero is never a valid post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl PostId {
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A run of literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub span: Span,
}

/// A container with its delimiters and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockGroup {
    /// Opening delimiter text (empty for the document root)
    pub open: String,
    /// Closing delimiter text. Quotes are closed by the line break, which
    /// stays a sibling node, so they carry an empty close.
    pub close: String,
    pub span: Span,
    pub children: Vec<Node>,
}

/// Inline code, a raw zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSpan {
    pub open: String,
    pub code: String,
    pub close: String,
    pub span: Span,
}

/// An embedded URL or cross-board link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub raw: String,
    pub span: Span,
}

/// Resolution state of a reference node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReferenceState {
    /// Found by the assembler, not yet checked against storage
    Pending,
    /// Storage confirmed the target in `thread`
    Confirmed { thread: ThreadId },
    /// The post references itself
    OwnPost,
}

/// A cross-post reference such as `>>42`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub raw: String,
    pub span: Span,
    /// `None` when the digits do not fit a post ID
    pub target: Option<PostId>,
    pub state: ReferenceState,
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Node {
    Text(TextRun),
    Quote(BlockGroup),
    Spoiler(BlockGroup),
    Code(CodeSpan),
    Link(Link),
    Reference(Reference),
    LineBreak { raw: String, span: Span },
}

impl Node {
    pub fn text(text: impl Into<String>, span: Span) -> Self {
        Node::Text(TextRun {
            text: text.into(),
            span,
        })
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Text(run) => run.span,
            Node::Quote(group) | Node::Spoiler(group) => group.span,
            Node::Code(code) => code.span,
            Node::Link(link) => link.span,
            Node::Reference(reference) => reference.span,
            Node::LineBreak { span, .. } => *span,
        }
    }

    /// Child nodes, empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Quote(group) | Node::Spoiler(group) => &group.children,
            _ => &[],
        }
    }

    /// Appends the node's original source text.
    pub fn write_source(&self, out: &mut String) {
        match self {
            Node::Text(run) => out.push_str(&run.text),
            Node::Quote(group) | Node::Spoiler(group) => {
                out.push_str(&group.open);
                for child in &group.children {
                    child.write_source(out);
                }
                out.push_str(&group.close);
            }
            Node::Code(code) => {
                out.push_str(&code.open);
                out.push_str(&code.code);
                out.push_str(&code.close);
            }
            Node::Link(link) => out.push_str(&link.raw),
            Node::Reference(reference) => out.push_str(&reference.raw),
            Node::LineBreak { raw, .. } => out.push_str(raw),
        }
    }

    fn write_plain(&self, out: &mut String) {
        match self {
            Node::Text(run) => out.push_str(&run.text),
            Node::Quote(group) => {
                // Quote markers are part of what readers see
                out.push_str(&group.open);
                for child in &group.children {
                    child.write_plain(out);
                }
            }
            Node::Spoiler(group) => {
                for child in &group.children {
                    child.write_plain(out);
                }
            }
            Node::Code(code) => out.push_str(&code.code),
            Node::Link(link) => out.push_str(&link.raw),
            Node::Reference(reference) => out.push_str(&reference.raw),
            Node::LineBreak { .. } => out.push('\n'),
        }
    }
}

/// A parsed post body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    pub root: BlockGroup,
}

impl Document {
    pub fn new(children: Vec<Node>, span: Span) -> Self {
        Self {
            root: BlockGroup {
                open: String::new(),
                close: String::new(),
                span,
                children,
            },
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.root.children
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Reconstructs the exact source text.
    pub fn to_source(&self) -> String {
        let mut out = String::with_capacity(self.root.span.len());
        for node in &self.root.children {
            node.write_source(&mut out);
        }
        out
    }

    /// Text with spoiler and code delimiters removed, line breaks normalized.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for node in &self.root.children {
            node.write_plain(&mut out);
        }
        out
    }

    /// Depth-first pre-order walk over every node.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Node)) {
        let mut stack: Vec<&'a Node> = self.root.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(node.children().iter().rev());
        }
    }

    /// Rewrites every reference node in document order.
    ///
    /// The callback returns the replacement node. Uses an explicit stack so
    /// deeply nested documents cannot exhaust the call stack.
    pub fn rewrite_references(&mut self, mut rewrite: impl FnMut(Reference) -> Node) {
        let mut stack = vec![self.root.children.iter_mut()];
        while let Some(level) = stack.last_mut() {
            let Some(node) = level.next() else {
                stack.pop();
                continue;
            };
            if let Node::Reference(reference) = node {
                let reference = reference.clone();
                *node = rewrite(reference);
                continue;
            }
            if let Node::Quote(group) | Node::Spoiler(group) = node {
                stack.push(group.children.iter_mut());
            }
        }
    }

    /// All reference nodes in document order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.walk(|node| {
            if let Node::Reference(reference) = node {
                out.push(reference);
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Document {
        Document::new(
            vec![
                Node::text("a ", Span::new(0, 2)),
                Node::Spoiler(BlockGroup {
                    open: "[s]".into(),
                    close: "[/s]".into(),
                    span: Span::new(2, 14),
                    children: vec![
                        Node::Reference(Reference {
                            raw: ">>1".into(),
                            span: Span::new(5, 8),
                            target: Some(PostId(1)),
                            state: ReferenceState::Pending,
                        }),
                        Node::text(" b", Span::new(8, 10)),
                    ],
                }),
                Node::Reference(Reference {
                    raw: ">>2".into(),
                    span: Span::new(14, 17),
                    target: Some(PostId(2)),
                    state: ReferenceState::Pending,
                }),
            ],
            Span::new(0, 17),
        )
    }

    #[test]
    fn to_source_includes_delimiters() {
        assert_eq!(sample().to_source(), "a [s]>>1 b[/s]>>2");
    }

    #[test]
    fn plain_text_strips_spoiler_markers() {
        assert_eq!(sample().plain_text(), "a >>1 b>>2");
    }

    #[test]
    fn references_in_document_order() {
        let doc = sample();
        let targets: Vec<_> = doc.references().iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![Some(PostId(1)), Some(PostId(2))]);
    }

    #[test]
    fn rewrite_references_reaches_nested_nodes() {
        let mut doc = sample();
        doc.rewrite_references(|r| Node::text(r.raw, r.span));
        assert!(doc.references().is_empty());
        assert_eq!(doc.to_source(), "a [s]>>1 b[/s]>>2");
    }

    #[test]
    fn walk_collects_nodes_in_preorder() {
        let doc = sample();
        let mut seen: Vec<&Node> = Vec::new();
        doc.walk(|node| seen.push(node));
        let spans: Vec<_> = seen.iter().map(|node| node.span()).collect();
        assert_eq!(
            spans,
            vec![
                Span::new(0, 2),
                Span::new(2, 14),
                Span::new(5, 8),
                Span::new(8, 10),
                Span::new(14, 17),
            ]
        );
    }

    #[test]
    fn zero_post_id_is_invalid() {
        assert!(!PostId(0).is_valid());
        assert!(PostId(7).is_valid());
    }
}
