//! Open container contexts on the assembler stack.

use crate::document::{BlockGroup, CodeSpan, Node, Span};
use crate::grammar::MarkupKind;
use crate::lexer::Token;

/// A container that has been opened but not yet closed.
#[derive(Debug)]
pub struct Frame {
    pub kind: MarkupKind,
    pub open: String,
    pub open_span: Span,
    pub children: Vec<Node>,
}

impl Frame {
    pub fn new(kind: MarkupKind, token: &Token<'_>) -> Self {
        Self {
            kind,
            open: token.text.to_string(),
            open_span: token.span,
            children: Vec::new(),
        }
    }

    /// End of the last byte consumed by this frame so far.
    pub fn end(&self) -> usize {
        self.children
            .last()
            .map_or(self.open_span.end, |child| child.span().end)
    }

    /// Turn the frame into a finished node. `close` is the closing delimiter
    /// text and `end` the byte offset just past it.
    pub fn close(self, close: &str, end: usize) -> Node {
        let span = Span::new(self.open_span.start, end);
        match self.kind {
            MarkupKind::Code => {
                let mut code = String::new();
                for child in &self.children {
                    child.write_source(&mut code);
                }
                Node::Code(CodeSpan {
                    open: self.open,
                    code,
                    close: close.to_string(),
                    span,
                })
            }
            MarkupKind::Spoiler => Node::Spoiler(self.into_group(close, span)),
            // Only containers and code spans get frames
            _ => Node::Quote(self.into_group(close, span)),
        }
    }

    /// Give up on the frame: the opener becomes text and the children are
    /// returned for splicing into the parent.
    pub fn flatten(self) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(self.children.len() + 1);
        nodes.push(Node::text(self.open, self.open_span));
        nodes.extend(self.children);
        nodes
    }

    fn into_group(self, close: &str, span: Span) -> BlockGroup {
        BlockGroup {
            open: self.open,
            close: close.to_string(),
            span,
            children: self.children,
        }
    }
}
