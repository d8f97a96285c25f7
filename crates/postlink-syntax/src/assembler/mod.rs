//! # Markup Assembler - Building the Document Tree
//!
//! The assembler consumes the token stream in a single pass and builds a
//! [`Document`]. Nested markup is tracked on an explicit stack of [`Frame`]s
//! rather than the call stack, so adversarial input like ten thousand
//! spoiler openers costs heap, not stack, and is capped by the board's
//! `max_depth` anyway.
//!
//! ## Stack Discipline
//!
//! ```text
//! Open(kind)   push a frame (or emit text + DepthExceeded when full)
//! Close(kind)  pop to the matching frame, flattening anything above it
//! LineBreak    close every open quote, flattening non-quotes above them
//! end of input close quotes, flatten everything else
//! ```
//!
//! "Flattening" a frame turns its opener into a text run and splices its
//! children into the parent, so an unclosed delimiter costs the reader some
//! formatting but never any text.
//!
//! ## Placeholder References
//!
//! Reference markers become [`Reference`] nodes in the `Pending` state with
//! the digits parsed into a post ID (or `None` if they overflow). Checking
//! them against storage is the resolver's job.

mod frame;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::document::{Document, Link, Node, PostId, Reference, ReferenceState, Span};
use crate::grammar::{Grammar, MarkupKind};
use crate::lexer::{Token, TokenKind};
use frame::Frame;

/// Output of the assembler: the tree plus whatever it had to degrade.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assembly {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

/// Assemble a token stream into a document tree.
pub fn assemble<'a>(tokens: impl IntoIterator<Item = Token<'a>>, grammar: &Grammar) -> Assembly {
    let mut assembler = Assembler::new(grammar.max_depth);
    for token in tokens {
        assembler.push(token);
    }
    assembler.finish()
}

struct Assembler {
    root: Vec<Node>,
    stack: Vec<Frame>,
    diagnostics: Vec<Diagnostic>,
    max_depth: usize,
    end: usize,
}

impl Assembler {
    fn new(max_depth: usize) -> Self {
        Self {
            root: Vec::new(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
            max_depth,
            end: 0,
        }
    }

    /// Children list of the innermost open context.
    fn children(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.root,
        }
    }

    fn push(&mut self, token: Token<'_>) {
        self.end = self.end.max(token.span.end);
        match token.kind {
            TokenKind::Plain => self.text(&token),
            TokenKind::LineBreak => {
                self.close_quotes();
                self.children().push(Node::LineBreak {
                    raw: token.text.to_string(),
                    span: token.span,
                });
            }
            TokenKind::ReferenceMarker => {
                let target = token.payload.parse::<u64>().ok().map(PostId);
                self.children().push(Node::Reference(Reference {
                    raw: token.text.to_string(),
                    span: token.span,
                    target,
                    state: ReferenceState::Pending,
                }));
            }
            TokenKind::Link => {
                self.children().push(Node::Link(Link {
                    href: token.payload.to_string(),
                    raw: token.text.to_string(),
                    span: token.span,
                }));
            }
            TokenKind::Open(kind) => self.open(kind, &token),
            TokenKind::Close(kind) => self.close(kind, &token),
        }
    }

    fn text(&mut self, token: &Token<'_>) {
        let node = Node::text(token.text, token.span);
        self.children().push(node);
    }

    fn open(&mut self, kind: MarkupKind, token: &Token<'_>) {
        if !(kind.is_container() || kind == MarkupKind::Code) {
            self.text(token);
            return;
        }
        if self.stack.len() >= self.max_depth {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::DepthExceeded,
                token.span,
                token.text,
            ));
            self.text(token);
            return;
        }
        self.stack.push(Frame::new(kind, token));
    }

    fn close(&mut self, kind: MarkupKind, token: &Token<'_>) {
        let Some(index) = self.stack.iter().rposition(|frame| frame.kind == kind) else {
            self.text(token);
            return;
        };
        // Quotes above the match end here; anything else was left open
        while self.stack.len() > index + 1 {
            self.close_or_flatten_top();
        }
        if let Some(frame) = self.stack.pop() {
            let node = frame.close(token.text, token.span.end);
            self.children().push(node);
        }
    }

    /// A line break ends every open quote.
    fn close_quotes(&mut self) {
        let Some(outermost) = self
            .stack
            .iter()
            .position(|frame| frame.kind == MarkupKind::Quote)
        else {
            return;
        };
        while self.stack.len() > outermost {
            self.close_or_flatten_top();
        }
    }

    fn close_or_flatten_top(&mut self) {
        let is_quote = self
            .stack
            .last()
            .is_some_and(|frame| frame.kind == MarkupKind::Quote);
        if !is_quote {
            self.flatten_top();
            return;
        }
        if let Some(frame) = self.stack.pop() {
            let end = frame.end();
            let node = frame.close("", end);
            self.children().push(node);
        }
    }

    fn flatten_top(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnclosedDelimiter(frame.kind),
                frame.open_span,
                frame.open.clone(),
            ));
            let nodes = frame.flatten();
            self.children().extend(nodes);
        }
    }

    fn finish(mut self) -> Assembly {
        while !self.stack.is_empty() {
            self.close_or_flatten_top();
        }
        Assembly {
            document: Document::new(self.root, Span::new(0, self.end)),
            diagnostics: self.diagnostics,
        }
    }
}
