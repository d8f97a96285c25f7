//! # postlink-syntax
//!
//! Lossless parsing of imageboard post bodies into a document tree, using
//! [Logos] for the fixed lexical layer and a per-board [`Grammar`] for the
//! configurable markup on top of it.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## Architecture Overview
//!
//! ```text
//! Raw body → Lexer → Tokens → Assembler → Document (+ diagnostics)
//!            (Logos + Grammar)  (explicit frame stack)
//! ```
//!
//! ### 1. Lexer ([`lexer`] module)
//!
//! Splits the body into plain runs, delimiters, reference markers, links and
//! line breaks. Concatenating the token texts gives back the input exactly,
//! and markup the board does not allow (or that is never closed) simply
//! stays plain text.
//!
//! ```text
//! "see >>42 [spoiler]hi[/spoiler]"
//!   → [Plain("see "), ReferenceMarker(">>42"), Plain(" "),
//!      Open(Spoiler), Plain("hi"), Close(Spoiler)]
//! ```
//!
//! ### 2. Assembler ([`assembler`] module)
//!
//! Builds the [`Document`] tree in one pass over the tokens, keeping open
//! quotes and spoilers on an explicit stack. Anything still open at the end
//! is flattened back into text and reported as a [`Diagnostic`].
//!
//! ### 3. Document ([`document`] module)
//!
//! The tree keeps every delimiter's raw text, so
//! [`Document::to_source`] reproduces the original body. References start
//! out `Pending`; resolving them against storage happens in the engine crate.
//!
//! ## Quick Start
//!
//! ```
//! use postlink_syntax::{parse, Grammar, Node};
//!
//! let grammar = Grammar::default();
//! let assembly = parse("see >>42 and [spoiler]hi[/spoiler]", &grammar);
//!
//! assert_eq!(assembly.document.to_source(), "see >>42 and [spoiler]hi[/spoiler]");
//! assert!(matches!(assembly.document.nodes()[1], Node::Reference(_)));
//! ```
//!
//! ## Never Failing
//!
//! Neither stage returns an error. Malformed markup degrades to text plus a
//! diagnostic, which keeps a half-typed post renderable and means the only
//! failures a caller has to handle come from storage.

pub mod assembler;
pub mod diagnostic;
pub mod document;
pub mod grammar;
pub mod lexer;

pub use assembler::{Assembly, assemble};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use document::{
    BlockGroup, CodeSpan, Document, Link, Node, PostId, Reference, ReferenceState, Span,
    TextRun, ThreadId,
};
pub use grammar::{Grammar, MarkupKind, NestingPolicy};
pub use lexer::{Token, TokenKind, Tokens, tokenize};

/// Tokenize and assemble `input` in one go.
pub fn parse(input: &str, grammar: &Grammar) -> Assembly {
    assemble(tokenize(input, grammar), grammar)
}
