//! # Lexer - Tokenizing Post Bodies
//!
//! This module provides the first stage of parsing: breaking a raw post body
//! into typed tokens.
//!
//! ## Two Layers
//!
//! Delimiters are configured per board, so they cannot be baked into a
//! [Logos] enum. Instead the work is split:
//!
//! 1. [`Lexeme`] is a fixed Logos lexer that chops text into small,
//!    context-free pieces (words, digits, single punctuation, whitespace,
//!    line endings). These pieces define the boundaries where markup may
//!    start.
//! 2. [`Tokens`] walks those boundaries and, at each one, checks the board's
//!    [`Grammar`] for a line break, cross-board link, reference, quote prefix,
//!    code span, spoiler marker or URL. Anything else is merged into a run of
//!    plain text.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## The Lossless Guarantee
//!
//! Every byte of the input lands in exactly one token:
//!
//! ```
//! use postlink_syntax::{Grammar, lexer::tokenize};
//!
//! let grammar = Grammar::default();
//! let input = "see >>42 and [spoiler]hi[/spoiler]\n>implying";
//! let rebuilt: String = tokenize(input, &grammar).map(|t| t.text).collect();
//! assert_eq!(rebuilt, input);
//! ```
//!
//! ## Degrading Instead of Failing
//!
//! The lexer never rejects input. A spoiler opener with no closer anywhere
//! after it, a code marker with no partner on the same line, a nested
//! delimiter the nesting policy forbids, or markup the board disabled all
//! come out as plain text. Whatever is still unbalanced is the assembler's
//! problem.
//!
//! ## Restartable
//!
//! [`Tokens`] is a lazy iterator that is `Clone`; cloning it before
//! consuming gives an independent pass over the same input with identical
//! results.

use std::collections::VecDeque;

use logos::Logos;

use crate::document::Span;
use crate::grammar::{Grammar, MarkupKind};

/// Context-free pieces of input.
///
/// Every byte of valid UTF-8 matches exactly one of these patterns, so the
/// Logos error branch only exists for completeness.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lexeme {
    /// Line ending (LF, CRLF or a lone CR)
    #[regex(r"\r\n|\n|\r")]
    Newline,

    /// Horizontal whitespace
    #[regex(r"[ \t]+")]
    Whitespace,

    /// ASCII digits; wins over `Word` when both match the same run
    #[regex(r"[0-9]+", priority = 3)]
    Digits,

    /// ASCII word characters
    #[regex(r"[A-Za-z0-9_]+")]
    Word,

    /// A single ASCII punctuation character other than `_`
    #[regex(r"[!-/:-@\[-\^\x60{-~]")]
    Punct,

    /// Anything else: non-ASCII text and control characters
    #[regex(r"[^\x20-\x7E\t\n\r]+")]
    Other,
}

/// Token kinds handed to the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Literal text
    Plain,
    /// Opening delimiter of a container or code span
    Open(MarkupKind),
    /// Closing delimiter
    Close(MarkupKind),
    /// Reference sigil followed by digits; payload is the digits
    ReferenceMarker,
    /// URL or cross-board link; payload is the href
    Link,
    /// Line ending
    LineBreak,
}

/// A token with its exact source slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub span: Span,
    pub text: &'a str,
    /// The meaningful part of the token: reference digits, link href, or
    /// the full text for everything else.
    pub payload: &'a str,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, src: &'a str, start: usize, end: usize) -> Self {
        let text = &src[start..end];
        Self {
            kind,
            span: Span::new(start, end),
            text,
            payload: text,
        }
    }

    fn with_payload(mut self, payload: &'a str) -> Self {
        self.payload = payload;
        self
    }
}

const URL_SCHEMES: [&str; 2] = ["https://", "http://"];

/// Tokenize `input` according to `grammar`.
pub fn tokenize<'a>(input: &'a str, grammar: &'a Grammar) -> Tokens<'a> {
    Tokens::new(input, grammar)
}

/// Length of the first lexeme of `rest` and its kind.
fn first_lexeme(rest: &str) -> Option<(Lexeme, usize)> {
    let mut lexer = Lexeme::lexer(rest);
    let result = lexer.next()?;
    let len = lexer.span().end;
    match result {
        Ok(kind) => Some((kind, len)),
        // Unreachable with the patterns above, but stay lossless regardless
        Err(()) => Some((Lexeme::Other, rest.chars().next().map_or(1, char::len_utf8))),
    }
}

/// Lazy, restartable token stream over one post body.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    src: &'a str,
    grammar: &'a Grammar,
    pos: usize,
    /// At the start of a line, or directly after a quote prefix
    line_start: bool,
    quote_depth: usize,
    spoiler_depth: usize,
    /// Spoiler depth when the current line's quote opened. The assembler
    /// drops spoilers opened inside a quote when the line ends, so the
    /// count returns here at the line break.
    quote_floor: Option<usize>,
    /// Start of the last spoiler closer in the input, for the "is there a
    /// closer ahead" check
    last_spoiler_close: Option<usize>,
    queue: VecDeque<Token<'a>>,
}

impl<'a> Tokens<'a> {
    pub fn new(src: &'a str, grammar: &'a Grammar) -> Self {
        let last_spoiler_close = if grammar.allows(MarkupKind::Spoiler)
            && !grammar.spoiler_close.is_empty()
        {
            src.rfind(grammar.spoiler_close.as_str())
        } else {
            None
        };
        Self {
            src,
            grammar,
            pos: 0,
            line_start: true,
            quote_depth: 0,
            spoiler_depth: 0,
            quote_floor: None,
            last_spoiler_close,
            queue: VecDeque::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn emit(&mut self, kind: TokenKind, end: usize) -> Token<'a> {
        let token = Token::new(kind, self.src, self.pos, end);
        self.pos = end;
        token
    }

    /// Try every construct at the current position. On success the tokens
    /// are queued and `pos` has moved past them.
    fn construct(&mut self) -> bool {
        let Some((lexeme, len)) = first_lexeme(self.rest()) else {
            return false;
        };

        if lexeme == Lexeme::Newline {
            let token = self.emit(TokenKind::LineBreak, self.pos + len);
            self.queue.push_back(token);
            self.line_start = true;
            self.quote_depth = 0;
            if let Some(floor) = self.quote_floor.take() {
                self.spoiler_depth = floor;
            }
            return true;
        }

        let found = self.board_link()
            || self.reference()
            || self.quote()
            || self.code_span()
            || self.spoiler()
            || self.url();
        if found {
            return true;
        }
        self.line_start = false;
        false
    }

    /// `>>>/board/`
    fn board_link(&mut self) -> bool {
        let g = self.grammar;
        if !g.allows(MarkupKind::Link) || g.reference_sigil.is_empty() {
            return false;
        }
        let rest = self.rest();
        let Some(after_sigil) = rest.strip_prefix(g.reference_sigil.as_str()) else {
            return false;
        };
        let Some(after_slash) = after_sigil.strip_prefix(">/") else {
            return false;
        };
        let Some((Lexeme::Word | Lexeme::Digits, name_len)) = first_lexeme(after_slash) else {
            return false;
        };
        if !after_slash[name_len..].starts_with('/') {
            return false;
        }
        let href_start = self.pos + g.reference_sigil.len() + 1;
        let end = href_start + 1 + name_len + 1;
        let href = &self.src[href_start..end];
        let token = self.emit(TokenKind::Link, end).with_payload(href);
        self.queue.push_back(token);
        self.line_start = false;
        true
    }

    /// `>>123`
    fn reference(&mut self) -> bool {
        let g = self.grammar;
        if !g.allows(MarkupKind::Reference) || g.reference_sigil.is_empty() {
            return false;
        }
        let Some(after_sigil) = self.rest().strip_prefix(g.reference_sigil.as_str()) else {
            return false;
        };
        let Some((Lexeme::Digits, digits_len)) = first_lexeme(after_sigil) else {
            return false;
        };
        let digits_start = self.pos + g.reference_sigil.len();
        let end = digits_start + digits_len;
        let digits = &self.src[digits_start..end];
        let token = self.emit(TokenKind::ReferenceMarker, end).with_payload(digits);
        self.queue.push_back(token);
        self.line_start = false;
        true
    }

    /// Quote prefix at the start of a line.
    fn quote(&mut self) -> bool {
        let g = self.grammar;
        if !self.line_start || !g.allows(MarkupKind::Quote) || g.quote_prefix.is_empty() {
            return false;
        }
        if !self.rest().starts_with(g.quote_prefix.as_str()) {
            return false;
        }
        if self.quote_depth >= g.nesting.limit() {
            return false;
        }
        let token = self.emit(TokenKind::Open(MarkupKind::Quote), self.pos + g.quote_prefix.len());
        self.queue.push_back(token);
        if self.quote_depth == 0 {
            self.quote_floor = Some(self.spoiler_depth);
        }
        self.quote_depth += 1;
        // Stay in the prefix zone so `>>text` nests
        self.line_start = true;
        true
    }

    /// Code marker with a partner on the same line. The content is a raw zone.
    fn code_span(&mut self) -> bool {
        let g = self.grammar;
        let marker = g.code_marker.as_str();
        if !g.allows(MarkupKind::Code) || marker.is_empty() || !self.rest().starts_with(marker) {
            return false;
        }
        let after = &self.rest()[marker.len()..];
        let line_len = after.find(['\n', '\r']).unwrap_or(after.len());
        let Some(content_len) = after[..line_len].find(marker) else {
            return false;
        };
        if content_len == 0 {
            return false;
        }
        let open_end = self.pos + marker.len();
        let content_end = open_end + content_len;
        let close_end = content_end + marker.len();

        let open = self.emit(TokenKind::Open(MarkupKind::Code), open_end);
        let content = self.emit(TokenKind::Plain, content_end);
        let close = self.emit(TokenKind::Close(MarkupKind::Code), close_end);
        self.queue.extend([open, content, close]);
        self.line_start = false;
        true
    }

    fn spoiler(&mut self) -> bool {
        let g = self.grammar;
        if !g.allows(MarkupKind::Spoiler) || g.spoiler_open.is_empty() || g.spoiler_close.is_empty()
        {
            return false;
        }
        let rest = self.rest();

        // Closers first so identical open/close markers alternate
        if self.spoiler_depth > 0 && rest.starts_with(g.spoiler_close.as_str()) {
            let token = self.emit(
                TokenKind::Close(MarkupKind::Spoiler),
                self.pos + g.spoiler_close.len(),
            );
            self.queue.push_back(token);
            self.spoiler_depth -= 1;
            // Closing a spoiler from before the quote ends the quote too
            if self.quote_floor.is_some_and(|floor| self.spoiler_depth < floor) {
                self.quote_floor = None;
            }
            self.line_start = false;
            return true;
        }

        if !rest.starts_with(g.spoiler_open.as_str()) || self.spoiler_depth >= g.nesting.limit() {
            return false;
        }
        let open_end = self.pos + g.spoiler_open.len();
        let closed_later = self.last_spoiler_close.is_some_and(|close| close >= open_end);
        if !closed_later {
            return false;
        }
        let token = self.emit(TokenKind::Open(MarkupKind::Spoiler), open_end);
        self.queue.push_back(token);
        self.spoiler_depth += 1;
        self.line_start = false;
        true
    }

    fn url(&mut self) -> bool {
        if !self.grammar.allows(MarkupKind::Link) {
            return false;
        }
        let rest = self.rest();
        let Some(scheme) = URL_SCHEMES.iter().find(|s| rest.starts_with(*s)) else {
            return false;
        };
        let tail = &rest[scheme.len()..];
        let tail_len = tail
            .find(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '<' | '>' | '"'))
            .unwrap_or(tail.len());
        if tail_len == 0 {
            return false;
        }
        let token = self.emit(TokenKind::Link, self.pos + scheme.len() + tail_len);
        self.queue.push_back(token);
        self.line_start = false;
        true
    }

    /// Advance over one lexeme of plain text.
    fn bump_lexeme(&mut self) {
        let len = first_lexeme(self.rest()).map_or(self.rest().len(), |(_, len)| len);
        self.pos += len.max(1).min(self.rest().len());
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if let Some(token) = self.queue.pop_front() {
            return Some(token);
        }

        let plain_start = self.pos;
        while self.pos < self.src.len() {
            let at = self.pos;
            if self.construct() {
                if at > plain_start {
                    return Some(Token::new(TokenKind::Plain, self.src, plain_start, at));
                }
                return self.queue.pop_front();
            }
            self.bump_lexeme();
        }

        (self.pos > plain_start)
            .then(|| Token::new(TokenKind::Plain, self.src, plain_start, self.pos))
    }
}
