//! Lexer built on logos
//!
//! The scanner produces one token per call and supports exactly one level
//! of pushback: a token handed back with [`Lexer::reject`] is returned by
//! the next scan. Rejecting twice without an intervening scan is a
//! programmer error and panics.

mod token;

pub use token::{Token, TokenKind, TEXTLEN};

use crate::common::{CompileError, CompileResult, Span};
use logos::Logos;

/// Lexer for subset-C source code.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
    rejected: Option<Token>,
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            rejected: None,
            at_eof: false,
        }
    }

    /// Scan and return the next token. At end of input this yields `Eof`
    /// tokens indefinitely.
    pub fn next_token(&mut self) -> CompileResult<Token> {
        if let Some(token) = self.rejected.take() {
            return Ok(token);
        }

        if self.at_eof {
            let len = self.inner.source().len();
            return Ok(Token::new(TokenKind::Eof, Span::new(len, len)));
        }

        match self.inner.next() {
            Some(Ok(kind)) => {
                let span = self.inner.span();
                Ok(Token::new(kind, Span::new(span.start, span.end)))
            }
            Some(Err(())) => {
                let span = self.inner.span();
                let slice = self.inner.slice();
                let message = if slice.starts_with('\'') {
                    "bad or unterminated character literal".to_string()
                } else if slice.starts_with('"') {
                    "bad escape or unterminated string literal".to_string()
                } else if slice.chars().all(|c| c.is_ascii_digit()) {
                    "integer literal out of range".to_string()
                } else if slice.len() >= TEXTLEN {
                    format!("identifier or literal longer than {} bytes", TEXTLEN - 1)
                } else {
                    format!("unrecognized character '{}'", slice)
                };
                Err(CompileError::lexer(message, Span::new(span.start, span.end)))
            }
            None => {
                self.at_eof = true;
                let len = self.inner.source().len();
                Ok(Token::new(TokenKind::Eof, Span::new(len, len)))
            }
        }
    }

    /// Hand a token back so the next [`Lexer::next_token`] returns it.
    ///
    /// # Panics
    ///
    /// Panics when a token is already pending; only one level of pushback
    /// exists and a second rejection indicates a compiler bug.
    pub fn reject(&mut self, token: Token) {
        if self.rejected.is_some() {
            panic!("token rejected twice without an intervening scan");
        }
        self.rejected = Some(token);
    }

    pub fn source(&self) -> &'a str {
        self.inner.source()
    }
}
