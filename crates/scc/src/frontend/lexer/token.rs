//! Token definitions for the subset-C lexer

use crate::common::Span;
use logos::Logos;

/// Longest accepted identifier or string literal, in bytes.
pub const TEXTLEN: usize = 512;

/// Token with source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

fn ident_callback<'s>(lex: &mut logos::Lexer<'s, TokenKind>) -> Option<String> {
    let slice = lex.slice();
    if slice.len() >= TEXTLEN {
        return None;
    }
    Some(slice.to_string())
}

/// Decode one escape character (the byte after a backslash).
fn unescape(c: u8) -> Option<u8> {
    match c {
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b'f' => Some(0x0c),
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'v' => Some(0x0b),
        b'\\' => Some(b'\\'),
        b'"' => Some(b'"'),
        b'\'' => Some(b'\''),
        _ => None,
    }
}

/// Decode a character literal slice (quotes included) to its byte value.
fn char_literal_callback<'s>(lex: &mut logos::Lexer<'s, TokenKind>) -> Option<i64> {
    let inner = lex.slice().as_bytes();
    let inner = &inner[1..inner.len() - 1];
    match inner {
        [b'\\', esc] => unescape(*esc).map(i64::from),
        [c] => Some(i64::from(*c)),
        _ => None,
    }
}

/// Decode a string literal slice (quotes included) to its byte content.
fn string_literal_callback<'s>(lex: &mut logos::Lexer<'s, TokenKind>) -> Option<Vec<u8>> {
    let inner = lex.slice().as_bytes();
    let inner = &inner[1..inner.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut bytes = inner.iter();
    while let Some(&c) = bytes.next() {
        if c == b'\\' {
            out.push(unescape(*bytes.next()?)?);
        } else {
            out.push(c);
        }
    }
    if out.len() >= TEXTLEN {
        return None;
    }
    Some(out)
}

/// All token kinds in the subset language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\x0c]+")] // Skip whitespace
pub enum TokenKind {
    // === Keywords ===
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("return")]
    Return,
    #[token("void")]
    Void,
    #[token("char")]
    Char,
    #[token("int")]
    Int,
    #[token("long")]
    Long,

    // === Identifiers ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", ident_callback)]
    Identifier(String),

    // === Literals ===
    // Decimal integers and character literals share a token; a character
    // literal is just a one-byte integer constant.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    #[regex(r"'([^'\\\n]|\\.)'", char_literal_callback)]
    IntLiteral(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#, string_literal_callback)]
    StringLiteral(Vec<u8>),

    // === Operators ===
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("!")]
    Bang,

    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    LtLt,
    #[token(">>")]
    GtGt,

    // === Punctuation ===
    #[token(";")]
    Semi,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // Synthesized at end of input.
    Eof,
}

impl TokenKind {
    /// Check if this token names a primitive type.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Void | TokenKind::Char | TokenKind::Int | TokenKind::Long
        )
    }

    /// Check if this token ends an expression.
    pub fn is_expression_terminator(&self) -> bool {
        matches!(
            self,
            TokenKind::Semi | TokenKind::RParen | TokenKind::RBracket | TokenKind::Eof
        )
    }

    /// Binding power of binary operators, higher binds tighter. Tokens that
    /// cannot appear as a binary operator have no precedence.
    pub fn binary_precedence(&self) -> Option<u8> {
        match self {
            TokenKind::Assign => Some(10),
            TokenKind::PipePipe => Some(20),
            TokenKind::AmpAmp => Some(30),
            TokenKind::Pipe => Some(40),
            TokenKind::Caret => Some(50),
            TokenKind::Amp => Some(60),
            TokenKind::EqEq | TokenKind::NotEq => Some(70),
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => Some(80),
            TokenKind::LtLt | TokenKind::GtGt => Some(90),
            TokenKind::Plus | TokenKind::Minus => Some(100),
            TokenKind::Star | TokenKind::Slash => Some(110),
            _ => None,
        }
    }

    /// Check if this operator groups right-to-left.
    pub fn is_right_associative(&self) -> bool {
        matches!(self, TokenKind::Assign)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Else => write!(f, "'else'"),
            TokenKind::While => write!(f, "'while'"),
            TokenKind::For => write!(f, "'for'"),
            TokenKind::Return => write!(f, "'return'"),
            TokenKind::Void => write!(f, "'void'"),
            TokenKind::Char => write!(f, "'char'"),
            TokenKind::Int => write!(f, "'int'"),
            TokenKind::Long => write!(f, "'long'"),
            TokenKind::Identifier(s) => write!(f, "identifier '{}'", s),
            TokenKind::IntLiteral(v) => write!(f, "integer '{}'", v),
            TokenKind::StringLiteral(_) => write!(f, "string literal"),
            TokenKind::Assign => write!(f, "'='"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::PlusPlus => write!(f, "'++'"),
            TokenKind::MinusMinus => write!(f, "'--'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::AmpAmp => write!(f, "'&&'"),
            TokenKind::PipePipe => write!(f, "'||'"),
            TokenKind::Bang => write!(f, "'!'"),
            TokenKind::Amp => write!(f, "'&'"),
            TokenKind::Pipe => write!(f, "'|'"),
            TokenKind::Caret => write!(f, "'^'"),
            TokenKind::Tilde => write!(f, "'~'"),
            TokenKind::LtLt => write!(f, "'<<'"),
            TokenKind::GtGt => write!(f, "'>>'"),
            TokenKind::Semi => write!(f, "';'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}
