//! Token model.
//!
//! A token is a classified lexeme: the kind drives the parser's decisions,
//! the interned text carries the exact spelling, and the line number feeds
//! diagnostics. Keywords and type names are classified here so the parser
//! never string-compares against raw source.

use std::fmt;

use pcc_util::Symbol;

/// Reserved words of the source language.
pub const KEYWORDS: &[&str] = &["if", "else", "for", "while", "return", "extern"];

/// Primitive type names.
pub const TYPES: &[&str] = &["void", "char", "short", "int", "long", "float", "double"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// One of `{ } ( ) , ;`
    Boundary,
    /// Single-character operator: `= + - * / % < > ! &`
    Operator,
    /// Operator followed by `=`: `== != <= >=` (and rejected forms like `+=`)
    Operator2,
    /// `||` or `&&`
    Bool,
    /// Decimal integer literal
    Integer,
    /// Decimal floating-point literal
    Float,
    /// Double-quoted string literal (content, unquoted, escapes resolved)
    Chars,
    /// `if else for while return extern`
    Keyword,
    /// `void char short int long float double`
    Type,
    /// A type name directly followed by `*`
    PointerType,
    Identifier,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Boundary => "boundary",
            TokenKind::Operator => "operator",
            TokenKind::Operator2 => "operator2",
            TokenKind::Bool => "bool",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::Chars => "chars",
            TokenKind::Keyword => "keyword",
            TokenKind::Type => "type",
            TokenKind::PointerType => "pointer type",
            TokenKind::Identifier => "identifier",
        }
    }
}

/// A classified lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Symbol,
    /// 1-based source line the lexeme started on.
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str, line: u32) -> Self {
        Token {
            kind,
            text: Symbol::intern(text),
            line,
        }
    }

    /// True when this token is exactly `kind` with spelling `text`.
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text.as_str() == text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind.name(), self.text)
    }
}
