//! pcc-lex - lexical analysis.
//!
//! Turns source text into a flat token stream. The scanner accumulates a
//! pending lexeme and flushes it whenever a delimiter shows up: whitespace,
//! a boundary character, an operator, or a quote. Classification happens at
//! flush time (integer / float / keyword / type name / identifier), so the
//! parser only ever looks at [`TokenKind`]s.
//!
//! Two spellings get special treatment:
//!
//! - `*` directly after a type name turns that token into a pointer type
//!   (`int*` and `int *` both work); anywhere else it is the ordinary
//!   multiply/dereference operator.
//! - `||` and `&&` are boolean operators. A single `|` is an error; the
//!   language has no bitwise operators, and silently dropping the byte
//!   would change the meaning of the surrounding expression. A single `&`
//!   stays an operator because it spells address-of.

pub mod cursor;
pub mod token;

use cursor::Cursor;
use thiserror::Error;
use tracing::debug;

pub use token::{Token, TokenKind, KEYWORDS, TYPES};

#[derive(Debug, Error)]
pub enum LexError {
    #[error("line {line}: unexpected character `{ch}`")]
    UnexpectedCharacter { ch: char, line: u32 },

    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: u32 },
}

pub type Result<T> = std::result::Result<T, LexError>;

const BOUNDARIES: &[u8] = b"{}(),;";
const OPERATORS: &[u8] = b"=+-*/%<>!&";

/// Tokenize a complete source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    lexer.run()?;
    debug!(target: "lexer", tokens = lexer.tokens.len(), "lexical analysis done");
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    cursor: Cursor<'a>,
    tokens: Vec<Token>,
    /// Pending lexeme bytes, flushed at the next delimiter.
    pending: Vec<u8>,
    /// Line the pending lexeme started on.
    pending_line: u32,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            tokens: Vec::new(),
            pending: Vec::new(),
            pending_line: 1,
        }
    }

    fn run(&mut self) -> Result<()> {
        while let Some(b) = self.cursor.current() {
            match b {
                b'"' => {
                    self.flush();
                    self.string_literal()?;
                }
                b if b.is_ascii_whitespace() => {
                    self.flush();
                    self.cursor.advance();
                }
                b'*' => {
                    self.flush();
                    self.cursor.advance();
                    match self.tokens.last_mut() {
                        Some(last) if last.kind == TokenKind::Type => {
                            last.kind = TokenKind::PointerType;
                        }
                        _ => self.push_str(TokenKind::Operator, "*"),
                    }
                }
                b'|' | b'&' => {
                    self.flush();
                    if self.cursor.peek(1) == Some(b) {
                        let text = if b == b'|' { "||" } else { "&&" };
                        self.push_str(TokenKind::Bool, text);
                        self.cursor.advance();
                        self.cursor.advance();
                    } else if b == b'&' {
                        // address-of
                        self.push_str(TokenKind::Operator, "&");
                        self.cursor.advance();
                    } else {
                        return Err(LexError::UnexpectedCharacter {
                            ch: '|',
                            line: self.cursor.line(),
                        });
                    }
                }
                b if BOUNDARIES.contains(&b) => {
                    self.flush();
                    self.push_byte(TokenKind::Boundary, b);
                    self.cursor.advance();
                }
                b if OPERATORS.contains(&b) => {
                    self.flush();
                    if self.cursor.peek(1) == Some(b'=') {
                        let text = [b, b'='];
                        let text = std::str::from_utf8(&text).unwrap().to_owned();
                        self.push_str(TokenKind::Operator2, &text);
                        self.cursor.advance();
                        self.cursor.advance();
                    } else {
                        self.push_byte(TokenKind::Operator, b);
                        self.cursor.advance();
                    }
                }
                b if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' => {
                    if self.pending.is_empty() {
                        self.pending_line = self.cursor.line();
                    }
                    self.pending.push(b);
                    self.cursor.advance();
                }
                other => {
                    return Err(LexError::UnexpectedCharacter {
                        ch: other as char,
                        line: self.cursor.line(),
                    });
                }
            }
        }
        self.flush();
        Ok(())
    }

    /// Classify and emit the pending lexeme, if any.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = String::from_utf8(std::mem::take(&mut self.pending))
            .expect("pending lexeme is ascii");
        let kind = if text.as_bytes()[0].is_ascii_digit() {
            if text.contains('.') {
                TokenKind::Float
            } else {
                TokenKind::Integer
            }
        } else if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else if TYPES.contains(&text.as_str()) {
            TokenKind::Type
        } else {
            TokenKind::Identifier
        };
        let line = self.pending_line;
        self.tokens.push(Token::new(kind, &text, line));
    }

    /// Consume a `"..."` literal; the leading quote is the current byte.
    fn string_literal(&mut self) -> Result<()> {
        let start_line = self.cursor.line();
        self.cursor.advance();
        let mut content = Vec::new();
        loop {
            match self.cursor.current() {
                None => return Err(LexError::UnterminatedString { line: start_line }),
                Some(b'"') => {
                    self.cursor.advance();
                    break;
                }
                Some(b'\\') => {
                    self.cursor.advance();
                    let escaped = self
                        .cursor
                        .current()
                        .ok_or(LexError::UnterminatedString { line: start_line })?;
                    content.push(match escaped {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'0' => b'\0',
                        other => other,
                    });
                    self.cursor.advance();
                }
                Some(b) => {
                    content.push(b);
                    self.cursor.advance();
                }
            }
        }
        let text = String::from_utf8_lossy(&content).into_owned();
        self.tokens.push(Token::new(TokenKind::Chars, &text, start_line));
        Ok(())
    }

    fn push_str(&mut self, kind: TokenKind, text: &str) {
        self.tokens.push(Token::new(kind, text, self.cursor.line()));
    }

    fn push_byte(&mut self, kind: TokenKind, b: u8) {
        let text = [b];
        self.push_str(kind, std::str::from_utf8(&text).unwrap());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().iter().map(|t| t.kind).collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .iter()
            .map(|t| t.text.as_str().to_owned())
            .collect()
    }

    #[test]
    fn simple_method() {
        let toks = tokenize("int main(){ return 42; }").unwrap();
        let expect = [
            (TokenKind::Type, "int"),
            (TokenKind::Identifier, "main"),
            (TokenKind::Boundary, "("),
            (TokenKind::Boundary, ")"),
            (TokenKind::Boundary, "{"),
            (TokenKind::Keyword, "return"),
            (TokenKind::Integer, "42"),
            (TokenKind::Boundary, ";"),
            (TokenKind::Boundary, "}"),
        ];
        assert_eq!(toks.len(), expect.len());
        for (tok, (kind, text)) in toks.iter().zip(expect) {
            assert_eq!(tok.kind, kind);
            assert_eq!(tok.text.as_str(), text);
        }
    }

    #[test]
    fn double_operators() {
        assert_eq!(
            kinds("a <= b == c != d >= e"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator2,
                TokenKind::Identifier,
                TokenKind::Operator2,
                TokenKind::Identifier,
                TokenKind::Operator2,
                TokenKind::Identifier,
                TokenKind::Operator2,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn bool_operators() {
        assert_eq!(
            kinds("a && b || c"),
            vec![
                TokenKind::Identifier,
                TokenKind::Bool,
                TokenKind::Identifier,
                TokenKind::Bool,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn single_pipe_is_an_error() {
        assert!(matches!(
            tokenize("a | b"),
            Err(LexError::UnexpectedCharacter { ch: '|', .. })
        ));
    }

    #[test]
    fn address_of_is_an_operator() {
        assert_eq!(
            kinds("&x"),
            vec![TokenKind::Operator, TokenKind::Identifier]
        );
    }

    #[test]
    fn pointer_type_with_and_without_space() {
        for src in ["int* p", "int *p", "int * p"] {
            let toks = tokenize(src).unwrap();
            assert_eq!(toks[0].kind, TokenKind::PointerType, "source: {src}");
            assert_eq!(toks[0].text.as_str(), "int");
            assert_eq!(toks[1].kind, TokenKind::Identifier);
        }
    }

    #[test]
    fn multiply_stays_an_operator() {
        assert_eq!(
            kinds("a*b"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn integer_and_float_literals() {
        assert_eq!(
            kinds("1 23 4.5"),
            vec![TokenKind::Integer, TokenKind::Integer, TokenKind::Float]
        );
    }

    #[test]
    fn string_literal_with_escapes() {
        let toks = tokenize("write(1, \"hi\\n\", 3);").unwrap();
        let chars: Vec<_> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Chars)
            .collect();
        assert_eq!(chars.len(), 1);
        assert_eq!(chars[0].text.as_str(), "hi\n");
    }

    #[test]
    fn unterminated_string() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn line_numbers() {
        let toks = tokenize("int a;\nint b;\n\nint c;").unwrap();
        let lines: Vec<_> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.line)
            .collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn keywords_and_types() {
        assert_eq!(
            texts("extern long fib(long n);"),
            vec!["extern", "long", "fib", "(", "long", "n", ")", ";"]
        );
        assert_eq!(kinds("extern long fib(long n);")[0], TokenKind::Keyword);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn identifiers_lex_whole(name in "[a-z_][a-z0-9_]{0,20}") {
                prop_assume!(!KEYWORDS.contains(&name.as_str()));
                prop_assume!(!TYPES.contains(&name.as_str()));
                let toks = tokenize(&name).unwrap();
                prop_assert_eq!(toks.len(), 1);
                prop_assert_eq!(toks[0].kind, TokenKind::Identifier);
                prop_assert_eq!(toks[0].text.as_str(), name.as_str());
            }

            #[test]
            fn integers_lex_whole(value in 0u64..=u64::MAX / 2) {
                let text = value.to_string();
                let toks = tokenize(&text).unwrap();
                prop_assert_eq!(toks.len(), 1);
                prop_assert_eq!(toks[0].kind, TokenKind::Integer);
            }

            #[test]
            fn whitespace_is_insignificant(pad in "[ \t\n]{0,4}") {
                let src = format!("int{pad} main () {{ return{pad} 0 ; }}", pad = pad);
                let a = tokenize(&src).unwrap();
                let b = tokenize("int main(){ return 0; }").unwrap();
                let ka: Vec<_> = a.iter().map(|t| (t.kind, t.text)).collect();
                let kb: Vec<_> = b.iter().map(|t| (t.kind, t.text)).collect();
                prop_assert_eq!(ka, kb);
            }
        }
    }
}
