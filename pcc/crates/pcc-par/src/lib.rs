//! pcc-par - syntactic analysis.
//!
//! A recursive-descent parser over the token stream: one method per
//! grammar rule, no backtracking. The grammar is LL(1) apart from two
//! spots that need a single token of lookahead (`ident (` starts a call,
//! `ident =` starts an assignment).
//!
//! Name resolution happens here, against a lexical scope stack: the
//! bottom frame holds globals, a frame is pushed per method and per
//! block, and `define` statements add to the top frame. Referencing an
//! identifier or calling a method that is not in scope is a fatal parse
//! error carrying the offending lexeme, so nothing downstream ever sees an
//! unresolved name. Method calls also record the callee's declared
//! return type in the call node, which MIR generation uses to type the
//! implicit last-return operand.

pub mod ast;
mod expr;
mod stmt;

use pcc_lex::{Token, TokenKind};
use pcc_util::{FxHashMap, Symbol};
use thiserror::Error;
use tracing::debug;

use ast::{AstType, DefineStatement, MethodDef, ParamDef, Primitive, Program};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        line: u32,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("line {line}: undefined identifier `{name}`")]
    UndefinedIdentifier { name: Symbol, line: u32 },

    #[error("line {line}: undefined method `{name}`")]
    UndefinedMethod { name: Symbol, line: u32 },

    #[error("line {line}: `{found}` is not a type name")]
    MissingType { found: String, line: u32 },

    #[error("line {line}: invalid literal `{text}`")]
    InvalidLiteral { text: String, line: u32 },
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse a whole program.
pub fn parse(tokens: &[Token]) -> Result<Program> {
    let mut parser = Parser::new(tokens);
    let program = parser.program()?;
    debug!(target: "parser", methods = program.methods.len(), "syntactic analysis done");
    Ok(program)
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Lexical scopes; `scopes[0]` holds globals.
    scopes: Vec<Vec<Symbol>>,
    /// Declared methods, name -> return type.
    methods: FxHashMap<Symbol, AstType>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            pos: 0,
            scopes: vec![Vec::new()],
            methods: FxHashMap::default(),
        }
    }

    // ---- token plumbing -------------------------------------------------

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub(crate) fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn at(&self, kind: TokenKind, text: &str) -> bool {
        self.peek().is_some_and(|t| t.is(kind, text))
    }

    /// Consume the next token if it matches exactly.
    pub(crate) fn eat(&mut self, kind: TokenKind, text: &str) -> bool {
        if self.at(kind, text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(
        &mut self,
        kind: TokenKind,
        text: &str,
        expected: &'static str,
    ) -> Result<Token> {
        if self.at(kind, text) {
            Ok(self.bump().unwrap())
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(crate) fn expect_kind(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token> {
        match self.peek() {
            Some(t) if t.kind == kind => Ok(self.bump().unwrap()),
            _ => Err(self.unexpected(expected)),
        }
    }

    pub(crate) fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(t) => ParseError::UnexpectedToken {
                found: t.to_string(),
                expected,
                line: t.line,
            },
            None => ParseError::UnexpectedEof { expected },
        }
    }

    // ---- scope stack ----------------------------------------------------

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn declare(&mut self, name: Symbol) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .push(name);
    }

    pub(crate) fn is_defined(&self, name: Symbol) -> bool {
        self.scopes.iter().any(|frame| frame.contains(&name))
    }

    pub(crate) fn check_defined(&self, name: Symbol, line: u32) -> Result<()> {
        if self.is_defined(name) {
            Ok(())
        } else {
            Err(ParseError::UndefinedIdentifier { name, line })
        }
    }

    pub(crate) fn method_return_type(&self, name: Symbol, line: u32) -> Result<AstType> {
        self.methods
            .get(&name)
            .copied()
            .ok_or(ParseError::UndefinedMethod { name, line })
    }

    // ---- top level ------------------------------------------------------

    fn program(&mut self) -> Result<Program> {
        let mut program = Program {
            globals: Vec::new(),
            methods: Vec::new(),
        };
        while self.peek().is_some() {
            let is_extern = self.eat(TokenKind::Keyword, "extern");
            let ty = self.parse_type()?;
            let name_tok = self.expect_kind(TokenKind::Identifier, "a name")?;
            if self.at(TokenKind::Boundary, "(") {
                program
                    .methods
                    .push(self.method(is_extern, ty, name_tok.text)?);
            } else if is_extern {
                return Err(self.unexpected("`(` after an extern method name"));
            } else {
                program.globals.push(self.global(ty, name_tok.text)?);
            }
        }
        Ok(program)
    }

    /// The name is registered before the body parses so recursion resolves.
    fn method(&mut self, is_extern: bool, ret: AstType, name: Symbol) -> Result<MethodDef> {
        self.methods.insert(name, ret);
        self.expect(TokenKind::Boundary, "(", "`(`")?;
        let mut params = Vec::new();
        if !self.at(TokenKind::Boundary, ")") {
            loop {
                let ty = self.parse_type()?;
                let param = self.expect_kind(TokenKind::Identifier, "a parameter name")?;
                params.push(ParamDef {
                    ty,
                    name: param.text,
                });
                if !self.eat(TokenKind::Boundary, ",") {
                    break;
                }
            }
        }
        self.expect(TokenKind::Boundary, ")", "`)`")?;

        let body = if self.eat(TokenKind::Boundary, ";") {
            None
        } else {
            self.push_scope();
            for param in &params {
                self.declare(param.name);
            }
            let block = self.block()?;
            self.pop_scope();
            Some(block)
        };
        Ok(MethodDef {
            is_extern,
            ret,
            name,
            params,
            body,
        })
    }

    fn global(&mut self, ty: AstType, name: Symbol) -> Result<DefineStatement> {
        self.expect(TokenKind::Operator, "=", "`=`")?;
        let value = self.expression()?;
        self.expect(TokenKind::Boundary, ";", "`;`")?;
        self.declare(name);
        Ok(DefineStatement { ty, name, value })
    }

    pub(crate) fn parse_type(&mut self) -> Result<AstType> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Type || t.kind == TokenKind::PointerType => {
                let tok = self.bump().unwrap();
                let primitive = Primitive::from_name(tok.text.as_str()).ok_or_else(|| {
                    ParseError::MissingType {
                        found: tok.text.as_str().to_owned(),
                        line: tok.line,
                    }
                })?;
                Ok(AstType::new(primitive, tok.kind == TokenKind::PointerType))
            }
            Some(t) => Err(ParseError::MissingType {
                found: t.to_string(),
                line: t.line,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: "a type name",
            }),
        }
    }
}
