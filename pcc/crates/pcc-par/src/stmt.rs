//! Statement parsing.

use pcc_lex::TokenKind;

use crate::ast::{
    Block, DefineStatement, ForStatement, IfStatement, Statement, WhileStatement,
};
use crate::{Parser, Result};

impl<'a> Parser<'a> {
    /// `{ statement* }`, with its own scope frame.
    pub(crate) fn block(&mut self) -> Result<Block> {
        self.expect(TokenKind::Boundary, "{", "`{`")?;
        self.push_scope();
        let mut statements = Vec::new();
        while !self.at(TokenKind::Boundary, "}") {
            if self.peek().is_none() {
                return Err(self.unexpected("`}`"));
            }
            statements.push(self.statement()?);
        }
        self.pop_scope();
        self.expect(TokenKind::Boundary, "}", "`}`")?;
        Ok(Block { statements })
    }

    pub(crate) fn statement(&mut self) -> Result<Statement> {
        let Some(tok) = self.peek().copied() else {
            return Err(self.unexpected("a statement"));
        };
        match tok.kind {
            TokenKind::Type | TokenKind::PointerType => self.define_statement().map(Statement::Define),
            TokenKind::Keyword => match tok.text.as_str() {
                "if" => self.if_statement(),
                "while" => self.while_statement(),
                "for" => self.for_statement(),
                "return" => self.return_statement(),
                _ => Err(self.unexpected("a statement")),
            },
            TokenKind::Boundary if tok.text.as_str() == "{" => {
                Ok(Statement::Block(self.block()?))
            }
            TokenKind::Identifier
                if self
                    .peek_at(1)
                    .is_some_and(|t| t.is(TokenKind::Boundary, "(")) =>
            {
                let call = self.method_call()?;
                self.expect(TokenKind::Boundary, ";", "`;`")?;
                Ok(Statement::MethodCall(call))
            }
            _ => {
                let expr = self.expression()?;
                self.expect(TokenKind::Boundary, ";", "`;`")?;
                Ok(Statement::Expression(expr))
            }
        }
    }

    /// `type ident = expr ;`. The name enters scope only after its
    /// initializer parsed, so `int a = a;` is rejected.
    fn define_statement(&mut self) -> Result<DefineStatement> {
        let ty = self.parse_type()?;
        let name = self.expect_kind(TokenKind::Identifier, "a variable name")?;
        self.expect(TokenKind::Operator, "=", "`=`")?;
        let value = self.expression()?;
        self.expect(TokenKind::Boundary, ";", "`;`")?;
        self.declare(name.text);
        Ok(DefineStatement {
            ty,
            name: name.text,
            value,
        })
    }

    fn if_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Keyword, "if", "`if`")?;
        self.expect(TokenKind::Boundary, "(", "`(`")?;
        let condition = self.bool_expr()?;
        self.expect(TokenKind::Boundary, ")", "`)`")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.eat(TokenKind::Keyword, "else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            condition,
            then_branch,
            else_branch,
        }))
    }

    fn while_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Keyword, "while", "`while`")?;
        self.expect(TokenKind::Boundary, "(", "`(`")?;
        let condition = self.bool_expr()?;
        self.expect(TokenKind::Boundary, ")", "`)`")?;
        let body = Box::new(self.statement()?);
        Ok(Statement::While(WhileStatement { condition, body }))
    }

    /// `for ( init ; cond ; step ) stmt`. The init clause may be a define
    /// (`for (int i = 0; ...)`) or a plain expression; a define's name
    /// scopes to the statement enclosing the `for`.
    fn for_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Keyword, "for", "`for`")?;
        self.expect(TokenKind::Boundary, "(", "`(`")?;
        let init = match self.peek() {
            Some(t) if t.kind == TokenKind::Type || t.kind == TokenKind::PointerType => {
                let define = {
                    let ty = self.parse_type()?;
                    let name = self.expect_kind(TokenKind::Identifier, "a variable name")?;
                    self.expect(TokenKind::Operator, "=", "`=`")?;
                    let value = self.expression()?;
                    self.declare(name.text);
                    DefineStatement {
                        ty,
                        name: name.text,
                        value,
                    }
                };
                self.expect(TokenKind::Boundary, ";", "`;`")?;
                ForInit::Define(define)
            }
            _ => {
                let expr = self.expression()?;
                self.expect(TokenKind::Boundary, ";", "`;`")?;
                ForInit::Expr(expr)
            }
        };
        let condition = self.bool_expr()?;
        self.expect(TokenKind::Boundary, ";", "`;`")?;
        let step = self.expression()?;
        self.expect(TokenKind::Boundary, ")", "`)`")?;
        let body = Box::new(self.statement()?);
        match init {
            ForInit::Expr(init) => Ok(Statement::For(ForStatement {
                init: Some(init),
                condition,
                step,
                body,
            })),
            // `for (int i = e; ...)` hoists the define in front of the loop;
            // the loop itself keeps no init clause.
            ForInit::Define(define) => Ok(Statement::Block(Block {
                statements: vec![
                    Statement::Define(define),
                    Statement::For(ForStatement {
                        init: None,
                        condition,
                        step,
                        body,
                    }),
                ],
            })),
        }
    }

    fn return_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Keyword, "return", "`return`")?;
        let value = if self.at(TokenKind::Boundary, ";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Boundary, ";", "`;`")?;
        Ok(Statement::Return(value))
    }
}

enum ForInit {
    Expr(crate::ast::Expr),
    Define(DefineStatement),
}
