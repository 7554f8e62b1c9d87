//! Expression parsing: assignments, sum-of-products arithmetic, pointer
//! forms, and boolean expressions in OR-of-AND shape.
//!
//! Precedence is carried by the grammar levels themselves: `||` over `&&`
//! over relations, and `+ -` over `* / %`. There is no unary minus and no
//! parenthesized sub-expression in this language.

use pcc_lex::TokenKind;

use crate::ast::{
    AddOp, ArithExpr, ArithItem, ArrayLiteral, BoolExpr, BoolFactor, BoolItem, Expr, Factor,
    Literal, MethodCall, MulOp, PointerExpr, Primitive, RelOp,
};
use crate::{ParseError, Parser, Result};

impl<'a> Parser<'a> {
    pub(crate) fn expression(&mut self) -> Result<Expr> {
        let Some(tok) = self.peek().copied() else {
            return Err(self.unexpected("an expression"));
        };
        match tok.kind {
            // `{ ... }` array literal or a string literal
            TokenKind::Boundary if tok.text.as_str() == "{" => {
                Ok(Expr::Pointer(PointerExpr::Array(self.array_literal()?)))
            }
            TokenKind::Chars => {
                self.bump();
                Ok(Expr::Pointer(PointerExpr::Array(chars_to_array(
                    tok.text.as_str(),
                ))))
            }
            // `&ident`
            TokenKind::Operator if tok.text.as_str() == "&" => {
                self.bump();
                let name = self.expect_kind(TokenKind::Identifier, "an identifier after `&`")?;
                self.check_defined(name.text, name.line)?;
                Ok(Expr::Pointer(PointerExpr::AddressOf(name.text)))
            }
            // `ident = ...` assignment; anything else is arithmetic
            TokenKind::Identifier
                if self
                    .peek_at(1)
                    .is_some_and(|t| t.is(TokenKind::Operator, "=")) =>
            {
                self.bump();
                self.check_defined(tok.text, tok.line)?;
                self.bump(); // `=`
                let value = Box::new(self.expression()?);
                Ok(Expr::Assignment {
                    target: tok.text,
                    value,
                })
            }
            _ => Ok(Expr::Arithmetic(self.arith_expr()?)),
        }
    }

    pub(crate) fn arith_expr(&mut self) -> Result<ArithExpr> {
        let first = self.arith_item()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(t) if t.is(TokenKind::Operator, "+") => AddOp::Add,
                Some(t) if t.is(TokenKind::Operator, "-") => AddOp::Sub,
                _ => break,
            };
            self.bump();
            rest.push((op, self.arith_item()?));
        }
        Ok(ArithExpr { first, rest })
    }

    fn arith_item(&mut self) -> Result<ArithItem> {
        let first = self.factor()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(t) if t.is(TokenKind::Operator, "*") => MulOp::Mul,
                Some(t) if t.is(TokenKind::Operator, "/") => MulOp::Div,
                Some(t) if t.is(TokenKind::Operator, "%") => MulOp::Mod,
                _ => break,
            };
            self.bump();
            rest.push((op, self.factor()?));
        }
        Ok(ArithItem { first, rest })
    }

    fn factor(&mut self) -> Result<Factor> {
        let Some(tok) = self.peek().copied() else {
            return Err(self.unexpected("a factor"));
        };
        match tok.kind {
            TokenKind::Integer => {
                self.bump();
                let value: i64 =
                    tok.text
                        .as_str()
                        .parse()
                        .map_err(|_| ParseError::InvalidLiteral {
                            text: tok.text.as_str().to_owned(),
                            line: tok.line,
                        })?;
                Ok(Factor::Literal(Literal::from_integer(value)))
            }
            TokenKind::Float => {
                self.bump();
                let value: f64 =
                    tok.text
                        .as_str()
                        .parse()
                        .map_err(|_| ParseError::InvalidLiteral {
                            text: tok.text.as_str().to_owned(),
                            line: tok.line,
                        })?;
                Ok(Factor::Literal(Literal::from_float(value)))
            }
            TokenKind::Identifier
                if self
                    .peek_at(1)
                    .is_some_and(|t| t.is(TokenKind::Boundary, "(")) =>
            {
                Ok(Factor::MethodReturn(self.method_call()?))
            }
            TokenKind::Identifier => {
                self.bump();
                self.check_defined(tok.text, tok.line)?;
                Ok(Factor::Identity(tok.text))
            }
            // `*ident` dereference
            TokenKind::Operator if tok.text.as_str() == "*" => {
                self.bump();
                let name = self.expect_kind(TokenKind::Identifier, "an identifier after `*`")?;
                self.check_defined(name.text, name.line)?;
                Ok(Factor::Deref(name.text))
            }
            // `&ident` address-of
            TokenKind::Operator if tok.text.as_str() == "&" => {
                self.bump();
                let name = self.expect_kind(TokenKind::Identifier, "an identifier after `&`")?;
                self.check_defined(name.text, name.line)?;
                Ok(Factor::AddressOf(name.text))
            }
            _ => Err(self.unexpected("a factor")),
        }
    }

    pub(crate) fn method_call(&mut self) -> Result<MethodCall> {
        let name = self.expect_kind(TokenKind::Identifier, "a method name")?;
        let ret = self.method_return_type(name.text, name.line)?;
        self.expect(TokenKind::Boundary, "(", "`(`")?;
        let mut args = Vec::new();
        if !self.at(TokenKind::Boundary, ")") {
            loop {
                args.push(self.expression()?);
                if !self.eat(TokenKind::Boundary, ",") {
                    break;
                }
            }
        }
        self.expect(TokenKind::Boundary, ")", "`)`")?;
        Ok(MethodCall {
            name: name.text,
            ret,
            args,
        })
    }

    pub(crate) fn bool_expr(&mut self) -> Result<BoolExpr> {
        let mut items = vec![self.bool_item()?];
        while self.eat(TokenKind::Bool, "||") {
            items.push(self.bool_item()?);
        }
        Ok(BoolExpr { items })
    }

    fn bool_item(&mut self) -> Result<BoolItem> {
        let mut factors = vec![self.bool_factor()?];
        while self.eat(TokenKind::Bool, "&&") {
            factors.push(self.bool_factor()?);
        }
        Ok(BoolItem { factors })
    }

    fn bool_factor(&mut self) -> Result<BoolFactor> {
        if self.eat(TokenKind::Operator, "!") {
            return Ok(BoolFactor::Invert(Box::new(self.bool_factor()?)));
        }
        let lhs = self.arith_expr()?;
        let op = self.relation_op()?;
        let rhs = self.arith_expr()?;
        Ok(BoolFactor::Relation { lhs, op, rhs })
    }

    fn relation_op(&mut self) -> Result<RelOp> {
        let Some(tok) = self.peek().copied() else {
            return Err(self.unexpected("a relational operator"));
        };
        let op = match (tok.kind, tok.text.as_str()) {
            (TokenKind::Operator, "<") => RelOp::Less,
            (TokenKind::Operator, ">") => RelOp::Greater,
            (TokenKind::Operator2, "<=") => RelOp::LessEq,
            (TokenKind::Operator2, ">=") => RelOp::GreaterEq,
            (TokenKind::Operator2, "==") => RelOp::Eq,
            (TokenKind::Operator2, "!=") => RelOp::NotEq,
            _ => return Err(self.unexpected("a relational operator")),
        };
        self.bump();
        Ok(op)
    }

    /// `{ lit, lit, ... }`; element type follows the widest element.
    fn array_literal(&mut self) -> Result<ArrayLiteral> {
        self.expect(TokenKind::Boundary, "{", "`{`")?;
        let mut values = Vec::new();
        if !self.at(TokenKind::Boundary, "}") {
            loop {
                match self.factor()? {
                    Factor::Literal(lit) => values.push(lit),
                    _ => return Err(self.unexpected("a literal")),
                }
                if !self.eat(TokenKind::Boundary, ",") {
                    break;
                }
            }
        }
        self.expect(TokenKind::Boundary, "}", "`}`")?;
        let primitive = values
            .iter()
            .map(literal_primitive)
            .max_by_key(|p| *p as u8)
            .unwrap_or(Primitive::Char);
        Ok(ArrayLiteral { primitive, values })
    }
}

fn literal_primitive(lit: &Literal) -> Primitive {
    match lit {
        Literal::Char(_) => Primitive::Char,
        Literal::Short(_) => Primitive::Short,
        Literal::Int(_) => Primitive::Int,
        Literal::Long(_) => Primitive::Long,
        Literal::Float(_) => Primitive::Float,
        Literal::Double(_) => Primitive::Double,
    }
}

/// A string literal is a char array.
fn chars_to_array(text: &str) -> ArrayLiteral {
    ArrayLiteral {
        primitive: Primitive::Char,
        values: text.bytes().map(|b| Literal::Char(b as i8)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use pcc_lex::tokenize;

    fn first_return(src: &str) -> Expr {
        let program = crate::parse(&tokenize(src).unwrap()).unwrap();
        for method in program.methods {
            if let Some(body) = method.body {
                for stmt in body.statements {
                    if let Statement::Return(Some(expr)) = stmt {
                        return expr;
                    }
                }
            }
        }
        panic!("no return expression");
    }

    #[test]
    fn precedence_shape() {
        // a*a + b*b: two items, each a product of two factors
        let expr = first_return("int main(){ int a = 3; int b = 4; return a*a + b*b; }");
        let Expr::Arithmetic(arith) = expr else {
            panic!("expected arithmetic");
        };
        assert_eq!(arith.rest.len(), 1);
        assert_eq!(arith.first.rest.len(), 1);
        assert!(matches!(arith.rest[0], (AddOp::Add, _)));
        assert!(matches!(arith.first.rest[0], (MulOp::Mul, _)));
    }

    #[test]
    fn left_associative_sums() {
        let expr = first_return("int main(){ int a = 1; return a - a + a; }");
        let Expr::Arithmetic(arith) = expr else {
            panic!("expected arithmetic");
        };
        assert_eq!(arith.rest.len(), 2);
        assert!(matches!(arith.rest[0], (AddOp::Sub, _)));
        assert!(matches!(arith.rest[1], (AddOp::Add, _)));
    }

    #[test]
    fn chained_assignment_nests_right() {
        let program = crate::parse(
            &tokenize("int main(){ int x = 1; int y = 2; x = y = 5; return x; }").unwrap(),
        )
        .unwrap();
        let Statement::Expression(Expr::Assignment { target, value }) =
            &program.methods[0].body.as_ref().unwrap().statements[2]
        else {
            panic!("expected assignment");
        };
        assert_eq!(target.as_str(), "x");
        assert!(matches!(**value, Expr::Assignment { .. }));
    }

    #[test]
    fn call_in_expression() {
        let expr = first_return(
            "int add(int x, int y){ return x + y; } int main(){ return add(17, 25); }",
        );
        let Expr::Arithmetic(arith) = expr else {
            panic!("expected arithmetic");
        };
        assert!(matches!(arith.first.first, Factor::MethodReturn(_)));
    }

    #[test]
    fn bool_dnf_shape() {
        let program = crate::parse(
            &tokenize("int main(){ int a = 5; if (a > 3 && a < 10 || a == 0) return 1; return 0; }")
                .unwrap(),
        )
        .unwrap();
        let Statement::If(if_stmt) = &program.methods[0].body.as_ref().unwrap().statements[1]
        else {
            panic!("expected if");
        };
        assert_eq!(if_stmt.condition.items.len(), 2); // two OR items
        assert_eq!(if_stmt.condition.items[0].factors.len(), 2); // a>3 && a<10
        assert_eq!(if_stmt.condition.items[1].factors.len(), 1);
    }

    #[test]
    fn inversion_nests() {
        let program = crate::parse(
            &tokenize("int main(){ int a = 1; if (! ! a == 1) return 1; return 0; }").unwrap(),
        )
        .unwrap();
        let Statement::If(if_stmt) = &program.methods[0].body.as_ref().unwrap().statements[1]
        else {
            panic!("expected if");
        };
        let BoolFactor::Invert(inner) = &if_stmt.condition.items[0].factors[0] else {
            panic!("expected inversion");
        };
        assert!(matches!(**inner, BoolFactor::Invert(_)));
    }

    #[test]
    fn string_literal_becomes_char_array() {
        let program = crate::parse(
            &tokenize("extern int write(int fd, long buf, int len); int main(){ write(1, \"ok\", 2); return 0; }")
                .unwrap(),
        )
        .unwrap();
        let Statement::MethodCall(call) = &program.methods[1].body.as_ref().unwrap().statements[0]
        else {
            panic!("expected call");
        };
        let Expr::Pointer(PointerExpr::Array(array)) = &call.args[1] else {
            panic!("expected array argument");
        };
        assert_eq!(array.primitive, Primitive::Char);
        assert_eq!(array.values.len(), 2);
    }

    #[test]
    fn address_of_and_deref() {
        let program = crate::parse(
            &tokenize("int main(){ int x = 1; long* p = &x; return *x; }").unwrap(),
        )
        .unwrap();
        let body = &program.methods[0].body.as_ref().unwrap().statements;
        let Statement::Define(define) = &body[1] else {
            panic!("expected define");
        };
        assert!(matches!(
            define.value,
            Expr::Pointer(PointerExpr::AddressOf(_))
        ));
        let Statement::Return(Some(Expr::Arithmetic(arith))) = &body[2] else {
            panic!("expected return");
        };
        assert!(matches!(arith.first.first, Factor::Deref(_)));
    }

    #[test]
    fn array_literal_takes_widest_type() {
        let program = crate::parse(
            &tokenize("int main(){ long a = {1, 300, 70000}; return 0; }").unwrap(),
        )
        .unwrap();
        let Statement::Define(define) = &program.methods[0].body.as_ref().unwrap().statements[0]
        else {
            panic!("expected define");
        };
        let Expr::Pointer(PointerExpr::Array(array)) = &define.value else {
            panic!("expected array");
        };
        assert_eq!(array.primitive, Primitive::Int);
        assert_eq!(array.values.len(), 3);
    }
}
