//! AST to MIR lowering.
//!
//! Expressions lower bottom-up into chains over a single temporary per
//! grammar level, which keeps temporary liveness short. Boolean
//! expressions lower into short-circuit compare-and-branch form against
//! caller-provided true/false labels. Control flow emits block and loop
//! markers around its region so the optimizer and the register allocator
//! can see scope boundaries without a CFG.
//!
//! Two symbol tables drive type fix-up: the per-method variable table and
//! the per-program method-return-type table. Every assignment resolves
//! its destination type immediately after emission and records it in the
//! variable table.

use indexmap::IndexMap;
use pcc_par::ast;
use pcc_util::Symbol;
use thiserror::Error;
use tracing::debug;

use crate::mir::{
    BinOp, CmpOp, InstKind, Mir, MirInst, MirLiteral, MirMethod, MirParam, MirType, Operand,
    OptFlag,
};

#[derive(Debug, Error)]
pub enum MirError {
    #[error("pointer and array expressions are not supported in code generation (`{context}`)")]
    UnsupportedPointer { context: String },

    #[error("global variables are not supported (`{name}`)")]
    UnsupportedGlobal { name: Symbol },

    #[error("internal error: variable `{name}` has no recorded type")]
    UnknownVariable { name: Symbol },

    #[error("internal error: last-return operand with no preceding call")]
    DanglingLastReturn,

    #[error("internal error: method `{name}` has no recorded return type")]
    UnknownMethod { name: Symbol },
}

pub type Result<T> = std::result::Result<T, MirError>;

/// Lower a parsed program into MIR, one method at a time.
pub fn generate(program: &ast::Program) -> Result<Mir> {
    if let Some(global) = program.globals.first() {
        return Err(MirError::UnsupportedGlobal { name: global.name });
    }
    let mut gen = MirGen::new();
    let mut methods = Vec::new();
    for method in &program.methods {
        if let Some(lowered) = gen.lower_method(method)? {
            methods.push(lowered);
        }
    }
    debug!(target: "mir", methods = methods.len(), "mir generation done");
    Ok(Mir {
        methods,
        method_types: gen.method_types,
    })
}

struct MirGen {
    /// Current method's instruction list.
    code: Vec<MirInst>,
    code_line: u32,
    /// Reset per method.
    temp_index: u32,
    /// Global across the compilation; labels stay unique program-wide.
    label_index: u32,
    /// Per-method variable type table.
    var_types: IndexMap<Symbol, MirType>,
    /// Per-program method return type table.
    method_types: IndexMap<Symbol, MirType>,
    /// Name of the most recent lowered call, consumed by type fix-up.
    last_called: Option<Symbol>,
}

impl MirGen {
    fn new() -> Self {
        MirGen {
            code: Vec::new(),
            code_line: 0,
            temp_index: 0,
            label_index: 0,
            var_types: IndexMap::new(),
            method_types: IndexMap::new(),
            last_called: None,
        }
    }

    fn emit(&mut self, kind: InstKind) {
        let code_line = self.code_line;
        self.code_line += 1;
        self.code.push(MirInst { code_line, kind });
    }

    fn alloc_temp(&mut self) -> Symbol {
        let name = Symbol::intern(&format!("$t{}", self.temp_index));
        self.temp_index += 1;
        name
    }

    fn alloc_label(&mut self) -> Symbol {
        let name = Symbol::intern(&format!(".L{}", self.label_index));
        self.label_index += 1;
        name
    }

    // ---- type fix-up ----------------------------------------------------

    /// The type an operand carries, resolving identities through the var
    /// table and last-return through the method table.
    fn resolve_operand_type(&mut self, operand: &Operand) -> Result<MirType> {
        match operand {
            Operand::Identity(name) => self
                .var_types
                .get(name)
                .copied()
                .ok_or(MirError::UnknownVariable { name: *name }),
            Operand::LastRet(_) => {
                let callee = self.last_called.take().ok_or(MirError::DanglingLastReturn)?;
                self.method_types
                    .get(&callee)
                    .copied()
                    .ok_or(MirError::UnknownMethod { name: callee })
            }
            Operand::Literal(lit) => Ok(lit.ty()),
            Operand::Void => Ok(MirType::scalar(crate::mir::Scalar::Void)),
        }
    }

    /// Emit `dist = from` with its type resolved and recorded.
    fn emit_assign2(&mut self, dist: Symbol, from: Operand) -> Result<()> {
        let ty = self.resolve_operand_type(&from)?;
        self.var_types.insert(dist, ty);
        self.emit(InstKind::Assign2 { ty, dist, from });
        Ok(())
    }

    /// Emit `dist = dist op rhs`; the destination type widens to the max
    /// rank of its current type and the right-hand side.
    fn emit_assign3(&mut self, dist: Symbol, op: BinOp, rhs: Operand) -> Result<()> {
        let current = self
            .var_types
            .get(&dist)
            .copied()
            .ok_or(MirError::UnknownVariable { name: dist })?;
        let rhs_ty = self.resolve_operand_type(&rhs)?;
        let ty = current.max(rhs_ty);
        self.var_types.insert(dist, ty);
        self.emit(InstKind::Assign3 {
            ty,
            dist,
            lhs: Operand::Identity(dist),
            op,
            rhs,
        });
        Ok(())
    }

    // ---- expressions ----------------------------------------------------

    fn lower_factor(&mut self, factor: &ast::Factor) -> Result<Operand> {
        match factor {
            ast::Factor::Identity(name) => Ok(Operand::Identity(*name)),
            ast::Factor::Literal(lit) => Ok(Operand::Literal(MirLiteral::from_ast(lit))),
            ast::Factor::MethodReturn(call) => {
                self.lower_call(call)?;
                Ok(Operand::LastRet(MirType::from_ast(&call.ret)))
            }
            ast::Factor::AddressOf(name) => Err(MirError::UnsupportedPointer {
                context: format!("&{name}"),
            }),
            ast::Factor::Deref(name) => Err(MirError::UnsupportedPointer {
                context: format!("*{name}"),
            }),
        }
    }

    /// Product chain: `t = f0; t = t*f1; ...` reusing one temporary.
    fn lower_arith_item(&mut self, item: &ast::ArithItem) -> Result<Operand> {
        let from = self.lower_factor(&item.first)?;
        let temp = self.alloc_temp();
        self.emit_assign2(temp, from)?;
        for (op, factor) in &item.rest {
            let rhs = self.lower_factor(factor)?;
            self.emit_assign3(temp, mul_op(*op), rhs)?;
        }
        Ok(Operand::Identity(temp))
    }

    /// Sum chain over item results: items lower first, then the chain
    /// wraps them in a fresh temporary.
    fn lower_arith_expr(&mut self, expr: &ast::ArithExpr) -> Result<Operand> {
        let first = self.lower_arith_item(&expr.first)?;
        let mut rest = Vec::with_capacity(expr.rest.len());
        for (op, item) in &expr.rest {
            rest.push((add_op(*op), self.lower_arith_item(item)?));
        }
        let temp = self.alloc_temp();
        self.emit_assign2(temp, first)?;
        for (op, value) in rest {
            self.emit_assign3(temp, op, value)?;
        }
        Ok(Operand::Identity(temp))
    }

    /// Lower an expression to an operand. Statement positions discard the
    /// operand; value positions consume it.
    fn lower_expression(&mut self, expr: &ast::Expr) -> Result<Operand> {
        match expr {
            ast::Expr::Assignment { target, value } => {
                let from = self.lower_expression(value)?;
                self.emit_assign2(*target, from)?;
                // `x = y = e` makes `y` the value of the inner expression
                Ok(Operand::Identity(*target))
            }
            ast::Expr::Arithmetic(arith) => self.lower_arith_expr(arith),
            ast::Expr::Pointer(ast::PointerExpr::AddressOf(name)) => {
                Err(MirError::UnsupportedPointer {
                    context: format!("&{name}"),
                })
            }
            ast::Expr::Pointer(ast::PointerExpr::Array(_)) => Err(MirError::UnsupportedPointer {
                context: "array literal".to_owned(),
            }),
        }
    }

    fn lower_call(&mut self, call: &ast::MethodCall) -> Result<()> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.lower_expression(arg)?);
        }
        self.emit(InstKind::Call {
            label: call.name,
            args,
        });
        // remembered after the arguments lower, so nested calls inside the
        // argument list cannot clobber it
        self.last_called = Some(call.name);
        Ok(())
    }

    // ---- booleans -------------------------------------------------------

    fn lower_bool_factor(
        &mut self,
        factor: &ast::BoolFactor,
        true_label: Symbol,
        false_label: Symbol,
    ) -> Result<()> {
        match factor {
            // `!f` swaps the targets
            ast::BoolFactor::Invert(inner) => {
                self.lower_bool_factor(inner, false_label, true_label)
            }
            ast::BoolFactor::Relation { lhs, op, rhs } => {
                let lhs = self.lower_arith_expr(lhs)?;
                let rhs = self.lower_arith_expr(rhs)?;
                self.emit(InstKind::Cmp {
                    lhs,
                    op: rel_op(*op),
                    rhs,
                    true_label,
                    false_label: Some(false_label),
                });
                Ok(())
            }
        }
    }

    /// AND chain: every factor but the last gets its own true label to
    /// fall through into the next factor; any failure exits to the outer
    /// false label.
    fn lower_bool_item(
        &mut self,
        item: &ast::BoolItem,
        true_label: Symbol,
        false_label: Symbol,
    ) -> Result<()> {
        let last = item.factors.len() - 1;
        for (i, factor) in item.factors.iter().enumerate() {
            if i < last {
                let step_label = self.alloc_label();
                self.lower_bool_factor(factor, step_label, false_label)?;
                self.emit(InstKind::Label(step_label));
            } else {
                self.lower_bool_factor(factor, true_label, false_label)?;
            }
        }
        Ok(())
    }

    /// OR chain: every item but the last gets its own false label to fall
    /// through into the next item; any success exits to the outer true
    /// label.
    fn lower_bool_expr(
        &mut self,
        expr: &ast::BoolExpr,
        true_label: Symbol,
        false_label: Symbol,
    ) -> Result<()> {
        let last = expr.items.len() - 1;
        for (i, item) in expr.items.iter().enumerate() {
            if i < last {
                let step_label = self.alloc_label();
                self.lower_bool_item(item, true_label, step_label)?;
                self.emit(InstKind::Label(step_label));
            } else {
                self.lower_bool_item(item, true_label, false_label)?;
            }
        }
        Ok(())
    }

    // ---- statements -----------------------------------------------------

    fn lower_statement(&mut self, stmt: &ast::Statement) -> Result<()> {
        match stmt {
            ast::Statement::Define(define) => {
                let from = self.lower_expression(&define.value)?;
                self.emit_assign2(define.name, from)
            }
            ast::Statement::Expression(expr) => {
                self.lower_expression(expr)?;
                Ok(())
            }
            ast::Statement::MethodCall(call) => self.lower_call(call),
            ast::Statement::Return(value) => {
                let value = match value {
                    Some(expr) => Some(self.lower_expression(expr)?),
                    None => None,
                };
                self.emit(InstKind::Ret { value });
                Ok(())
            }
            ast::Statement::If(if_stmt) => self.lower_if(if_stmt),
            ast::Statement::While(while_stmt) => self.lower_while(while_stmt),
            ast::Statement::For(for_stmt) => self.lower_for(for_stmt),
            ast::Statement::Block(block) => {
                for stmt in &block.statements {
                    self.lower_statement(stmt)?;
                }
                Ok(())
            }
        }
    }

    fn lower_if(&mut self, if_stmt: &ast::IfStatement) -> Result<()> {
        let true_label = self.alloc_label();
        let false_label = self.alloc_label();
        let end_label = self.alloc_label();

        self.lower_bool_expr(&if_stmt.condition, true_label, false_label)?;
        self.emit(InstKind::OptFlag(OptFlag::EnterBlock));

        self.emit(InstKind::Label(true_label));
        self.lower_statement(&if_stmt.then_branch)?;
        self.emit(InstKind::Jmp(end_label));

        self.emit(InstKind::Label(false_label));
        if let Some(else_branch) = &if_stmt.else_branch {
            self.lower_statement(else_branch)?;
        }
        self.emit(InstKind::Label(end_label));
        self.emit(InstKind::OptFlag(OptFlag::ExitBlock));
        Ok(())
    }

    fn lower_while(&mut self, while_stmt: &ast::WhileStatement) -> Result<()> {
        self.emit(InstKind::OptFlag(OptFlag::EnterLoop));
        let entry_label = self.alloc_label();
        self.emit(InstKind::Label(entry_label));

        let true_label = self.alloc_label();
        let false_label = self.alloc_label();
        self.lower_bool_expr(&while_stmt.condition, true_label, false_label)?;

        self.emit(InstKind::Label(true_label));
        self.lower_statement(&while_stmt.body)?;
        self.emit(InstKind::Jmp(entry_label));

        self.emit(InstKind::Label(false_label));
        self.emit(InstKind::OptFlag(OptFlag::ExitLoop));
        Ok(())
    }

    fn lower_for(&mut self, for_stmt: &ast::ForStatement) -> Result<()> {
        if let Some(init) = &for_stmt.init {
            self.lower_expression(init)?;
        }
        self.emit(InstKind::OptFlag(OptFlag::EnterLoop));

        let true_label = self.alloc_label();
        let false_label = self.alloc_label();
        let entry_label = self.alloc_label();
        self.emit(InstKind::Label(entry_label));
        self.lower_bool_expr(&for_stmt.condition, true_label, false_label)?;

        self.emit(InstKind::Label(true_label));
        self.lower_statement(&for_stmt.body)?;
        self.lower_expression(&for_stmt.step)?;
        self.emit(InstKind::Jmp(entry_label));

        self.emit(InstKind::Label(false_label));
        self.emit(InstKind::OptFlag(OptFlag::ExitLoop));
        Ok(())
    }

    // ---- methods --------------------------------------------------------

    /// Lower one method. Extern declarations register their return type
    /// and produce no body.
    fn lower_method(&mut self, method: &ast::MethodDef) -> Result<Option<MirMethod>> {
        self.method_types
            .insert(method.name, MirType::from_ast(&method.ret));

        let Some(body) = &method.body else {
            return Ok(None);
        };

        let mut params = Vec::with_capacity(method.params.len());
        for param in &method.params {
            let ty = MirType::from_ast(&param.ty);
            self.var_types.insert(param.name, ty);
            params.push(MirParam {
                name: param.name,
                ty,
            });
        }

        for stmt in &body.statements {
            self.lower_statement(stmt)?;
        }

        let code = std::mem::take(&mut self.code);
        self.code_line = 0;
        self.temp_index = 0;
        self.var_types.clear();
        self.last_called = None;
        Ok(Some(MirMethod {
            label: method.name,
            params,
            code,
        }))
    }
}

fn add_op(op: ast::AddOp) -> BinOp {
    match op {
        ast::AddOp::Add => BinOp::Add,
        ast::AddOp::Sub => BinOp::Sub,
    }
}

fn mul_op(op: ast::MulOp) -> BinOp {
    match op {
        ast::MulOp::Mul => BinOp::Mul,
        ast::MulOp::Div => BinOp::Div,
        ast::MulOp::Mod => BinOp::Mod,
    }
}

fn rel_op(op: ast::RelOp) -> CmpOp {
    match op {
        ast::RelOp::Eq => CmpOp::Eq,
        ast::RelOp::NotEq => CmpOp::Ne,
        ast::RelOp::Less => CmpOp::Lt,
        ast::RelOp::LessEq => CmpOp::Le,
        ast::RelOp::Greater => CmpOp::Gt,
        ast::RelOp::GreaterEq => CmpOp::Ge,
    }
}
