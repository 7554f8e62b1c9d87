//! MIR: a linear three-address representation, one instruction list per
//! method.
//!
//! Instructions carry a monotonically increasing code line assigned at
//! emission; the register allocator's next-use analysis and the total
//! ordering guarantee both hang off it. Operands name variables and
//! temporaries by interned symbol: identity of a value IS its name.

use std::fmt;

use pcc_par::ast;
use pcc_util::Symbol;

/// Scalar value types, ordered by widening rank.
///
/// The discriminant is the rank: integers widen upward, floats sit above
/// every integer, so a mixed int/float operation resolves to the float
/// side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scalar {
    Void = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    I64 = 4,
    F32 = 5,
    F64 = 6,
}

impl Scalar {
    /// Width in bytes for register/stack purposes (sub-word integers are
    /// handled in 32-bit registers).
    pub fn width(self) -> u32 {
        match self {
            Scalar::Void => 0,
            Scalar::I8 | Scalar::I16 | Scalar::I32 | Scalar::F32 => 4,
            Scalar::I64 | Scalar::F64 => 8,
        }
    }

    /// Semantic size in bytes.
    pub fn semantic_size(self) -> u32 {
        match self {
            Scalar::Void => 0,
            Scalar::I8 => 1,
            Scalar::I16 => 2,
            Scalar::I32 | Scalar::F32 => 4,
            Scalar::I64 | Scalar::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Scalar::F32 | Scalar::F64)
    }
}

/// A scalar plus pointer-ness. Pointers are always 8 bytes and rank above
/// every scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirType {
    pub scalar: Scalar,
    pub is_pointer: bool,
}

impl MirType {
    pub fn scalar(scalar: Scalar) -> Self {
        MirType {
            scalar,
            is_pointer: false,
        }
    }

    pub fn from_ast(ty: &ast::AstType) -> Self {
        let scalar = match ty.primitive {
            ast::Primitive::Void => Scalar::Void,
            ast::Primitive::Char => Scalar::I8,
            ast::Primitive::Short => Scalar::I16,
            ast::Primitive::Int => Scalar::I32,
            ast::Primitive::Long => Scalar::I64,
            ast::Primitive::Float => Scalar::F32,
            ast::Primitive::Double => Scalar::F64,
        };
        MirType {
            scalar,
            is_pointer: ty.is_pointer,
        }
    }

    pub fn rank(self) -> u8 {
        if self.is_pointer {
            7
        } else {
            self.scalar as u8
        }
    }

    /// The wider of two types by rank.
    pub fn max(self, other: MirType) -> MirType {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }

    pub fn width(self) -> u32 {
        if self.is_pointer {
            8
        } else {
            self.scalar.width()
        }
    }
}

impl fmt::Display for MirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.scalar)?;
        if self.is_pointer {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// A typed literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MirLiteral {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl MirLiteral {
    pub fn from_ast(lit: &ast::Literal) -> Self {
        match *lit {
            ast::Literal::Char(v) => MirLiteral::I8(v),
            ast::Literal::Short(v) => MirLiteral::I16(v),
            ast::Literal::Int(v) => MirLiteral::I32(v),
            ast::Literal::Long(v) => MirLiteral::I64(v),
            ast::Literal::Float(v) => MirLiteral::F32(v),
            ast::Literal::Double(v) => MirLiteral::F64(v),
        }
    }

    pub fn ty(self) -> MirType {
        MirType::scalar(match self {
            MirLiteral::I8(_) => Scalar::I8,
            MirLiteral::I16(_) => Scalar::I16,
            MirLiteral::I32(_) => Scalar::I32,
            MirLiteral::I64(_) => Scalar::I64,
            MirLiteral::F32(_) => Scalar::F32,
            MirLiteral::F64(_) => Scalar::F64,
        })
    }

    /// Integer value, if this is an integer literal.
    pub fn as_int(self) -> Option<i64> {
        match self {
            MirLiteral::I8(v) => Some(v as i64),
            MirLiteral::I16(v) => Some(v as i64),
            MirLiteral::I32(v) => Some(v as i64),
            MirLiteral::I64(v) => Some(v),
            MirLiteral::F32(_) | MirLiteral::F64(_) => None,
        }
    }
}

impl fmt::Display for MirLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirLiteral::I8(v) => write!(f, "{v}"),
            MirLiteral::I16(v) => write!(f, "{v}"),
            MirLiteral::I32(v) => write!(f, "{v}"),
            MirLiteral::I64(v) => write!(f, "{v}"),
            MirLiteral::F32(v) => write!(f, "{v}"),
            MirLiteral::F64(v) => write!(f, "{v}"),
        }
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A named variable or temporary.
    Identity(Symbol),
    /// The implicit return value of the most recent call, with its
    /// remembered type.
    LastRet(MirType),
    Literal(MirLiteral),
    Void,
}

impl Operand {
    pub fn as_identity(&self) -> Option<Symbol> {
        match self {
            Operand::Identity(name) => Some(*name),
            _ => None,
        }
    }

    pub fn is_identity(&self, name: Symbol) -> bool {
        matches!(self, Operand::Identity(n) if *n == name)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Identity(name) => write!(f, "{name}"),
            Operand::LastRet(_) => write!(f, "[last ret]"),
            Operand::Literal(lit) => write!(f, "{lit}"),
            Operand::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        })
    }
}

/// Scope hints consumed by the optimizer and the register allocator;
/// never encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptFlag {
    EnterBlock,
    ExitBlock,
    EnterLoop,
    ExitLoop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// `dist = from`
    Assign2 {
        ty: MirType,
        dist: Symbol,
        from: Operand,
    },
    /// `dist = lhs op rhs`
    Assign3 {
        ty: MirType,
        dist: Symbol,
        lhs: Operand,
        op: BinOp,
        rhs: Operand,
    },
    /// `lhs op rhs ? true_label : false_label`; a missing false label
    /// falls through.
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
        true_label: Symbol,
        false_label: Option<Symbol>,
    },
    Call {
        label: Symbol,
        args: Vec<Operand>,
    },
    Ret {
        value: Option<Operand>,
    },
    Label(Symbol),
    Jmp(Symbol),
    OptFlag(OptFlag),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirInst {
    /// Emission index; strictly increasing within a method.
    pub code_line: u32,
    pub kind: InstKind,
}

impl MirInst {
    /// The identifier this instruction writes, if any.
    pub fn writes(&self) -> Option<Symbol> {
        match &self.kind {
            InstKind::Assign2 { dist, .. } | InstKind::Assign3 { dist, .. } => Some(*dist),
            _ => None,
        }
    }

    /// True when the instruction reads or writes `name` in any operand
    /// position. Feeds the next-use analysis.
    pub fn mentions(&self, name: Symbol) -> bool {
        match &self.kind {
            InstKind::Assign2 { dist, from, .. } => *dist == name || from.is_identity(name),
            InstKind::Assign3 { dist, lhs, rhs, .. } => {
                *dist == name || lhs.is_identity(name) || rhs.is_identity(name)
            }
            InstKind::Cmp { lhs, rhs, .. } => lhs.is_identity(name) || rhs.is_identity(name),
            InstKind::Call { args, .. } => args.iter().any(|a| a.is_identity(name)),
            InstKind::Ret { value } => value.as_ref().is_some_and(|v| v.is_identity(name)),
            InstKind::Label(_) | InstKind::Jmp(_) | InstKind::OptFlag(_) => false,
        }
    }
}

impl fmt::Display for MirInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstKind::Assign2 { ty, dist, from } => write!(f, "{dist} = {from} ({ty})"),
            InstKind::Assign3 {
                ty,
                dist,
                lhs,
                op,
                rhs,
            } => write!(f, "{dist} = {lhs} {op} {rhs} ({ty})"),
            InstKind::Cmp {
                lhs,
                op,
                rhs,
                true_label,
                false_label,
            } => {
                write!(f, "cmp: {lhs} {op} {rhs} ? {true_label} : ")?;
                match false_label {
                    Some(label) => write!(f, "{label}"),
                    None => write!(f, "nop"),
                }
            }
            InstKind::Call { label, args } => {
                write!(f, "call: {label}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            InstKind::Ret { value } => match value {
                Some(value) => write!(f, "ret: {value}"),
                None => write!(f, "ret"),
            },
            InstKind::Label(label) => write!(f, "label: {label}"),
            InstKind::Jmp(label) => write!(f, "jmp: {label}"),
            InstKind::OptFlag(flag) => write!(f, ".opt {flag:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MirParam {
    pub name: Symbol,
    pub ty: MirType,
}

impl MirParam {
    /// Stack/register footprint of this parameter.
    pub fn byte(&self) -> u32 {
        if self.ty.is_pointer {
            8
        } else {
            self.ty.scalar.semantic_size()
        }
    }
}

/// One method's MIR. Methods are independent: no register or temporary
/// state crosses this boundary.
#[derive(Debug, Clone)]
pub struct MirMethod {
    pub label: Symbol,
    pub params: Vec<MirParam>,
    pub code: Vec<MirInst>,
}

/// A whole program's MIR plus the method-return-type table, which lives
/// for the entire compilation.
#[derive(Debug, Clone)]
pub struct Mir {
    pub methods: Vec<MirMethod>,
    pub method_types: indexmap::IndexMap<Symbol, MirType>,
}
