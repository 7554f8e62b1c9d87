//! MIR optimization: Mir2 folding.
//!
//! A conservative copy-propagation + dead-store pass. For every
//! `d = src` where `src` is a plain identity or literal (never a
//! last-return, never pointer-typed), the pass tries to substitute `src`
//! into every future read of `d` within the enclosing scope and, when at
//! least one read was rewritten, unlinks the original copy.
//!
//! Two fences keep it sound:
//!
//! 1. **Loop regions.** If anything writes `d` inside a loop region later
//!    in the method, folding would lose the iteration-carried value, so
//!    the copy is left alone.
//! 2. **Scope.** Substitution walks forward tracking block nesting and
//!    stops at the first rewrite of `d` (inclusive) or when the walk
//!    leaves the enclosing scope.
//!
//! The pass is idempotent: a second run finds nothing left to fold.

use pcc_util::Symbol;
use tracing::debug;

use crate::mir::{InstKind, Mir, MirInst, MirMethod, Operand, OptFlag};

/// Run the optimizer at the given level. Folding runs when `level > 0`.
pub fn optimize(mir: &mut Mir, level: i32) {
    if level <= 0 {
        return;
    }
    debug!(target: "opt", level, "optimizing");
    for method in &mut mir.methods {
        fold_copies(method);
    }
}

/// Fold copy/constant assignments into their future readers.
pub fn fold_copies(method: &mut MirMethod) {
    let mut i = 0;
    while i < method.code.len() {
        if let Some((dist, src)) = foldable_copy(&method.code[i]) {
            let rest = &mut method.code[i + 1..];
            if !written_inside_loop(rest, dist) && substitute(rest, dist, &src) {
                method.code.remove(i);
                continue;
            }
        }
        i += 1;
    }
}

/// `d = src` qualifies when `src` is an identity or literal and the
/// assignment is not pointer-typed. Last-return sources pin the value of
/// a specific call and must not move past other calls.
fn foldable_copy(inst: &MirInst) -> Option<(Symbol, Operand)> {
    match &inst.kind {
        InstKind::Assign2 { ty, dist, from }
            if !ty.is_pointer
                && matches!(from, Operand::Identity(_) | Operand::Literal(_)) =>
        {
            Some((*dist, from.clone()))
        }
        _ => None,
    }
}

/// Does any later instruction write `dist` while inside a loop region?
fn written_inside_loop(code: &[MirInst], dist: Symbol) -> bool {
    let mut depth = 0i32;
    for inst in code {
        match inst.kind {
            InstKind::OptFlag(OptFlag::EnterLoop) => depth += 1,
            InstKind::OptFlag(OptFlag::ExitLoop) => depth -= 1,
            _ => {
                if depth > 0 && inst.writes() == Some(dist) {
                    return true;
                }
            }
        }
    }
    false
}

/// Replace reads of `dist` with `src` until `dist` is rewritten or the
/// walk leaves the enclosing scope. Returns whether anything changed.
fn substitute(code: &mut [MirInst], dist: Symbol, src: &Operand) -> bool {
    let mut replaced = false;
    let mut level = 0i32;
    for inst in code {
        match &mut inst.kind {
            InstKind::OptFlag(OptFlag::EnterBlock | OptFlag::EnterLoop) => level += 1,
            InstKind::OptFlag(OptFlag::ExitBlock | OptFlag::ExitLoop) => {
                level -= 1;
                if level < 0 {
                    break;
                }
            }
            InstKind::Assign2 {
                from, dist: writes, ..
            } => {
                replaced |= replace_read(from, dist, src);
                if *writes == dist {
                    break;
                }
            }
            InstKind::Assign3 {
                lhs,
                rhs,
                dist: writes,
                ..
            } => {
                replaced |= replace_read(lhs, dist, src);
                replaced |= replace_read(rhs, dist, src);
                if *writes == dist {
                    break;
                }
            }
            InstKind::Cmp { lhs, rhs, .. } => {
                replaced |= replace_read(lhs, dist, src);
                replaced |= replace_read(rhs, dist, src);
            }
            InstKind::Ret { value } => {
                if let Some(value) = value {
                    replaced |= replace_read(value, dist, src);
                }
            }
            InstKind::Call { args, .. } => {
                for arg in args {
                    replaced |= replace_read(arg, dist, src);
                }
            }
            InstKind::Label(_) | InstKind::Jmp(_) => {}
        }
    }
    replaced
}

fn replace_read(operand: &mut Operand, dist: Symbol, src: &Operand) -> bool {
    if operand.is_identity(dist) {
        *operand = src.clone();
        true
    } else {
        false
    }
}
