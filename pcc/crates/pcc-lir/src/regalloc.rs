//! The register residency map.
//!
//! `owners[i]` names the identifier currently cached in allocatable
//! register `i`; values also always live in their stack slots, so
//! eviction is free: the evicted owner simply reloads on next use.
//!
//! Allocation hands out fresh registers until the file is full, then
//! evicts the owner whose next use is farthest in the future (absent
//! counts as infinitely far), an offline policy the linear MIR list makes
//! exact. A per-instruction "atomic" set protects registers materialized
//! for the current MIR instruction from being evicted by it.

use pcc_util::Symbol;

use crate::error::CodeGenError;
use crate::regs::COMMON_REG_SIZE;
use pcc_mir::MirInst;

pub struct RegisterFile {
    owners: [Option<Symbol>; COMMON_REG_SIZE],
    /// Registers pinned for the MIR instruction being lowered.
    in_use: Vec<usize>,
    /// Registers handed out so far this method.
    used: usize,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            owners: [None; COMMON_REG_SIZE],
            in_use: Vec::new(),
            used: 0,
        }
    }

    /// Forget every residency; used at method entry, after calls, and at
    /// loop boundaries.
    pub fn clear(&mut self) {
        self.owners = [None; COMMON_REG_SIZE];
        self.used = 0;
    }

    /// Reset the atomic set; called once per MIR instruction.
    pub fn begin_instruction(&mut self) {
        self.in_use.clear();
    }

    /// Allocator index currently holding `name`.
    pub fn lookup(&self, name: Symbol) -> Option<usize> {
        self.owners.iter().position(|o| *o == Some(name))
    }

    pub fn set_owner(&mut self, index: usize, name: Symbol) {
        self.owners[index] = Some(name);
    }

    /// Pin a register against eviction for the current instruction.
    pub fn pin(&mut self, index: usize) {
        if !self.in_use.contains(&index) {
            self.in_use.push(index);
        }
    }

    /// Allocate a register: the next untouched one if any remain,
    /// otherwise the non-pinned register whose owner has the farthest
    /// next use in `rest` (the MIR from the current instruction onward).
    pub fn alloc(&mut self, rest: &[MirInst]) -> Result<usize, CodeGenError> {
        while self.used < COMMON_REG_SIZE {
            let index = self.used;
            self.used += 1;
            // a fresh register can still be pinned: argument registers
            // are claimed positionally before their values materialize
            if self.in_use.contains(&index) {
                continue;
            }
            self.pin(index);
            return Ok(index);
        }
        let mut best = None;
        let mut farthest: i64 = -1;
        for index in 0..COMMON_REG_SIZE {
            if self.in_use.contains(&index) {
                continue;
            }
            let line = next_use_line(rest, self.owners[index]);
            if line > farthest {
                farthest = line;
                best = Some(index);
            }
            if line == i64::MAX {
                break;
            }
        }
        let index = best.ok_or(CodeGenError::NoRegisterAvailable)?;
        self.pin(index);
        Ok(index)
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Code line of the next instruction mentioning `owner`, or `i64::MAX`
/// when the register is free or its owner is never touched again.
fn next_use_line(rest: &[MirInst], owner: Option<Symbol>) -> i64 {
    let Some(name) = owner else {
        return i64::MAX;
    };
    rest.iter()
        .find(|inst| inst.mentions(name))
        .map(|inst| inst.code_line as i64)
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcc_mir::{InstKind, MirLiteral, MirType, Operand, Scalar};

    fn use_of(name: Symbol, code_line: u32) -> MirInst {
        MirInst {
            code_line,
            kind: InstKind::Ret {
                value: Some(Operand::Identity(name)),
            },
        }
    }

    #[test]
    fn fresh_registers_come_first() {
        let mut regs = RegisterFile::new();
        for expected in 0..COMMON_REG_SIZE {
            assert_eq!(regs.alloc(&[]).unwrap(), expected);
        }
    }

    #[test]
    fn lookup_finds_owner() {
        let mut regs = RegisterFile::new();
        let name = Symbol::intern("ra_v");
        let index = regs.alloc(&[]).unwrap();
        regs.set_owner(index, name);
        assert_eq!(regs.lookup(name), Some(index));
        regs.clear();
        assert_eq!(regs.lookup(name), None);
    }

    /// Invariant 10: the victim's next use is the farthest among
    /// non-pinned owners.
    #[test]
    fn eviction_picks_farthest_next_use() {
        let mut regs = RegisterFile::new();
        let names: Vec<Symbol> = (0..COMMON_REG_SIZE)
            .map(|i| Symbol::intern(&format!("ra_far_{i}")))
            .collect();
        for name in &names {
            let index = regs.alloc(&[]).unwrap();
            regs.set_owner(index, *name);
        }
        // owner of register i is next used at line 100 - i: register 14
        // has the farthest use
        let rest: Vec<MirInst> = (0..COMMON_REG_SIZE)
            .map(|i| use_of(names[i], 100 - i as u32))
            .collect();
        regs.begin_instruction();
        assert_eq!(regs.alloc(&rest).unwrap(), COMMON_REG_SIZE - 1);
    }

    #[test]
    fn owner_never_used_again_wins_eviction() {
        let mut regs = RegisterFile::new();
        let names: Vec<Symbol> = (0..COMMON_REG_SIZE)
            .map(|i| Symbol::intern(&format!("ra_dead_{i}")))
            .collect();
        for name in &names {
            let index = regs.alloc(&[]).unwrap();
            regs.set_owner(index, *name);
        }
        // every owner except names[3] is used again soon
        let rest: Vec<MirInst> = (0..COMMON_REG_SIZE)
            .filter(|i| *i != 3)
            .map(|i| use_of(names[i], i as u32))
            .collect();
        regs.begin_instruction();
        assert_eq!(regs.alloc(&rest).unwrap(), 3);
    }

    #[test]
    fn pinned_registers_are_not_evicted() {
        let mut regs = RegisterFile::new();
        let names: Vec<Symbol> = (0..COMMON_REG_SIZE)
            .map(|i| Symbol::intern(&format!("ra_pin_{i}")))
            .collect();
        for name in &names {
            let index = regs.alloc(&[]).unwrap();
            regs.set_owner(index, *name);
        }
        regs.begin_instruction();
        // names[7] is the farthest-used owner but its register is pinned
        let mut rest: Vec<MirInst> = (0..COMMON_REG_SIZE)
            .map(|i| use_of(names[i], i as u32))
            .collect();
        rest[7] = use_of(names[7], 1000);
        regs.pin(7);
        let victim = regs.alloc(&rest).unwrap();
        assert_ne!(victim, 7);
    }

    #[test]
    fn mentions_counts_writes_too() {
        // next-use analysis looks for any read *or* write
        let name = Symbol::intern("ra_w");
        let write = MirInst {
            code_line: 5,
            kind: InstKind::Assign2 {
                ty: MirType::scalar(Scalar::I32),
                dist: name,
                from: Operand::Literal(MirLiteral::I32(0)),
            },
        };
        assert_eq!(next_use_line(&[write], Some(name)), 5);
    }
}
