//! The instruction buffer and the two-pass relocator.
//!
//! Pass 1 ([`assemble`]) walks the typed instruction list: labels record
//! their word index, non-branches encode to final words immediately, and
//! branches park a relocation record in their slot. Pass 2
//! ([`CodeBuffer::relocate`]) resolves every record against the label
//! table: `offset = base + (label_index - this_index) * 4`, each
//! instruction being 4 bytes. After pass 2 the buffer holds nothing but
//! resolved words.

use indexmap::IndexMap;
use pcc_util::Symbol;
use tracing::debug;

use crate::encode;
use crate::error::{EncodeError, Result};
use pcc_lir::{Cond, Inst};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchKind {
    B,
    Bl,
    Bc(Cond),
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Word(u32),
    Branch { kind: BranchKind, target: Symbol },
}

/// Encoded text section under construction.
pub struct CodeBuffer {
    slots: Vec<Slot>,
    /// label -> word index, in definition order.
    labels: IndexMap<Symbol, usize>,
}

/// Pass 1: encode an instruction list into a buffer with branch
/// placeholders.
pub fn assemble(insts: &[Inst]) -> Result<CodeBuffer> {
    let mut buffer = CodeBuffer {
        slots: Vec::with_capacity(insts.len()),
        labels: IndexMap::new(),
    };
    for inst in insts {
        buffer.push(inst)?;
    }
    debug!(target: "encode", words = buffer.slots.len(), labels = buffer.labels.len(), "pass 1 done");
    Ok(buffer)
}

impl CodeBuffer {
    fn push(&mut self, inst: &Inst) -> Result<()> {
        match inst {
            Inst::Label(name) => {
                if self.labels.insert(*name, self.slots.len()).is_some() {
                    return Err(EncodeError::DuplicateLabel { label: *name });
                }
            }
            Inst::B { target } => self.push_branch(BranchKind::B, *target),
            Inst::Bl { target } => self.push_branch(BranchKind::Bl, *target),
            Inst::Bc { cond, target } => self.push_branch(BranchKind::Bc(*cond), *target),
            other => {
                for word in encode_words(other)? {
                    self.slots.push(Slot::Word(word));
                }
            }
        }
        Ok(())
    }

    fn push_branch(&mut self, kind: BranchKind, target: Symbol) {
        self.slots.push(Slot::Branch { kind, target });
    }

    /// Pass 2: resolve every branch placeholder against the label table.
    pub fn relocate(&mut self, base: i32) -> Result<()> {
        for index in 0..self.slots.len() {
            let Slot::Branch { kind, target } = self.slots[index] else {
                continue;
            };
            let label_index = *self
                .labels
                .get(&target)
                .ok_or(EncodeError::UnknownLabel { label: target })?;
            let offset = base as i64 + (label_index as i64 - index as i64) * 4;
            let word = match kind {
                BranchKind::B => encode::b(offset),
                BranchKind::Bl => encode::bl(offset),
                BranchKind::Bc(cond) => encode::bcond(cond.code(), offset),
            }
            .ok_or(EncodeError::BranchOutOfRange {
                label: target,
                offset,
            })?;
            self.slots[index] = Slot::Word(word);
        }
        debug!(target: "encode", "pass 2 done");
        Ok(())
    }

    /// Finished words; errors if any placeholder survived relocation.
    pub fn words(&self) -> Result<Vec<u32>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Word(word) => Ok(*word),
                Slot::Branch { .. } => Err(EncodeError::UnresolvedRelocation { index }),
            })
            .collect()
    }

    /// Little-endian byte stream of the finished words.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        Ok(self
            .words()?
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect())
    }

    /// Byte offset of each label, in definition order.
    pub fn symbol_offsets(&self) -> Vec<(Symbol, u32)> {
        self.labels
            .iter()
            .map(|(name, index)| (*name, *index as u32 * 4))
            .collect()
    }

    pub fn word_count(&self) -> usize {
        self.slots.len()
    }
}

/// Encode one non-branch instruction into its word(s).
fn encode_words(inst: &Inst) -> Result<Vec<u32>> {
    Ok(match *inst {
        Inst::MovImm { sf, rd, imm } => encode::mov_imm(sf, rd, imm),
        Inst::MovReg { sf, rd, rm } => vec![encode::mov_reg(sf, rd, rm)],
        Inst::CmpImm { sf, rn, imm } => vec![encode::cmp_imm(sf, rn, imm)?],
        Inst::CmpReg { sf, rn, rm } => vec![encode::cmp_reg(sf, rn, rm)],
        Inst::AddImm { sf, rd, rn, imm } => vec![encode::add_imm(sf, rd, rn, imm)?],
        Inst::AddReg { sf, rd, rn, rm } => vec![encode::add_reg(sf, rd, rn, rm)],
        Inst::SubImm { sf, rd, rn, imm } => vec![encode::sub_imm(sf, rd, rn, imm)?],
        Inst::SubReg { sf, rd, rn, rm } => vec![encode::sub_reg(sf, rd, rn, rm)],
        Inst::Mul { sf, rd, rn, rm } => vec![encode::mul(sf, rd, rn, rm)],
        Inst::Sdiv { sf, rd, rn, rm } => vec![encode::sdiv(sf, rd, rn, rm)],
        Inst::Msub { sf, rd, rn, rm, ra } => vec![encode::msub(sf, rd, rn, rm, ra)],
        Inst::Ldr { sf, rt, base, offset } => encode::ldr(sf, rt, base, offset),
        Inst::Str { sf, rt, base, offset } => encode::str(sf, rt, base, offset),
        Inst::Ldp { sf, rt, rt2, base, offset } => encode::ldp(sf, rt, rt2, base, offset)?,
        Inst::Stp { sf, rt, rt2, base, offset } => encode::stp(sf, rt, rt2, base, offset)?,
        Inst::Ret => vec![encode::RET],
        Inst::Svc { imm } => vec![encode::svc(imm)],
        Inst::Label(_) | Inst::B { .. } | Inst::Bc { .. } | Inst::Bl { .. } => {
            unreachable!("labels and branches are handled by the buffer")
        }
    })
}
