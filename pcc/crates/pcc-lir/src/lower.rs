//! MIR to AArch64 lowering.
//!
//! One pass over a method's MIR, emitting typed instructions. Register
//! width per instruction follows the widest operand involved: 32-bit
//! forms when everything fits in 4 bytes, 64-bit otherwise.
//!
//! Every assignment writes its result back to the destination's stack
//! slot immediately, so registers are a pure cache over the frame. That
//! is what makes the cheap residency discipline sound: clearing the map
//! at calls (callee trashes everything) and at loop boundaries (values
//! flow through the stack across iterations) can never lose data.

use tracing::debug;

use crate::error::{CodeGenError, Result};
use crate::frame::{align_block_size, compute_stack_size, StackFrame, BLOCK_64};
use crate::lir::{Cond, Inst};
use crate::regalloc::RegisterFile;
use crate::regs::{COMMON_REGS, FP, LR, SCRATCH, SP, XZR};
use pcc_mir::{BinOp, CmpOp, InstKind, MirInst, MirLiteral, MirMethod, Operand};
use pcc_util::Symbol;

/// Lower one method, appending to `out`.
pub fn lower_method(method: &MirMethod, out: &mut Vec<Inst>) -> Result<()> {
    debug!(target: "arm64", method = %method.label, "lowering method");
    MethodLowerer::new(method, out).run()
}

struct MethodLowerer<'a> {
    method: &'a MirMethod,
    out: &'a mut Vec<Inst>,
    regs: RegisterFile,
    frame: StackFrame,
}

/// Right-hand side of a three-operand op: register or inline immediate.
enum Rhs {
    Reg(usize),
    Imm(i64),
}

impl<'a> MethodLowerer<'a> {
    fn new(method: &'a MirMethod, out: &'a mut Vec<Inst>) -> Self {
        let frame = StackFrame::new(compute_stack_size(method));
        MethodLowerer {
            method,
            out,
            regs: RegisterFile::new(),
            frame,
        }
    }

    fn run(&mut self) -> Result<()> {
        self.out.push(Inst::Label(self.method.label));
        let aligned = self.frame.aligned_size() as i64;
        let total = self.frame.total_size() as i64;

        // prologue: claim the frame, park fp/lr above the slot area
        self.out.push(Inst::SubImm {
            sf: true,
            rd: SP,
            rn: SP,
            imm: total,
        });
        self.out.push(Inst::Stp {
            sf: true,
            rt: FP,
            rt2: LR,
            base: SP,
            offset: aligned as i32,
        });
        self.out.push(Inst::AddImm {
            sf: true,
            rd: FP,
            rn: SP,
            imm: aligned,
        });

        self.store_params()?;

        for index in 0..self.method.code.len() {
            self.lower_inst(index)?;
        }

        // epilogue
        self.out.push(Inst::Ldp {
            sf: true,
            rt: FP,
            rt2: LR,
            base: SP,
            offset: aligned as i32,
        });
        self.out.push(Inst::AddImm {
            sf: true,
            rd: SP,
            rn: SP,
            imm: total,
        });
        self.out.push(Inst::Ret);
        Ok(())
    }

    /// Spill incoming arguments from x0..x7 into their slots.
    fn store_params(&mut self) -> Result<()> {
        if self.method.params.len() > COMMON_REGS.len().min(8) {
            return Err(CodeGenError::TooManyArguments {
                method: self.method.label,
                count: self.method.params.len(),
            });
        }
        for (index, param) in self.method.params.iter().enumerate() {
            let offset = self.frame.alloc_var(param.name, param.byte())?;
            self.out.push(Inst::Str {
                sf: align_block_size(param.byte()) == BLOCK_64,
                rt: COMMON_REGS[index],
                base: SP,
                offset,
            });
        }
        Ok(())
    }

    fn lower_inst(&mut self, index: usize) -> Result<()> {
        // the atomic set protects registers materialized for this one
        // MIR instruction
        self.regs.begin_instruction();
        let rest = &self.method.code[index..];
        let inst = &self.method.code[index];
        match &inst.kind {
            InstKind::Assign2 { ty, dist, from } => {
                let dist_reg = match self.regs.lookup(*dist) {
                    Some(reg) => reg,
                    None => self.regs.alloc(rest)?,
                };
                let width = ty.width().max(self.operand_size(from)?);
                let sf = width == BLOCK_64;
                match from {
                    Operand::Identity(name) => match self.regs.lookup(*name) {
                        Some(from_reg) => self.out.push(Inst::MovReg {
                            sf,
                            rd: COMMON_REGS[dist_reg],
                            rm: COMMON_REGS[from_reg],
                        }),
                        None => {
                            let offset = self
                                .frame
                                .offset_of(*name)
                                .ok_or(CodeGenError::VarNotOnStack { name: *name })?;
                            self.out.push(Inst::Ldr {
                                sf,
                                rt: COMMON_REGS[dist_reg],
                                base: SP,
                                offset,
                            });
                        }
                    },
                    // the last return value lives in x0
                    Operand::LastRet(_) => self.out.push(Inst::MovReg {
                        sf,
                        rd: COMMON_REGS[dist_reg],
                        rm: 0,
                    }),
                    Operand::Literal(lit) => {
                        let imm = self.literal_imm(lit)?;
                        self.out.push(Inst::MovImm {
                            sf,
                            rd: COMMON_REGS[dist_reg],
                            imm,
                        });
                    }
                    Operand::Void => {
                        return Err(CodeGenError::VoidOperand {
                            context: "assignment",
                        })
                    }
                }
                self.regs.set_owner(dist_reg, *dist);
                self.store_dist(*dist, ty.width(), sf, COMMON_REGS[dist_reg])?;
            }

            InstKind::Assign3 {
                ty,
                dist,
                lhs,
                op,
                rhs,
            } => {
                let width = ty
                    .width()
                    .max(self.operand_size(lhs)?)
                    .max(self.operand_size(rhs)?);
                let sf = width == BLOCK_64;

                let lhs_reg = self.value_into_reg(lhs, sf, rest, "$lhs")?;
                let rhs_val = match rhs {
                    Operand::Identity(_) | Operand::LastRet(_) => {
                        Rhs::Reg(self.value_into_reg(rhs, sf, rest, "$rhs")?)
                    }
                    Operand::Literal(lit) => {
                        let imm = self.literal_imm(lit)?;
                        // add/sub take a 12-bit unsigned immediate inline;
                        // everything else goes through a register
                        if matches!(op, BinOp::Add | BinOp::Sub) && (0..=0xFFF).contains(&imm) {
                            Rhs::Imm(imm)
                        } else {
                            let reg = self.regs.alloc(rest)?;
                            self.out.push(Inst::MovImm {
                                sf,
                                rd: COMMON_REGS[reg],
                                imm,
                            });
                            self.regs.set_owner(reg, Symbol::intern("$rhs"));
                            Rhs::Reg(reg)
                        }
                    }
                    Operand::Void => {
                        return Err(CodeGenError::VoidOperand {
                            context: "arithmetic",
                        })
                    }
                };

                // reuse the left register unless the destination already
                // lives somewhere
                let dist_reg = self.regs.lookup(*dist).unwrap_or(lhs_reg);
                self.regs.pin(dist_reg);
                let rd = COMMON_REGS[dist_reg];
                let rn = COMMON_REGS[lhs_reg];
                match (op, &rhs_val) {
                    (BinOp::Add, Rhs::Imm(imm)) => {
                        self.out.push(Inst::AddImm { sf, rd, rn, imm: *imm })
                    }
                    (BinOp::Add, Rhs::Reg(reg)) => self.out.push(Inst::AddReg {
                        sf,
                        rd,
                        rn,
                        rm: COMMON_REGS[*reg],
                    }),
                    (BinOp::Sub, Rhs::Imm(imm)) => {
                        self.out.push(Inst::SubImm { sf, rd, rn, imm: *imm })
                    }
                    (BinOp::Sub, Rhs::Reg(reg)) => self.out.push(Inst::SubReg {
                        sf,
                        rd,
                        rn,
                        rm: COMMON_REGS[*reg],
                    }),
                    (BinOp::Mul, Rhs::Reg(reg)) => self.out.push(Inst::Mul {
                        sf,
                        rd,
                        rn,
                        rm: COMMON_REGS[*reg],
                    }),
                    (BinOp::Div, Rhs::Reg(reg)) => self.out.push(Inst::Sdiv {
                        sf,
                        rd,
                        rn,
                        rm: COMMON_REGS[*reg],
                    }),
                    // a % b: quotient into the scratch register, then
                    // msub folds it back: rd = a - (a/b)*b
                    (BinOp::Mod, Rhs::Reg(reg)) => {
                        let rm = COMMON_REGS[*reg];
                        self.out.push(Inst::Sdiv {
                            sf,
                            rd: SCRATCH,
                            rn,
                            rm,
                        });
                        self.out.push(Inst::Msub {
                            sf,
                            rd,
                            rn: SCRATCH,
                            rm,
                            ra: rn,
                        });
                    }
                    (BinOp::Mul | BinOp::Div | BinOp::Mod, Rhs::Imm(_)) => {
                        unreachable!("immediate operands are register-materialized for mul/div/mod")
                    }
                }
                self.regs.set_owner(dist_reg, *dist);
                self.store_dist(*dist, ty.width(), sf, rd)?;
            }

            InstKind::Cmp {
                lhs,
                op,
                rhs,
                true_label,
                false_label,
            } => {
                let width = self.operand_size(lhs)?.max(self.operand_size(rhs)?);
                let sf = width == BLOCK_64;
                let lhs_reg = self.value_into_reg(lhs, sf, rest, "$cmp_lhs")?;
                match rhs {
                    Operand::Identity(_) | Operand::LastRet(_) => {
                        let rhs_reg = self.value_into_reg(rhs, sf, rest, "$cmp_rhs")?;
                        self.out.push(Inst::CmpReg {
                            sf,
                            rn: COMMON_REGS[lhs_reg],
                            rm: COMMON_REGS[rhs_reg],
                        });
                    }
                    Operand::Literal(lit) => {
                        let imm = self.literal_imm(lit)?;
                        self.out.push(Inst::CmpImm {
                            sf,
                            rn: COMMON_REGS[lhs_reg],
                            imm,
                        });
                    }
                    Operand::Void => {
                        return Err(CodeGenError::VoidOperand {
                            context: "comparison",
                        })
                    }
                }
                self.out.push(Inst::Bc {
                    cond: cond_of(*op),
                    target: *true_label,
                });
                if let Some(false_label) = false_label {
                    self.out.push(Inst::B {
                        target: *false_label,
                    });
                }
            }

            InstKind::Call { label, args } => {
                if args.len() > 8 {
                    return Err(CodeGenError::TooManyArguments {
                        method: *label,
                        count: args.len(),
                    });
                }
                for (i, arg) in args.iter().enumerate() {
                    let width = self.operand_size(arg)?;
                    let sf = width == BLOCK_64;
                    // positional argument register i; for i < 8 the
                    // allocator index and machine register coincide
                    match arg {
                        Operand::Identity(name) => {
                            let value_reg = self.load_var(*name, rest)?;
                            self.regs.set_owner(i, *name);
                            self.regs.pin(i);
                            self.out.push(Inst::MovReg {
                                sf,
                                rd: i as u8,
                                rm: COMMON_REGS[value_reg],
                            });
                        }
                        Operand::LastRet(_) => {
                            self.regs.set_owner(i, Symbol::intern("$last_ret"));
                            self.regs.pin(i);
                            self.out.push(Inst::MovReg {
                                sf,
                                rd: i as u8,
                                rm: 0,
                            });
                        }
                        Operand::Literal(lit) => {
                            let imm = self.literal_imm(lit)?;
                            self.regs.set_owner(i, Symbol::intern("$arg"));
                            self.regs.pin(i);
                            self.out.push(Inst::MovImm {
                                sf,
                                rd: i as u8,
                                imm,
                            });
                        }
                        Operand::Void => {
                            return Err(CodeGenError::VoidOperand { context: "call" })
                        }
                    }
                }
                self.out.push(Inst::Bl { target: *label });
                // the callee-trashed contract treats every allocatable
                // register as clobbered
                self.regs.clear();
            }

            InstKind::Ret { value } => {
                match value {
                    None => self.out.push(Inst::MovReg {
                        sf: true,
                        rd: 0,
                        rm: XZR,
                    }),
                    Some(Operand::Identity(name)) => {
                        let value_reg = self.load_var(*name, rest)?;
                        let sf = self.frame.size_of(*name).unwrap_or(BLOCK_64) == BLOCK_64;
                        self.out.push(Inst::MovReg {
                            sf,
                            rd: 0,
                            rm: COMMON_REGS[value_reg],
                        });
                    }
                    // already in x0
                    Some(Operand::LastRet(_)) => {}
                    Some(Operand::Literal(lit)) => {
                        let imm = self.literal_imm(lit)?;
                        self.out.push(Inst::MovImm {
                            sf: true,
                            rd: 0,
                            imm,
                        });
                    }
                    Some(Operand::Void) => {
                        return Err(CodeGenError::VoidOperand { context: "return" })
                    }
                }
                self.regs.set_owner(0, Symbol::intern("$last_ret"));
            }

            InstKind::Label(name) => self.out.push(Inst::Label(*name)),

            InstKind::Jmp(target) => self.out.push(Inst::B { target: *target }),

            // loop edges force every live value through the stack
            InstKind::OptFlag(flag) => match flag {
                pcc_mir::OptFlag::EnterLoop | pcc_mir::OptFlag::ExitLoop => self.regs.clear(),
                pcc_mir::OptFlag::EnterBlock | pcc_mir::OptFlag::ExitBlock => {}
            },
        }
        Ok(())
    }

    /// Make a value operand resident and return its allocator index.
    fn value_into_reg(
        &mut self,
        operand: &Operand,
        sf: bool,
        rest: &[MirInst],
        pin_as: &str,
    ) -> Result<usize> {
        let index = match operand {
            Operand::Identity(name) => self.load_var(*name, rest)?,
            // x0 is allocator index 0
            Operand::LastRet(_) => 0,
            Operand::Literal(lit) => {
                let imm = self.literal_imm(lit)?;
                let reg = self.regs.alloc(rest)?;
                self.out.push(Inst::MovImm {
                    sf,
                    rd: COMMON_REGS[reg],
                    imm,
                });
                reg
            }
            Operand::Void => {
                return Err(CodeGenError::VoidOperand { context: "value" });
            }
        };
        self.regs.set_owner(index, Symbol::intern(pin_as));
        self.regs.pin(index);
        Ok(index)
    }

    /// Bring a named variable into a register, loading from its slot if
    /// it is not already resident.
    fn load_var(&mut self, name: Symbol, rest: &[MirInst]) -> Result<usize> {
        if let Some(index) = self.regs.lookup(name) {
            self.regs.pin(index);
            return Ok(index);
        }
        let offset = self
            .frame
            .offset_of(name)
            .ok_or(CodeGenError::VarNotOnStack { name })?;
        let size = self.frame.size_of(name).unwrap_or(BLOCK_64);
        let index = self.regs.alloc(rest)?;
        self.out.push(Inst::Ldr {
            sf: size == BLOCK_64,
            rt: COMMON_REGS[index],
            base: SP,
            offset,
        });
        self.regs.set_owner(index, name);
        Ok(index)
    }

    /// Store an assignment result into the destination's slot, creating
    /// the slot on first write.
    fn store_dist(&mut self, dist: Symbol, dist_width: u32, sf: bool, rt: u8) -> Result<()> {
        let offset = match self.frame.offset_of(dist) {
            Some(offset) => offset,
            None => self.frame.alloc_var(dist, dist_width)?,
        };
        self.out.push(Inst::Str {
            sf,
            rt,
            base: SP,
            offset,
        });
        Ok(())
    }

    fn literal_imm(&self, lit: &MirLiteral) -> Result<i64> {
        lit.as_int().ok_or_else(|| CodeGenError::FloatImmediate {
            value: match lit {
                MirLiteral::F32(v) => *v as f64,
                MirLiteral::F64(v) => *v,
                _ => unreachable!(),
            },
        })
    }

    /// Register/stack width of an operand in bytes.
    fn operand_size(&self, operand: &Operand) -> Result<u32> {
        match operand {
            Operand::Identity(name) => self
                .frame
                .size_of(*name)
                .ok_or(CodeGenError::VarNotOnStack { name: *name }),
            Operand::LastRet(ty) => Ok(ty.width()),
            Operand::Literal(lit) => Ok(lit.ty().width()),
            Operand::Void => Err(CodeGenError::UnsizedOperand { context: "void" }),
        }
    }
}

fn cond_of(op: CmpOp) -> Cond {
    match op {
        CmpOp::Eq => Cond::Eq,
        CmpOp::Ne => Cond::Ne,
        CmpOp::Lt => Cond::Lt,
        CmpOp::Le => Cond::Le,
        CmpOp::Gt => Cond::Gt,
        CmpOp::Ge => Cond::Ge,
    }
}
