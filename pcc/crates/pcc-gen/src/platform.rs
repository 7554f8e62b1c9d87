//! Platform entry stubs and system-call wrappers.
//!
//! Every hosted platform gets the same preamble shape: `_start` zeroes
//! the frame pointer and link register, branches-with-link to `main`,
//! loads the platform's exit system-call number into its dispatch
//! register with `main`'s return value still in x0, and traps. Linux and
//! macOS additionally get tiny libc-level wrappers (`write`, `read`,
//! `fork`) of the form `mov <nr-reg>, #nr; svc; ret`. Everything lives in
//! the ordinary instruction stream and relocates with it.

use pcc_lir::regs::{X0, X1, X16, X29, X30, X8};
use pcc_lir::Inst;
use pcc_util::Symbol;

/// Linux AArch64 system-call numbers.
pub mod linux_nr {
    pub const READ: i64 = 63;
    pub const WRITE: i64 = 64;
    pub const EXIT: i64 = 93;
    /// fork is clone on AArch64
    pub const FORK: i64 = 220;
}

/// macOS BSD system-call numbers (dispatched via `svc #0x80`).
pub mod macos_nr {
    pub const EXIT: i64 = 1;
    pub const FORK: i64 = 2;
    pub const READ: i64 = 3;
    pub const WRITE: i64 = 4;
}

/// Windows native system-service numbers.
pub mod windows_nr {
    pub const NT_WRITE_FILE: u16 = 8;
    pub const NT_TERMINATE_PROCESS: u16 = 44;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Bare,
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// The symbol execution starts at; the container writer points the
    /// entry address here.
    pub fn entry_symbol(self) -> &'static str {
        match self {
            Platform::Bare => "main",
            _ => "_start",
        }
    }

    /// Emit the startup preamble (nothing for bare metal).
    pub fn emit_start(self, out: &mut Vec<Inst>) {
        if self == Platform::Bare {
            return;
        }
        let main = Symbol::intern("main");
        out.push(Inst::Label(Symbol::intern("_start")));
        out.push(Inst::MovImm {
            sf: true,
            rd: X29,
            imm: 0,
        });
        out.push(Inst::MovImm {
            sf: true,
            rd: X30,
            imm: 0,
        });
        out.push(Inst::Bl { target: main });
        // main's return value stays in x0 for the exit call
        match self {
            Platform::Linux => {
                out.push(Inst::MovImm {
                    sf: true,
                    rd: X8,
                    imm: linux_nr::EXIT,
                });
                out.push(Inst::Svc { imm: 0 });
            }
            Platform::MacOs => {
                out.push(Inst::MovImm {
                    sf: true,
                    rd: X16,
                    imm: macos_nr::EXIT,
                });
                out.push(Inst::Svc { imm: 0x80 });
            }
            Platform::Windows => {
                // NtTerminateProcess(INVALID_HANDLE_VALUE, exit_code)
                out.push(Inst::MovReg {
                    sf: true,
                    rd: X1,
                    rm: X0,
                });
                out.push(Inst::MovImm {
                    sf: true,
                    rd: X0,
                    imm: -1,
                });
                out.push(Inst::Svc {
                    imm: windows_nr::NT_TERMINATE_PROCESS,
                });
            }
            Platform::Bare => unreachable!(),
        }
    }

    /// Emit the libc-level wrappers this platform links statically.
    pub fn emit_syscall_stubs(self, out: &mut Vec<Inst>) {
        match self {
            Platform::Linux => {
                for (name, nr) in [
                    ("write", linux_nr::WRITE),
                    ("read", linux_nr::READ),
                    ("fork", linux_nr::FORK),
                ] {
                    emit_stub(out, name, X8, nr, 0);
                }
            }
            Platform::MacOs => {
                for (name, nr) in [
                    ("write", macos_nr::WRITE),
                    ("read", macos_nr::READ),
                    ("fork", macos_nr::FORK),
                ] {
                    emit_stub(out, name, X16, nr, 0x80);
                }
            }
            Platform::Windows | Platform::Bare => {}
        }
    }
}

fn emit_stub(out: &mut Vec<Inst>, name: &str, nr_reg: u8, nr: i64, svc_imm: u16) {
    out.push(Inst::Label(Symbol::intern(name)));
    out.push(Inst::MovImm {
        sf: true,
        rd: nr_reg,
        imm: nr,
    });
    out.push(Inst::Svc { imm: svc_imm });
    out.push(Inst::Ret);
}
