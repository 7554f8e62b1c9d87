//! Target assembly: platform preamble + every method, then encoding.

use tracing::debug;

use crate::asm::AsmGenerator;
use crate::buffer::assemble;
use crate::error::Result;
use crate::object::TextSection;
use crate::platform::Platform;
use pcc_lir::{lower_method, CodeGenError, Inst};
use pcc_mir::Mir;

/// Lower a whole program into one instruction stream: startup stub,
/// syscall wrappers, then each method in order.
pub fn generate_insts(mir: &Mir, platform: Platform) -> std::result::Result<Vec<Inst>, CodeGenError> {
    let mut insts = Vec::new();
    platform.emit_start(&mut insts);
    platform.emit_syscall_stubs(&mut insts);
    for method in &mir.methods {
        lower_method(method, &mut insts)?;
    }
    debug!(target: "arm64", count = insts.len(), "target generation done");
    Ok(insts)
}

/// Encode and relocate an instruction stream into a finished text
/// section. Branches are PC-relative, so the text relocates at base 0.
pub fn encode_text(insts: &[Inst], platform: Platform) -> Result<TextSection> {
    let mut buffer = assemble(insts)?;
    buffer.relocate(0)?;
    Ok(TextSection {
        bytes: buffer.bytes()?,
        symbols: buffer.symbol_offsets(),
        entry: platform.entry_symbol(),
    })
}

/// Render the instruction stream as assembly text (`-S`).
pub fn render_asm(insts: &[Inst], platform: Platform) -> String {
    AsmGenerator::new().generate(platform.entry_symbol(), insts)
}
