//! Textual assembly backend for `-S`.
//!
//! The instruction list already knows how to render itself; this adds the
//! section header and the entry-point directive so the output assembles
//! under a stock toolchain.

use pcc_lir::Inst;

pub struct AsmGenerator {
    output: String,
}

impl AsmGenerator {
    pub fn new() -> Self {
        AsmGenerator {
            output: String::new(),
        }
    }

    pub fn generate(mut self, entry: &str, insts: &[Inst]) -> String {
        self.output.push_str(".text\n");
        self.output.push_str(&format!(".global {entry}\n"));
        for inst in insts {
            self.output.push_str(&inst.to_string());
            self.output.push('\n');
        }
        self.output
    }
}

impl Default for AsmGenerator {
    fn default() -> Self {
        Self::new()
    }
}
