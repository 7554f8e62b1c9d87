//! Method stack frames.
//!
//! A frame is sized once per method before any code is emitted: one
//! 8-byte slot per parameter plus one 8-byte slot per distinct
//! destination identifier, rounded up to a 16-byte multiple, with a
//! 16-byte header above for the saved frame pointer and link register.
//! Slots are then handed out downward from just below the header, 4- or
//! 8-byte aligned by the variable's width. All addressing is sp-relative.

use pcc_util::Symbol;

use crate::error::CodeGenError;
use pcc_mir::{InstKind, MirMethod};

pub const STACK_ALIGN: u32 = 16;
pub const BLOCK_32: u32 = 4;
pub const BLOCK_64: u32 = 8;

/// Variables narrower than 8 bytes occupy a 32-bit block.
pub fn align_block_size(req: u32) -> u32 {
    if req > BLOCK_32 {
        BLOCK_64
    } else {
        BLOCK_32
    }
}

/// Round a raw frame size up to the 16-byte stack alignment (at least
/// one full block).
pub fn align_stack_size(req: u32) -> u32 {
    if req < STACK_ALIGN {
        return STACK_ALIGN;
    }
    req.div_ceil(STACK_ALIGN) * STACK_ALIGN
}

/// Raw slot bytes a method needs: 8 per parameter, 8 per distinct
/// assignment destination.
pub fn compute_stack_size(method: &MirMethod) -> u32 {
    let mut size = method.params.len() as u32 * BLOCK_64;
    let mut seen: Vec<Symbol> = Vec::new();
    for inst in &method.code {
        if let InstKind::Assign2 { dist, .. } | InstKind::Assign3 { dist, .. } = &inst.kind {
            if !seen.contains(dist) {
                seen.push(*dist);
                size += BLOCK_64;
            }
        }
    }
    size
}

struct StackVar {
    name: Symbol,
    size: u32,
    offset: i32,
}

/// Slot map for one method; lives only while that method lowers.
pub struct StackFrame {
    vars: Vec<StackVar>,
    /// Next candidate offset, moving downward.
    top: i32,
    /// 16-byte aligned slot area; fp/lr live at `[sp, aligned]`.
    aligned: u32,
}

impl StackFrame {
    pub fn new(stack_size: u32) -> Self {
        let aligned = align_stack_size(stack_size);
        StackFrame {
            vars: Vec::new(),
            top: aligned as i32 - BLOCK_32 as i32,
            aligned,
        }
    }

    /// Slot-area size; the fp/lr pair is stored at this offset.
    pub fn aligned_size(&self) -> u32 {
        self.aligned
    }

    /// Full frame adjustment applied to sp, header included.
    pub fn total_size(&self) -> u32 {
        self.aligned + STACK_ALIGN
    }

    /// Allocate a slot, aligned to the variable's block size, and return
    /// its sp-relative offset.
    pub fn alloc_var(&mut self, name: Symbol, size_in_bytes: u32) -> Result<i32, CodeGenError> {
        let size = align_block_size(size_in_bytes);
        let mut offset = self.top;
        while offset % size as i32 != 0 {
            offset -= 1;
        }
        if offset < 0 {
            return Err(CodeGenError::StackOverflow { name });
        }
        self.vars.push(StackVar { name, size, offset });
        self.top = offset - size as i32;
        Ok(offset)
    }

    pub fn offset_of(&self, name: Symbol) -> Option<i32> {
        self.vars.iter().find(|v| v.name == name).map(|v| v.offset)
    }

    pub fn size_of(&self, name: Symbol) -> Option<u32> {
        self.vars.iter().find(|v| v.name == name).map(|v| v.size)
    }
}
