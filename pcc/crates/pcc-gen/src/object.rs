//! Output containers.
//!
//! The core hands over three things: the finished text bytes, the byte
//! offset of every label, and the entry symbol's name. This module wraps
//! them into an ELF64 executable image (ET_DYN under `--shared`) or a
//! flat binary for bare metal. Mach-O64 and PE32+ writers are external
//! collaborators consuming the same [`TextSection`] interface.

use pcc_util::Symbol;
use tracing::debug;

use crate::error::{EncodeError, Result};

/// Everything a container writer needs from the core.
pub struct TextSection {
    pub bytes: Vec<u8>,
    /// Label name -> byte offset within the text.
    pub symbols: Vec<(Symbol, u32)>,
    pub entry: &'static str,
}

impl TextSection {
    pub fn entry_offset(&self) -> Result<u32> {
        self.symbols
            .iter()
            .find(|(name, _)| name.as_str() == self.entry)
            .map(|(_, offset)| *offset)
            .ok_or_else(|| EncodeError::MissingEntry {
                entry: self.entry.to_owned(),
            })
    }
}

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;
const EM_AARCH64: u16 = 183;
const PT_LOAD: u32 = 1;
const PF_R_X: u32 = 0x5;

const EHDR_SIZE: u64 = 64;
const PHDR_SIZE: u64 = 56;
/// Image base for the single loadable segment.
const VADDR_BASE: u64 = 0x40_0000;

/// Emit a minimal ELF64 executable: file header, one PT_LOAD program
/// header covering the whole image, then the text.
pub fn write_elf64(text: &TextSection, shared: bool) -> Result<Vec<u8>> {
    let text_offset = align_to(EHDR_SIZE + PHDR_SIZE, 16);
    let entry = VADDR_BASE + text_offset + text.entry_offset()? as u64;
    let file_size = text_offset + text.bytes.len() as u64;

    let mut out = Vec::with_capacity(file_size as usize);

    // e_ident
    out.extend_from_slice(&ELF_MAGIC);
    out.push(2); // ELFCLASS64
    out.push(1); // ELFDATA2LSB
    out.push(1); // EV_CURRENT
    out.extend_from_slice(&[0u8; 9]);

    let e_type = if shared { ET_DYN } else { ET_EXEC };
    out.extend_from_slice(&e_type.to_le_bytes());
    out.extend_from_slice(&EM_AARCH64.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&entry.to_le_bytes()); // e_entry
    out.extend_from_slice(&EHDR_SIZE.to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes()); // e_phentsize
    out.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
    debug_assert_eq!(out.len() as u64, EHDR_SIZE);

    // program header: map the whole file R+X at the image base
    out.extend_from_slice(&PT_LOAD.to_le_bytes());
    out.extend_from_slice(&PF_R_X.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // p_offset
    out.extend_from_slice(&VADDR_BASE.to_le_bytes()); // p_vaddr
    out.extend_from_slice(&VADDR_BASE.to_le_bytes()); // p_paddr
    out.extend_from_slice(&file_size.to_le_bytes()); // p_filesz
    out.extend_from_slice(&file_size.to_le_bytes()); // p_memsz
    out.extend_from_slice(&0x1000u64.to_le_bytes()); // p_align
    debug_assert_eq!(out.len() as u64, EHDR_SIZE + PHDR_SIZE);

    while (out.len() as u64) < text_offset {
        out.push(0);
    }
    out.extend_from_slice(&text.bytes);

    debug!(target: "elf", size = out.len(), entry, "elf image written");
    Ok(out)
}

/// Raw instruction stream, no container.
pub fn write_flat(text: &TextSection) -> Vec<u8> {
    text.bytes.clone()
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}
