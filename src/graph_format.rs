//! Offset-based binary format for compiled graph databases
//!
//! This module defines the serialized form of a compiled pattern database.
//! The format uses byte offsets and fixed-size records instead of pointers,
//! so a database can be memory-mapped and scanned in place without a
//! deserialization pass.
//!
//! # Layout
//!
//! ```text
//! [Header: GraphHeader (64 bytes, 8-byte aligned)]
//! [Program: Inst array (16 bytes each)]
//! [Pattern table: PatternEntry array (16 bytes each)]
//! [Expression strings: raw UTF-8, addressed by (offset, len)]
//! ```
//!
//! # Design Principles
//!
//! 1. **Alignment**: all structs cast cleanly from an 8-byte aligned buffer
//! 2. **Offsets**: all references are u32 byte offsets (4GB limit)
//! 3. **Zero-copy**: readable directly from mmap without parsing
//! 4. **Integrity**: XXH64 checksum over everything after the header

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::EngineError;

/// Magic bytes identifying a graphscan database
pub const MAGIC: &[u8; 8] = b"GSCANDB\0";

/// Current format version
pub const VERSION: u32 = 1;

/// Block scanning mode (the only mode this engine implements)
pub const MODE_BLOCK: u32 = 1;

/// Sentinel for "no accelerator byte" in [`GraphHeader::accel_byte`]
pub const ACCEL_NONE: u32 = u32::MAX;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = std::mem::size_of::<GraphHeader>();

/// Size of one program instruction in bytes
pub const INST_SIZE: usize = std::mem::size_of::<Inst>();

/// Longest buffer a single scan call accepts (offsets are 32-bit)
pub const MAX_SCAN_LENGTH: usize = u32::MAX as usize;

/// Main header for a serialized graph database (64 bytes, 8-byte aligned)
///
/// All offsets are relative to the start of the buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct GraphHeader {
    /// Magic bytes: "GSCANDB\0"
    pub magic: [u8; 8],

    /// XXH64 of everything after the header
    pub checksum: u64,

    /// Format version (currently 1)
    pub version: u32,

    /// Scanning mode the database was compiled for (1 = block)
    pub mode: u32,

    /// Number of instructions in the program
    pub inst_count: u32,

    /// Offset to the first instruction
    pub insts_offset: u32,

    /// Index of the program entry instruction
    pub start_inst: u32,

    /// Number of compiled patterns
    pub pattern_count: u32,

    /// Offset to the pattern entry array
    pub patterns_offset: u32,

    /// Offset to the expression strings area
    pub strings_offset: u32,

    /// Total size of the expression strings area
    pub strings_size: u32,

    /// Total size of the entire serialized buffer (bytes)
    pub total_buffer_size: u32,

    /// Single byte every unanchored match must start with, or [`ACCEL_NONE`]
    ///
    /// Lets the scan engine skip dead input with memchr when its thread set
    /// is empty.
    pub accel_byte: u32,

    /// Reserved for future use
    pub reserved: u32,
}

/// Instruction opcodes for the compiled program
pub mod opcode {
    /// Consume one byte in `[arg0, arg1]`, continue at `next`
    pub const BYTE_RANGE: u32 = 0;
    /// Fork execution to `arg0` and `next` without consuming input
    pub const SPLIT: u32 = 1;
    /// Report a match for pattern id `arg0`; terminal
    pub const MATCH: u32 = 2;
    /// Continue at `next` only at offset 0
    pub const ASSERT_START: u32 = 3;
    /// Continue at `next` only at the end of the buffer
    pub const ASSERT_END: u32 = 4;
}

/// One program instruction (16 bytes, 4-byte aligned)
///
/// Field meaning depends on the opcode; see [`opcode`]. Targets are
/// instruction indices, not byte offsets.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Inst {
    /// One of the [`opcode`] constants
    pub opcode: u32,
    /// lo byte / fork target / pattern id
    pub arg0: u32,
    /// hi byte (BYTE_RANGE only)
    pub arg1: u32,
    /// Fall-through target
    pub next: u32,
}

impl Inst {
    pub(crate) fn byte_range(lo: u8, hi: u8, next: u32) -> Self {
        Self {
            opcode: opcode::BYTE_RANGE,
            arg0: lo as u32,
            arg1: hi as u32,
            next,
        }
    }

    pub(crate) fn split(a: u32, b: u32) -> Self {
        Self {
            opcode: opcode::SPLIT,
            arg0: a,
            arg1: 0,
            next: b,
        }
    }

    pub(crate) fn match_inst(pattern_id: u32) -> Self {
        Self {
            opcode: opcode::MATCH,
            arg0: pattern_id,
            arg1: 0,
            next: 0,
        }
    }

    pub(crate) fn assert_start(next: u32) -> Self {
        Self {
            opcode: opcode::ASSERT_START,
            arg0: 0,
            arg1: 0,
            next,
        }
    }

    pub(crate) fn assert_end(next: u32) -> Self {
        Self {
            opcode: opcode::ASSERT_END,
            arg0: 0,
            arg1: 0,
            next,
        }
    }
}

/// Pattern table entry (16 bytes)
///
/// Expression text lives in the strings area; `expr_offset` is relative to
/// [`GraphHeader::strings_offset`].
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PatternEntry {
    /// Caller-visible pattern id, reported in match events
    pub id: u32,
    /// Encoded [`crate::PatternFlags`]
    pub flags: u32,
    /// Offset of the expression text within the strings area
    pub expr_offset: u32,
    /// Length of the expression text in bytes
    pub expr_len: u32,
}

/// Read and structurally validate the header of a serialized buffer
///
/// Checks magic, version, mode, and that every section the header references
/// lies within the buffer. Instruction-level validation (opcodes, branch
/// targets) happens in [`crate::Database`].
pub fn read_header(data: &[u8]) -> Result<GraphHeader, EngineError> {
    if data.len() < HEADER_SIZE {
        return Err(EngineError::Format(format!(
            "buffer too small for header: {} bytes (need {})",
            data.len(),
            HEADER_SIZE
        )));
    }
    // Copy the header out so callers may pass unaligned buffers; the body
    // sections still require alignment and are cast in Database.
    let (header, _) = GraphHeader::read_from_prefix(data)
        .map_err(|_| EngineError::Format("truncated header".to_string()))?;

    if &header.magic != MAGIC {
        return Err(EngineError::Format("bad magic bytes".to_string()));
    }
    if header.version != VERSION {
        return Err(EngineError::Format(format!(
            "unsupported format version {} (expected {})",
            header.version, VERSION
        )));
    }
    if header.mode != MODE_BLOCK {
        return Err(EngineError::Format(format!(
            "unsupported scan mode {} (only block mode is supported)",
            header.mode
        )));
    }
    if header.total_buffer_size as usize != data.len() {
        return Err(EngineError::Format(format!(
            "header claims {} bytes, buffer has {}",
            header.total_buffer_size,
            data.len()
        )));
    }

    let insts_end = (header.insts_offset as usize)
        .checked_add(header.inst_count as usize * INST_SIZE)
        .filter(|&end| end <= data.len());
    if insts_end.is_none() {
        return Err(EngineError::Format(
            "instruction section out of bounds".to_string(),
        ));
    }
    let patterns_end = (header.patterns_offset as usize)
        .checked_add(header.pattern_count as usize * std::mem::size_of::<PatternEntry>())
        .filter(|&end| end <= data.len());
    if patterns_end.is_none() {
        return Err(EngineError::Format(
            "pattern table out of bounds".to_string(),
        ));
    }
    let strings_end = (header.strings_offset as usize)
        .checked_add(header.strings_size as usize)
        .filter(|&end| end <= data.len());
    if strings_end.is_none() {
        return Err(EngineError::Format(
            "strings section out of bounds".to_string(),
        ));
    }
    if header.inst_count == 0 || header.start_inst >= header.inst_count {
        return Err(EngineError::Format(
            "start instruction out of range".to_string(),
        ));
    }
    if header.pattern_count == 0 {
        return Err(EngineError::Format("database has no patterns".to_string()));
    }

    Ok(header)
}
