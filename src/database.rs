//! Compiled database: immutable, serializable, shareable
//!
//! A [`Database`] owns a validated copy of the serialized program, either in
//! heap memory or memory-mapped from a file. It never mutates after
//! construction and may be shared read-only across any number of concurrent
//! scans, each with its own scratch.
//!
//! Loading goes through full structural validation (header bounds, opcode
//! and branch-target checks, checksum), so a corrupt or hostile file fails
//! with a [`EngineError::Format`] instead of misbehaving during a scan.

use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use xxhash_rust::xxh64::xxh64;
use zerocopy::{IntoBytes, Ref};

use crate::error::{EngineError, Result};
use crate::graph_format::{
    read_header, GraphHeader, Inst, PatternEntry, ACCEL_NONE, HEADER_SIZE, INST_SIZE, MODE_BLOCK,
    opcode,
};
use crate::pattern::PatternFlags;

/// Heap buffer with 8-byte alignment, required for casting the header
///
/// A plain `Vec<u8>` gives no alignment guarantee; backing the bytes with
/// `u64` words does.
#[derive(Debug)]
struct AlignedBytes {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBytes {
    fn from_slice(data: &[u8]) -> Self {
        let mut words = vec![0u64; data.len().div_ceil(8)];
        words.as_mut_slice().as_mut_bytes()[..data.len()].copy_from_slice(data);
        Self {
            words,
            len: data.len(),
        }
    }

    fn as_slice(&self) -> &[u8] {
        &self.words.as_slice().as_bytes()[..self.len]
    }
}

#[derive(Debug)]
enum Storage {
    Owned(AlignedBytes),
    // mmap pages are always sufficiently aligned
    Mapped(Mmap),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(buf) => buf.as_slice(),
            Storage::Mapped(mmap) => mmap,
        }
    }
}

/// An immutable compiled pattern database
///
/// Produced by [`crate::compile`], or loaded from disk with
/// [`Database::open`] / [`Database::from_bytes`]. `Sync` by construction:
/// concurrent scans on different threads share one database, each thread
/// bringing its own [`crate::Scratch`].
#[derive(Debug)]
pub struct Database {
    storage: Storage,
    header: GraphHeader,
}

/// Summary of a database, for inspection and JSON output
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    /// Format version
    pub version: u32,
    /// Scanning mode name
    pub mode: &'static str,
    /// Program size in instructions
    pub instructions: u32,
    /// Number of compiled patterns
    pub patterns: u32,
    /// Serialized size in bytes
    pub buffer_size: u32,
    /// XXH64 body checksum, hex
    pub checksum: String,
    /// Prefilter byte, if the compiler found one
    pub accel_byte: Option<u8>,
}

impl Database {
    /// Construct from serialized bytes, copying into aligned heap storage
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let storage = Storage::Owned(AlignedBytes::from_slice(data));
        Self::validate_and_build(storage)
    }

    /// Memory-map a database file
    ///
    /// The file loads in constant time; pages are faulted in on demand, and
    /// multiple processes mapping the same file share physical memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| EngineError::Io(format!("failed to open database file: {}", e)))?;
        let mmap = unsafe {
            Mmap::map(&file)
                .map_err(|e| EngineError::Mmap(format!("failed to map database file: {}", e)))?
        };
        Self::validate_and_build(Storage::Mapped(mmap))
    }

    /// Write the serialized database to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn validate_and_build(storage: Storage) -> Result<Self> {
        let data = storage.as_slice();
        let header = read_header(data)?;

        let body_checksum = xxh64(&data[HEADER_SIZE..], 0);
        if body_checksum != header.checksum {
            return Err(EngineError::Format(format!(
                "checksum mismatch: header says {:016x}, body hashes to {:016x}",
                header.checksum, body_checksum
            )));
        }

        let db = Self { storage, header };
        db.validate_program()?;
        db.validate_pattern_table()?;
        Ok(db)
    }

    /// Check every instruction so the scan loop can index without bounds
    /// failures on malformed input
    fn validate_program(&self) -> Result<()> {
        let insts = self.insts();
        if insts.len() != self.header.inst_count as usize {
            // Misaligned section offsets make the zerocopy cast fail
            return Err(EngineError::Format(
                "instruction section is misaligned".to_string(),
            ));
        }
        let count = insts.len() as u32;
        let pattern_ids: Vec<u32> = self.pattern_entries().iter().map(|e| e.id).collect();

        for (idx, inst) in insts.iter().enumerate() {
            let ok = match inst.opcode {
                opcode::BYTE_RANGE => {
                    inst.arg0 <= inst.arg1 && inst.arg1 <= 255 && inst.next < count
                }
                opcode::SPLIT => inst.arg0 < count && inst.next < count,
                opcode::MATCH => pattern_ids.contains(&inst.arg0),
                opcode::ASSERT_START | opcode::ASSERT_END => inst.next < count,
                _ => false,
            };
            if !ok {
                return Err(EngineError::Format(format!(
                    "invalid instruction at index {} (opcode {})",
                    idx, inst.opcode
                )));
            }
        }
        Ok(())
    }

    fn validate_pattern_table(&self) -> Result<()> {
        if self.pattern_entries().len() != self.header.pattern_count as usize {
            return Err(EngineError::Format(
                "pattern table is misaligned".to_string(),
            ));
        }
        let strings_size = self.header.strings_size;
        for (idx, entry) in self.pattern_entries().iter().enumerate() {
            let end = entry.expr_offset.checked_add(entry.expr_len);
            if end.is_none() || end.unwrap_or(u32::MAX) > strings_size {
                return Err(EngineError::Format(format!(
                    "pattern {} expression out of bounds",
                    idx
                )));
            }
            if self.expression_at(entry).is_none() {
                return Err(EngineError::Format(format!(
                    "pattern {} expression is not valid UTF-8",
                    idx
                )));
            }
        }
        Ok(())
    }

    /// Raw serialized bytes (for transmission or embedding)
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Number of patterns in the database
    pub fn pattern_count(&self) -> usize {
        self.header.pattern_count as usize
    }

    /// Program size in instructions
    pub fn instruction_count(&self) -> usize {
        self.header.inst_count as usize
    }

    /// Workspace requirement a scratch must satisfy to scan this database
    ///
    /// Expressed in VM thread slots; one per program instruction.
    pub fn scratch_requirement(&self) -> usize {
        self.header.inst_count as usize
    }

    /// Prefilter byte, if every unanchored match must start with one byte
    pub fn accel_byte(&self) -> Option<u8> {
        if self.header.accel_byte == ACCEL_NONE {
            None
        } else {
            Some(self.header.accel_byte as u8)
        }
    }

    /// Expression text of the pattern at table position `index`
    pub fn expression(&self, index: usize) -> Option<&str> {
        let entry = *self.pattern_entries().get(index)?;
        self.expression_at(&entry)
    }

    /// Caller-visible id of the pattern at table position `index`
    pub fn pattern_id(&self, index: usize) -> Option<u32> {
        self.pattern_entries().get(index).map(|e| e.id)
    }

    /// Flags of the pattern at table position `index`
    pub fn pattern_flags(&self, index: usize) -> Option<PatternFlags> {
        self.pattern_entries()
            .get(index)
            .map(|e| PatternFlags::from_bits(e.flags))
    }

    /// Database summary for inspection
    pub fn info(&self) -> DatabaseInfo {
        DatabaseInfo {
            version: self.header.version,
            mode: if self.header.mode == MODE_BLOCK {
                "block"
            } else {
                "unknown"
            },
            instructions: self.header.inst_count,
            patterns: self.header.pattern_count,
            buffer_size: self.header.total_buffer_size,
            checksum: format!("{:016x}", self.header.checksum),
            accel_byte: self.accel_byte(),
        }
    }

    pub(crate) fn header(&self) -> &GraphHeader {
        &self.header
    }

    /// The instruction slice, re-cast from the validated buffer
    pub(crate) fn insts(&self) -> &[Inst] {
        let data = self.storage.as_slice();
        let start = self.header.insts_offset as usize;
        let end = start + self.header.inst_count as usize * INST_SIZE;
        // Bounds were validated in read_header; a cast failure would mean
        // the buffer moved, which Storage precludes
        match Ref::<_, [Inst]>::from_bytes(&data[start..end]) {
            Ok(insts) => Ref::into_ref(insts),
            Err(_) => &[],
        }
    }

    fn pattern_entries(&self) -> &[PatternEntry] {
        let data = self.storage.as_slice();
        let start = self.header.patterns_offset as usize;
        let end = start + self.header.pattern_count as usize * std::mem::size_of::<PatternEntry>();
        match Ref::<_, [PatternEntry]>::from_bytes(&data[start..end]) {
            Ok(entries) => Ref::into_ref(entries),
            Err(_) => &[],
        }
    }

    fn expression_at(&self, entry: &PatternEntry) -> Option<&str> {
        let data = self.storage.as_slice();
        let start = self.header.strings_offset as usize + entry.expr_offset as usize;
        let end = start + entry.expr_len as usize;
        std::str::from_utf8(data.get(start..end)?).ok()
    }
}
