//! Pattern compiler
//!
//! Lowers parsed pattern ASTs into the combined byte-program and serializes
//! it directly into the offset-based format consumed by the scan engine.
//! Construction uses temporary in-memory fragments, then writes the final
//! buffer in one pass, so compiling the same patterns always produces an
//! identical database.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::xxh64;
use zerocopy::IntoBytes;

use crate::database::Database;
use crate::error::{CompileError, EngineError};
use crate::graph_format::{
    GraphHeader, Inst, PatternEntry, ACCEL_NONE, HEADER_SIZE, MAGIC, MODE_BLOCK, VERSION,
};
use crate::pattern::{parse, Ast, ByteClass, Pattern};

/// Hard cap on compiled program size
const MAX_PROGRAM_INSTS: usize = 1 << 20;

/// Scanning mode requested at compile time
///
/// Only block mode is implemented; the variant exists so the compile
/// signature carries the mode explicitly, as the scan library contract does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// The whole input is available in one contiguous buffer per scan call
    Block,
}

/// Compile a set of patterns into an immutable [`Database`]
///
/// Pattern ids must be unique. Patterns that can match the empty buffer are
/// rejected. Errors identify the offending pattern by its index in `patterns`.
///
/// # Example
///
/// ```
/// use graphscan::{compile, Pattern, ScanMode};
///
/// let patterns = vec![Pattern::new("ab+c", 0), Pattern::new("x[0-9]z", 1)];
/// let db = compile(&patterns, ScanMode::Block).unwrap();
/// assert_eq!(db.pattern_count(), 2);
/// ```
pub fn compile(patterns: &[Pattern], mode: ScanMode) -> Result<Database, EngineError> {
    let ScanMode::Block = mode;
    if patterns.is_empty() {
        return Err(EngineError::InvalidArgument(
            "no patterns provided".to_string(),
        ));
    }

    let mut seen_ids: FxHashMap<u32, usize> = FxHashMap::default();
    let mut builder = ProgramBuilder::new();
    let mut entries = Vec::with_capacity(patterns.len());
    let mut accel: Option<ByteClass> = Some(ByteClass::empty());

    for (index, pattern) in patterns.iter().enumerate() {
        if let Some(&prev) = seen_ids.get(&pattern.id) {
            return Err(CompileError::new(
                index,
                format!("duplicate pattern id {} (also used by pattern {})", pattern.id, prev),
            )
            .into());
        }
        seen_ids.insert(pattern.id, index);

        let ast = parse(&pattern.expression, pattern.flags)
            .map_err(|msg| CompileError::new(index, msg))?;
        if ast.is_nullable() {
            return Err(CompileError::new(
                index,
                "pattern can match an empty buffer, which is not supported in block mode",
            )
            .into());
        }

        accel = match (accel, ast.leading_bytes()) {
            (Some(acc), Some(lead)) => Some(acc.union(&lead)),
            _ => None,
        };

        let entry_inst = builder.compile_pattern(&ast, pattern.id, index)?;
        entries.push((entry_inst, pattern));
    }

    let start_inst = builder.entry_chain(entries.iter().map(|(inst, _)| *inst));
    let accel_byte = match accel {
        Some(class) => match class.ranges[..] {
            [(lo, hi)] if lo == hi => lo as u32,
            _ => ACCEL_NONE,
        },
        None => ACCEL_NONE,
    };

    let buffer = serialize(&builder.insts, start_inst, &entries, accel_byte);
    Database::from_bytes(&buffer)
}

/// An unpatched branch in a fragment under construction
#[derive(Debug, Clone, Copy)]
enum Hole {
    /// Patch the `next` field of the instruction
    Next(u32),
    /// Patch the `arg0` field of the instruction (split first leg)
    Arg0(u32),
}

/// A compiled fragment: entry instruction plus dangling exits
struct Frag {
    start: u32,
    holes: Vec<Hole>,
}

struct ProgramBuilder {
    insts: Vec<Inst>,
}

impl ProgramBuilder {
    fn new() -> Self {
        Self { insts: Vec::new() }
    }

    fn push(&mut self, inst: Inst) -> u32 {
        let idx = self.insts.len() as u32;
        self.insts.push(inst);
        idx
    }

    fn patch(&mut self, holes: &[Hole], target: u32) {
        for hole in holes {
            match *hole {
                Hole::Next(idx) => self.insts[idx as usize].next = target,
                Hole::Arg0(idx) => self.insts[idx as usize].arg0 = target,
            }
        }
    }

    /// Compile one pattern and cap it with its MATCH instruction.
    /// Returns the pattern's entry instruction index.
    fn compile_pattern(
        &mut self,
        ast: &Ast,
        pattern_id: u32,
        index: usize,
    ) -> Result<u32, EngineError> {
        let frag = self.compile_ast(ast);
        let done = self.push(Inst::match_inst(pattern_id));
        self.patch(&frag.holes, done);
        if self.insts.len() > MAX_PROGRAM_INSTS {
            return Err(EngineError::ResourceLimit(format!(
                "compiled program exceeds {} instructions at pattern {}",
                MAX_PROGRAM_INSTS, index
            )));
        }
        Ok(frag.start)
    }

    /// Split chain fanning out to every pattern's entry instruction
    fn entry_chain(&mut self, entry_insts: impl DoubleEndedIterator<Item = u32>) -> u32 {
        let mut entries: Vec<u32> = entry_insts.collect();
        let mut acc = entries.pop().unwrap_or(0);
        while let Some(entry) = entries.pop() {
            acc = self.push(Inst::split(entry, acc));
        }
        acc
    }

    fn compile_ast(&mut self, ast: &Ast) -> Frag {
        match ast {
            Ast::Empty => {
                // Epsilon jump; both legs get patched to the same target
                let idx = self.push(Inst::split(0, 0));
                Frag {
                    start: idx,
                    holes: vec![Hole::Arg0(idx), Hole::Next(idx)],
                }
            }
            Ast::Class(class) => self.compile_class(class),
            Ast::Concat(nodes) => {
                let mut iter = nodes.iter();
                let Some(first) = iter.next() else {
                    return self.compile_ast(&Ast::Empty);
                };
                let mut frag = self.compile_ast(first);
                for node in iter {
                    let next = self.compile_ast(node);
                    self.patch(&frag.holes, next.start);
                    frag.holes = next.holes;
                }
                frag
            }
            Ast::Alternate(nodes) => {
                let frags: Vec<Frag> = nodes.iter().map(|n| self.compile_ast(n)).collect();
                let mut holes = Vec::new();
                let mut starts = Vec::with_capacity(frags.len());
                for frag in frags {
                    starts.push(frag.start);
                    holes.extend(frag.holes);
                }
                let start = self.alt_chain(&starts);
                Frag { start, holes }
            }
            Ast::Repeat { node, min, max } => self.compile_repeat(node, *min, *max),
            Ast::AssertStart => {
                let idx = self.push(Inst::assert_start(0));
                Frag {
                    start: idx,
                    holes: vec![Hole::Next(idx)],
                }
            }
            Ast::AssertEnd => {
                let idx = self.push(Inst::assert_end(0));
                Frag {
                    start: idx,
                    holes: vec![Hole::Next(idx)],
                }
            }
        }
    }

    /// One byte from a class: single range inline, otherwise a split fan-out
    fn compile_class(&mut self, class: &ByteClass) -> Frag {
        let mut holes = Vec::with_capacity(class.ranges.len());
        let mut starts = Vec::with_capacity(class.ranges.len());
        for &(lo, hi) in &class.ranges {
            let idx = self.push(Inst::byte_range(lo, hi, 0));
            holes.push(Hole::Next(idx));
            starts.push(idx);
        }
        let start = self.alt_chain(&starts);
        Frag { start, holes }
    }

    /// Right-fold a list of entry points into a split chain
    fn alt_chain(&mut self, starts: &[u32]) -> u32 {
        let mut acc = *starts.last().unwrap_or(&0);
        for &start in starts.iter().rev().skip(1) {
            acc = self.push(Inst::split(start, acc));
        }
        acc
    }

    fn compile_repeat(&mut self, node: &Ast, min: u32, max: Option<u32>) -> Frag {
        match max {
            // {min,} - min mandatory copies, then a star
            None => {
                let star = |builder: &mut Self| {
                    let split = builder.push(Inst::split(0, 0));
                    let body = builder.compile_ast(node);
                    builder.insts[split as usize].arg0 = body.start;
                    builder.patch(&body.holes, split);
                    Frag {
                        start: split,
                        holes: vec![Hole::Next(split)],
                    }
                };
                if min == 0 {
                    star(self)
                } else {
                    let mut frag = self.compile_ast(node);
                    for _ in 1..min {
                        let copy = self.compile_ast(node);
                        self.patch(&frag.holes, copy.start);
                        frag.holes = copy.holes;
                    }
                    let tail = star(self);
                    self.patch(&frag.holes, tail.start);
                    frag.holes = tail.holes;
                    frag
                }
            }
            // {min,max} - min mandatory copies plus (max - min) optional ones
            Some(max) => {
                let mut frag: Option<Frag> = None;
                for _ in 0..min {
                    let copy = self.compile_ast(node);
                    frag = Some(match frag {
                        None => copy,
                        Some(mut prev) => {
                            self.patch(&prev.holes, copy.start);
                            prev.holes = copy.holes;
                            prev
                        }
                    });
                }
                for _ in min..max {
                    let split = self.push(Inst::split(0, 0));
                    let body = self.compile_ast(node);
                    self.insts[split as usize].arg0 = body.start;
                    let mut opt_holes = vec![Hole::Next(split)];
                    opt_holes.extend(body.holes);
                    frag = Some(match frag {
                        None => Frag {
                            start: split,
                            holes: opt_holes,
                        },
                        Some(mut prev) => {
                            self.patch(&prev.holes, split);
                            prev.holes = opt_holes;
                            prev
                        }
                    });
                }
                // min == max == 0 is rejected earlier by the nullability check
                frag.unwrap_or_else(|| Frag {
                    start: 0,
                    holes: Vec::new(),
                })
            }
        }
    }
}

/// Write the final offset-based buffer
fn serialize(
    insts: &[Inst],
    start_inst: u32,
    entries: &[(u32, &Pattern)],
    accel_byte: u32,
) -> Vec<u8> {
    let insts_offset = HEADER_SIZE;
    let insts_size = std::mem::size_of_val(insts);
    let patterns_offset = insts_offset + insts_size;
    let patterns_size = entries.len() * std::mem::size_of::<PatternEntry>();
    let strings_offset = patterns_offset + patterns_size;

    let mut strings = Vec::new();
    let mut pattern_entries = Vec::with_capacity(entries.len());
    for (_, pattern) in entries {
        let expr = pattern.expression.as_bytes();
        pattern_entries.push(PatternEntry {
            id: pattern.id,
            flags: pattern.flags.to_bits(),
            expr_offset: strings.len() as u32,
            expr_len: expr.len() as u32,
        });
        strings.extend_from_slice(expr);
    }

    let total = strings_offset + strings.len();
    let mut buffer = Vec::with_capacity(total);
    buffer.resize(HEADER_SIZE, 0);
    buffer.extend_from_slice(insts.as_bytes());
    buffer.extend_from_slice(pattern_entries.as_bytes());
    buffer.extend_from_slice(&strings);

    let header = GraphHeader {
        magic: *MAGIC,
        checksum: xxh64(&buffer[HEADER_SIZE..], 0),
        version: VERSION,
        mode: MODE_BLOCK,
        inst_count: insts.len() as u32,
        insts_offset: insts_offset as u32,
        start_inst,
        pattern_count: entries.len() as u32,
        patterns_offset: patterns_offset as u32,
        strings_offset: strings_offset as u32,
        strings_size: strings.len() as u32,
        total_buffer_size: total as u32,
        accel_byte,
        reserved: 0,
    };
    buffer[..HEADER_SIZE].copy_from_slice(header.as_bytes());
    buffer
}
