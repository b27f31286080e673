//! Block-mode scan engine
//!
//! Executes a compiled database against one contiguous input buffer,
//! invoking a caller-supplied callback synchronously for every match. The
//! call does not return until the whole buffer has been examined or the
//! callback requests termination.
//!
//! # Ordering
//!
//! Callbacks are delivered in non-decreasing order of match end-offset.
//! Matches ending at the same offset are delivered in ascending pattern-id
//! order; this tie-break is part of the contract and pinned by tests.
//!
//! # Execution model
//!
//! A thread-set VM over the compiled program: the current set of automaton
//! positions advances one input byte at a time, reseeding the unanchored
//! entry point at every offset so all match occurrences are reported, not
//! just the leftmost. Runtime is O(program size × input length) worst case,
//! with no backtracking and no per-byte allocation.

use memchr::memchr;

use crate::database::Database;
use crate::error::{EngineError, Result};
use crate::graph_format::{opcode, Inst, MAX_SCAN_LENGTH};
use crate::scratch::{Scratch, ThreadSet};

/// A single reported pattern occurrence
///
/// Delivered transiently to the scan callback; not retained by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEvent {
    /// Id of the matching pattern, as given at compile time
    pub id: u32,
    /// Start offset of the match (leftmost when attempts merge)
    pub from: u64,
    /// End offset: index of the byte just past the match
    pub to: u64,
    /// Reserved, currently always 0
    pub flags: u32,
}

/// Callback verdict: keep scanning or stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matching {
    /// Deliver further matches
    Continue,
    /// Stop the scan; no more callbacks will be invoked
    Terminate,
}

/// How a scan call finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The entire buffer was examined and every match delivered
    Completed,
    /// The callback requested early termination
    Terminated,
}

/// Scan `data` with `db`, reporting matches to `on_match`
///
/// `flags` is reserved and must be 0. `scratch` must have been allocated for
/// this database or one with an equal-or-larger requirement; mismatches are
/// rejected, never undefined. Buffers longer than `u32::MAX` are rejected
/// (callers wanting to scan more must pre-truncate or split).
///
/// # Example
///
/// ```
/// use graphscan::{compile, scan, Matching, Pattern, ScanMode, Scratch};
///
/// let db = compile(&[Pattern::new("ab+", 0)], ScanMode::Block).unwrap();
/// let mut scratch = Scratch::for_database(&db);
/// let mut ends = Vec::new();
/// scan(&db, b"xabbz", 0, &mut scratch, |event| {
///     ends.push(event.to);
///     Matching::Continue
/// })
/// .unwrap();
/// assert_eq!(ends, vec![3, 4]);
/// ```
pub fn scan<F>(
    db: &Database,
    data: &[u8],
    flags: u32,
    scratch: &mut Scratch,
    mut on_match: F,
) -> Result<ScanOutcome>
where
    F: FnMut(&MatchEvent) -> Matching,
{
    if flags != 0 {
        return Err(EngineError::InvalidArgument(format!(
            "scan flags must be 0, got {:#x}",
            flags
        )));
    }
    scratch.check_compatible(db)?;
    if data.len() > MAX_SCAN_LENGTH {
        return Err(EngineError::BufferTooLarge {
            length: data.len(),
            max: MAX_SCAN_LENGTH,
        });
    }

    scratch.reset();
    let Scratch {
        clist,
        nlist,
        stack,
        staged,
        ..
    } = scratch;

    let insts = db.insts();
    let start_inst = db.header().start_inst;
    let accel = db.accel_byte();
    let len = data.len();
    let mut at = 0usize;

    loop {
        // Unanchored seed: a match attempt may begin at every offset
        add_thread(insts, clist, stack, start_inst, at as u64, at, len);

        // Deliver matches ending exactly at `at`
        staged.clear();
        for thread in clist.iter() {
            let inst = insts[thread.inst as usize];
            if inst.opcode == opcode::MATCH {
                staged.push((inst.arg0, thread.start));
            }
        }
        if !staged.is_empty() {
            // Ties on end offset resolve by ascending pattern id
            staged.sort_unstable_by_key(|&(id, _)| id);
            for &(id, from) in staged.iter() {
                let event = MatchEvent {
                    id,
                    from,
                    to: at as u64,
                    flags: 0,
                };
                if on_match(&event) == Matching::Terminate {
                    return Ok(ScanOutcome::Terminated);
                }
            }
        }

        if at >= len {
            break;
        }

        // Step every live thread over the next byte
        let byte = data[at];
        nlist.clear();
        for &thread in clist.iter() {
            let inst = insts[thread.inst as usize];
            if inst.opcode == opcode::BYTE_RANGE
                && inst.arg0 <= byte as u32
                && byte as u32 <= inst.arg1
            {
                add_thread(insts, nlist, stack, inst.next, thread.start, at + 1, len);
            }
        }
        std::mem::swap(clist, nlist);
        at += 1;

        // Nothing alive: fast-forward to the next byte any match can start
        // with, when the compiler determined one
        if clist.is_empty() && at < len {
            if let Some(b) = accel {
                match memchr(b, &data[at..]) {
                    Some(skip) => at += skip,
                    None => at = len,
                }
            }
        }
    }

    Ok(ScanOutcome::Completed)
}

/// Add a thread and its epsilon closure to `set`
///
/// Iterative worklist rather than recursion; the program was validated at
/// load time, so every target is in range.
fn add_thread(
    insts: &[Inst],
    set: &mut ThreadSet,
    stack: &mut Vec<u32>,
    inst: u32,
    start: u64,
    at: usize,
    len: usize,
) {
    stack.push(inst);
    while let Some(idx) = stack.pop() {
        if !set.insert(idx, start) {
            continue;
        }
        let inst = insts[idx as usize];
        match inst.opcode {
            opcode::SPLIT => {
                stack.push(inst.arg0);
                stack.push(inst.next);
            }
            opcode::ASSERT_START => {
                if at == 0 {
                    stack.push(inst.next);
                }
            }
            opcode::ASSERT_END => {
                if at == len {
                    stack.push(inst.next);
                }
            }
            // BYTE_RANGE waits for the step; MATCH waits for the flush
            _ => {}
        }
    }
}

impl Database {
    /// Scan with default flags; see [`scan`]
    pub fn scan<F>(&self, data: &[u8], scratch: &mut Scratch, on_match: F) -> Result<ScanOutcome>
    where
        F: FnMut(&MatchEvent) -> Matching,
    {
        scan(self, data, 0, scratch, on_match)
    }

    /// Collect every match into a vector
    pub fn find_all(&self, data: &[u8], scratch: &mut Scratch) -> Result<Vec<MatchEvent>> {
        let mut events = Vec::new();
        scan(self, data, 0, scratch, |event| {
            events.push(*event);
            Matching::Continue
        })?;
        Ok(events)
    }
}
