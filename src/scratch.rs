//! Per-scan scratch space
//!
//! A [`Scratch`] is the mutable workspace one in-flight scan call owns
//! exclusively: two VM thread sets, the epsilon-closure stack, and a staging
//! buffer for matches at the current offset. Allocating it once and reusing
//! it across many scans avoids per-call allocation entirely; its working
//! state is fully reset at the start of every scan, never carried over.
//!
//! Exclusivity is enforced by the borrow checker: [`crate::scan`] takes
//! `&mut Scratch`, so the same instance can never serve two scans at once.

use crate::database::Database;
use crate::error::{EngineError, Result};

/// A VM thread: an instruction plus the offset its match attempt started at
#[derive(Debug, Clone, Copy)]
pub(crate) struct Thread {
    pub(crate) inst: u32,
    pub(crate) start: u64,
}

/// Sparse set of VM threads, keyed by instruction index
///
/// Constant-time insert, membership test, and clear; iteration in insertion
/// order. The sparse array may hold stale indices; validity is established
/// by the dense-side back-check.
pub(crate) struct ThreadSet {
    sparse: Vec<u32>,
    dense: Vec<Thread>,
}

impl ThreadSet {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            sparse: vec![0; capacity],
            dense: Vec::with_capacity(capacity),
        }
    }

    fn grow(&mut self, capacity: usize) {
        if capacity > self.sparse.len() {
            self.sparse.resize(capacity, 0);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.dense.clear();
    }

    /// Insert a thread, keeping the leftmost start when it already exists.
    /// Returns true when the thread is new or its start improved, i.e. when
    /// the caller should (re)visit the instruction's epsilon successors.
    pub(crate) fn insert(&mut self, inst: u32, start: u64) -> bool {
        let slot = self.sparse[inst as usize] as usize;
        if let Some(existing) = self.dense.get_mut(slot) {
            if existing.inst == inst {
                if start < existing.start {
                    existing.start = start;
                    return true;
                }
                return false;
            }
        }
        self.sparse[inst as usize] = self.dense.len() as u32;
        self.dense.push(Thread { inst, start });
        true
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Thread> {
        self.dense.iter()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

/// Mutable per-call workspace for the scan engine
///
/// Sized from a database's [`Database::scratch_requirement`]. A scratch is
/// compatible with the database it was allocated for and with any database
/// of equal or smaller requirement; the scan entry point checks this
/// defensively and reports [`EngineError::ScratchMismatch`] otherwise.
pub struct Scratch {
    capacity: usize,
    pub(crate) clist: ThreadSet,
    pub(crate) nlist: ThreadSet,
    pub(crate) stack: Vec<u32>,
    pub(crate) staged: Vec<(u32, u64)>,
}

impl Scratch {
    /// Allocate scratch sized for `db`
    pub fn for_database(db: &Database) -> Self {
        let capacity = db.scratch_requirement();
        Self {
            capacity,
            clist: ThreadSet::with_capacity(capacity),
            nlist: ThreadSet::with_capacity(capacity),
            stack: Vec::with_capacity(capacity),
            staged: Vec::new(),
        }
    }

    /// Enlarge this scratch in place so it can also serve `db`
    ///
    /// Reuses the existing allocation where possible; a no-op when the
    /// scratch is already large enough. This mirrors the reference
    /// allocator's incremental-growth behavior, so one scratch can serve
    /// several databases if sized for the largest.
    pub fn grow_for(&mut self, db: &Database) {
        let required = db.scratch_requirement();
        if required > self.capacity {
            self.clist.grow(required);
            self.nlist.grow(required);
            self.capacity = required;
        }
    }

    /// Instruction capacity this scratch was allocated for
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reject scratch/database pairings the scratch is too small for
    pub(crate) fn check_compatible(&self, db: &Database) -> Result<()> {
        let required = db.scratch_requirement();
        if required > self.capacity {
            return Err(EngineError::ScratchMismatch {
                required,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Wipe all working state; called at the start of every scan
    pub(crate) fn reset(&mut self) {
        self.clist.clear();
        self.nlist.clear();
        self.stack.clear();
        self.staged.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, ScanMode};
    use crate::pattern::Pattern;

    fn db_for(patterns: &[&str]) -> Database {
        let patterns: Vec<Pattern> = patterns
            .iter()
            .enumerate()
            .map(|(i, p)| Pattern::new(*p, i as u32))
            .collect();
        compile(&patterns, ScanMode::Block).unwrap()
    }

    #[test]
    fn thread_set_insert_and_merge() {
        let mut set = ThreadSet::with_capacity(8);
        assert!(set.insert(3, 10));
        assert!(set.insert(3, 5)); // improved start, signal a revisit
        assert!(!set.insert(3, 8)); // worse start, ignored
        assert!(set.insert(7, 2));
        assert_eq!(set.iter().count(), 2);

        let threads: Vec<_> = set.iter().copied().collect();
        assert_eq!(threads[0].inst, 3);
        assert_eq!(threads[0].start, 5);

        set.clear();
        assert!(set.is_empty());
        assert!(set.insert(3, 99));
    }

    #[test]
    fn sized_from_database() {
        let db = db_for(&["abc", "xy+z"]);
        let scratch = Scratch::for_database(&db);
        assert_eq!(scratch.capacity(), db.scratch_requirement());
        assert!(scratch.check_compatible(&db).is_ok());
    }

    #[test]
    fn undersized_scratch_rejected() {
        let small = db_for(&["ab"]);
        let large = db_for(&["abcdefghij[0-9]{4,8}klmno", "zz(aa|bb|cc)+yy"]);

        let scratch = Scratch::for_database(&small);
        match scratch.check_compatible(&large) {
            Err(EngineError::ScratchMismatch { required, capacity }) => {
                assert_eq!(required, large.scratch_requirement());
                assert_eq!(capacity, small.scratch_requirement());
            }
            other => panic!("expected mismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn grow_in_place() {
        let small = db_for(&["ab"]);
        let large = db_for(&["abcdefghij[0-9]{4,8}klmno", "zz(aa|bb|cc)+yy"]);

        let mut scratch = Scratch::for_database(&small);
        assert!(scratch.check_compatible(&large).is_err());

        scratch.grow_for(&large);
        assert!(scratch.check_compatible(&large).is_ok());
        // Still serves the smaller database
        assert!(scratch.check_compatible(&small).is_ok());

        // Growing for the smaller database again is a no-op
        let capacity = scratch.capacity();
        scratch.grow_for(&small);
        assert_eq!(scratch.capacity(), capacity);
    }
}
