//! Graphscan - Block-Mode Multi-Pattern Scanning Engine
//!
//! Graphscan compiles a set of regular-expression patterns into an
//! immutable, serializable database and scans byte buffers against all
//! patterns simultaneously, reporting every match through a synchronous
//! callback.
//!
//! # Quick Start
//!
//! ```rust
//! use graphscan::{compile, Matching, Pattern, ScanMode, Scratch};
//!
//! // Compile patterns into an immutable database
//! let patterns = vec![Pattern::new("foo", 0), Pattern::new("ba[rz]", 1)];
//! let db = compile(&patterns, ScanMode::Block)?;
//!
//! // Allocate scratch once, reuse it across many scans
//! let mut scratch = Scratch::for_database(&db);
//!
//! db.scan(b"foo bar baz", &mut scratch, |event| {
//!     println!("pattern {} matched at offset {}", event.id, event.to);
//!     Matching::Continue
//! })?;
//! # Ok::<(), graphscan::EngineError>(())
//! ```
//!
//! # Model
//!
//! ```text
//! patterns ──compile──▶ Database (immutable, serializable, Sync)
//!                           │
//!                           ├── Scratch::for_database (per-thread workspace)
//!                           │
//!                           └──scan(db, buffer, scratch, callback)
//!                                  │ synchronous, in end-offset order
//!                                  ▼
//!                             MatchEvent { id, from, to }
//! ```
//!
//! - **Block mode**: the whole input is available in one contiguous buffer
//!   per call; offsets are bounded by `u32::MAX`.
//! - **Ordering**: callbacks arrive in non-decreasing end-offset order, ties
//!   broken by ascending pattern id.
//! - **Sharing**: a [`Database`] is read-only after construction and may
//!   serve any number of concurrent scans; each scan owns its [`Scratch`]
//!   exclusively (`&mut`).
//! - **Persistence**: databases serialize to an offset-based binary format
//!   that loads zero-copy via memory mapping ([`Database::open`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Pattern compiler: AST lowering and program serialization
pub mod compiler;
/// Compiled database and on-disk loading
pub mod database;
/// Error types for engine operations
pub mod error;
/// Buffered readers for pattern list files
pub mod file_reader;
/// Serialized graph format definitions
pub mod graph_format;
/// Pattern specification and parsing
pub mod pattern;
/// Block-mode scan engine
pub mod scan;
/// Per-scan scratch space
pub mod scratch;

// Re-exports for consumers

pub use crate::compiler::{compile, ScanMode};
pub use crate::database::{Database, DatabaseInfo};
pub use crate::error::{CompileError, EngineError, Result};
pub use crate::graph_format::MAX_SCAN_LENGTH;
pub use crate::pattern::{Pattern, PatternFlags};
pub use crate::scan::{scan, MatchEvent, Matching, ScanOutcome};
pub use crate::scratch::Scratch;

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
