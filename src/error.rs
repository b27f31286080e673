//! Error types for the graphscan library

use std::fmt;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Compilation failure for a specific pattern
///
/// Carries the index of the offending expression (position in the slice
/// handed to the compiler) and a human-readable message. Compile errors are
/// never fatal to the process; the caller decides whether to abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Index of the pattern that failed to compile
    pub expression: usize,
    /// Human-readable description of the failure
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(expression: usize, message: impl Into<String>) -> Self {
        Self {
            expression,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pattern {}: {}", self.expression, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Main error type for engine operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Pattern compilation failed
    Compile(CompileError),

    /// I/O errors
    Io(String),

    /// Memory mapping errors
    Mmap(String),

    /// Serialized graph format errors (bad magic, version, bounds, checksum)
    Format(String),

    /// Scratch was allocated for a smaller database than the one being scanned
    ScratchMismatch {
        /// Instruction capacity the scan requires
        required: usize,
        /// Instruction capacity the scratch was allocated with
        capacity: usize,
    },

    /// Input buffer exceeds the engine's 32-bit offset range
    BufferTooLarge {
        /// Length of the rejected buffer
        length: usize,
        /// Maximum scannable length
        max: usize,
    },

    /// Resource limit exceeded (e.g., program too large)
    ResourceLimit(String),

    /// Invalid argument passed to an engine entry point
    InvalidArgument(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Compile(err) => write!(f, "Compile error: {}", err),
            EngineError::Io(msg) => write!(f, "I/O error: {}", msg),
            EngineError::Mmap(msg) => write!(f, "Memory mapping error: {}", msg),
            EngineError::Format(msg) => write!(f, "Format error: {}", msg),
            EngineError::ScratchMismatch { required, capacity } => write!(
                f,
                "Scratch mismatch: database requires capacity for {} instructions, \
                 scratch was allocated for {}",
                required, capacity
            ),
            EngineError::BufferTooLarge { length, max } => write!(
                f,
                "Buffer too large: {} bytes exceeds the engine's {} byte limit",
                length, max
            ),
            EngineError::ResourceLimit(msg) => write!(f, "Resource limit exceeded: {}", msg),
            EngineError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<CompileError> for EngineError {
    fn from(err: CompileError) -> Self {
        EngineError::Compile(err)
    }
}
