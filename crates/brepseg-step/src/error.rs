//! Error types for STEP face traversal.

use thiserror::Error;

/// Errors that can occur while reading faces from a STEP file.
#[derive(Error, Debug)]
pub enum StepError {
    /// I/O error reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected character or malformed token.
    #[error("Lexer error at line {line}, column {col}: {message}")]
    Lexer {
        /// Line number (1-indexed).
        line: usize,
        /// Column number (1-indexed).
        col: usize,
        /// Error message.
        message: String,
    },

    /// Unexpected token or malformed structure.
    #[error("Parser error{}: {message}", entity_id.map(|id| format!(" at entity #{id}")).unwrap_or_default())]
    Parser {
        /// Entity ID where the error occurred, if known.
        entity_id: Option<u64>,
        /// Error message.
        message: String,
    },

    /// A reference points at an entity that is not in the DATA section.
    #[error("Missing entity reference: #{0}")]
    MissingEntity(u64),

    /// An entity has the wrong type for its position in the topology.
    #[error("Type mismatch at #{id}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Entity id that had the wrong type.
        id: u64,
        /// Expected type name(s).
        expected: String,
        /// Actual type name.
        actual: String,
    },

    /// An entity argument is missing or has the wrong shape.
    #[error("Malformed argument {index} of #{id}: {message}")]
    BadArgument {
        /// Entity id.
        id: u64,
        /// Argument position (0-indexed).
        index: usize,
        /// What was wrong.
        message: String,
    },

    /// No B-rep solid entities in the file.
    #[error("No solids found in STEP file")]
    NoSolids,
}

impl StepError {
    /// Create a lexer error.
    pub fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(entity_id: Option<u64>, message: impl Into<String>) -> Self {
        Self::Parser {
            entity_id,
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(id: u64, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            id,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a malformed argument error.
    pub fn bad_argument(id: u64, index: usize, message: impl Into<String>) -> Self {
        Self::BadArgument {
            id,
            index,
            message: message.into(),
        }
    }
}
