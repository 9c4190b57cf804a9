// Error types shared by the library modules. The binary wraps these in
// `anyhow` and prints them; nothing in here ever exits the process.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Field-level validation failure. Each variant names the rule that was
/// violated so the UI can print it and re-prompt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: String },

    #[error("{field} must contain only letters and single spaces between words (got {value:?})")]
    InvalidName { field: String, value: String },

    #[error("{field} must be between {min} and {max} characters long")]
    Length {
        field: String,
        min: usize,
        max: usize,
    },

    #[error("{field} must be at least {min} characters long")]
    TooShort { field: String, min: usize },

    #[error("roll number must be letters and digits only (got {0:?})")]
    InvalidRollNumber(String),

    #[error("a student with roll number {0} already exists")]
    DuplicateRollNumber(String),

    #[error("{field} must be a whole number between {min} and {max} (got {value:?})")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        value: String,
    },

    #[error("{field} must be exactly {expected} digits (got {value:?})")]
    InvalidPhone {
        field: String,
        expected: usize,
        value: String,
    },

    #[error("invalid email address {0:?}")]
    InvalidEmail(String),

    #[error("email address is longer than {0} characters")]
    EmailTooLong(usize),

    #[error("email domain {domain:?} is not allowed (use one of: {allowed})")]
    DisallowedDomain { domain: String, allowed: String },

    #[error("{field} must contain at least one letter and one digit")]
    InvalidAddress { field: String },

    #[error("{field} must contain only letters and digits (got {value:?})")]
    NotAlphanumeric { field: String, value: String },

    #[error("{field}: cannot read {value:?} as {expected}")]
    TypeMismatch {
        field: String,
        expected: String,
        value: String,
    },

    #[error("invalid column name {0:?}: must be non-empty, trimmed, and free of ',' ':' and line breaks")]
    InvalidColumnName(String),

    #[error("unknown column type {0:?} (expected string, integer or float)")]
    UnknownType(String),

    #[error("missing value for column {0}")]
    MissingField(String),

    #[error("column {0} is not part of the schema")]
    UnknownField(String),
}

/// Every failure the roster library can report.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{what} {name:?} not found")]
    NotFound { what: &'static str, name: String },

    #[error("column {0:?} already exists")]
    DuplicateColumn(String),

    #[error("column {0:?} identifies students and cannot be removed or replaced")]
    ProtectedColumn(String),

    #[error("line {line}: bad schema header: {reason}")]
    SchemaParse { line: usize, reason: String },

    #[error("line {line} (roll number {roll_number:?}): {reason}")]
    RowParse {
        line: usize,
        roll_number: String,
        reason: String,
    },

    #[error("file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl RosterError {
    pub fn student_not_found(roll_number: &str) -> Self {
        RosterError::NotFound {
            what: "student",
            name: roll_number.to_string(),
        }
    }

    pub fn column_not_found(name: &str) -> Self {
        RosterError::NotFound {
            what: "column",
            name: name.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RosterError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
