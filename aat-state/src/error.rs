//! Errors returned by reading, building and renaming

use std::fmt::Display;

use crate::{
    diagnostics::Diagnostic,
    lookup::LookupFormat,
    state_table::SubtableKind,
};

/// A state table could not be read.
///
/// This is returned by [`StateTable::read`][crate::StateTable::read], and
/// carries the first fatal problem encountered. Use
/// [`StateTable::read_validated`][crate::StateTable::read_validated] to see
/// every problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    diagnostic: Diagnostic,
}

/// A state table could not be compiled.
///
/// These indicate a table that was constructed incorrectly; they cannot
/// occur for a table produced by decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The kind has no payload encoding.
    UnsupportedKind(SubtableKind),
    /// A defined state has no entry for a class.
    MissingCell { state: String, class: String },
    /// An entry targets a state with no row.
    UndefinedState { from: String, target: String },
    /// An entry's payload does not belong to the table's kind.
    PayloadMismatch { state: String, class: String },
    /// A fixed state has no row.
    MissingFixedState(&'static str),
    /// There are more entries, states or lookups than fit in 16 bits.
    TooMany(&'static str),
    /// An offset does not fit in its field.
    OffsetOverflow,
    /// A pinned lookup format cannot encode the data.
    UnrepresentableLookup(LookupFormat),
}

/// A rename could not be applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameError {
    /// The name is one of the fixed state or class names.
    Fixed(String),
    /// Two names would become the same.
    Collision(String),
}

impl DecodeError {
    pub(crate) fn new(diagnostic: Diagnostic) -> Self {
        DecodeError { diagnostic }
    }

    /// The diagnostic that stopped decoding.
    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    /// Shorthand for the diagnostic's code.
    pub fn code(&self) -> &'static str {
        self.diagnostic.code
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to read state table: {}", self.diagnostic)
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::UnsupportedKind(kind) => {
                write!(f, "cannot compile {kind} subtables")
            }
            BuildError::MissingCell { state, class } => {
                write!(f, "state '{state}' has no entry for class '{class}'")
            }
            BuildError::UndefinedState { from, target } => {
                write!(f, "state '{from}' transitions to undefined state '{target}'")
            }
            BuildError::PayloadMismatch { state, class } => write!(
                f,
                "entry for state '{state}', class '{class}' has the wrong payload kind"
            ),
            BuildError::MissingFixedState(name) => write!(f, "missing fixed state '{name}'"),
            BuildError::TooMany(what) => write!(f, "too many {what}"),
            BuildError::OffsetOverflow => write!(f, "an offset overflowed its field"),
            BuildError::UnrepresentableLookup(format) => {
                write!(f, "lookup cannot be written as {format}")
            }
        }
    }
}

impl Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::Fixed(name) => write!(f, "'{name}' is a fixed name"),
            NameError::Collision(name) => write!(f, "the name '{name}' is already in use"),
        }
    }
}

impl std::error::Error for DecodeError {}
impl std::error::Error for BuildError {}
impl std::error::Error for NameError {}
