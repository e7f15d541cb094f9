//! Reporting problems found while reading or validating state tables.
//!
//! Decoding untrusted data never panics and never returns early with a
//! bare error: every finding is handed to a [`DiagnosticSink`] so that a
//! caller can validate many subtables in one pass and inspect everything
//! that was wrong with them.

use std::fmt::Display;

/// How serious a [`Diagnostic`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Stable identifiers for the diagnostics emitted by this crate.
pub mod codes {
    pub const CANNOT_CONTINUE: &str = "V0002";
    pub const INSUFFICIENT_BYTES: &str = "V0004";
    pub const TOO_FEW_CLASSES: &str = "V0634";
    pub const BAD_OFFSET: &str = "V0635";
    pub const MISSING_ENTRY_TABLE: &str = "V0636";
    pub const MISSING_STATE_ARRAY: &str = "V0637";
    pub const MISSING_CLASS_TABLE: &str = "V0638";
    pub const MISSING_PAYLOAD_TABLE: &str = "V0639";
    pub const ENTRY_INDEX_OUT_OF_RANGE: &str = "V0676";
    pub const INFINITE_LOOP: &str = "V0678";
    pub const CLASS_INDEX_OUT_OF_RANGE: &str = "V0714";
    pub const BAD_LOOKUP_ORDER: &str = "V0715";
    pub const LOOKUP_OFFSET_COLLISION: &str = "V0716";
    pub const EMPTY_CLASS_TABLE: &str = "V0717";
    pub const EXPLICIT_OUT_OF_BOUNDS: &str = "V0718";
    pub const EXPLICIT_FIXED_CLASS: &str = "V0719";
    pub const UNKNOWN_LOOKUP_FORMAT: &str = "V0720";
    pub const BAD_UNIT_SIZE: &str = "V0721";
    pub const STATE_INDEX_OUT_OF_RANGE: &str = "V0724";
    pub const TOO_FEW_STATES: &str = "V0725";
    pub const BAD_NAME_STASH: &str = "V0730";
    pub const NAME_STASH_COUNT: &str = "V0731";
    pub const UNTERMINATED_VALUES: &str = "V0732";
    pub const MISSING_FIXED_STATE: &str = "V0883";
    pub const INCOMPLETE_ROW: &str = "V0884";
    pub const MISSING_FIXED_CLASS: &str = "V0885";
    pub const UNDEFINED_STATE: &str = "V0887";
    pub const UNUSED_CLASS: &str = "V0888";
}

/// A single finding, with its severity, a stable code, and a message.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

/// Something that receives diagnostics.
///
/// Only [`report`][Self::report] must be implemented; the other methods are
/// shorthands that build the [`Diagnostic`].
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);

    fn error(&mut self, code: &'static str, message: String) {
        self.report(Diagnostic::new(Severity::Error, code, message))
    }

    fn warning(&mut self, code: &'static str, message: String) {
        self.report(Diagnostic::new(Severity::Warning, code, message))
    }

    fn info(&mut self, code: &'static str, message: String) {
        self.report(Diagnostic::new(Severity::Info, code, message))
    }

    fn debug(&mut self, code: &'static str, message: String) {
        self.report(Diagnostic::new(Severity::Debug, code, message))
    }
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: impl Display) -> Self {
        Diagnostic {
            severity,
            code,
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{severity} {}: {}", self.code, self.message)
    }
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic)
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for &mut T {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}

/// A sink that collects everything it is given.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Default::default()
    }

    /// `true` if any error-level diagnostic was reported.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.items.iter()
    }

    /// The codes of all reported diagnostics, in order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.items.iter().map(|d| d.code).collect()
    }

    /// The first error-level diagnostic, if any.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.items.iter().find(|d| d.is_error())
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic)
    }
}

/// A sink that forwards diagnostics to the [`log`] crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        let level = match diagnostic.severity {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        };
        log::log!(target: "aat_state", level, "{}: {}", diagnostic.code, diagnostic.message);
    }
}

/// Tracks the number of errors reported through a wrapped sink.
pub(crate) struct Counting<'a, S: DiagnosticSink + ?Sized> {
    inner: &'a mut S,
    errors: usize,
}

impl<'a, S: DiagnosticSink + ?Sized> Counting<'a, S> {
    pub(crate) fn new(inner: &'a mut S) -> Self {
        Counting { inner, errors: 0 }
    }

    pub(crate) fn errors(&self) -> usize {
        self.errors
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Counting<'_, S> {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
        }
        self.inner.report(diagnostic)
    }
}
