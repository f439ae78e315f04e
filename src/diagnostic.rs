//! Reports for cells that were stored leniently instead of exactly.
//!
//! A malformed cell never aborts a scan. The field receives the closest
//! value the relational engine would accept (or NULL), and a [`Diagnostic`]
//! describing what happened goes to a [`DiagnosticSink`].

use std::fmt;

/// What kind of lenient conversion took place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Numeric cell was not a number; its numeric prefix (or 0) was stored.
    NotANumber,
    /// Value exceeded the column range and was clamped.
    OutOfRange,
    /// Temporal cell matched no accepted format; the field was set NULL, or
    /// to the zero value in a `NOT NULL` column.
    BadTemporal,
    /// Flag cell was neither `true`/`1` nor `false`/`0`; stored as false.
    BadBoolean,
    /// Enum or set label not declared on the column.
    UnknownLabel,
    /// Structured-text cell is not valid JSON; stored verbatim.
    InvalidJson,
    /// Binary cell lacked a `0x` hex prefix; its raw bytes were stored.
    NotHex,
    /// Data longer than the field capacity was cut.
    Truncated,
    /// NULL arrived for a column declared `NOT NULL`.
    NullInNotNull,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::NotANumber => "not a number",
            DiagnosticKind::OutOfRange => "out of range",
            DiagnosticKind::BadTemporal => "unparseable date/time",
            DiagnosticKind::BadBoolean => "not a boolean",
            DiagnosticKind::UnknownLabel => "unknown label",
            DiagnosticKind::InvalidJson => "invalid json",
            DiagnosticKind::NotHex => "not hex encoded",
            DiagnosticKind::Truncated => "truncated",
            DiagnosticKind::NullInNotNull => "null in not-null column",
        };
        f.write_str(s)
    }
}

/// A lenient conversion on one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub column: String,
    pub kind: DiagnosticKind,
    pub raw: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column '{}': {} (cell {:?})", self.column, self.kind, self.raw)
    }
}

/// Receiver for diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collects diagnostics for later inspection.
impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Default sink: logs each diagnostic as a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("Lenient conversion: {}", diagnostic);
    }
}
