//! Translation gaps: everything skipped, approximated or left untranslated

use std::fmt;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// A referenced column, relation or logical table was not found
    LookupFailure,
    /// A relation, join or mark kind outside the recognized set
    UnsupportedConstruct,
    /// A column-instance derivation outside the fixed vocabulary
    DerivationUnrecognized,
    /// The identifier allocator ran out of candidates
    NamingExhaustion,
    /// Translated, but with different semantics
    Approximation,
    /// Calculated field formula passed through without translation
    Untranslated,
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GapKind::LookupFailure => "lookup_failure",
            GapKind::UnsupportedConstruct => "unsupported_construct",
            GapKind::DerivationUnrecognized => "derivation_unrecognized",
            GapKind::NamingExhaustion => "naming_exhaustion",
            GapKind::Approximation => "approximation",
            GapKind::Untranslated => "untranslated",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub kind: GapKind,
    /// Source entity the gap is about (relation, column, worksheet, ...)
    pub subject: String,
    pub message: String,
}

/// Ordered log of gaps, mirrored to `tracing` as they are recorded.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct GapReport {
    gaps: Vec<Gap>,
}

impl GapReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: GapKind, subject: impl Into<String>, message: impl Into<String>) {
        let gap = Gap {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        warn!(kind = %gap.kind, subject = %gap.subject, "{}", gap.message);
        self.gaps.push(gap);
    }

    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn of_kind(&self, kind: GapKind) -> impl Iterator<Item = &Gap> {
        self.gaps.iter().filter(move |gap| gap.kind == kind)
    }

    pub fn count(&self, kind: GapKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }
}
