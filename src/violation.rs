//! Violation types, the intra-pipeline signalling bag, and the host-facing
//! strategy that decides what happens once a [`ValidationResult`] is built.
//!
//! Mirrors the shape of the teacher's `rules::types::{Severity, Violation,
//! AnalysisReport}`: an ordered severity enum, a flat violation struct
//! carrying a `'static` rule identifier, and an aggregate report type —
//! generalized here to carry the signalling bag and typed diagnostic fields
//! the orchestrator and pagination checkers need.

use std::collections::HashMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Severity of a single violation, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Info,
    Low,
    Medium,
    High,
    Critical
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL")
        }
    }
}

/// Line/column location of a violation within the checked SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line:   usize,
    pub column: usize
}

/// A single rule violation found during validation.
///
/// Immutable once constructed — checkers build these and push them onto
/// `ValidationResult.violations`; nothing downstream mutates a `ViolationInfo`
/// in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationInfo {
    /// Unique rule identifier (e.g. `"NoWhereClause"`, `"DeepPagination"`).
    pub kind:            &'static str,
    pub risk_level:       RiskLevel,
    pub message:         String,
    pub suggestion:      Option<String>,
    pub location:        Option<SourceLocation>,
    /// Offset observed by a pagination checker, if any. Diagnostic only —
    /// does not feed back into any checker's pass/fail decision.
    pub offset_observed: Option<u64>,
    /// Limit/page-size observed by a pagination checker, if any. Diagnostic
    /// only, same as `offset_observed`.
    pub limit_observed:  Option<u64>
}

impl ViolationInfo {
    pub fn new(kind: &'static str, risk_level: RiskLevel, message: impl Into<String>) -> Self {
        Self {
            kind,
            risk_level,
            message: message.into(),
            suggestion: None,
            location: None,
            offset_observed: None,
            limit_observed: None
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.location = Some(SourceLocation {
            line,
            column
        });
        self
    }

    pub fn with_offset_observed(mut self, offset: u64) -> Self {
        self.offset_observed = Some(offset);
        self
    }

    pub fn with_limit_observed(mut self, limit: u64) -> Self {
        self.limit_observed = Some(limit);
        self
    }
}

/// Intra-pipeline signalling key read by the pagination checker family.
///
/// The only signal documented to cross checker boundaries: `NoConditionPagination`
/// sets this to suppress `DeepPagination`/`LargePageSize`/`MissingOrderBy` on
/// the same call. Everything else checkers want to communicate becomes a
/// typed field on `ViolationInfo` instead.
pub const EARLY_RETURN_KEY: &str = "earlyReturn";

/// Scoped, per-call signalling bag threaded through the orchestrator.
///
/// Discarded after strategy application (spec invariant: `details` never
/// escapes the core). Kept as a generic string-keyed map rather than a fixed
/// struct so new checkers can introduce ad hoc signals without changing this
/// type, mirroring the source's own "typed key/value bag" description.
#[derive(Debug, Clone, Default)]
pub struct DetailsBag {
    entries: HashMap<CompactString, bool>
}

impl DetailsBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn early_return(&self) -> bool {
        self.entries
            .get(EARLY_RETURN_KEY)
            .copied()
            .unwrap_or(false)
    }

    pub fn set_early_return(&mut self) {
        self.entries.insert(CompactString::new(EARLY_RETURN_KEY), true);
    }

    pub fn set(&mut self, key: &str, value: bool) {
        self.entries.insert(CompactString::new(key), value);
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }
}

/// Result of a single `validate()` call.
///
/// `details` is scoped to the call and must not be read by the host; only
/// `passed` and `violations` are meant to cross the library boundary, which
/// is why `details` does not derive `Serialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub violations: Vec<ViolationInfo>,
    #[serde(skip)]
    #[serde(default)]
    details:        DetailsBagSkip
}

/// Wrapper so `DetailsBag` (which intentionally has no `Serialize` impl) can
/// sit inside a derive-serde struct as a skipped field.
#[derive(Debug, Clone, Default)]
struct DetailsBagSkip(DetailsBag);

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
            details:    DetailsBagSkip(DetailsBag::new())
        }
    }

    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn push(&mut self, violation: ViolationInfo) {
        self.violations.push(violation);
    }

    pub fn details(&self) -> &DetailsBag {
        &self.details.0
    }

    pub fn details_mut(&mut self) -> &mut DetailsBag {
        &mut self.details.0
    }

    pub fn highest_risk(&self) -> Option<RiskLevel> {
        self.violations.iter().map(|v| v.risk_level).max()
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-visible action taken once a `ValidationResult` is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViolationStrategy {
    /// Raise `SqlSafetyViolation` instead of returning the result.
    Block,
    /// Return the result to the caller; the caller decides what to do.
    Warn,
    /// Log violations via `tracing` and return the result.
    Log
}
