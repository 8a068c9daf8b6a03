//! Rule checkers (C3): pure inspectors of a `(SqlContext, ValidationResult)`
//! pair, grouped into the three families the design lays out — structural,
//! pagination-family, and text-pattern.

pub mod pagination_family;
pub mod structural;
pub mod text_pattern;

use crate::{context::SqlContext, violation::ValidationResult};

/// A single-purpose inspector. Implementations must be pure over `context`
/// (no mutation of it or of its AST) and safe to invoke concurrently across
/// different contexts — the orchestrator relies on this to run independent
/// `validate()` calls on separate threads without synchronizing checkers.
///
/// Checkers must not panic for normal control flow; a panic is caught by the
/// orchestrator and treated as "this checker produced no violations."
pub trait Checker: Send + Sync {
    /// Stable identifier used for ordering, logging, and `ViolationInfo.kind`.
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    fn check(&self, context: &SqlContext, result: &mut ValidationResult);
}
