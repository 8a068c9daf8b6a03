//! Error types and constructors for the SqlGuard core.
//!
//! This module provides error construction functions that create properly
//! formatted [`AppError`] instances with context-specific messages, mirroring
//! the error taxonomy in the design: parse errors, configuration errors, and
//! the aggregate safety violation raised by the validator facade under the
//! `Block` strategy.

pub use masterror::{AppError, AppResult};

use crate::violation::ViolationInfo;

/// Create a SQL parse error with optional position info.
///
/// Used by the parser facade (C1) in strict mode, where a parse failure
/// propagates instead of falling back to an `Unparsed` sentinel.
pub fn parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("SQL parse error", &msg))
}

/// Create a configuration error.
///
/// Raised by `RulesConfig::validate` at startup, never by the `validate`
/// runtime path (spec §7: "not a runtime concern for the validate path").
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Aggregate error surfaced to the host when the configured
/// [`crate::violation::ViolationStrategy`] is `Block` and the result
/// contains one or more violations.
#[derive(Debug, Clone)]
pub struct SqlSafetyViolation {
    pub violations: Vec<ViolationInfo>
}

impl std::fmt::Display for SqlSafetyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SQL safety violation: {} violation(s) found",
            self.violations.len()
        )
    }
}

impl std::error::Error for SqlSafetyViolation {}

/// Wrap a non-empty violation list as the `AppError` the validator facade (C7)
/// raises under the `Block` strategy.
pub fn safety_violation_error(violations: Vec<ViolationInfo>) -> AppError {
    let violation = SqlSafetyViolation {
        violations
    };
    AppError::service(violation.to_string())
}

/// Format a SQL error with position highlighting extracted from the
/// underlying parser error message, the same way sqlparser's own
/// `Line: X, Column Y` suffix can be surfaced to callers.
fn format_sql_error(prefix: &str, message: &str) -> String {
    if let Some(pos) = extract_position(message) {
        format!(
            "{prefix} at line {line}, column {column}:\n  {message}",
            prefix = prefix,
            line = pos.line,
            column = pos.column,
            message = message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

/// Extract position from a sqlparser error message ("Line: X, Column Y").
fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";
    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let rest = message.get(line_num_start..)?;
    let col_start = rest.find(col_marker)?;
    let line_str = message.get(line_num_start..line_num_start + col_start)?;
    let col_num_start = line_num_start + col_start + col_marker.len();
    let col_rest = message.get(col_num_start..)?;
    let col_end = col_rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(col_rest.len());
    let col_str = message.get(col_num_start..col_num_start + col_end)?;
    let line = line_str.parse().ok()?;
    let column = col_str.parse().ok()?;
    Some(SqlPosition {
        line,
        column
    })
}
