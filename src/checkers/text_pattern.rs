//! Text-pattern checkers: operate on the raw SQL string rather than the
//! parsed AST, so they tolerate lenient-mode `Unparsed` input the same way
//! the spec requires.

use std::sync::LazyLock;

use regex::Regex;

use super::Checker;
use crate::{config::CheckerConfig, context::SqlContext, violation::{ValidationResult, ViolationInfo}};

/// Matches `--` line comments and `/* ... */` block comments. Deliberately
/// coarse: it does not track string-literal state, so a `--` inside a
/// string literal is a false positive the checker accepts in exchange for
/// running on syntactically invalid SQL the parser rejected.
static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(--[^\n]*)|(/\*[\s\S]*?\*/)").expect("valid regex"));

static INTO_OUTFILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bINTO\s+(OUTFILE|DUMPFILE)\b").expect("valid regex"));

pub struct SqlComment {
    pub config: CheckerConfig
}

impl Checker for SqlComment {
    fn name(&self) -> &'static str {
        "SqlComment"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        if COMMENT_REGEX.is_match(&context.sql) {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "SQL text contains a comment token"
            ));
        }
    }
}

pub struct IntoOutfile {
    pub config: CheckerConfig
}

impl Checker for IntoOutfile {
    fn name(&self) -> &'static str {
        "IntoOutfile"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        if INTO_OUTFILE_REGEX.is_match(&context.sql) {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "SQL text contains INTO OUTFILE/DUMPFILE"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::RiskLevel;

    fn ctx(sql: &str) -> SqlContext {
        SqlContext::builder(sql, "Reports.export").build().unwrap()
    }

    #[test]
    fn sql_comment_detects_line_comment() {
        let checker = SqlComment {
            config: CheckerConfig::new(true, RiskLevel::Medium)
        };
        let mut result = ValidationResult::new();
        checker.check(&ctx("SELECT * FROM users -- drop audit trail"), &mut result);
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn sql_comment_ignores_clean_query() {
        let checker = SqlComment {
            config: CheckerConfig::new(true, RiskLevel::Medium)
        };
        let mut result = ValidationResult::new();
        checker.check(&ctx("SELECT * FROM users WHERE id = 1"), &mut result);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn into_outfile_detects_mysql_export() {
        let checker = IntoOutfile {
            config: CheckerConfig::new(true, RiskLevel::Critical)
        };
        let mut result = ValidationResult::new();
        checker.check(
            &ctx("SELECT * FROM users INTO OUTFILE '/tmp/dump.csv'"),
            &mut result
        );
        assert_eq!(result.violations.len(), 1);
    }
}
