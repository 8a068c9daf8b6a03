//! Pagination-family checkers (C3.B): all five consult the pagination
//! classification (C5) and the `earlyReturn` signal set by
//! `NoConditionPagination`.

use super::Checker;
use crate::{
    config::{CheckerConfig, NoPaginationConfig, PaginationAbuseConfig},
    context::SqlContext,
    pagination::{PaginationClassification, classify},
    statement::StatementKind,
    violation::{ValidationResult, ViolationInfo}
};

fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let value = value.to_ascii_lowercase();
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value
    }
}

pub struct LogicalPagination {
    pub config: CheckerConfig
}

impl Checker for LogicalPagination {
    fn name(&self) -> &'static str {
        "LogicalPagination"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if classify(stmt, context) != PaginationClassification::Logical {
            return;
        }
        let mut v = ViolationInfo::new(
            self.name(),
            self.config.risk_level,
            "pagination parameters present but no database-level LIMIT applied"
        );
        if let Some(rb) = context.hints.row_bounds {
            v = v.with_offset_observed(rb.offset).with_limit_observed(rb.limit);
        }
        result.push(v);
    }
}

pub struct NoConditionPagination {
    pub config: CheckerConfig
}

impl Checker for NoConditionPagination {
    fn name(&self) -> &'static str {
        "NoConditionPagination"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if classify(stmt, context) != PaginationClassification::Physical {
            return;
        }
        let dummy_where = !stmt.has_where || stmt.where_cols.is_empty();
        if dummy_where {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "paginated query has no (or only a dummy) WHERE clause"
            ));
            result.details_mut().set_early_return();
        }
    }
}

pub struct DeepPagination {
    pub config: PaginationAbuseConfig
}

impl Checker for DeepPagination {
    fn name(&self) -> &'static str {
        "DeepPagination"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if classify(stmt, context) != PaginationClassification::Physical {
            return;
        }
        if result.details().early_return() {
            return;
        }
        if let Some(offset) = stmt.offset
            && offset > self.config.max_offset
        {
            result.push(
                ViolationInfo::new(
                    self.name(),
                    self.config.base.risk_level,
                    format!("OFFSET {offset} exceeds configured maximum {}", self.config.max_offset)
                )
                .with_offset_observed(offset)
            );
        }
    }
}

pub struct LargePageSize {
    pub config: PaginationAbuseConfig
}

impl Checker for LargePageSize {
    fn name(&self) -> &'static str {
        "LargePageSize"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if classify(stmt, context) != PaginationClassification::Physical {
            return;
        }
        if result.details().early_return() {
            return;
        }
        if let Some(limit) = stmt.limit
            && limit > self.config.max_page_size
        {
            result.push(
                ViolationInfo::new(
                    self.name(),
                    self.config.base.risk_level,
                    format!(
                        "page size {limit} exceeds configured maximum {}",
                        self.config.max_page_size
                    )
                )
                .with_limit_observed(limit)
            );
        }
    }
}

pub struct MissingOrderBy {
    pub config: CheckerConfig
}

impl Checker for MissingOrderBy {
    fn name(&self) -> &'static str {
        "MissingOrderBy"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if classify(stmt, context) != PaginationClassification::Physical {
            return;
        }
        if result.details().early_return() {
            return;
        }
        if stmt.order_cols.is_empty() {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "paginated query has no ORDER BY clause; page contents are unstable"
            ));
        }
    }
}

pub struct NoPagination {
    pub config: NoPaginationConfig
}

impl Checker for NoPagination {
    fn name(&self) -> &'static str {
        "NoPagination"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if classify(stmt, context) != PaginationClassification::None
            || stmt.kind != StatementKind::Select
        {
            return;
        }

        if self
            .config
            .whitelist_mapper_ids
            .iter()
            .any(|p| wildcard_match(p, &context.mapper_id))
        {
            return;
        }
        if stmt
            .tables
            .iter()
            .any(|t| self.config.whitelist_tables.iter().any(|w| wildcard_match(w, t)))
        {
            return;
        }
        if is_unique_key_lookup(stmt, &self.config.unique_key_fields) {
            return;
        }

        let blacklist_only = !stmt.where_cols.is_empty()
            && stmt
                .where_cols
                .iter()
                .all(|col| self.config.blacklist_fields.iter().any(|b| wildcard_match(b, col)));

        let risk = if !stmt.has_where || stmt.where_cols.is_empty() {
            // dummy/tautological WHERE counts as "no effective condition"
            Some(self.config.base.risk_level)
        } else if blacklist_only {
            Some(crate::violation::RiskLevel::High)
        } else if self.config.enforce_for_all_queries {
            Some(crate::violation::RiskLevel::Medium)
        } else {
            None
        };

        if let Some(risk) = risk {
            result.push(ViolationInfo::new(
                self.name(),
                risk,
                "SELECT has no pagination and no LIMIT; full table scan risk"
            ));
        }
    }
}

/// A WHERE clause is a unique-key lookup when every referenced column is one
/// of the configured unique-key fields (default: `id`) — e.g. `WHERE id = ?`.
fn is_unique_key_lookup(stmt: &crate::statement::Statement, unique_key_fields: &[String]) -> bool {
    !stmt.where_cols.is_empty()
        && stmt
            .where_cols
            .iter()
            .all(|c| unique_key_fields.iter().any(|k| k.eq_ignore_ascii_case(c)))
}

#[cfg(test)]
mod tests {
    use sqlparser::{dialect::GenericDialect, parser::Parser};

    use super::*;
    use crate::{context::SqlContext, statement::Statement, violation::RiskLevel};

    fn ctx_for(sql: &str) -> SqlContext {
        let stmt = Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0);
        let mut ctx = SqlContext::builder(sql, "Reports.page").build().unwrap();
        ctx.set_parsed_statement(Statement::from_ast(sql.to_string(), stmt));
        ctx
    }

    #[test]
    fn no_condition_pagination_sets_early_return() {
        let ctx = ctx_for("SELECT * FROM users LIMIT 50");
        let checker = NoConditionPagination {
            config: CheckerConfig::new(true, RiskLevel::Critical)
        };
        let mut result = ValidationResult::new();
        checker.check(&ctx, &mut result);
        assert_eq!(result.violations.len(), 1);
        assert!(result.details().early_return());
    }

    #[test]
    fn deep_pagination_skips_when_early_return_set() {
        let ctx = ctx_for("SELECT * FROM users LIMIT 50 OFFSET 999999");
        let mut result = ValidationResult::new();
        result.details_mut().set_early_return();
        let checker = DeepPagination {
            config: crate::config::RulesConfig::default().pagination_abuse
        };
        checker.check(&ctx, &mut result);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn deep_pagination_fires_past_max_offset() {
        let ctx = ctx_for("SELECT * FROM users WHERE status = 1 LIMIT 50 OFFSET 999999");
        let mut result = ValidationResult::new();
        let checker = DeepPagination {
            config: crate::config::RulesConfig::default().pagination_abuse
        };
        checker.check(&ctx, &mut result);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].offset_observed, Some(999_999));
    }

    #[test]
    fn missing_order_by_fires_without_order_clause() {
        let ctx = ctx_for("SELECT * FROM users WHERE status = 1 LIMIT 50");
        let mut result = ValidationResult::new();
        let checker = MissingOrderBy {
            config: CheckerConfig::new(true, RiskLevel::Low)
        };
        checker.check(&ctx, &mut result);
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn no_pagination_exempts_unique_key_lookup() {
        let ctx = ctx_for("SELECT * FROM users WHERE id = 5");
        let mut result = ValidationResult::new();
        let checker = NoPagination {
            config: crate::config::RulesConfig::default().no_pagination
        };
        checker.check(&ctx, &mut result);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn no_pagination_flags_full_scan() {
        let ctx = ctx_for("SELECT * FROM users");
        let mut result = ValidationResult::new();
        let checker = NoPagination {
            config: crate::config::RulesConfig::default().no_pagination
        };
        checker.check(&ctx, &mut result);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].risk_level, RiskLevel::Critical);
    }

    #[test]
    fn no_pagination_flags_blacklist_only_where_as_high_even_when_not_enforced() {
        let ctx = ctx_for("SELECT * FROM users WHERE status = 1");
        let mut result = ValidationResult::new();
        let mut config = crate::config::RulesConfig::default().no_pagination;
        config.blacklist_fields.insert("status".to_string());
        config.enforce_for_all_queries = false;
        let checker = NoPagination {
            config
        };
        checker.check(&ctx, &mut result);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].risk_level, RiskLevel::High);
    }
}
