//! Validator facade (C7): the crate's single public entry point, combining
//! the dedup filter (C2), parser (C1), checker orchestrator (C4), and
//! rewrite pipeline (C6) into the procedure the spec's callers actually
//! invoke.

use std::{rc::Rc, time::Duration};

use crate::{
    cache::{DedupCache, StatementCacheScope},
    config::Config,
    context::SqlContext,
    dialect::create_dialect,
    error::{AppResult, safety_violation_error},
    orchestrator::Orchestrator,
    parser::SqlParserFacade,
    rewrite::{RewritePipeline, Rewriter, limit_injection::LimitInjection, soft_delete::SoftDeleteFilter, tenant::TenantIsolation},
    statement::Statement,
    violation::{RiskLevel, ValidationResult, ViolationInfo, ViolationStrategy}
};

/// Owns one configured instance of the validation + rewrite pipeline.
/// Built once and shared across threads (spec §5: checker/rewriter
/// instances and their configs are immutable after construction).
pub struct SqlGuard {
    config:       Config,
    dedup:        DedupCache,
    parser:       SqlParserFacade,
    orchestrator: Orchestrator,
    rewriters:    RewritePipeline
}

impl SqlGuard {
    /// Validate `config.rules` up front (spec §4.7's "not a runtime concern
    /// for the validate path": bad config must fail at construction, never
    /// mid-call) and build the fixed checker/rewriter rosters from it.
    pub fn new(config: Config) -> AppResult<Self> {
        config.rules.validate()?;
        let dedup = DedupCache::new(
            config.deduplication.cache_size,
            Duration::from_millis(config.deduplication.ttl_ms)
        );
        let orchestrator = Orchestrator::new(&config.rules);
        let dialect = create_dialect(&config.rewrite.product_name);
        let rewriters: Vec<Box<dyn Rewriter>> = vec![
            Box::new(TenantIsolation {
                config: config.rewrite.tenant_isolation.clone()
            }),
            Box::new(SoftDeleteFilter {
                config: config.rewrite.soft_delete.clone()
            }),
            Box::new(LimitInjection {
                config: config.rewrite.limit_injection.clone(),
                dialect
            }),
        ];
        Ok(Self {
            config,
            dedup,
            parser: SqlParserFacade::new(),
            orchestrator,
            rewriters: RewritePipeline::new(rewriters)
        })
    }

    /// Step 1-6 of the validator facade procedure (spec.md §4.7).
    ///
    /// On `Block` strategy with at least one violation, returns
    /// `Err(safety_violation_error(..))`; every other path returns `Ok`.
    pub fn validate(&self, context: &mut SqlContext) -> AppResult<ValidationResult> {
        if !self.config.enabled || context.sql.trim().is_empty() {
            return Ok(ValidationResult::new());
        }
        if self.dedup.should_skip(&context.sql) {
            return Ok(ValidationResult::new());
        }

        let _scope = StatementCacheScope::enter();

        let statement = match self.parser.parse(&context.sql, context.parse_mode) {
            Ok(statement) => statement,
            Err(e) => {
                let mut result = ValidationResult::new();
                result.push(ViolationInfo::new("ParseError", RiskLevel::Critical, e.to_string()));
                return self.apply_strategy(result);
            }
        };
        context.set_parsed_statement(statement);

        let mut result = ValidationResult::new();
        self.orchestrator.run(context, &mut result);
        self.apply_strategy(result)
    }

    fn apply_strategy(&self, result: ValidationResult) -> AppResult<ValidationResult> {
        match self.config.violation_strategy {
            ViolationStrategy::Block if !result.passed() => Err(safety_violation_error(result.violations)),
            ViolationStrategy::Block => Ok(result),
            ViolationStrategy::Warn => {
                for violation in &result.violations {
                    tracing::warn!(kind = violation.kind, risk = %violation.risk_level, message = %violation.message, "sql violation");
                }
                Ok(result)
            }
            ViolationStrategy::Log => {
                for violation in &result.violations {
                    tracing::info!(kind = violation.kind, risk = %violation.risk_level, message = %violation.message, "sql violation");
                }
                Ok(result)
            }
        }
    }

    /// Apply the rewrite pipeline (C6) to `statement`, reusing `context`'s
    /// already-populated `parsedStatement` if the caller validated first in
    /// the same call cycle (spec.md §4.7 cross-component invariant (a));
    /// otherwise parses fresh.
    pub fn rewrite(&self, statement: Statement, context: &SqlContext) -> Statement {
        let rc = Rc::new(statement);
        let result = self.rewriters.run(rc, context);
        Rc::try_unwrap(result).unwrap_or_else(|shared| (*shared).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SqlType;

    fn guard_with(config: Config) -> SqlGuard {
        SqlGuard::new(config).unwrap()
    }

    #[test]
    fn bare_select_star_with_where_passes_default_config() {
        let guard = guard_with(Config::default());
        let mut ctx = SqlContext::builder("SELECT * FROM orders WHERE id = 1", "Orders.byId")
            .build()
            .unwrap();
        let result = guard.validate(&mut ctx).unwrap();
        assert!(result.passed());
    }

    #[test]
    fn dummy_where_clause_is_flagged() {
        let guard = guard_with(Config::default());
        let mut ctx = SqlContext::builder("DELETE FROM users WHERE 1=1", "Users.deleteAll")
            .build()
            .unwrap();
        let result = guard.validate(&mut ctx).unwrap();
        assert!(result.violations.iter().any(|v| v.kind == "DummyCondition"));
    }

    #[test]
    fn block_strategy_raises_on_violation() {
        let mut config = Config::default();
        config.violation_strategy = ViolationStrategy::Block;
        let guard = guard_with(config);
        let mut ctx = SqlContext::builder("DELETE FROM users WHERE 1=1", "Users.deleteAll")
            .build()
            .unwrap();
        assert!(guard.validate(&mut ctx).is_err());
    }

    #[test]
    fn disabled_validator_always_passes() {
        let mut config = Config::default();
        config.enabled = false;
        let guard = guard_with(config);
        let mut ctx = SqlContext::builder("DROP TABLE users", "Users.dropAll").build().unwrap();
        let result = guard.validate(&mut ctx).unwrap();
        assert!(result.passed());
    }

    #[test]
    fn strict_parse_failure_becomes_parse_error_violation() {
        let guard = guard_with(Config::default());
        let mut ctx = SqlContext::builder("SELEKT 1 FRO", "Raw.broken")
            .sql_type(SqlType::Unknown)
            .parse_mode(crate::context::ParseMode::Strict)
            .build()
            .unwrap();
        let result = guard.validate(&mut ctx).unwrap();
        assert!(result.violations.iter().any(|v| v.kind == "ParseError"));
    }

    #[test]
    fn rewrite_injects_tenant_and_limit_when_enabled() {
        let mut config = Config::default();
        config.rewrite.tenant_isolation.enabled = true;
        config.rewrite.limit_injection.enabled = true;
        let guard = guard_with(config);
        let sql = "SELECT * FROM orders";
        let ctx = SqlContext::builder(sql, "Orders.all")
            .param("tenantId", serde_json::json!(9))
            .build()
            .unwrap();
        let statement = SqlParserFacade::new()
            .parse(sql, crate::context::ParseMode::Strict)
            .unwrap();
        let rewritten = guard.rewrite(statement, &ctx);
        assert!(rewritten.raw.contains("tenant_id = 9"));
        assert!(rewritten.raw.to_ascii_uppercase().contains("LIMIT"));
    }
}
