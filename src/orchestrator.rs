//! Rule orchestration (C4): builds the fixed checker roster from a
//! [`RulesConfig`] and runs it against one context/result pair in the order
//! the checker families require.
//!
//! Grounded on the teacher's `RuleRunner` (`rules/mod.rs`): a
//! `Vec<Box<dyn Checker>>` built once from config and reused across calls.
//! The teacher runs its rules with `rayon` because independent queries (and
//! independent rules within one query) have no ordering requirement between
//! them; this orchestrator runs sequentially within a single call because two
//! ordering invariants must hold — `NoWhereClause` before `DummyCondition`,
//! and `NoConditionPagination` before the three checkers that read its
//! `earlyReturn` signal. Concurrency instead comes from the host running
//! independent `validate()` calls on independent threads.

use std::panic::{self, AssertUnwindSafe};

use crate::{
    checkers::{Checker, pagination_family, structural, text_pattern},
    config::RulesConfig,
    context::SqlContext,
    violation::{RiskLevel, ValidationResult}
};

/// Builds and runs the checker roster for one [`RulesConfig`].
pub struct Orchestrator {
    checkers: Vec<Box<dyn Checker>>
}

impl Orchestrator {
    /// Assemble the roster and order it per the three ordering rules:
    /// `NoWhereClause` before `DummyCondition`, `NoConditionPagination`
    /// before the three pagination checkers that read its `earlyReturn`
    /// signal, and everything else by risk level descending. The first two
    /// rules hold automatically under a risk-descending sort because in
    /// both pairs the checker required to run first already carries the
    /// higher risk level; a stable sort on registration order below then
    /// gives risk-descending, registration-order-tiebroken output in one
    /// pass, with no special-cased reordering.
    pub fn new(config: &RulesConfig) -> Self {
        let mut ranked: Vec<(RiskLevel, Box<dyn Checker>)> = vec![
            (config.no_where_clause.risk_level, Box::new(structural::NoWhereClause {
                config: config.no_where_clause.clone()
            })),
            (config.dummy_condition.base.risk_level, Box::new(structural::DummyCondition {
                config: config.dummy_condition.clone()
            })),
            (config.no_pagination.base.risk_level, Box::new(pagination_family::NoConditionPagination {
                config: config.no_pagination.base.clone()
            })),
            (config.pagination_abuse.base.risk_level, Box::new(pagination_family::DeepPagination {
                config: config.pagination_abuse.clone()
            })),
            (config.pagination_abuse.base.risk_level, Box::new(pagination_family::LargePageSize {
                config: config.pagination_abuse.clone()
            })),
            (config.missing_order_by.risk_level, Box::new(pagination_family::MissingOrderBy {
                config: config.missing_order_by.clone()
            })),
            (config.logical_pagination.risk_level, Box::new(pagination_family::LogicalPagination {
                config: config.logical_pagination.clone()
            })),
            (config.no_pagination.base.risk_level, Box::new(pagination_family::NoPagination {
                config: config.no_pagination.clone()
            })),
            (config.blacklist_fields.base.risk_level, Box::new(structural::BlacklistField {
                config: config.blacklist_fields.clone()
            })),
            (config.whitelist_fields.base.risk_level, Box::new(structural::WhitelistField {
                config: config.whitelist_fields.clone()
            })),
            (config.denied_table.base.risk_level, Box::new(structural::DeniedTable {
                config: config.denied_table.clone()
            })),
            (config.read_only_table.base.risk_level, Box::new(structural::ReadOnlyTable {
                config: config.read_only_table.clone()
            })),
            (config.dangerous_function.base.risk_level, Box::new(structural::DangerousFunction {
                config: config.dangerous_function.clone()
            })),
            (config.set_operation.base.risk_level, Box::new(structural::SetOperation {
                config: config.set_operation.clone()
            })),
            (config.multi_statement.risk_level, Box::new(structural::MultiStatement {
                config: config.multi_statement.clone()
            })),
            (config.ddl_operation.risk_level, Box::new(structural::DdlOperation {
                config: config.ddl_operation.clone()
            })),
            (config.drop_detected.risk_level, Box::new(structural::DropDetected {
                config: config.drop_detected.clone()
            })),
            (config.truncate_detected.risk_level, Box::new(structural::TruncateDetected {
                config: config.truncate_detected.clone()
            })),
            (config.call_statement.risk_level, Box::new(structural::CallStatement {
                config: config.call_statement.clone()
            })),
            (config.metadata_statement.risk_level, Box::new(structural::MetadataStatement {
                config: config.metadata_statement.clone()
            })),
            (config.set_statement.risk_level, Box::new(structural::SetStatement {
                config: config.set_statement.clone()
            })),
            (config.sql_comment.risk_level, Box::new(text_pattern::SqlComment {
                config: config.sql_comment.clone()
            })),
            (config.into_outfile.risk_level, Box::new(text_pattern::IntoOutfile {
                config: config.into_outfile.clone()
            })),
        ];
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        let checkers = ranked.into_iter().map(|(_, checker)| checker).collect();
        Self {
            checkers
        }
    }

    /// Run every enabled checker against `context`, appending violations to
    /// `result` in roster order. A checker that panics is caught and treated
    /// as "produced no violations"; the panic is logged and does not abort
    /// the remaining roster.
    pub fn run(&self, context: &SqlContext, result: &mut ValidationResult) {
        for checker in &self.checkers {
            if !checker.is_enabled() {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| checker.check(context, result)));
            if let Err(payload) = outcome {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::warn!(
                    checker = checker.name(),
                    reason = %reason,
                    "checker panicked; treated as no violations"
                );
            }
        }
    }
}
