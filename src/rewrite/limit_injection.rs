//! Limit-injection rewriter: caps unbounded `SELECT`s with a dialect-
//! appropriate row limit (C8) when the host hasn't already signaled it
//! manages pagination itself.

use std::{rc::Rc, sync::Arc};

use serde::{Deserialize, Serialize};

use super::{Rewriter, rebuild_from_ast};
use crate::{
    context::SqlContext,
    dialect::DialectStrategy,
    statement::{Statement, StatementKind}
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitInjectionConfig {
    pub enabled:      bool,
    pub default_limit: u64
}

impl Default for LimitInjectionConfig {
    fn default() -> Self {
        Self {
            enabled:       false,
            default_limit: 1_000
        }
    }
}

/// Adds `LIMIT <default_limit>` (or the dialect's equivalent) to a `SELECT`
/// that has none. Skipped when the statement already carries a limit, or
/// when `SqlContext::hints` shows the host already bounds the result set
/// itself (a `rowBounds` hint or a recognized page parameter).
pub struct LimitInjection {
    pub config:  LimitInjectionConfig,
    pub dialect: Arc<dyn DialectStrategy>
}

impl Rewriter for LimitInjection {
    fn name(&self) -> &'static str {
        "LimitInjection"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn rewrite(&self, statement: Rc<Statement>, context: &SqlContext) -> Rc<Statement> {
        if statement.kind != StatementKind::Select || statement.limit.is_some() {
            return statement;
        }
        if context.hints.row_bounds.is_some() || context.hints.page_param.is_some() {
            return statement;
        }
        let Some(ast) = statement.ast() else {
            return statement;
        };
        match self.dialect.apply_limit(ast, self.config.default_limit) {
            Ok(new_ast) => rebuild_from_ast(new_ast),
            Err(_) => statement
        }
    }
}
