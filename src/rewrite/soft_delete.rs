//! Soft-delete filter rewriter: injects `AND <column> = <live value>` into
//! `SELECT`/`UPDATE`/`DELETE` so a query that forgot to exclude
//! soft-deleted rows doesn't see (or touch) them.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{Rewriter, inject_condition, parse_condition, rebuild_from_ast};
use crate::{
    context::SqlContext,
    statement::{Statement, StatementKind}
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftDeleteConfig {
    pub enabled:    bool,
    pub column:     String,
    /// Literal SQL fragment for "not deleted", e.g. `"0"` or `"FALSE"`.
    pub live_value: String
}

impl Default for SoftDeleteConfig {
    fn default() -> Self {
        Self {
            enabled:    false,
            column:     "deleted".into(),
            live_value: "0".into()
        }
    }
}

/// Rewriter that excludes soft-deleted rows unless the statement already
/// filters on the configured column itself.
pub struct SoftDeleteFilter {
    pub config: SoftDeleteConfig
}

impl Rewriter for SoftDeleteFilter {
    fn name(&self) -> &'static str {
        "SoftDeleteFilter"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn rewrite(&self, statement: Rc<Statement>, _context: &SqlContext) -> Rc<Statement> {
        if !matches!(
            statement.kind,
            StatementKind::Select | StatementKind::Update | StatementKind::Delete
        ) {
            return statement;
        }
        if statement
            .where_cols
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&self.config.column))
        {
            return statement;
        }
        let Ok(condition) =
            parse_condition(&format!("{} = {}", self.config.column, self.config.live_value))
        else {
            return statement;
        };
        let Some(ast) = statement.ast().cloned() else {
            return statement;
        };
        match inject_condition(ast, condition) {
            Some(new_ast) => rebuild_from_ast(new_ast),
            None => statement
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use sqlparser::{dialect::GenericDialect, parser::Parser};

    use super::*;

    fn statement_for(sql: &str) -> Rc<Statement> {
        let stmt = Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0);
        Rc::new(Statement::from_ast(sql.to_string(), stmt))
    }

    fn ctx(sql: &str) -> SqlContext {
        SqlContext::builder(sql, "Reports.all").build().unwrap()
    }

    #[test]
    fn injects_soft_delete_guard_into_bare_select() {
        let rewriter = SoftDeleteFilter {
            config: SoftDeleteConfig {
                enabled: true,
                ..Default::default()
            }
        };
        let sql = "SELECT * FROM orders";
        let before = statement_for(sql);
        let after = rewriter.rewrite(Rc::clone(&before), &ctx(sql));
        assert!(!Rc::ptr_eq(&before, &after));
        assert!(after.raw.contains("deleted = 0"));
    }

    #[test]
    fn idempotent_when_column_already_filtered() {
        let rewriter = SoftDeleteFilter {
            config: SoftDeleteConfig {
                enabled: true,
                ..Default::default()
            }
        };
        let sql = "SELECT * FROM orders WHERE deleted = 1";
        let before = statement_for(sql);
        let after = rewriter.rewrite(Rc::clone(&before), &ctx(sql));
        assert!(Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn combines_with_existing_where_via_and() {
        let rewriter = SoftDeleteFilter {
            config: SoftDeleteConfig {
                enabled: true,
                ..Default::default()
            }
        };
        let sql = "SELECT * FROM orders WHERE customer_id = 9";
        let before = statement_for(sql);
        let after = rewriter.rewrite(Rc::clone(&before), &ctx(sql));
        assert!(after.raw.contains("customer_id = 9"));
        assert!(after.raw.contains("deleted = 0"));
    }
}
