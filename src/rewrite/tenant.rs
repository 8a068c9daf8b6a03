//! Tenant isolation rewriter: injects `AND <column> = <value>` into
//! `SELECT`/`UPDATE`/`DELETE` so a mapper that forgot its tenant filter
//! can't read or touch another tenant's rows.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Rewriter, inject_condition, parse_condition, rebuild_from_ast};
use crate::{
    context::SqlContext,
    statement::{Statement, StatementKind}
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantIsolationConfig {
    pub enabled:   bool,
    /// Column checked for in `WHERE`/idempotency and injected as the filter.
    pub column:    String,
    /// Key looked up in `SqlContext::params` for the tenant value.
    pub param_key: String
}

impl Default for TenantIsolationConfig {
    fn default() -> Self {
        Self {
            enabled:   false,
            column:    "tenant_id".into(),
            param_key: "tenantId".into()
        }
    }
}

/// Rewriter that scopes a statement to the tenant named in the context's
/// bound parameters. A no-op when the column is already present in the
/// `WHERE` clause (idempotent) or when the tenant parameter isn't bound.
pub struct TenantIsolation {
    pub config: TenantIsolationConfig
}

impl Rewriter for TenantIsolation {
    fn name(&self) -> &'static str {
        "TenantIsolation"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn rewrite(&self, statement: Rc<Statement>, context: &SqlContext) -> Rc<Statement> {
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
        let Some(value) = context.params.get(&self.config.param_key) else {
            return statement;
        };
        let literal = render_literal(value);
        let Ok(condition) = parse_condition(&format!("{} = {literal}", self.config.column)) else {
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

fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string()
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

    fn context_with_tenant(sql: &str, tenant: i64) -> SqlContext {
        SqlContext::builder(sql, "Reports.all")
            .param("tenantId", serde_json::json!(tenant))
            .build()
            .unwrap()
    }

    #[test]
    fn injects_tenant_filter_into_bare_select() {
        let rewriter = TenantIsolation {
            config: TenantIsolationConfig {
                enabled: true,
                ..Default::default()
            }
        };
        let sql = "SELECT * FROM orders";
        let ctx = context_with_tenant(sql, 42);
        let before = statement_for(sql);
        let after = rewriter.rewrite(Rc::clone(&before), &ctx);
        assert!(!Rc::ptr_eq(&before, &after));
        assert!(after.raw.contains("tenant_id = 42"));
    }

    #[test]
    fn skips_when_column_already_bound() {
        let rewriter = TenantIsolation {
            config: TenantIsolationConfig {
                enabled: true,
                ..Default::default()
            }
        };
        let sql = "SELECT * FROM orders WHERE tenant_id = 7";
        let ctx = context_with_tenant(sql, 42);
        let before = statement_for(sql);
        let after = rewriter.rewrite(Rc::clone(&before), &ctx);
        assert!(Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn skips_when_tenant_param_missing() {
        let rewriter = TenantIsolation {
            config: TenantIsolationConfig {
                enabled: true,
                ..Default::default()
            }
        };
        let sql = "SELECT * FROM orders";
        let ctx = SqlContext::builder(sql, "Reports.all").build().unwrap();
        let before = statement_for(sql);
        let after = rewriter.rewrite(Rc::clone(&before), &ctx);
        assert!(Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn disabled_rewriter_reports_itself_disabled() {
        let rewriter = TenantIsolation {
            config: TenantIsolationConfig::default()
        };
        assert!(!rewriter.is_enabled());
    }
}
