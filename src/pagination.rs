//! Pagination detector (C5): classifies a statement's pagination shape as
//! `NONE`, `PHYSICAL`, or `LOGICAL` from the context's execution hints and
//! the parsed AST's own `LIMIT` clause.

use serde::Serialize;

use crate::{context::SqlContext, statement::Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaginationClassification {
    None,
    Physical,
    Logical
}

/// Classify the pagination shape of `statement` under `context`.
///
/// `context.hints.row_bounds`/`page_param` describe pagination parameters a
/// host-side mapper framework may have passed down. `hasPlugin` is a
/// separate signal (`context.hints.pagination_plugin_active`): the plugin
/// injects `LIMIT` at execution time, after `validate()` already ran against
/// the unmodified SQL, so its absence of a `LIMIT` clause in the parsed AST
/// does not mean the query will actually run unbounded.
pub fn classify(statement: &Statement, context: &SqlContext) -> PaginationClassification {
    let has_limit = statement.limit.is_some();
    let has_page_param = context.hints.row_bounds.is_some() || context.hints.page_param.is_some();
    let has_plugin = context.hints.pagination_plugin_active;

    if has_page_param && !has_limit && !has_plugin {
        PaginationClassification::Logical
    } else if has_limit || (has_page_param && has_plugin) {
        PaginationClassification::Physical
    } else {
        PaginationClassification::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionHints, RowBounds, SqlContext};

    fn parse(sql: &str) -> Statement {
        use sqlparser::{dialect::GenericDialect, parser::Parser};
        let stmt = Parser::parse_sql(&GenericDialect {}, sql)
            .unwrap()
            .remove(0);
        Statement::from_ast(sql.to_string(), stmt)
    }

    #[test]
    fn no_limit_no_page_param_is_none() {
        let stmt = parse("SELECT * FROM users");
        let ctx = SqlContext::builder("SELECT * FROM users", "UserMapper.all")
            .build()
            .unwrap();
        assert_eq!(classify(&stmt, &ctx), PaginationClassification::None);
    }

    #[test]
    fn limit_present_is_physical() {
        let stmt = parse("SELECT * FROM users LIMIT 10");
        let ctx = SqlContext::builder("SELECT * FROM users LIMIT 10", "UserMapper.page")
            .build()
            .unwrap();
        assert_eq!(classify(&stmt, &ctx), PaginationClassification::Physical);
    }

    #[test]
    fn page_param_without_limit_is_logical() {
        let stmt = parse("SELECT * FROM users");
        let mut ctx = SqlContext::builder("SELECT * FROM users", "UserMapper.page")
            .build()
            .unwrap();
        ctx.hints = ExecutionHints {
            row_bounds: Some(RowBounds {
                offset: 0,
                limit:  20
            }),
            page_param: None,
            pagination_plugin_active: false
        };
        assert_eq!(classify(&stmt, &ctx), PaginationClassification::Logical);
    }

    #[test]
    fn page_param_with_plugin_and_no_limit_is_physical() {
        let stmt = parse("SELECT * FROM users");
        let mut ctx = SqlContext::builder("SELECT * FROM users", "UserMapper.page")
            .build()
            .unwrap();
        ctx.hints = ExecutionHints {
            row_bounds: Some(RowBounds {
                offset: 0,
                limit:  20
            }),
            page_param: None,
            pagination_plugin_active: true
        };
        assert_eq!(classify(&stmt, &ctx), PaginationClassification::Physical);
    }
}
