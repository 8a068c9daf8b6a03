//! Rewrite pipeline (C6): an ordered list of statement-to-statement
//! transformers applied after validation, sharing the same cached AST the
//! checker orchestrator (C4) already populated for this call.
//!
//! Each [`Rewriter`] receives an `Rc<Statement>` and returns one back;
//! returning the *same* `Rc` (not an equal-but-distinct one) is how a
//! rewriter signals "no change," and the pipeline uses `Rc::ptr_eq` on that
//! return value rather than comparing statement contents, mirroring the
//! `Rc`-scoped statement cache in `cache.rs`.

pub mod limit_injection;
pub mod soft_delete;
pub mod tenant;

use std::{panic, rc::Rc};

use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Statement as AstStatement};

use crate::{
    context::SqlContext,
    error::{AppResult, parse_error},
    statement::Statement
};

pub trait Rewriter: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    /// Returning the same `Rc` passed in means "no change"; returning a
    /// fresh one means this step produced a new statement.
    fn rewrite(&self, statement: Rc<Statement>, context: &SqlContext) -> Rc<Statement>;
}

pub struct RewritePipeline {
    rewriters: Vec<Box<dyn Rewriter>>
}

impl RewritePipeline {
    pub fn new(rewriters: Vec<Box<dyn Rewriter>>) -> Self {
        Self {
            rewriters
        }
    }

    /// Apply every enabled rewriter in configured order. A rewriter that
    /// panics is logged via `tracing` and treated as "no change," exactly
    /// like a failed checker in the orchestrator; the pipeline continues
    /// with the statement from before that step.
    pub fn run(&self, statement: Rc<Statement>, context: &SqlContext) -> Rc<Statement> {
        let mut current = statement;
        for rewriter in &self.rewriters {
            if !rewriter.is_enabled() {
                continue;
            }
            let before = Rc::clone(&current);
            let outcome =
                panic::catch_unwind(panic::AssertUnwindSafe(|| rewriter.rewrite(before, context)));
            match outcome {
                Ok(next) => current = next,
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    tracing::warn!(
                        rewriter = rewriter.name(),
                        reason = %reason,
                        "rewriter panicked; statement passed through unchanged"
                    );
                }
            }
        }
        current
    }
}

/// Re-derive a `Statement` from a mutated AST: serialize it to SQL and run
/// that text back through `Statement::from_ast` so every derived field
/// (`where_cols`, `tables`, complexity cache, ...) is fresh, matching the
/// "update the bound SQL string and re-cache" requirement for each step.
pub(crate) fn rebuild_from_ast(ast: AstStatement) -> Rc<Statement> {
    let sql = ast.to_string();
    Rc::new(Statement::from_ast(sql, ast))
}

/// Parse a bare condition fragment (e.g. `"tenant_id = 5"`) into an `Expr` by
/// embedding it in a throwaway `WHERE` clause and pulling the parsed
/// selection back out, rather than hand-building `Expr`/`Value` nodes whose
/// exact shape varies across `sqlparser` versions.
pub(crate) fn parse_condition(fragment: &str) -> AppResult<Expr> {
    use sqlparser::{dialect::GenericDialect, parser::Parser};

    let parsed = Parser::parse_sql(&GenericDialect {}, &format!("SELECT * FROM t WHERE {fragment}"))
        .map_err(|e| parse_error(format!("rewrite condition did not parse: {e}")))?
        .into_iter()
        .next()
        .ok_or_else(|| parse_error("rewrite condition produced no statement"))?;
    match parsed {
        AstStatement::Query(query) => match *query.body {
            SetExpr::Select(select) => select
                .selection
                .ok_or_else(|| parse_error("rewrite condition parsed to an empty selection")),
            _ => Err(parse_error("rewrite condition did not parse to a plain SELECT"))
        },
        _ => Err(parse_error("rewrite condition did not parse to a query"))
    }
}

fn combine_and(existing: Option<Expr>, addition: Expr) -> Expr {
    match existing {
        Some(left) => Expr::BinaryOp {
            left: Box::new(left),
            op: BinaryOperator::And,
            right: Box::new(addition)
        },
        None => addition
    }
}

/// Inject `condition` into the top-level `WHERE` of a `SELECT`/`UPDATE`/
/// `DELETE`, combining with any existing condition via `AND`. Returns `None`
/// for statement shapes with no single top-level selection to extend (a set
/// operation body, for instance) so the caller can leave the statement
/// unchanged rather than silently drop the condition.
pub(crate) fn inject_condition(mut ast: AstStatement, condition: Expr) -> Option<AstStatement> {
    fn inject_set_expr(set_expr: &mut SetExpr, condition: Expr) -> bool {
        match set_expr {
            SetExpr::Select(select) => {
                select.selection = Some(combine_and(select.selection.take(), condition));
                true
            }
            SetExpr::Query(q) => inject_set_expr(&mut q.body, condition),
            _ => false
        }
    }

    let applied = match &mut ast {
        AstStatement::Query(query) => inject_set_expr(&mut query.body, condition),
        AstStatement::Update {
            selection, ..
        } => {
            *selection = Some(combine_and(selection.take(), condition));
            true
        }
        AstStatement::Delete(delete) => {
            delete.selection = Some(combine_and(delete.selection.take(), condition));
            true
        }
        _ => false
    };

    applied.then_some(ast)
}

#[cfg(test)]
mod tests {
    use sqlparser::{dialect::GenericDialect, parser::Parser};

    use super::*;
    use crate::context::SqlContext;

    fn parse_statement(sql: &str) -> Statement {
        let stmt = Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0);
        Statement::from_ast(sql.to_string(), stmt)
    }

    struct NoOp;
    impl Rewriter for NoOp {
        fn name(&self) -> &'static str {
            "NoOp"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn rewrite(&self, statement: Rc<Statement>, _context: &SqlContext) -> Rc<Statement> {
            statement
        }
    }

    #[test]
    fn no_op_rewriter_returns_identical_reference() {
        let pipeline = RewritePipeline::new(vec![Box::new(NoOp)]);
        let ctx = SqlContext::builder("SELECT * FROM t", "Reports.all").build().unwrap();
        let statement = Rc::new(parse_statement("SELECT * FROM t"));
        let before = Rc::clone(&statement);
        let after = pipeline.run(statement, &ctx);
        assert!(Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn inject_condition_combines_with_existing_where() {
        let stmt = Parser::parse_sql(&GenericDialect {}, "SELECT * FROM t WHERE active = 1")
            .unwrap()
            .remove(0);
        let condition = parse_condition("tenant_id = 5").unwrap();
        let rewritten = inject_condition(stmt, condition).unwrap();
        let sql = rewritten.to_string();
        assert!(sql.contains("active = 1"));
        assert!(sql.contains("tenant_id = 5"));
        assert!(sql.to_ascii_uppercase().contains("AND"));
    }

    #[test]
    fn inject_condition_adds_where_when_absent() {
        let stmt = Parser::parse_sql(&GenericDialect {}, "SELECT * FROM t").unwrap().remove(0);
        let condition = parse_condition("deleted = 0").unwrap();
        let rewritten = inject_condition(stmt, condition).unwrap();
        assert!(rewritten.to_string().to_ascii_uppercase().contains("WHERE"));
    }
}
