//! The parsed-SQL abstraction checkers and rewriters operate over.
//!
//! `Statement` is a tagged wrapper around a `sqlparser` AST node plus the
//! metadata the rule checkers need repeatedly (referenced tables, WHERE
//! columns, ORDER BY / LIMIT / OFFSET, window functions, set-operation and
//! subquery flags). Metadata is computed once at construction and cached on
//! the value, the same trade sqlparser's own tree makes expensive to redo
//! per checker.

pub(crate) mod extract;

use std::sync::OnceLock;

use compact_str::CompactString;
use indexmap::IndexSet;
use serde::Serialize;
use smallvec::SmallVec;
use sqlparser::ast::Statement as AstStatement;

use crate::config::SetOperationKind;

use self::extract::{
    ExtractionContext, contains_subquery, extract_columns_from_expr, extract_from_set_expr
};

/// Type alias for small column vectors, mirroring the cardinality most
/// WHERE/ORDER BY/GROUP BY clauses actually have.
pub type ColumnVec = SmallVec<[CompactString; 8]>;

#[derive(Debug, Clone, Serialize)]
pub struct WindowFunction {
    pub name:           CompactString,
    pub partition_cols: Vec<CompactString>,
    pub order_cols:     Vec<CompactString>
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct QueryComplexity {
    pub score:             u32,
    pub table_count:       u32,
    pub join_count:        u32,
    pub subquery_count:    u32,
    pub condition_count:   u32,
    pub aggregation_count: u32,
    pub window_count:      u32
}

/// Tagged view over the statement kind, mirrored from `SqlContext::sqlType`
/// but inferred here from the actual parsed AST rather than a caller-supplied
/// hint, since checkers need the authoritative classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum StatementKind {
    Select,
    Update,
    Delete,
    Insert,
    Call,
    Ddl,
    SetVar,
    ShowMetadata,
    Use,
    MultiStatement,
    Unparsed
}

/// A parsed SQL statement plus the metadata extracted from its AST.
///
/// Owned exclusively by the statement cache; checkers and rewriters receive
/// shared references and must not mutate it — a rewriter that needs to
/// change the statement builds and caches a new `Statement`, it never edits
/// this one in place.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub raw:          String,
    pub kind:         StatementKind,
    pub tables:       Vec<CompactString>,
    pub where_cols:   ColumnVec,
    pub join_cols:    ColumnVec,
    pub order_cols:   ColumnVec,
    pub group_cols:   ColumnVec,
    pub having_cols:  ColumnVec,
    pub window_funcs: Vec<WindowFunction>,
    pub limit:        Option<u64>,
    pub offset:       Option<u64>,
    pub has_union:    bool,
    /// The actual set operator of the top-level set operation, when one is
    /// present — distinct from `has_union`, which is set for any of
    /// UNION/INTERSECT/EXCEPT/MINUS and can't tell them apart.
    pub set_operator: Option<SetOperationKind>,
    pub has_distinct: bool,
    pub has_subquery: bool,
    pub has_where:    bool,
    /// Destroyed-object name for DROP/TRUNCATE statements, used by the
    /// sharper `DropDetected`/`TruncateDetected` checkers.
    pub ddl_target:   Option<CompactString>,
    /// Remaining top-level statements when this was produced by `parseMulti`
    /// and more than one statement was present.
    pub multi_tail:   Vec<CompactString>,
    /// True when any statement in `multi_tail` classifies as DDL, so
    /// `DdlOperation` can fire on a stacked `SELECT ...; DROP TABLE ...`
    /// without re-parsing the tail text itself.
    pub tail_has_ddl: bool,
    #[serde(skip)]
    ast:              Option<AstStatement>,
    #[serde(skip)]
    complexity_cell:  OnceLock<QueryComplexity>
}

impl Statement {
    pub fn new(raw: String, kind: StatementKind) -> Self {
        Self {
            raw,
            kind,
            tables: Vec::new(),
            where_cols: ColumnVec::new(),
            join_cols: ColumnVec::new(),
            order_cols: ColumnVec::new(),
            group_cols: ColumnVec::new(),
            having_cols: ColumnVec::new(),
            window_funcs: Vec::new(),
            limit: None,
            offset: None,
            has_union: false,
            set_operator: None,
            has_distinct: false,
            has_subquery: false,
            has_where: false,
            ddl_target: None,
            multi_tail: Vec::new(),
            tail_has_ddl: false,
            ast: None,
            complexity_cell: OnceLock::new()
        }
    }

    /// A sentinel used when strict parsing is disabled and the SQL text does
    /// not parse: raw-text checkers can still run, AST-walking checkers see
    /// empty metadata and simply do not fire.
    pub fn unparsed(raw: impl Into<String>) -> Self {
        Self::new(raw.into(), StatementKind::Unparsed)
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self.kind, StatementKind::Unparsed)
    }

    /// The underlying sqlparser AST node, when one was produced. Rewriters
    /// clone this, mutate the clone, and hand the result to a fresh
    /// `Statement::from_ast` rather than mutating shared state.
    pub fn ast(&self) -> Option<&AstStatement> {
        self.ast.as_ref()
    }

    pub fn complexity(&self) -> &QueryComplexity {
        self.complexity_cell.get_or_init(|| calculate_complexity(self))
    }

    /// Build a `Statement` from a real parsed AST node, populating all
    /// derived metadata fields the checkers rely on.
    pub fn from_ast(raw: String, stmt: AstStatement) -> Self {
        let built = build_from_ast(raw, &stmt);
        let mut built = built;
        built.ast = Some(stmt);
        built
    }
}

fn build_from_ast(raw: String, stmt: &AstStatement) -> Statement {
    match stmt {
        AstStatement::Query(query) => build_select(raw, query),
        AstStatement::Insert(insert) => {
            let mut s = Statement::new(raw, StatementKind::Insert);
            s.tables.push(insert.table.to_string().into());
            s
        }
        AstStatement::Update {
            table,
            selection,
            ..
        } => {
            let mut s = Statement::new(raw, StatementKind::Update);
            s.tables.push(table.relation.to_string().into());
            if let Some(sel) = selection {
                s.has_where = true;
                let mut cols = IndexSet::new();
                extract_columns_from_expr(sel, &mut cols);
                s.where_cols = cols.into_iter().collect();
            }
            s
        }
        AstStatement::Delete(delete) => {
            let mut s = Statement::new(raw, StatementKind::Delete);
            if let Some(sel) = &delete.selection {
                s.has_where = true;
                let mut cols = IndexSet::new();
                extract_columns_from_expr(sel, &mut cols);
                s.where_cols = cols.into_iter().collect();
            }
            if let sqlparser::ast::FromTable::WithFromKeyword(from_items) = &delete.from {
                for item in from_items {
                    s.tables.push(item.relation.to_string().into());
                }
            }
            s
        }
        AstStatement::Truncate {
            table_names, ..
        } => {
            let mut s = Statement::new(raw, StatementKind::Ddl);
            for table in table_names {
                s.tables.push(table.name.to_string().into());
            }
            s.ddl_target = s.tables.first().cloned();
            s
        }
        AstStatement::Drop {
            names, ..
        } => {
            let mut s = Statement::new(raw, StatementKind::Ddl);
            for name in names {
                s.tables.push(name.to_string().into());
            }
            s.ddl_target = s.tables.first().cloned();
            s
        }
        AstStatement::CreateTable(_)
        | AstStatement::AlterTable {
            ..
        } => Statement::new(raw, StatementKind::Ddl),
        AstStatement::Call(_) | AstStatement::Execute {
            ..
        } => Statement::new(raw, StatementKind::Call),
        AstStatement::SetVariable {
            ..
        }
        | AstStatement::SetTimeZone {
            ..
        } => Statement::new(raw, StatementKind::SetVar),
        AstStatement::ShowTables {
            ..
        }
        | AstStatement::ShowColumns {
            ..
        }
        | AstStatement::ShowCreate {
            ..
        }
        | AstStatement::ExplainTable {
            ..
        }
        | AstStatement::Explain {
            ..
        } => Statement::new(raw, StatementKind::ShowMetadata),
        AstStatement::Use(_) => Statement::new(raw, StatementKind::Use),
        _ => Statement::new(raw, StatementKind::Unparsed)
    }
}

fn build_select(raw: String, query: &sqlparser::ast::Query) -> Statement {
    let mut s = Statement::new(raw, StatementKind::Select);

    if let Some(limit_clause) = &query.limit_clause {
        match limit_clause {
            sqlparser::ast::LimitClause::LimitOffset {
                limit,
                offset,
                ..
            } => {
                if let Some(sqlparser::ast::Expr::Value(val)) = limit
                    && let sqlparser::ast::Value::Number(n, _) = &val.value
                {
                    s.limit = n.parse().ok();
                }
                if let Some(offset_expr) = offset
                    && let sqlparser::ast::Expr::Value(val) = &offset_expr.value
                    && let sqlparser::ast::Value::Number(n, _) = &val.value
                {
                    s.offset = n.parse().ok();
                }
            }
            sqlparser::ast::LimitClause::OffsetCommaLimit {
                offset,
                limit,
                ..
            } => {
                if let sqlparser::ast::Expr::Value(val) = limit
                    && let sqlparser::ast::Value::Number(n, _) = &val.value
                {
                    s.limit = n.parse().ok();
                }
                if let sqlparser::ast::Expr::Value(val) = offset
                    && let sqlparser::ast::Value::Number(n, _) = &val.value
                {
                    s.offset = n.parse().ok();
                }
            }
        }
    }

    if let Some(order_by) = &query.order_by
        && let sqlparser::ast::OrderByKind::Expressions(exprs) = &order_by.kind
    {
        let mut cols = IndexSet::new();
        for expr in exprs {
            extract_columns_from_expr(&expr.expr, &mut cols);
        }
        s.order_cols = cols.into_iter().collect();
    }

    let mut tables = IndexSet::new();
    let mut where_cols = IndexSet::new();
    let mut join_cols = IndexSet::new();
    let mut group_cols = IndexSet::new();
    let mut having_cols = IndexSet::new();
    let mut window_funcs = Vec::new();
    let mut ctx = ExtractionContext {
        tables:       &mut tables,
        where_cols:   &mut where_cols,
        join_cols:    &mut join_cols,
        group_cols:   &mut group_cols,
        having_cols:  &mut having_cols,
        window_funcs: &mut window_funcs,
        has_union:    &mut s.has_union,
        set_operator: &mut s.set_operator,
        has_distinct: &mut s.has_distinct,
        has_subquery: &mut s.has_subquery
    };
    extract_from_set_expr(&query.body, &mut ctx);

    s.has_where = !where_cols.is_empty() || top_level_has_where(&query.body);
    s.tables = tables.into_iter().collect();
    s.where_cols = where_cols.into_iter().collect();
    s.join_cols = join_cols.into_iter().collect();
    s.group_cols = group_cols.into_iter().collect();
    s.having_cols = having_cols.into_iter().collect();
    s.window_funcs = window_funcs;
    s
}

/// `extract_columns_from_expr` only populates `where_cols` when the WHERE
/// expression references a column; `WHERE 1=1` or `WHERE TRUE` has a
/// selection but no columns, so the column-emptiness check alone cannot
/// distinguish "no WHERE" from "dummy WHERE." This looks at the raw selection
/// presence instead, leaving dummy-condition detection to its own checker.
fn top_level_has_where(set_expr: &sqlparser::ast::SetExpr) -> bool {
    match set_expr {
        sqlparser::ast::SetExpr::Select(select) => select.selection.is_some(),
        sqlparser::ast::SetExpr::Query(query) => top_level_has_where(&query.body),
        sqlparser::ast::SetExpr::SetOperation {
            left,
            right,
            ..
        } => top_level_has_where(left) && top_level_has_where(right),
        _ => false
    }
}

fn calculate_complexity(stmt: &Statement) -> QueryComplexity {
    let table_count = stmt.tables.len() as u32;
    let join_count = table_count.saturating_sub(1);
    let subquery_count = u32::from(stmt.has_subquery);
    let condition_count =
        (stmt.where_cols.len() + stmt.having_cols.len() + stmt.join_cols.len()) as u32;
    let aggregation_count = stmt.group_cols.len() as u32;
    let window_count = stmt.window_funcs.len() as u32;
    let score = table_count
        + join_count * 2
        + subquery_count * 3
        + condition_count
        + aggregation_count * 2
        + window_count * 2;
    QueryComplexity {
        score,
        table_count,
        join_count,
        subquery_count,
        condition_count,
        aggregation_count,
        window_count
    }
}
