use sqlparser::ast::{SetExpr, SetOperator, SetQuantifier};

use super::{
    ExtractionContext,
    expr::{contains_subquery, extract_columns_from_expr, extract_window_functions},
    table::extract_from_table_factor
};
use crate::config::SetOperationKind;

/// Map sqlparser's operator/quantifier pair onto our own enum by display
/// text rather than matching its variants directly, so this stays stable
/// across sqlparser versions that add or rename set-operator variants.
fn classify_set_operator(op: &SetOperator, quantifier: &SetQuantifier) -> SetOperationKind {
    let all = matches!(quantifier.to_string().to_ascii_uppercase().as_str(), "ALL" | "ALL BY NAME");
    match op.to_string().to_ascii_uppercase().as_str() {
        "UNION" if all => SetOperationKind::UnionAll,
        "UNION" => SetOperationKind::Union,
        "INTERSECT" => SetOperationKind::Intersect,
        "EXCEPT" => SetOperationKind::Except,
        "MINUS" => SetOperationKind::Minus,
        _ => SetOperationKind::Union
    }
}

pub fn extract_from_set_expr(set_expr: &SetExpr, ctx: &mut ExtractionContext<'_>) {
    match set_expr {
        SetExpr::Select(select) => {
            *ctx.has_distinct = select.distinct.is_some();
            for item in &select.projection {
                if let sqlparser::ast::SelectItem::UnnamedExpr(expr)
                | sqlparser::ast::SelectItem::ExprWithAlias {
                    expr, ..
                } = item
                {
                    extract_window_functions(expr, ctx.window_funcs);
                    if contains_subquery(expr) {
                        *ctx.has_subquery = true;
                    }
                }
            }
            for table in &select.from {
                extract_from_table_factor(&table.relation, ctx.tables);
                for join in &table.joins {
                    extract_from_table_factor(&join.relation, ctx.tables);
                    match &join.join_operator {
                        sqlparser::ast::JoinOperator::Inner(constraint)
                        | sqlparser::ast::JoinOperator::LeftOuter(constraint)
                        | sqlparser::ast::JoinOperator::RightOuter(constraint)
                        | sqlparser::ast::JoinOperator::FullOuter(constraint) => {
                            if let sqlparser::ast::JoinConstraint::On(expr) = constraint {
                                extract_columns_from_expr(expr, ctx.join_cols);
                            }
                        }
                        _ => {}
                    }
                }
            }
            if let Some(selection) = &select.selection {
                extract_columns_from_expr(selection, ctx.where_cols);
                if contains_subquery(selection) {
                    *ctx.has_subquery = true;
                }
            }
            if let sqlparser::ast::GroupByExpr::Expressions(exprs, _) = &select.group_by {
                for expr in exprs {
                    extract_columns_from_expr(expr, ctx.group_cols);
                }
            }
            if let Some(having) = &select.having {
                extract_columns_from_expr(having, ctx.having_cols);
            }
        }
        SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right
        } => {
            *ctx.has_union = true;
            if ctx.set_operator.is_none() {
                *ctx.set_operator = Some(classify_set_operator(op, set_quantifier));
            }
            extract_from_set_expr(left, ctx);
            extract_from_set_expr(right, ctx);
        }
        SetExpr::Query(query) => {
            extract_from_set_expr(&query.body, ctx);
        }
        SetExpr::Values(_)
        | SetExpr::Insert(_)
        | SetExpr::Update(_)
        | SetExpr::Table(_)
        | SetExpr::Delete(_)
        | SetExpr::Merge(_) => {}
    }
}
