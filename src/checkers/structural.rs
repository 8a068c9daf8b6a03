//! Structural checkers: operate on the parsed AST (`context.parsed_statement`).

use compact_str::CompactString;
use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Statement as AstStatement};

use super::Checker;
use crate::{
    config::{
        BlacklistFieldsConfig, CheckerConfig, DangerousFunctionConfig, DeniedTableConfig,
        ReadOnlyTableConfig, SetOperationConfig, WhitelistFieldsConfig
    },
    context::SqlContext,
    statement::{
        Statement, StatementKind,
        extract::{extract_function_names, is_literal}
    },
    violation::{ValidationResult, ViolationInfo}
};

/// Case-insensitive match of `value` against `pattern`, where a trailing `*`
/// in `pattern` means "starts with" (e.g. `"create_*"` matches `"create_at"`).
fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let value = value.to_ascii_lowercase();
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value
    }
}

fn matches_any(patterns: &[impl AsRef<str>], value: &str) -> bool {
    patterns.iter().any(|p| wildcard_match(p.as_ref(), value))
}

pub struct NoWhereClause {
    pub config: CheckerConfig
}

impl Checker for NoWhereClause {
    fn name(&self) -> &'static str {
        "NoWhereClause"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        let applies = matches!(
            stmt.kind,
            StatementKind::Select | StatementKind::Update | StatementKind::Delete
        );
        if applies && !stmt.has_where {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                format!("{:?} statement has no WHERE clause", stmt.kind)
            ));
        }
    }
}

pub struct DummyCondition {
    pub config: crate::config::DummyConditionConfig
}

impl Checker for DummyCondition {
    fn name(&self) -> &'static str {
        "DummyCondition"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if !matches!(
            stmt.kind,
            StatementKind::Select | StatementKind::Update | StatementKind::Delete
        ) {
            return;
        }
        if !stmt.has_where {
            return;
        }
        let Some(ast) = stmt.ast() else {
            return;
        };
        let Some(selection) = top_level_selection(ast) else {
            return;
        };

        let mut conjuncts = Vec::new();
        flatten_conjuncts(selection, &mut conjuncts);

        let patterns: Vec<String> = self
            .config
            .patterns
            .iter()
            .chain(self.config.custom_patterns.iter())
            .map(|p| normalize_for_dummy_match(p))
            .collect();

        let is_dummy = conjuncts.iter().any(|conjunct| {
            let normalized = normalize_for_dummy_match(&conjunct.to_string());
            patterns.iter().any(|p| normalized == *p) || is_literal_tautology(conjunct)
        });
        if is_dummy {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.base.risk_level,
                "WHERE clause is a tautological (dummy) condition"
            ));
        }
    }
}

/// Lowercases and strips all whitespace so configured patterns and rendered
/// AST conjuncts compare equal regardless of spacing (`"1=1"` vs the AST's
/// rendered `"1 = 1"`).
fn normalize_for_dummy_match(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase()
}

/// The top-level `WHERE`/selection expression of a `SELECT`/`UPDATE`/
/// `DELETE`, read-only — used by `DummyCondition` to inspect only the
/// condition itself rather than the whole statement text.
fn top_level_selection(ast: &AstStatement) -> Option<&Expr> {
    fn from_set_expr(set_expr: &SetExpr) -> Option<&Expr> {
        match set_expr {
            SetExpr::Select(select) => select.selection.as_ref(),
            SetExpr::Query(q) => from_set_expr(&q.body),
            _ => None
        }
    }
    match ast {
        AstStatement::Query(query) => from_set_expr(&query.body),
        AstStatement::Update {
            selection, ..
        } => selection.as_ref(),
        AstStatement::Delete(delete) => delete.selection.as_ref(),
        _ => None
    }
}

/// Split a `WHERE` expression on top-level `AND` into its conjuncts, so a
/// dummy condition `AND`ed alongside a real one (`WHERE 1=1 AND id = ?`) is
/// still found without having to match the whole expression verbatim.
fn flatten_conjuncts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    if let Expr::BinaryOp {
        left,
        op: BinaryOperator::And,
        right
    } = expr
    {
        flatten_conjuncts(left, out);
        flatten_conjuncts(right, out);
    } else {
        out.push(expr);
    }
}

/// A conjunct of the shape `<literal> = <literal>` with equal sides, e.g.
/// `2 = 2` or `'x' = 'x'` — a tautology regardless of the configured text
/// patterns.
fn is_literal_tautology(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right
        } => {
            is_literal(left)
                && is_literal(right)
                && normalize_for_dummy_match(&left.to_string())
                    == normalize_for_dummy_match(&right.to_string())
        }
        _ => false
    }
}

pub struct BlacklistField {
    pub config: BlacklistFieldsConfig
}

impl Checker for BlacklistField {
    fn name(&self) -> &'static str {
        "BlacklistField"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if stmt.where_cols.is_empty() {
            return;
        }
        let patterns: Vec<&str> = self.config.fields.iter().map(String::as_str).collect();
        let all_blacklisted = stmt
            .where_cols
            .iter()
            .all(|col| matches_any(&patterns, col));
        if all_blacklisted {
            let fields = stmt.where_cols.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
            result.push(ViolationInfo::new(
                self.name(),
                self.config.base.risk_level,
                format!("WHERE clause references only blacklisted fields: {fields}")
            ));
        }
    }
}

pub struct WhitelistField {
    pub config: WhitelistFieldsConfig
}

impl Checker for WhitelistField {
    fn name(&self) -> &'static str {
        "WhitelistField"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        for table in &stmt.tables {
            let allowed: Vec<&str> = self
                .config
                .by_table
                .get(table.as_str())
                .map(|v| v.iter().map(String::as_str).collect())
                .unwrap_or_else(|| self.config.fields.iter().map(String::as_str).collect());
            let known_table = self.config.by_table.contains_key(table.as_str());
            if !known_table && !self.config.enforce_for_unknown_tables {
                continue;
            }
            let offending: Vec<&CompactString> = stmt
                .where_cols
                .iter()
                .filter(|c| !matches_any(&allowed, c.as_str()))
                .collect();
            if !offending.is_empty() {
                result.push(ViolationInfo::new(
                    self.name(),
                    self.config.base.risk_level,
                    format!("table '{table}' referenced with non-whitelisted columns")
                ));
            }
        }
    }
}

pub struct MultiStatement {
    pub config: CheckerConfig
}

impl Checker for MultiStatement {
    fn name(&self) -> &'static str {
        "MultiStatement"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if !stmt.multi_tail.is_empty() {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                format!(
                    "{} additional top-level statement(s) after the first",
                    stmt.multi_tail.len()
                )
            ));
        }
    }
}

pub struct SetOperation {
    pub config: SetOperationConfig
}

impl Checker for SetOperation {
    fn name(&self) -> &'static str {
        "SetOperation"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        let Some(operator) = stmt.set_operator else {
            return;
        };
        if !self.config.allowed_operations.contains(&operator) {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.base.risk_level,
                format!("statement contains a {operator:?} set operation not in the allow-list")
            ));
        }
    }
}

pub struct DdlOperation {
    pub config: CheckerConfig
}

impl Checker for DdlOperation {
    fn name(&self) -> &'static str {
        "DdlOperation"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if stmt.kind == StatementKind::Ddl || stmt.tail_has_ddl {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "statement is a DDL operation"
            ));
        }
    }
}

/// Sharper variant of `DdlOperation` for `DROP TABLE`/`DROP DATABASE`: names
/// the destroyed object. Additive, not a replacement — `DdlOperation` still
/// fires too.
pub struct DropDetected {
    pub config: CheckerConfig
}

impl Checker for DropDetected {
    fn name(&self) -> &'static str {
        "DropDetected"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if stmt.kind != StatementKind::Ddl {
            return;
        }
        let is_drop = stmt.raw.trim_start().to_ascii_uppercase().starts_with("DROP");
        if is_drop {
            let target = stmt.ddl_target.as_deref().unwrap_or("<unknown>");
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                format!("DROP detected, target: {target}")
            ));
        }
    }
}

/// Sharper variant of `DdlOperation` for `TRUNCATE`, kept distinct because it
/// bypasses triggers and row-level logging the same way DROP does, but is
/// syntactically its own statement.
pub struct TruncateDetected {
    pub config: CheckerConfig
}

impl Checker for TruncateDetected {
    fn name(&self) -> &'static str {
        "TruncateDetected"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if stmt.kind != StatementKind::Ddl {
            return;
        }
        let is_truncate = stmt
            .raw
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("TRUNCATE");
        if is_truncate {
            let target = stmt.ddl_target.as_deref().unwrap_or("<unknown>");
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                format!("TRUNCATE detected, target: {target}")
            ));
        }
    }
}

pub struct CallStatement {
    pub config: CheckerConfig
}

impl Checker for CallStatement {
    fn name(&self) -> &'static str {
        "CallStatement"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if stmt.kind == StatementKind::Call {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "statement invokes a stored procedure"
            ));
        }
    }
}

pub struct MetadataStatement {
    pub config: CheckerConfig
}

impl Checker for MetadataStatement {
    fn name(&self) -> &'static str {
        "MetadataStatement"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if matches!(stmt.kind, StatementKind::ShowMetadata | StatementKind::Use) {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "statement inspects or switches server/schema metadata"
            ));
        }
    }
}

pub struct SetStatement {
    pub config: CheckerConfig
}

impl Checker for SetStatement {
    fn name(&self) -> &'static str {
        "SetStatement"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if stmt.kind == StatementKind::SetVar {
            result.push(ViolationInfo::new(
                self.name(),
                self.config.risk_level,
                "statement modifies a session variable"
            ));
        }
    }
}

pub struct DeniedTable {
    pub config: DeniedTableConfig
}

impl Checker for DeniedTable {
    fn name(&self) -> &'static str {
        "DeniedTable"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        for table in &stmt.tables {
            if matches_any(&self.config.denied_tables, table) {
                result.push(ViolationInfo::new(
                    self.name(),
                    self.config.base.risk_level,
                    format!("table '{table}' is denied")
                ));
            }
        }
    }
}

pub struct ReadOnlyTable {
    pub config: ReadOnlyTableConfig
}

impl Checker for ReadOnlyTable {
    fn name(&self) -> &'static str {
        "ReadOnlyTable"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        if !matches!(
            stmt.kind,
            StatementKind::Update | StatementKind::Delete | StatementKind::Insert
        ) {
            return;
        }
        for table in &stmt.tables {
            if matches_any(&self.config.readonly_tables, table) {
                result.push(ViolationInfo::new(
                    self.name(),
                    self.config.base.risk_level,
                    format!("table '{table}' is read-only")
                ));
            }
        }
    }
}

pub struct DangerousFunction {
    pub config: DangerousFunctionConfig
}

impl Checker for DangerousFunction {
    fn name(&self) -> &'static str {
        "DangerousFunction"
    }

    fn is_enabled(&self) -> bool {
        self.config.base.enabled
    }

    fn check(&self, context: &SqlContext, result: &mut ValidationResult) {
        let Some(stmt) = context.parsed_statement() else {
            return;
        };
        let Some(ast) = stmt.ast() else {
            return;
        };
        let mut names = Vec::new();
        walk_statement_expressions(ast, &mut names);
        for name in names {
            let upper = name.to_ascii_uppercase();
            if self
                .config
                .denied_functions
                .iter()
                .any(|f| f.to_ascii_uppercase() == upper)
            {
                result.push(ViolationInfo::new(
                    self.name(),
                    self.config.base.risk_level,
                    format!("denied function '{name}' invoked")
                ));
            }
        }
    }
}

fn walk_statement_expressions(stmt: &sqlparser::ast::Statement, names: &mut Vec<CompactString>) {
    use sqlparser::ast::{SetExpr, Statement as Ast};
    fn walk_set_expr(set_expr: &SetExpr, names: &mut Vec<CompactString>) {
        match set_expr {
            SetExpr::Select(select) => {
                for item in &select.projection {
                    if let sqlparser::ast::SelectItem::UnnamedExpr(expr)
                    | sqlparser::ast::SelectItem::ExprWithAlias {
                        expr, ..
                    } = item
                    {
                        extract_function_names(expr, names);
                    }
                }
                if let Some(selection) = &select.selection {
                    extract_function_names(selection, names);
                }
            }
            SetExpr::SetOperation {
                left,
                right,
                ..
            } => {
                walk_set_expr(left, names);
                walk_set_expr(right, names);
            }
            SetExpr::Query(q) => walk_set_expr(&q.body, names),
            _ => {}
        }
    }

    match stmt {
        Ast::Query(query) => walk_set_expr(&query.body, names),
        Ast::Update {
            selection: Some(sel),
            ..
        } => extract_function_names(sel, names),
        Ast::Delete(delete) => {
            if let Some(sel) = &delete.selection {
                extract_function_names(sel, names);
            }
        }
        _ => {}
    }
}
