//! `SqlContext`: the immutable, per-call value every checker, the
//! orchestrator, and the rewriter pipeline read from but never mutate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{AppResult, config_error},
    statement::Statement
};

/// Coarse SQL statement kind supplied (or inferred) by the caller, distinct
/// from `StatementKind` which is derived from the actual parsed AST —
/// `SqlType` is the caller's hint, `StatementKind` is the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Select,
    Update,
    Delete,
    Insert,
    Call,
    Ddl,
    Show,
    Use,
    Set,
    Unknown
}

impl SqlType {
    /// Infer the type from a SQL string's leading keyword, used when the
    /// caller does not supply one explicitly (construction contract: "set
    /// or inferable from `sql` prefix").
    pub fn infer_from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start();
        let first_word: String = trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match first_word.as_str() {
            "SELECT" | "WITH" => Self::Select,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "INSERT" | "REPLACE" => Self::Insert,
            "CALL" | "EXEC" | "EXECUTE" => Self::Call,
            "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" => Self::Ddl,
            "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" => Self::Show,
            "USE" => Self::Use,
            "SET" => Self::Set,
            _ => Self::Unknown
        }
    }
}

/// Pagination hints a mapper layer may pass down when it already knows it is
/// issuing a paged query (e.g. a MyBatis-style `RowBounds` parameter object).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionHints {
    pub row_bounds: Option<RowBounds>,
    pub page_param: Option<String>,
    /// Set by the host when a pagination plugin is active and will inject a
    /// database-level `LIMIT` at execution time, after `validate()` has
    /// already run against the unmodified SQL.
    #[serde(default)]
    pub pagination_plugin_active: bool
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RowBounds {
    pub offset: u64,
    pub limit:  u64
}

/// Strict parsing propagates parse failures; lenient parsing falls back to
/// an `Unparsed` sentinel so raw-text checkers can still run. Scoped per
/// call (spec's Open Question resolution), not a process-wide setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParseMode {
    Strict,
    #[default]
    Lenient
}

/// Immutable, per-call input to `validate`/`rewrite`.
///
/// Constructed once per call via [`SqlContextBuilder`], shared immutably
/// across all checkers, and dropped when the call returns along with its
/// statement cache entry.
#[derive(Debug, Clone)]
pub struct SqlContext {
    pub sql:         String,
    pub params:      HashMap<String, Value>,
    pub mapper_id:   String,
    pub sql_type:    SqlType,
    pub datasource:  Option<String>,
    pub parse_mode:  ParseMode,
    pub hints:       ExecutionHints,
    parsed_statement: Option<Statement>
}

impl SqlContext {
    pub fn builder(sql: impl Into<String>, mapper_id: impl Into<String>) -> SqlContextBuilder {
        SqlContextBuilder::new(sql, mapper_id)
    }

    pub fn parsed_statement(&self) -> Option<&Statement> {
        self.parsed_statement.as_ref()
    }

    /// Populated by the parser facade after step 3 of `validate` (spec
    /// invariant: `parsedStatement` is set after parsing and reused by the
    /// rewriter pipeline within the same call).
    pub fn set_parsed_statement(&mut self, statement: Statement) {
        self.parsed_statement = Some(statement);
    }

    pub fn namespace(&self) -> &str {
        self.mapper_id
            .split_once('.')
            .map(|(ns, _)| ns)
            .unwrap_or(&self.mapper_id)
    }
}

/// Builds and validates a [`SqlContext`], enforcing the construction
/// contract: `sql` non-empty, `mapperId` non-empty and contains a dot with a
/// non-empty namespace segment, `sqlType` set or inferable.
pub struct SqlContextBuilder {
    sql:        String,
    mapper_id:  String,
    params:     HashMap<String, Value>,
    sql_type:   Option<SqlType>,
    datasource: Option<String>,
    parse_mode: ParseMode,
    hints:      ExecutionHints
}

impl SqlContextBuilder {
    fn new(sql: impl Into<String>, mapper_id: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            mapper_id: mapper_id.into(),
            params: HashMap::new(),
            sql_type: None,
            datasource: None,
            parse_mode: ParseMode::default(),
            hints: ExecutionHints::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    pub fn parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn hints(mut self, hints: ExecutionHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn build(self) -> AppResult<SqlContext> {
        if self.sql.trim().is_empty() {
            return Err(config_error("SqlContext: sql must not be empty"));
        }
        let (namespace, method) = self
            .mapper_id
            .split_once('.')
            .ok_or_else(|| config_error("SqlContext: mapperId must contain a '.'"))?;
        if namespace.is_empty() {
            return Err(config_error("SqlContext: mapperId namespace segment must not be empty"));
        }
        if method.is_empty() {
            return Err(config_error("SqlContext: mapperId method segment must not be empty"));
        }
        let sql_type = self
            .sql_type
            .unwrap_or_else(|| SqlType::infer_from_sql(&self.sql));
        Ok(SqlContext {
            sql: self.sql,
            params: self.params,
            mapper_id: self.mapper_id,
            sql_type,
            datasource: self.datasource,
            parse_mode: self.parse_mode,
            hints: self.hints,
            parsed_statement: None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_sql() {
        let err = SqlContext::builder("   ", "UserMapper.find").build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_mapper_id_without_dot() {
        let err = SqlContext::builder("SELECT 1", "UserMapper").build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_mapper_id_with_empty_namespace() {
        let err = SqlContext::builder("SELECT 1", ".find").build();
        assert!(err.is_err());
    }

    #[test]
    fn infers_sql_type_from_prefix() {
        let ctx = SqlContext::builder("DELETE FROM users", "UserMapper.deleteAll")
            .build()
            .unwrap();
        assert_eq!(ctx.sql_type, SqlType::Delete);
    }

    #[test]
    fn explicit_sql_type_overrides_inference() {
        let ctx = SqlContext::builder("SELECT 1", "UserMapper.raw")
            .sql_type(SqlType::Unknown)
            .build()
            .unwrap();
        assert_eq!(ctx.sql_type, SqlType::Unknown);
    }

    #[test]
    fn namespace_extracts_leading_segment() {
        let ctx = SqlContext::builder("SELECT 1", "UserMapper.findById")
            .build()
            .unwrap();
        assert_eq!(ctx.namespace(), "UserMapper");
    }
}
