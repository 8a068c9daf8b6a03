//! Dialect strategy (C8): dialect-specific row-limit injection consumed by
//! the rewrite pipeline's limit-injection rewriter.
//!
//! sqlparser's AST models `LIMIT`/`OFFSET` as a single dialect-agnostic
//! `LimitClause`; it has no node for `TOP n`, `ROWNUM`, or `FETCH FIRST n
//! ROWS ONLY`. Rather than hand-build those fragments field-by-field (and
//! risk drifting from whatever shape the installed `sqlparser` version
//! actually has), each strategy below formats the already-serialized
//! statement text with the dialect's own keyword and reparses it through the
//! same facade the rest of the crate uses — the parser is the one thing here
//! guaranteed to produce a well-formed AST for its own dialect's syntax.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex}
};

use sqlparser::{ast::Statement as AstStatement, dialect::GenericDialect, parser::Parser};

use crate::error::{AppResult, parse_error};

fn reparse(sql: &str) -> AppResult<AstStatement> {
    Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| parse_error(format!("dialect rewrite produced unparsable SQL: {e}")))?
        .into_iter()
        .next()
        .ok_or_else(|| parse_error("dialect rewrite produced no statement"))
}

/// Splice `fragment` in right after the statement's leading `SELECT` keyword
/// (used by `TOP n` and `FIRST n` dialects, which place their row cap there).
fn splice_after_select(rendered: &str, fragment: &str) -> String {
    let trimmed = rendered.trim_start();
    if let Some(rest) = trimmed
        .get(..6)
        .filter(|prefix| prefix.eq_ignore_ascii_case("SELECT"))
    {
        format!("{rest} {fragment}{}", &trimmed[6..])
    } else {
        rendered.to_string()
    }
}

/// Per-dialect row-limit injection. `apply_limit` takes the statement to
/// modify and the desired row cap, and returns a freshly parsed AST with the
/// cap applied; callers never mutate the input in place (invariant: clone
/// first, mutate the clone).
pub trait DialectStrategy: Send + Sync {
    fn database_type(&self) -> &'static str;

    fn apply_limit(&self, statement: &AstStatement, n: u64) -> AppResult<AstStatement>;
}

/// `MySQL`, `MariaDB`, `PostgreSQL`, `openGauss`, `GaussDB`, `Kingbase`, `DM`,
/// and `Oscar` all accept a trailing `LIMIT n` clause with identical
/// semantics (spec.md's dialect table lists them as one row), so they share
/// one strategy parameterized only by the name reported to the caller.
pub struct LimitKeywordDialect {
    name: &'static str
}

impl LimitKeywordDialect {
    pub fn new(name: &'static str) -> Self {
        Self {
            name
        }
    }
}

impl DialectStrategy for LimitKeywordDialect {
    fn database_type(&self) -> &'static str {
        self.name
    }

    fn apply_limit(&self, statement: &AstStatement, n: u64) -> AppResult<AstStatement> {
        reparse(&format!("{statement} LIMIT {n}"))
    }
}

/// SQL Server: `SELECT TOP n ...`.
pub struct SqlServerDialect;

impl DialectStrategy for SqlServerDialect {
    fn database_type(&self) -> &'static str {
        "SQL Server"
    }

    fn apply_limit(&self, statement: &AstStatement, n: u64) -> AppResult<AstStatement> {
        reparse(&splice_after_select(&statement.to_string(), &format!("TOP {n}")))
    }
}

/// Oracle: wrap the query as a derived table and filter on `ROWNUM`.
pub struct OracleDialect;

impl DialectStrategy for OracleDialect {
    fn database_type(&self) -> &'static str {
        "Oracle"
    }

    fn apply_limit(&self, statement: &AstStatement, n: u64) -> AppResult<AstStatement> {
        let inner = statement.to_string();
        reparse(&format!("SELECT * FROM ({inner}) WHERE ROWNUM <= {n}"))
    }
}

/// DB2: ANSI `FETCH FIRST n ROWS ONLY`.
pub struct FetchFirstDialect;

impl DialectStrategy for FetchFirstDialect {
    fn database_type(&self) -> &'static str {
        "DB2"
    }

    fn apply_limit(&self, statement: &AstStatement, n: u64) -> AppResult<AstStatement> {
        reparse(&format!("{statement} FETCH FIRST {n} ROWS ONLY"))
    }
}

/// Informix: `SELECT FIRST n ...`.
pub struct InformixDialect;

impl DialectStrategy for InformixDialect {
    fn database_type(&self) -> &'static str {
        "Informix"
    }

    fn apply_limit(&self, statement: &AstStatement, n: u64) -> AppResult<AstStatement> {
        reparse(&splice_after_select(&statement.to_string(), &format!("FIRST {n}")))
    }
}

/// `productName` is matched case-insensitively by substring, same as the
/// spec's own `DatabaseMetaData.productName` factory description; unknown
/// names fall back to the MySQL-family strategy.
pub fn create_dialect(product_name: &str) -> Arc<dyn DialectStrategy> {
    let lower = product_name.to_ascii_lowercase();
    if lower.contains("sql server") || lower.contains("mssql") {
        Arc::new(SqlServerDialect)
    } else if lower.contains("oracle") {
        Arc::new(OracleDialect)
    } else if lower.contains("db2") {
        Arc::new(FetchFirstDialect)
    } else if lower.contains("informix") {
        Arc::new(InformixDialect)
    } else if lower.contains("postgres") {
        Arc::new(LimitKeywordDialect::new("PostgreSQL"))
    } else if lower.contains("opengauss") {
        Arc::new(LimitKeywordDialect::new("openGauss"))
    } else if lower.contains("gaussdb") {
        Arc::new(LimitKeywordDialect::new("GaussDB"))
    } else if lower.contains("kingbase") {
        Arc::new(LimitKeywordDialect::new("Kingbase"))
    } else if lower.contains("mariadb") {
        Arc::new(LimitKeywordDialect::new("MariaDB"))
    } else if lower.contains("dm") && lower.contains("database") {
        Arc::new(LimitKeywordDialect::new("DM"))
    } else if lower.contains("oscar") {
        Arc::new(LimitKeywordDialect::new("Oscar"))
    } else {
        Arc::new(LimitKeywordDialect::new("MySQL"))
    }
}

/// Caches a dialect strategy per data-source identity so the host doesn't
/// repeat the `productName` string match on every call.
#[derive(Default)]
pub struct DialectFactory {
    cache: Mutex<HashMap<String, Arc<dyn DialectStrategy>>>
}

impl DialectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `datasource_id` identifies the connection/pool; `product_name` is
    /// looked up (and the result cached) only on a miss.
    pub fn get_dialect(&self, datasource_id: &str, product_name: &str) -> Arc<dyn DialectStrategy> {
        let mut cache = self.cache.lock().expect("dialect cache mutex poisoned");
        if let Some(strategy) = cache.get(datasource_id) {
            return Arc::clone(strategy);
        }
        let strategy = create_dialect(product_name);
        cache.insert(datasource_id.to_string(), Arc::clone(&strategy));
        strategy
    }
}

#[cfg(test)]
mod tests {
    use sqlparser::{dialect::GenericDialect, parser::Parser};

    use super::*;

    fn parse(sql: &str) -> AstStatement {
        Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0)
    }

    #[test]
    fn mysql_family_appends_limit() {
        let stmt = parse("SELECT * FROM t");
        let dialect = LimitKeywordDialect::new("MySQL");
        let rewritten = dialect.apply_limit(&stmt, 100).unwrap();
        assert_eq!(
            rewritten.to_string().split_whitespace().collect::<Vec<_>>().join(" "),
            "SELECT * FROM t LIMIT 100"
        );
    }

    #[test]
    fn oracle_wraps_with_rownum() {
        let stmt = parse("SELECT * FROM t");
        let rewritten = OracleDialect.apply_limit(&stmt, 100).unwrap();
        let normalized = rewritten.to_string().split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalized, "SELECT * FROM (SELECT * FROM t) WHERE ROWNUM <= 100");
    }

    #[test]
    fn sql_server_injects_top() {
        let stmt = parse("SELECT * FROM t");
        let rewritten = SqlServerDialect.apply_limit(&stmt, 50).unwrap();
        let normalized = rewritten.to_string().to_ascii_uppercase();
        assert!(normalized.contains("TOP 50"));
    }

    #[test]
    fn create_dialect_falls_back_to_mysql_for_unknown_product() {
        let dialect = create_dialect("SomeExoticEngine");
        assert_eq!(dialect.database_type(), "MySQL");
    }

    #[test]
    fn factory_caches_by_datasource_identity() {
        let factory = DialectFactory::new();
        let a = factory.get_dialect("ds1", "PostgreSQL");
        let b = factory.get_dialect("ds1", "Oracle");
        assert_eq!(a.database_type(), b.database_type());
    }
}
