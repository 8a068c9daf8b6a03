//! SQL parser facade (C1): turns SQL text into [`Statement`] values, with
//! strict/lenient error handling and top-level `;` splitting for
//! multi-statement detection.

use sqlparser::{dialect::GenericDialect, parser::Parser};

use crate::{
    context::ParseMode,
    error::{AppResult, parse_error},
    statement::{Statement, StatementKind}
};

/// Stateless facade over `sqlparser`. Kept as a zero-sized type (like the
/// teacher's checkers) so it can be a `static`/shared value with no
/// per-instance configuration to race across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlParserFacade;

impl SqlParserFacade {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single SQL statement. In `Strict` mode a parse failure
    /// returns `Err`; in `Lenient` mode it returns an `Unparsed` sentinel
    /// carrying the raw SQL so text-pattern checkers still have something
    /// to run against.
    pub fn parse(&self, sql: &str, mode: ParseMode) -> AppResult<Statement> {
        match Parser::parse_sql(&GenericDialect {}, sql) {
            Ok(mut statements) if statements.len() == 1 => {
                Ok(Statement::from_ast(sql.to_string(), statements.remove(0)))
            }
            Ok(mut statements) if statements.is_empty() => match mode {
                ParseMode::Strict => Err(parse_error("no statement found")),
                ParseMode::Lenient => Ok(Statement::unparsed(sql))
            },
            Ok(statements) => {
                // More than one top-level statement: keep the first as the
                // primary parsed AST and record the rest as raw tail text so
                // MultiStatement can report on them without re-parsing.
                let mut iter = statements.into_iter();
                let first = iter.next().expect("checked len > 1 above");
                let mut stmt = Statement::from_ast(sql.to_string(), first);
                let tail: Vec<Statement> = iter
                    .map(|s| Statement::from_ast(s.to_string(), s))
                    .collect();
                stmt.tail_has_ddl = tail.iter().any(|s| s.kind == StatementKind::Ddl);
                stmt.multi_tail = tail.iter().map(|s| s.raw.clone().into()).collect();
                Ok(stmt)
            }
            Err(e) => match mode {
                ParseMode::Strict => Err(parse_error(e.to_string())),
                ParseMode::Lenient => Ok(Statement::unparsed(sql))
            }
        }
    }

    /// Split `sql` on top-level `;` (respecting quoted strings and `--`/`/*
    /// */` comments) and parse each segment independently. Used by the
    /// multi-statement injection checker, which needs the count of top-level
    /// statements rather than a single merged AST.
    pub fn parse_multi(&self, sql: &str, mode: ParseMode) -> AppResult<Vec<Statement>> {
        let segments = split_top_level_statements(sql);
        segments
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|segment| self.parse(segment, mode))
            .collect()
    }
}

/// Split SQL text on top-level semicolons, tracking single/double-quoted
/// string literals and `--`/`/* */` comments so a `;` inside a string or
/// comment does not count as a statement boundary.
fn split_top_level_statements(sql: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = sql.char_indices().peekable();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some((_, c)) = chars.next() {
        current.push(c);

        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_block_comment {
            if c == '*' && chars.peek().is_some_and(|(_, n)| *n == '/') {
                let (_, n) = chars.next().unwrap();
                current.push(n);
                in_block_comment = false;
            }
            continue;
        }
        if in_single_quote {
            if c == '\'' {
                in_single_quote = false;
            }
            continue;
        }
        if in_double_quote {
            if c == '"' {
                in_double_quote = false;
            }
            continue;
        }

        match c {
            '\'' => in_single_quote = true,
            '"' => in_double_quote = true,
            '-' if chars.peek().is_some_and(|(_, n)| *n == '-') => {
                let (_, n) = chars.next().unwrap();
                current.push(n);
                in_line_comment = true;
            }
            '/' if chars.peek().is_some_and(|(_, n)| *n == '*') => {
                let (_, n) = chars.next().unwrap();
                current.push(n);
                in_block_comment = true;
            }
            ';' => {
                current.pop();
                segments.push(std::mem::take(&mut current));
            }
            _ => {}
        }
    }
    if !current.trim().is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_select() {
        let facade = SqlParserFacade::new();
        let stmt = facade.parse("SELECT 1", ParseMode::Strict).unwrap();
        assert!(!stmt.is_unparsed());
    }

    #[test]
    fn strict_mode_propagates_parse_errors() {
        let facade = SqlParserFacade::new();
        let err = facade.parse("SELEKT 1 FRO", ParseMode::Strict);
        assert!(err.is_err());
    }

    #[test]
    fn lenient_mode_falls_back_to_unparsed() {
        let facade = SqlParserFacade::new();
        let stmt = facade.parse("SELEKT 1 FRO", ParseMode::Lenient).unwrap();
        assert!(stmt.is_unparsed());
        assert_eq!(stmt.raw, "SELEKT 1 FRO");
    }

    #[test]
    fn split_ignores_semicolons_inside_strings() {
        let segments = split_top_level_statements("SELECT 'a;b' FROM t; SELECT 2");
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn split_ignores_semicolons_inside_comments() {
        let segments =
            split_top_level_statements("SELECT 1; -- comment; with semicolon\nSELECT 2");
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn parse_multi_detects_stacked_statements() {
        let facade = SqlParserFacade::new();
        let stmts = facade
            .parse_multi("DELETE FROM users; DROP TABLE users", ParseMode::Strict)
            .unwrap();
        assert_eq!(stmts.len(), 2);
    }
}
