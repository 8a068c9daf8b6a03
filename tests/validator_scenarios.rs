use sqlguard::{
    config::Config,
    context::{ParseMode, SqlContext},
    dialect::{DialectStrategy, OracleDialect},
    validator::SqlGuard
};

fn ctx(sql: &str, mapper_id: &str) -> SqlContext {
    SqlContext::builder(sql, mapper_id).build().unwrap()
}

#[test]
fn s1_no_where_delete_is_single_critical_violation() {
    let guard = SqlGuard::new(Config::default()).unwrap();
    let mut context = ctx("DELETE FROM users", "UserMapper.deleteAll");
    let result = guard.validate(&mut context).unwrap();
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].kind, "NoWhereClause");
    assert_eq!(
        result.violations[0].risk_level,
        sqlguard::violation::RiskLevel::Critical
    );
}

#[test]
fn s2_dummy_condition_fires_without_no_where_clause() {
    let guard = SqlGuard::new(Config::default()).unwrap();
    let mut context = ctx("SELECT * FROM users WHERE 1=1", "UserMapper.findAll");
    let result = guard.validate(&mut context).unwrap();
    let kinds: Vec<&str> = result.violations.iter().map(|v| v.kind).collect();
    assert!(kinds.contains(&"DummyCondition"));
    assert!(!kinds.contains(&"NoWhereClause"));
}

#[test]
fn s3_blacklisted_fields_in_where_are_named_in_one_violation() {
    let mut config = Config::default();
    config.rules.blacklist_fields.base.enabled = true;
    config.rules.blacklist_fields.fields.insert("deleted".into());
    config.rules.blacklist_fields.fields.insert("status".into());
    let guard = SqlGuard::new(config).unwrap();
    let mut context = ctx(
        "SELECT * FROM users WHERE deleted = 0 AND status = 'active'",
        "UserMapper.findActive"
    );
    let result = guard.validate(&mut context).unwrap();
    let blacklist_hits: Vec<_> =
        result.violations.iter().filter(|v| v.kind == "BlacklistField").collect();
    assert_eq!(blacklist_hits.len(), 1);
    assert!(blacklist_hits[0].message.contains("deleted"));
    assert!(blacklist_hits[0].message.contains("status"));
}

#[test]
fn s4_deep_offset_is_suppressed_by_no_condition_pagination() {
    let guard = SqlGuard::new(Config::default()).unwrap();
    let mut context = ctx("SELECT * FROM orders LIMIT 50 OFFSET 100000", "OrderMapper.page");
    let result = guard.validate(&mut context).unwrap();
    let kinds: Vec<&str> = result.violations.iter().map(|v| v.kind).collect();
    assert!(kinds.contains(&"NoConditionPagination"));
    assert!(!kinds.contains(&"DeepPagination"));
}

#[test]
fn s5_stacked_statement_flags_multi_statement_and_ddl() {
    let guard = SqlGuard::new(Config::default()).unwrap();
    let mut context = ctx("SELECT * FROM u WHERE id=1; DROP TABLE u", "UserMapper.raw");
    let result = guard.validate(&mut context).unwrap();
    let kinds: Vec<&str> = result.violations.iter().map(|v| v.kind).collect();
    assert!(kinds.contains(&"MultiStatement"));
    assert!(kinds.contains(&"DdlOperation"));
}

#[test]
fn s6_oracle_limit_injection_wraps_with_rownum() {
    let parsed = sqlparser::parser::Parser::parse_sql(&sqlparser::dialect::GenericDialect {}, "SELECT * FROM t")
        .unwrap()
        .remove(0);
    let rewritten = OracleDialect.apply_limit(&parsed, 100).unwrap();
    let normalized = rewritten.to_string().split_whitespace().collect::<Vec<_>>().join(" ");
    assert_eq!(normalized, "SELECT * FROM (SELECT * FROM t) WHERE ROWNUM <= 100");
}

#[test]
fn invariant_clean_query_passes_with_default_checkers() {
    let guard = SqlGuard::new(Config::default()).unwrap();
    let mut context = ctx(
        "SELECT id, name FROM orders WHERE customer_id = 1 ORDER BY id LIMIT 20",
        "OrderMapper.byCustomer"
    );
    let result = guard.validate(&mut context).unwrap();
    assert!(result.passed());
    assert!(result.violations.is_empty());
}

#[test]
fn invariant_disabling_a_checker_removes_only_its_violations() {
    let mut config = Config::default();
    config.rules.dummy_condition.base.enabled = false;
    let guard = SqlGuard::new(config).unwrap();
    let mut context = ctx("SELECT * FROM users WHERE 1=1", "UserMapper.findAll");
    let result = guard.validate(&mut context).unwrap();
    assert!(!result.violations.iter().any(|v| v.kind == "DummyCondition"));
}

#[test]
fn invariant_dedup_skips_identical_consecutive_calls() {
    let guard = SqlGuard::new(Config::default()).unwrap();
    let mut first = ctx("DELETE FROM users", "UserMapper.deleteAll");
    let first_result = guard.validate(&mut first).unwrap();
    assert!(!first_result.passed());

    let mut second = ctx("DELETE FROM users", "UserMapper.deleteAll");
    let second_result = guard.validate(&mut second).unwrap();
    assert!(second_result.passed());
}

#[test]
fn invariant_lenient_parse_failure_still_flags_sql_comment() {
    let guard = SqlGuard::new(Config::default()).unwrap();
    let mut context = SqlContext::builder("SELEKT 1 -- DROP everything", "Raw.broken")
        .parse_mode(ParseMode::Lenient)
        .build()
        .unwrap();
    let result = guard.validate(&mut context).unwrap();
    assert!(result.violations.iter().any(|v| v.kind == "SqlComment"));
}

#[test]
fn invariant_block_strategy_raises_on_any_violation() {
    let mut config = Config::default();
    config.violation_strategy = sqlguard::violation::ViolationStrategy::Block;
    let guard = SqlGuard::new(config).unwrap();
    let mut context = ctx("DELETE FROM users", "UserMapper.deleteAll");
    assert!(guard.validate(&mut context).is_err());
}
