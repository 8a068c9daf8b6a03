use std::time::Duration;

use sqlguard::{
    cache::{DedupCache, StatementCacheScope},
    context::ParseMode,
    parser::SqlParserFacade
};

#[test]
fn statement_cache_scope_returns_same_ast_reference_for_repeat_parse() {
    let scope = StatementCacheScope::enter();
    let facade = SqlParserFacade::new();
    let a = scope
        .get_or_parse(&facade, "SELECT * FROM orders", ParseMode::Strict)
        .unwrap();
    let b = scope
        .get_or_parse(&facade, "SELECT * FROM orders", ParseMode::Strict)
        .unwrap();
    assert!(std::rc::Rc::ptr_eq(&a, &b));
}

#[test]
fn statement_cache_scope_misses_on_different_sql() {
    let scope = StatementCacheScope::enter();
    let facade = SqlParserFacade::new();
    let a = scope
        .get_or_parse(&facade, "SELECT 1", ParseMode::Strict)
        .unwrap();
    let b = scope
        .get_or_parse(&facade, "SELECT 2", ParseMode::Strict)
        .unwrap();
    assert!(!std::rc::Rc::ptr_eq(&a, &b));
}

#[test]
fn dedup_cache_skips_identical_sql_within_ttl() {
    let cache = DedupCache::new(10, Duration::from_millis(200));
    assert!(!cache.should_skip("SELECT * FROM orders WHERE id = 1"));
    assert!(cache.should_skip("SELECT * FROM orders WHERE id = 1"));
}

#[test]
fn dedup_cache_treats_distinct_sql_independently() {
    let cache = DedupCache::new(10, Duration::from_millis(200));
    assert!(!cache.should_skip("SELECT 1"));
    assert!(!cache.should_skip("SELECT 2"));
}

#[test]
fn dedup_cache_evicts_oldest_entry_at_capacity() {
    let cache = DedupCache::new(2, Duration::from_secs(60));
    cache.should_skip("a");
    cache.should_skip("b");
    cache.should_skip("c");
    assert_eq!(cache.len(), 2);
}
