//! Configuration shapes for the validator, its checkers, and the
//! deduplication filter.
//!
//! The core only defines these structs and their validation; reading them
//! from a TOML/JSON/YAML file (or wiring them from environment variables)
//! is the host's job, the same way a host wires a mapper framework's XML
//! into that framework's own config types. `RulesConfig::validate` is the
//! one piece of logic that belongs here: it is pure and operates only on
//! already-deserialized data.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppResult, config_error},
    rewrite::{
        limit_injection::LimitInjectionConfig, soft_delete::SoftDeleteConfig,
        tenant::TenantIsolationConfig
    },
    violation::RiskLevel
};

/// `activeStrategy` enumerated values from the configuration shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveStrategy {
    Dev,
    Test,
    Prod
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetOperationKind {
    Union,
    UnionAll,
    Intersect,
    Except,
    Minus
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub enabled:            bool,
    pub active_strategy:    ActiveStrategy,
    pub violation_strategy: crate::violation::ViolationStrategy,
    #[serde(default)]
    pub deduplication:      DeduplicationConfig,
    #[serde(default)]
    pub rules:              RulesConfig,
    #[serde(default)]
    pub rewrite:            RewriteConfig
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled:            true,
            active_strategy:    ActiveStrategy::Dev,
            violation_strategy: crate::violation::ViolationStrategy::Warn,
            deduplication:      DeduplicationConfig::default(),
            rules:              RulesConfig::default(),
            rewrite:            RewriteConfig::default()
        }
    }
}

/// Rewrite pipeline (C6) configuration: each kind is independently
/// toggleable, and `limit_injection` additionally names the database product
/// used to pick a [`crate::dialect::DialectStrategy`] when the caller has no
/// live `DataSource` metadata to query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    pub tenant_isolation: TenantIsolationConfig,
    pub soft_delete:      SoftDeleteConfig,
    pub limit_injection:  LimitInjectionConfig,
    pub product_name:     String
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            tenant_isolation: TenantIsolationConfig::default(),
            soft_delete:      SoftDeleteConfig::default(),
            limit_injection:  LimitInjectionConfig::default(),
            product_name:     "MySQL".into()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    pub enabled:  bool,
    pub cache_size: usize,
    pub ttl_ms:   u64
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled:    true,
            cache_size: 1000,
            ttl_ms:     100
        }
    }
}

/// Base fields every per-checker config carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    pub enabled:    bool,
    pub risk_level: RiskLevel
}

impl CheckerConfig {
    pub fn new(enabled: bool, risk_level: RiskLevel) -> Self {
        Self {
            enabled,
            risk_level
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyConditionConfig {
    #[serde(flatten)]
    pub base:            CheckerConfig,
    pub patterns:        Vec<String>,
    pub custom_patterns: Vec<String>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistFieldsConfig {
    #[serde(flatten)]
    pub base:   CheckerConfig,
    /// Supports a `*` suffix for prefix wildcards (e.g. `"password*"`).
    pub fields: HashSet<String>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistFieldsConfig {
    #[serde(flatten)]
    pub base:                     CheckerConfig,
    pub fields:                   HashSet<String>,
    #[serde(default)]
    pub by_table:                 HashMap<String, Vec<String>>,
    pub enforce_for_unknown_tables: bool
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationAbuseConfig {
    #[serde(flatten)]
    pub base:          CheckerConfig,
    pub max_offset:    u64,
    pub max_page_size: u64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoPaginationConfig {
    #[serde(flatten)]
    pub base:                  CheckerConfig,
    #[serde(default)]
    pub whitelist_mapper_ids:  Vec<String>,
    #[serde(default)]
    pub whitelist_tables:      Vec<String>,
    #[serde(default)]
    pub unique_key_fields:     Vec<String>,
    /// Fields that, when they are the only columns referenced in the WHERE
    /// clause, make an unpaginated query HIGH risk rather than CRITICAL —
    /// mirrors `BlacklistFieldsConfig.fields`.
    #[serde(default)]
    pub blacklist_fields:      HashSet<String>,
    pub enforce_for_all_queries: bool
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeniedTableConfig {
    #[serde(flatten)]
    pub base:           CheckerConfig,
    /// Wildcard `*` supported (e.g. `"tmp_*"`).
    pub denied_tables:  Vec<String>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOnlyTableConfig {
    #[serde(flatten)]
    pub base:             CheckerConfig,
    pub readonly_tables:  Vec<String>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DangerousFunctionConfig {
    #[serde(flatten)]
    pub base:             CheckerConfig,
    pub denied_functions: HashSet<String>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetOperationConfig {
    #[serde(flatten)]
    pub base:               CheckerConfig,
    pub allowed_operations: HashSet<SetOperationKind>
}

/// Aggregate of every per-checker config, keyed by checker name, plus the
/// validation the spec requires before any of it is handed to checkers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub no_where_clause:    CheckerConfig,
    pub dummy_condition:    DummyConditionConfig,
    pub blacklist_fields:   BlacklistFieldsConfig,
    pub whitelist_fields:   WhitelistFieldsConfig,
    pub pagination_abuse:   PaginationAbuseConfig,
    pub no_pagination:      NoPaginationConfig,
    pub logical_pagination: CheckerConfig,
    pub missing_order_by:   CheckerConfig,
    pub denied_table:       DeniedTableConfig,
    pub read_only_table:    ReadOnlyTableConfig,
    pub dangerous_function: DangerousFunctionConfig,
    pub set_operation:      SetOperationConfig,
    pub multi_statement:    CheckerConfig,
    pub ddl_operation:      CheckerConfig,
    pub drop_detected:      CheckerConfig,
    pub truncate_detected:  CheckerConfig,
    pub call_statement:     CheckerConfig,
    pub metadata_statement: CheckerConfig,
    pub set_statement:      CheckerConfig,
    pub sql_comment:        CheckerConfig,
    pub into_outfile:       CheckerConfig
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            no_where_clause:    CheckerConfig::new(true, RiskLevel::Critical),
            dummy_condition:    DummyConditionConfig {
                base:            CheckerConfig::new(true, RiskLevel::High),
                patterns:        vec![
                    "1=1".into(),
                    "1 = 1".into(),
                    "true".into(),
                    "'1'='1'".into(),
                    "'a'='a'".into()
                ],
                custom_patterns: Vec::new()
            },
            blacklist_fields:   BlacklistFieldsConfig {
                base:   CheckerConfig::new(false, RiskLevel::High),
                fields: HashSet::new()
            },
            whitelist_fields:   WhitelistFieldsConfig {
                base:                       CheckerConfig::new(false, RiskLevel::High),
                fields:                     HashSet::new(),
                by_table:                   HashMap::new(),
                enforce_for_unknown_tables: false
            },
            pagination_abuse:   PaginationAbuseConfig {
                base:          CheckerConfig::new(true, RiskLevel::Medium),
                max_offset:    10_000,
                max_page_size: 1_000
            },
            no_pagination:      NoPaginationConfig {
                base:                    CheckerConfig::new(true, RiskLevel::Critical),
                whitelist_mapper_ids:    Vec::new(),
                whitelist_tables:        Vec::new(),
                unique_key_fields:       vec!["id".into()],
                blacklist_fields:        HashSet::new(),
                enforce_for_all_queries: false
            },
            logical_pagination: CheckerConfig::new(true, RiskLevel::High),
            missing_order_by:   CheckerConfig::new(true, RiskLevel::Low),
            denied_table:       DeniedTableConfig {
                base:          CheckerConfig::new(false, RiskLevel::Critical),
                denied_tables: Vec::new()
            },
            read_only_table:    ReadOnlyTableConfig {
                base:            CheckerConfig::new(false, RiskLevel::Critical),
                readonly_tables: Vec::new()
            },
            dangerous_function: DangerousFunctionConfig {
                base:             CheckerConfig::new(true, RiskLevel::High),
                denied_functions: ["SLEEP", "BENCHMARK", "LOAD_FILE", "PG_SLEEP"]
                    .into_iter()
                    .map(String::from)
                    .collect()
            },
            set_operation:      SetOperationConfig {
                base:               CheckerConfig::new(false, RiskLevel::Medium),
                allowed_operations: HashSet::new()
            },
            multi_statement:    CheckerConfig::new(true, RiskLevel::Critical),
            ddl_operation:      CheckerConfig::new(true, RiskLevel::Critical),
            drop_detected:      CheckerConfig::new(true, RiskLevel::Critical),
            truncate_detected:  CheckerConfig::new(true, RiskLevel::Critical),
            call_statement:     CheckerConfig::new(false, RiskLevel::Medium),
            metadata_statement: CheckerConfig::new(false, RiskLevel::Info),
            set_statement:      CheckerConfig::new(false, RiskLevel::Info),
            sql_comment:        CheckerConfig::new(true, RiskLevel::Medium),
            into_outfile:       CheckerConfig::new(true, RiskLevel::Critical)
        }
    }
}

impl RulesConfig {
    /// Validate configuration shape constraints from the spec: numeric
    /// fields positive where stated, pattern lists non-empty when their
    /// checker is enabled and requires them. Called by the host at startup,
    /// never by `validate()` itself.
    pub fn validate(&self) -> AppResult<()> {
        if self.pagination_abuse.base.enabled {
            if self.pagination_abuse.max_offset == 0 {
                return Err(config_error("paginationAbuse.maxOffset must be > 0"));
            }
            if self.pagination_abuse.max_page_size == 0 {
                return Err(config_error("paginationAbuse.maxPageSize must be > 0"));
            }
        }
        if self.denied_table.base.enabled && self.denied_table.denied_tables.is_empty() {
            return Err(config_error(
                "deniedTable is enabled but deniedTables is empty"
            ));
        }
        if self.read_only_table.base.enabled && self.read_only_table.readonly_tables.is_empty() {
            return Err(config_error(
                "readOnlyTable is enabled but readonlyTables is empty"
            ));
        }
        if self.dangerous_function.base.enabled && self.dangerous_function.denied_functions.is_empty()
        {
            return Err(config_error(
                "dangerousFunction is enabled but deniedFunctions is empty"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_config_passes_validation() {
        assert!(RulesConfig::default().validate().is_ok());
    }

    #[test]
    fn pagination_abuse_rejects_zero_max_offset() {
        let mut cfg = RulesConfig::default();
        cfg.pagination_abuse.max_offset = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn denied_table_requires_non_empty_list_when_enabled() {
        let mut cfg = RulesConfig::default();
        cfg.denied_table.base.enabled = true;
        assert!(cfg.validate().is_err());
        cfg.denied_table.denied_tables.push("secrets".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = Config::default();
        let serialized = toml::to_string(&cfg).expect("serializable");
        let parsed: Config = toml::from_str(&serialized).expect("parseable");
        assert_eq!(parsed.enabled, cfg.enabled);
    }
}
