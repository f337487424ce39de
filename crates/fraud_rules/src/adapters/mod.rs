// Rust guideline compliant 2026-10-17

//! Adapters (secondary ports) for the `fraud_rules` binary.
//!
//! Each sub-module implements one or more hexagonal port traits defined in
//! the `domain` and `rule_engine` crates, or loads input for them.

pub mod concurrent_queue;
pub mod in_memory_rule_store;
pub mod log_alarm;
pub mod random_scorer;
pub mod rules_file;
pub mod seed_rules;
pub mod sqlite_rule_store;
