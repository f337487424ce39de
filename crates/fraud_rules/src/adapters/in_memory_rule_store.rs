// Rust guideline compliant 2026-10-17

//! In-memory adapter for the `RuleStore` port.
//!
//! Definitions live behind one `RwLock` and are published as an immutable
//! [`RuleSet`] snapshot rebuilt on every definition write. Trigger
//! statistics have one `Mutex` per rule, so concurrent `record_trigger` calls
//! on different rules never contend and calls on the same rule never lose an
//! increment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{Rule, RuleDraft, RulePatch, StoreError};
use parking_lot::{Mutex, RwLock};
use rule_engine::{CompiledRule, RuleSet, RuleStore};

#[derive(Debug, Default, Clone, Copy)]
struct TriggerStats {
    count: u64,
    last: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Entry {
    compiled: Arc<CompiledRule>,
    stats: Arc<Mutex<TriggerStats>>,
}

impl Entry {
    fn to_rule(&self) -> Rule {
        let stats = *self.stats.lock();
        Rule { trigger_count: stats.count, last_triggered: stats.last, ..self.compiled.rule().clone() }
    }
}

#[derive(Debug, Default)]
struct Rules {
    /// Creation order.
    entries: Vec<Entry>,
    snapshot: RuleSet,
}

impl Rules {
    fn position(&self, id: uuid::Uuid) -> Result<usize, StoreError> {
        self.entries.iter().position(|e| e.compiled.id() == id).ok_or(StoreError::NotFound { id })
    }

    fn publish(&mut self) {
        self.snapshot = RuleSet::new(self.entries.iter().map(|e| Arc::clone(&e.compiled)).collect());
    }
}

/// `RuleStore` adapter holding rules in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<Rules>,
}

impl InMemoryRuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the definition at `index`, keeping its statistics.
    fn replace(rules: &mut Rules, index: usize, compiled: CompiledRule) -> Rule {
        let entry = &mut rules.entries[index];
        entry.compiled = Arc::new(compiled);
        let rule = entry.to_rule();
        rules.publish();
        rule
    }
}

impl RuleStore for InMemoryRuleStore {
    async fn add(&self, draft: RuleDraft) -> Result<Rule, StoreError> {
        let compiled = CompiledRule::compile(draft.into_rule(uuid::Uuid::new_v4(), Utc::now()))?;
        let rule = compiled.rule().clone();
        let mut rules = self.rules.write();
        rules.entries.push(Entry { compiled: Arc::new(compiled), stats: Arc::default() });
        rules.publish();
        tracing::info!(rule_id = %rule.id, name = %rule.name, "rule_store.added");
        Ok(rule)
    }

    async fn update(&self, id: uuid::Uuid, patch: RulePatch) -> Result<Rule, StoreError> {
        let mut rules = self.rules.write();
        let index = rules.position(id)?;
        let patched = patch.apply(rules.entries[index].compiled.rule(), Utc::now());
        let compiled = CompiledRule::compile(patched)?;
        let rule = Self::replace(&mut rules, index, compiled);
        tracing::info!(rule_id = %id, "rule_store.updated");
        Ok(rule)
    }

    async fn remove(&self, id: uuid::Uuid) -> Result<Rule, StoreError> {
        let mut rules = self.rules.write();
        let index = rules.position(id)?;
        let entry = rules.entries.remove(index);
        rules.publish();
        tracing::info!(rule_id = %id, "rule_store.removed");
        Ok(entry.to_rule())
    }

    async fn toggle(&self, id: uuid::Uuid, enabled: bool) -> Result<Rule, StoreError> {
        let mut rules = self.rules.write();
        let index = rules.position(id)?;
        let current = &rules.entries[index].compiled;
        let toggled = current.with_rule(Rule { enabled, updated_at: Utc::now(), ..current.rule().clone() });
        let rule = Self::replace(&mut rules, index, toggled);
        tracing::info!(rule_id = %id, enabled, "rule_store.toggled");
        Ok(rule)
    }

    async fn record_trigger(&self, id: uuid::Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let stats = {
            let rules = self.rules.read();
            let index = rules.position(id)?;
            Arc::clone(&rules.entries[index].stats)
        };
        let mut stats = stats.lock();
        stats.count += 1;
        stats.last = stats.last.max(Some(at));
        Ok(())
    }

    async fn get(&self, id: uuid::Uuid) -> Result<Rule, StoreError> {
        let rules = self.rules.read();
        let index = rules.position(id)?;
        Ok(rules.entries[index].to_rule())
    }

    async fn list(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self.rules.read().entries.iter().map(Entry::to_rule).collect())
    }

    async fn snapshot(&self) -> Result<RuleSet, StoreError> {
        Ok(self.rules.read().snapshot.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Action, ConditionType, RuleCondition, ValidationError};

    fn draft(name: &str) -> RuleDraft {
        RuleDraft::new(name).condition(RuleCondition::new(
            "1",
            ConditionType::Amount,
            "transaction_amount",
            "greater_than",
            "1000",
        ))
    }

    // RS-T01: add assigns identity and fresh statistics.
    #[tokio::test]
    async fn add_assigns_identity_and_fresh_stats() {
        let store = InMemoryRuleStore::new();
        let rule = store.add(draft("a")).await.unwrap();
        assert_eq!(rule.trigger_count, 0);
        assert_eq!(rule.last_triggered, None);
        assert_eq!(rule.created_at, rule.updated_at);
        assert_eq!(store.get(rule.id).await.unwrap(), rule);
    }

    // RS-T02: invalid drafts are never stored.
    #[tokio::test]
    async fn invalid_draft_is_rejected() {
        let store = InMemoryRuleStore::new();
        let err = store.add(RuleDraft::new("empty")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::NoConditions)));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    // RS-T03: update re-validates and keeps statistics.
    #[tokio::test]
    async fn update_revalidates_and_keeps_stats() {
        let store = InMemoryRuleStore::new();
        let rule = store.add(draft("a")).await.unwrap();
        store.record_trigger(rule.id, Utc::now()).await.unwrap();

        let updated = store
            .update(rule.id, RulePatch { action: Some(Action::Block), ..RulePatch::default() })
            .await
            .unwrap();
        assert_eq!(updated.action, Action::Block);
        assert_eq!(updated.trigger_count, 1);
        assert!(updated.updated_at >= rule.updated_at);

        let bad = RulePatch { conditions: Some(vec![]), ..RulePatch::default() };
        assert!(matches!(store.update(rule.id, bad).await, Err(StoreError::Validation(_))));
        assert_eq!(store.get(rule.id).await.unwrap().action, Action::Block);
    }

    // RS-T04: unknown ids are hard errors.
    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryRuleStore::new();
        let id = uuid::Uuid::new_v4();
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(store.toggle(id, false).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(store.remove(id).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(store.record_trigger(id, Utc::now()).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(store.update(id, RulePatch::default()).await, Err(StoreError::NotFound { .. })));
    }

    // RS-T05: toggle touches only the flag and updated_at.
    #[tokio::test]
    async fn toggle_changes_only_the_flag() {
        let store = InMemoryRuleStore::new();
        let rule = store.add(draft("a")).await.unwrap();
        let toggled = store.toggle(rule.id, false).await.unwrap();
        assert!(!toggled.enabled);
        assert_eq!(toggled.conditions, rule.conditions);
        assert_eq!(toggled.name, rule.name);
        assert_eq!(store.snapshot().await.unwrap().enabled().count(), 0);
    }

    // RS-T06: snapshots are isolated from later writes.
    #[tokio::test]
    async fn snapshot_is_copy_on_write() {
        let store = InMemoryRuleStore::new();
        let a = store.add(draft("a")).await.unwrap();
        let before = store.snapshot().await.unwrap();
        store.add(draft("b")).await.unwrap();
        store.remove(a.id).await.unwrap();

        let names: Vec<_> = before.iter().map(|r| r.name().to_owned()).collect();
        assert_eq!(names, ["a"]);
        let after: Vec<_> = store.snapshot().await.unwrap().iter().map(|r| r.name().to_owned()).collect();
        assert_eq!(after, ["b"]);
    }

    // RS-T07: list keeps creation order across updates.
    #[tokio::test]
    async fn list_keeps_creation_order() {
        let store = InMemoryRuleStore::new();
        let a = store.add(draft("a")).await.unwrap();
        store.add(draft("b")).await.unwrap();
        store.update(a.id, RulePatch { name: Some("z".to_owned()), ..RulePatch::default() }).await.unwrap();
        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["z", "b"]);
    }

    // RS-T08: last_triggered is the latest trigger time, not the latest call.
    #[tokio::test]
    async fn last_triggered_keeps_the_latest_time() {
        let store = InMemoryRuleStore::new();
        let rule = store.add(draft("a")).await.unwrap();
        let late = Utc::now();
        let early = late - chrono::Duration::seconds(30);
        store.record_trigger(rule.id, late).await.unwrap();
        store.record_trigger(rule.id, early).await.unwrap();
        let stored = store.get(rule.id).await.unwrap();
        assert_eq!(stored.trigger_count, 2);
        assert_eq!(stored.last_triggered, Some(late));
    }

    // RS-T09: concurrent triggers on one rule lose no increment.
    #[test]
    fn concurrent_triggers_are_all_counted() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 250;

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let store = InMemoryRuleStore::new();
        let id = runtime.block_on(store.add(draft("hot"))).unwrap().id;

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                    for _ in 0..PER_THREAD {
                        runtime.block_on(store.record_trigger(id, Utc::now())).unwrap();
                    }
                });
            }
        });

        let stored = runtime.block_on(store.get(id)).unwrap();
        assert_eq!(stored.trigger_count, THREADS * PER_THREAD);
        assert!(stored.last_triggered.is_some());
    }
}
