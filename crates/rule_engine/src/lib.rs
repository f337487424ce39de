// Rust guideline compliant 2026-10-17

//! Rule evaluation core.
//!
//! Resolves condition fields against a transaction, applies operators,
//! evaluates compiled rules, and defines the [`RuleStore`] port whose
//! snapshots feed an evaluation session.
//!
//! Entry points: [`CompiledRule::compile`], [`RuleEvaluator::evaluate`],
//! [`RuleStore::snapshot`].

mod compiled;
mod evaluator;
mod expression;
mod operator;
mod resolver;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{Rule, RuleDraft, RulePatch, StoreError};

pub use compiled::{CompiledCondition, CompiledRule};
pub use evaluator::{ConditionOutcome, RuleEvaluator};
pub use expression::{EvalLimits, Expression};
pub use operator::{Operand, apply};
pub use resolver::{EvaluationContext, Resolved, lookup_field, lookup_operator, resolve};

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// Immutable snapshot of a store's rules, in creation order.
///
/// Cloning shares the snapshot; later store writes never affect it.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Arc<[Arc<CompiledRule>]>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: Vec<Arc<CompiledRule>>) -> Self {
        Self { rules: rules.into() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledRule>> {
        self.rules.iter()
    }

    /// Enabled rules, in creation order.
    pub fn enabled(&self) -> impl Iterator<Item = &Arc<CompiledRule>> {
        self.rules.iter().filter(|rule| rule.enabled())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Arc<CompiledRule>;
    type IntoIter = std::slice::Iter<'a, Arc<CompiledRule>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

// ---------------------------------------------------------------------------
// RuleStore
// ---------------------------------------------------------------------------

/// Hexagonal port: the rule store.
///
/// The store owns rule lifecycle and is the only writer of trigger
/// statistics. Every write validates through [`CompiledRule::compile`], so
/// an invalid rule is never stored.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait RuleStore {
    /// Validate and store a new rule.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the draft is invalid.
    async fn add(&self, draft: RuleDraft) -> Result<Rule, StoreError>;

    /// Apply `patch`, re-validate, and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id and
    /// `StoreError::Validation` if the patched rule is invalid.
    async fn update(&self, id: uuid::Uuid, patch: RulePatch) -> Result<Rule, StoreError>;

    /// Delete a rule and return it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id.
    async fn remove(&self, id: uuid::Uuid) -> Result<Rule, StoreError>;

    /// Set the enabled flag; touches nothing else but `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id.
    async fn toggle(&self, id: uuid::Uuid, enabled: bool) -> Result<Rule, StoreError>;

    /// Count one trigger at `at`. Concurrent calls never lose an increment.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id.
    async fn record_trigger(&self, id: uuid::Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id.
    async fn get(&self, id: uuid::Uuid) -> Result<Rule, StoreError>;

    /// All rules with current trigger statistics, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backing store fails.
    async fn list(&self) -> Result<Vec<Rule>, StoreError>;

    /// Copy-on-write snapshot of the compiled rules.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backing store fails.
    async fn snapshot(&self) -> Result<RuleSet, StoreError>;
}
