// Rust guideline compliant 2026-10-17

//! Shared domain types for the fraud rule engine.
//!
//! Defines the transaction record, the closed rule vocabulary, rule
//! definitions, evaluation reports, the error taxonomy, and the hexagonal
//! port traits: `TransactionSink`, `TransactionSource`, `Scorer`, and `Alarm`.
//! All workspace crates depend on this crate; it depends on none of them.

mod error;
mod report;
mod rule;
mod transaction;
mod vocabulary;

pub use error::{AlarmError, ConditionError, QueueError, ScorerError, StoreError, ValidationError};
pub use report::{DetectionReport, EvaluationResult, FraudSource, SessionReport, TriggeredRule};
pub use rule::{ConditionPatch, Rule, RuleCondition, RuleDraft, RulePatch};
pub use transaction::{FieldValue, Transaction};
pub use vocabulary::{Action, ConditionType, Field, FieldKind, Operator};

/// Hexagonal port: the write side of the transaction ingestion queue.
///
/// `Producer` depends exclusively on this trait -- never on a concrete adapter.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait TransactionSink {
    /// Write a batch of transactions into the queue.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Full` when capacity is exceeded, or
    /// `QueueError::Closed` when the queue has been shut down.
    async fn write_batch(&self, batch: Vec<Transaction>) -> Result<(), QueueError>;
}

/// Hexagonal port: the read side of the transaction ingestion queue.
///
/// The detection loop depends exclusively on this trait. Implementations
/// signal exhaustion via `QueueError::Closed`.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait TransactionSource {
    /// Read up to `max` transactions from the queue.
    ///
    /// Returns between 1 and `max` transactions when data is available.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Closed` when the queue is closed and drained.
    async fn read_batch(&self, max: usize) -> Result<Vec<Transaction>, QueueError>;
}

/// Hexagonal port: external fraud scoring model.
///
/// Composed with the rule verdict, never a replacement for it.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait Scorer {
    /// Fraud likelihood of `tx` in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `ScorerError::Failed` when no score can be produced.
    async fn score(&self, tx: &Transaction) -> Result<f64, ScorerError>;
}

/// Hexagonal port: fraud alert delivery.
///
/// Called once per fraud-positive detection report (best-effort).
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait Alarm {
    /// Raise an alert for `report`.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::DeliveryFailed` when the alert cannot be delivered.
    async fn trigger(&self, report: &DetectionReport) -> Result<(), AlarmError>;
}
