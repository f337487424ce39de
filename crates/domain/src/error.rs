// Rust guideline compliant 2026-10-17

//! Error taxonomy shared by the rule engine, stores, and pipeline adapters.

use crate::vocabulary::{ConditionType, Field};

/// Condition-level failure; always degrades to "not matched".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// The field name is not registered for the condition type.
    #[error("unknown field `{field}` for condition type `{condition_type}`")]
    UnknownField { condition_type: ConditionType, field: String },
    /// The operator name is not legal for the condition type.
    #[error("operator `{operator}` is not allowed for condition type `{condition_type}`")]
    UnknownOperator { condition_type: ConditionType, operator: String },
    /// A `$name` operand does not name a transaction field.
    #[error("unknown field reference `${name}`")]
    UnknownReference { name: String },
    /// Operand and field value are not comparable with this operator.
    #[error("type mismatch on `{field}`: {detail}")]
    TypeMismatch { field: Field, detail: String },
    /// The transaction carries no value for the field.
    #[error("transaction has no value for `{field}`")]
    MissingValue { field: Field },
    /// A regex or expression failed to compile.
    #[error("invalid expression: {reason}")]
    InvalidExpression { reason: String },
    /// A custom expression failed at evaluation time.
    #[error("expression evaluation failed: {reason}")]
    ExpressionEvaluation { reason: String },
    /// A custom expression exhausted its evaluation budget.
    #[error("expression evaluation timed out after {steps} steps")]
    Timeout { steps: u64 },
}

/// A rule definition rejected at save time; never stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rule name is required")]
    EmptyName,
    #[error("at least one condition is required")]
    NoConditions,
    #[error("condition id `{id}` is empty or duplicated")]
    ConditionId { id: String },
    #[error("condition `{id}` has no value")]
    EmptyValue { id: String },
    /// A condition failed vocabulary or operand checks.
    #[error("condition `{id}` is invalid: {source}")]
    Condition {
        id: String,
        #[source]
        source: ConditionError,
    },
}

/// Errors from a rule store port.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No rule with this id exists.
    #[error("rule {id} not found")]
    NotFound { id: uuid::Uuid },
    /// The definition failed validation.
    #[error("rule rejected: {0}")]
    Validation(#[from] ValidationError),
    /// A concurrent writer kept winning after internal retries.
    #[error("rule {id} was modified concurrently")]
    ConcurrentUpdate { id: uuid::Uuid },
    /// The backing store could not be reached or failed.
    #[error("rule store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors from the alarm port.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    /// Alarm could not be delivered.
    #[error("delivery failed: {reason}")]
    DeliveryFailed {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from the scorer port.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("scoring failed: {reason}")]
    Failed { reason: String },
}

/// Errors that a transaction queue implementation may return.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    /// Queue has reached its maximum capacity.
    #[error("queue full (capacity: {capacity})")]
    Full { capacity: usize },
    /// Queue has been closed; no further writes are accepted.
    #[error("queue closed")]
    Closed,
}
