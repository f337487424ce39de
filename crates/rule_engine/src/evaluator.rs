// Rust guideline compliant 2026-10-17

//! Condition and rule evaluation.
//!
//! Evaluation is a pure function of `(transaction, rule)`. Condition errors
//! never escape: they turn the condition into a non-match and are reported in
//! the [`EvaluationResult`].

use domain::{ConditionError, EvaluationResult, Transaction};

use crate::compiled::{Check, CompiledCondition, CompiledRule};
use crate::expression::{Budget, EvalLimits};
use crate::operator;
use crate::resolver::{EvaluationContext, Resolved, resolve};

/// Outcome of one condition against one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOutcome {
    Matched,
    NotMatched,
    /// The condition could not be decided and counts as not matched.
    Failed(ConditionError),
}

impl From<Result<bool, ConditionError>> for ConditionOutcome {
    fn from(result: Result<bool, ConditionError>) -> Self {
        match result {
            Ok(true) => Self::Matched,
            Ok(false) => Self::NotMatched,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Evaluates compiled rules; holds only the custom-condition cost limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator {
    limits: EvalLimits,
}

impl RuleEvaluator {
    #[must_use]
    pub fn new(limits: EvalLimits) -> Self {
        Self { limits }
    }

    /// Decide one condition.
    #[must_use]
    pub fn evaluate_condition(&self, ctx: &EvaluationContext<'_>, condition: &CompiledCondition) -> ConditionOutcome {
        let source = condition.source();
        let resolved = match &condition.check {
            Check::Broken(err) => return ConditionOutcome::Failed(err.clone()),
            Check::Compare { field, .. } => resolve(ctx, source.condition_type, *field),
            Check::Regex(_) | Check::Expression(_) => {
                resolve(ctx, source.condition_type, domain::Field::CustomExpression)
            }
        };
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(err) => return ConditionOutcome::Failed(err),
        };

        let tx = ctx.transaction();
        let outcome: ConditionOutcome = match (&condition.check, resolved) {
            (Check::Compare { field, operator, operand }, Resolved::Value(value)) => {
                operator::apply(*operator, *field, value, operand, tx).into()
            }
            (Check::Regex(regex), Resolved::Context) => {
                let mut budget = Budget::start(self.limits);
                ctx.rendered()
                    .and_then(|haystack| {
                        budget.tick()?;
                        let hit = regex.is_match(haystack);
                        budget.check_deadline()?;
                        Ok(hit)
                    })
                    .into()
            }
            (Check::Expression(expression), Resolved::Context) => {
                let mut budget = Budget::start(self.limits);
                expression.evaluate(tx, &mut budget).into()
            }
            _ => ConditionOutcome::Failed(ConditionError::UnknownField {
                condition_type: source.condition_type,
                field: source.field.clone(),
            }),
        };

        if let ConditionOutcome::Failed(ConditionError::Timeout { steps }) = &outcome {
            tracing::warn!(
                transaction_id = %tx.id,
                condition_id = %source.id,
                steps,
                "rule_engine.condition.timeout"
            );
        }
        outcome
    }

    /// Evaluate `rule` against `tx`.
    #[must_use]
    pub fn evaluate(&self, tx: &Transaction, rule: &CompiledRule) -> EvaluationResult {
        self.evaluate_in(&EvaluationContext::new(tx), rule)
    }

    /// Evaluate `rule` within a context shared with other rules.
    ///
    /// A disabled rule is not evaluated. Otherwise conditions are checked in
    /// order and evaluation stops at the first one that does not match.
    ///
    /// # Panics
    ///
    /// Panics if an enabled rule has no conditions, which compilation
    /// never produces.
    #[must_use]
    pub fn evaluate_in(&self, ctx: &EvaluationContext<'_>, rule: &CompiledRule) -> EvaluationResult {
        if !rule.enabled() {
            return EvaluationResult::disabled(rule.id());
        }
        assert!(!rule.conditions().is_empty(), "compiled rule without conditions");

        let mut matched_conditions = Vec::with_capacity(rule.conditions().len());
        for condition in rule.conditions() {
            let (reason, error) = match self.evaluate_condition(ctx, condition) {
                ConditionOutcome::Matched => {
                    matched_conditions.push(condition.id().to_owned());
                    continue;
                }
                ConditionOutcome::NotMatched => {
                    (format!("Condition not matched: {}", condition.source()), None)
                }
                ConditionOutcome::Failed(err) => {
                    tracing::debug!(
                        rule_id = %rule.id(),
                        condition_id = %condition.id(),
                        error = %err,
                        "rule_engine.condition.failed"
                    );
                    (format!("Condition {} failed: {err}", condition.id()), Some(err.to_string()))
                }
            };
            return EvaluationResult { rule_id: rule.id(), triggered: false, matched_conditions, reason, error };
        }

        EvaluationResult {
            rule_id: rule.id(),
            triggered: true,
            matched_conditions,
            reason: format!("Condition matched: {}", rule.rule().conditions_summary()),
            error: None,
        }
    }
}
