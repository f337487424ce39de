// Rust guideline compliant 2026-10-17

//! Evaluation outputs: per-rule results, session reports, and detection reports.

use serde::{Deserialize, Serialize};

use crate::vocabulary::Action;

/// Outcome of evaluating one rule against one transaction.
///
/// Produced fresh per `(rule, transaction)` pair; identical inputs always
/// yield an identical result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub rule_id: uuid::Uuid,
    pub triggered: bool,
    /// Ids of the conditions that held before evaluation stopped.
    pub matched_conditions: Vec<String>,
    /// Human-readable summary.
    pub reason: String,
    /// Diagnostic of the condition error that forced a non-match, if any.
    pub error: Option<String>,
}

impl EvaluationResult {
    /// Result for a disabled rule.
    #[must_use]
    pub fn disabled(rule_id: uuid::Uuid) -> Self {
        Self {
            rule_id,
            triggered: false,
            matched_conditions: vec![],
            reason: "rule disabled".to_owned(),
            error: None,
        }
    }
}

/// A rule that triggered during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: uuid::Uuid,
    pub rule_name: String,
    pub action: Action,
    /// `field operator value` terms joined with `AND`.
    pub conditions: String,
    pub result: EvaluationResult,
}

/// Output of one evaluation pass of the active rules over one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub transaction_id: uuid::Uuid,
    /// Triggered rules, in rule creation order.
    pub triggered: Vec<TriggeredRule>,
    /// Highest-precedence action among triggered rules; `None` when nothing fired.
    pub action: Option<Action>,
    /// Number of enabled rules evaluated.
    pub evaluated: usize,
    /// Non-triggered results whose miss was caused by a condition error.
    pub diagnostics: Vec<EvaluationResult>,
}

/// Origin of a fraud verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudSource {
    Rule,
}

/// Detection verdict returned to callers for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub transaction_id: uuid::Uuid,
    /// `true` when the resolved action is `block` or `require_verification`.
    pub is_fraud: bool,
    /// `Some(Rule)` whenever at least one rule triggered.
    pub fraud_source: Option<FraudSource>,
    /// Triggered rule names with their conditions, `; `-separated.
    pub fraud_reason: Option<String>,
    /// Score from an external scoring model, if one was consulted.
    pub fraud_score: Option<f64>,
    pub action: Option<Action>,
    pub triggered_rules: Vec<TriggeredRule>,
}

impl DetectionReport {
    /// Build the caller-facing verdict from a session report.
    #[must_use]
    pub fn from_session(session: SessionReport, fraud_score: Option<f64>) -> Self {
        let fraud_reason = (!session.triggered.is_empty()).then(|| {
            session
                .triggered
                .iter()
                .map(|t| format!("{} ({})", t.rule_name, t.conditions))
                .collect::<Vec<_>>()
                .join("; ")
        });
        Self {
            transaction_id: session.transaction_id,
            is_fraud: session.action.is_some_and(Action::is_fraud_positive),
            fraud_source: fraud_reason.is_some().then_some(FraudSource::Rule),
            fraud_reason,
            fraud_score,
            action: session.action,
            triggered_rules: session.triggered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggered(name: &str, action: Action) -> TriggeredRule {
        let rule_id = uuid::Uuid::new_v4();
        TriggeredRule {
            rule_id,
            rule_name: name.to_owned(),
            action,
            conditions: "country in_list US,CA".to_owned(),
            result: EvaluationResult {
                rule_id,
                triggered: true,
                matched_conditions: vec!["1".to_owned()],
                reason: "matched".to_owned(),
                error: None,
            },
        }
    }

    fn session(triggered: Vec<TriggeredRule>, action: Option<Action>) -> SessionReport {
        SessionReport {
            transaction_id: uuid::Uuid::new_v4(),
            evaluated: triggered.len(),
            triggered,
            action,
            diagnostics: vec![],
        }
    }

    #[test]
    fn quiet_session_is_not_fraud() {
        let report = DetectionReport::from_session(session(vec![], None), None);
        assert!(!report.is_fraud);
        assert_eq!(report.fraud_source, None);
        assert_eq!(report.fraud_reason, None);
    }

    #[test]
    fn flag_only_is_rule_sourced_but_not_fraud() {
        let report = DetectionReport::from_session(
            session(vec![triggered("Watch", Action::Flag)], Some(Action::Flag)),
            Some(0.4),
        );
        assert!(!report.is_fraud);
        assert_eq!(report.fraud_source, Some(FraudSource::Rule));
        assert_eq!(report.fraud_score, Some(0.4));
    }

    #[test]
    fn reason_concatenates_rule_names_and_conditions() {
        let report = DetectionReport::from_session(
            session(
                vec![triggered("A", Action::Flag), triggered("B", Action::Block)],
                Some(Action::Block),
            ),
            None,
        );
        assert!(report.is_fraud);
        assert_eq!(
            report.fraud_reason.as_deref(),
            Some("A (country in_list US,CA); B (country in_list US,CA)")
        );
    }
}
