// Rust guideline compliant 2026-10-17

//! Rule definitions: conditions, stored rules, drafts, and patches.
//!
//! A [`RuleDraft`] is what an editor builds (it starts with no conditions);
//! a [`Rule`] is what a store hands back, with identity, timestamps, and
//! trigger statistics that only the store may write.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vocabulary::{Action, ConditionType};

// ---------------------------------------------------------------------------
// RuleCondition
// ---------------------------------------------------------------------------

/// One `(field, operator, value)` test, as entered by a rule author.
///
/// `field` and `operator` are kept as names here; they are checked against
/// the vocabulary of `condition_type` when the rule is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Identifier, unique within its rule.
    pub id: String,
    /// Category selecting the legal fields and operators.
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    /// Field name, e.g. `"transaction_amount"`.
    pub field: String,
    /// Operator name, e.g. `"greater_than"`.
    pub operator: String,
    /// Literal operand, list, regex, expression, or `$field` reference.
    #[serde(default)]
    pub value: String,
}

impl RuleCondition {
    /// Create a condition from names.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        condition_type: ConditionType,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            condition_type,
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Create a condition with the type's default field and operator and an empty value.
    #[must_use]
    pub fn for_type(id: impl Into<String>, condition_type: ConditionType) -> Self {
        Self::new(
            id,
            condition_type,
            condition_type.default_field().name(),
            condition_type.default_operator().name(),
            "",
        )
    }
}

impl fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// Partial edit of one condition inside a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionPatch {
    pub field: Option<String>,
    pub operator: Option<String>,
    pub value: Option<String>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A stored fraud rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier assigned by the store.
    pub id: uuid::Uuid,
    /// Display name, never empty.
    pub name: String,
    pub description: String,
    /// Conditions, all of which must hold for the rule to trigger.
    pub conditions: Vec<RuleCondition>,
    /// Applied when the rule triggers.
    pub action: Action,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Time of the most recent trigger, if any.
    pub last_triggered: Option<DateTime<Utc>>,
    /// Number of sessions in which the rule triggered.
    pub trigger_count: u64,
}

impl Rule {
    /// One-line summary of the conditions, e.g.
    /// `"transaction_amount greater_than 1000 AND account_age less_than 30"`.
    #[must_use]
    pub fn conditions_summary(&self) -> String {
        self.conditions.iter().map(ToString::to_string).collect::<Vec<_>>().join(" AND ")
    }
}

// ---------------------------------------------------------------------------
// RuleDraft
// ---------------------------------------------------------------------------

fn enabled_by_default() -> bool {
    true
}

/// Rule definition under construction, before a store assigns identity.
///
/// Starts with no conditions; conditions are added, edited, and removed in
/// place. Validation happens when the draft is saved, not while editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub action: Action,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl RuleDraft {
    /// Start a draft: no conditions, action `flag`, enabled.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            conditions: vec![],
            action: Action::Flag,
            enabled: true,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the action.
    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Set the enabled flag.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Append a fully specified condition.
    #[must_use]
    pub fn condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append a condition of `condition_type` preset to the type's defaults.
    ///
    /// The new condition receives the smallest positive numeric id not yet
    /// used in this draft, and is returned for further editing.
    pub fn add_condition(&mut self, condition_type: ConditionType) -> &mut RuleCondition {
        let id = (1u32..)
            .map(|n| n.to_string())
            .find(|candidate| self.conditions.iter().all(|c| &c.id != candidate))
            .unwrap_or_default();
        self.conditions.push(RuleCondition::for_type(id, condition_type));
        let last = self.conditions.len() - 1;
        &mut self.conditions[last]
    }

    /// Apply `patch` to the condition with `id`. Returns `false` if absent.
    pub fn update_condition(&mut self, id: &str, patch: ConditionPatch) -> bool {
        let Some(condition) = self.conditions.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        if let Some(field) = patch.field {
            condition.field = field;
        }
        if let Some(operator) = patch.operator {
            condition.operator = operator;
        }
        if let Some(value) = patch.value {
            condition.value = value;
        }
        true
    }

    /// Remove the condition with `id`. Returns `false` if absent.
    pub fn remove_condition(&mut self, id: &str) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.id != id);
        self.conditions.len() != before
    }

    /// Materialize a new rule with fresh statistics.
    #[must_use]
    pub fn into_rule(self, id: uuid::Uuid, now: DateTime<Utc>) -> Rule {
        Rule {
            id,
            name: self.name,
            description: self.description,
            conditions: self.conditions,
            action: self.action,
            enabled: self.enabled,
            created_at: now,
            updated_at: now,
            last_triggered: None,
            trigger_count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// RulePatch
// ---------------------------------------------------------------------------

/// Partial edit of a stored rule's definition.
///
/// Trigger statistics are not patchable; only trigger recording changes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub conditions: Option<Vec<RuleCondition>>,
    pub action: Option<Action>,
    pub enabled: Option<bool>,
}

impl RulePatch {
    /// Return `rule` with this patch applied and `updated_at` set to `now`.
    #[must_use]
    pub fn apply(self, rule: &Rule, now: DateTime<Utc>) -> Rule {
        Rule {
            name: self.name.unwrap_or_else(|| rule.name.clone()),
            description: self.description.unwrap_or_else(|| rule.description.clone()),
            conditions: self.conditions.unwrap_or_else(|| rule.conditions.clone()),
            action: self.action.unwrap_or(rule.action),
            enabled: self.enabled.unwrap_or(rule.enabled),
            updated_at: now,
            ..rule.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_starts_empty_and_enabled() {
        let draft = RuleDraft::new("High Value Transactions");
        assert!(draft.conditions.is_empty());
        assert!(draft.enabled);
        assert_eq!(draft.action, Action::Flag);
    }

    #[test]
    fn added_conditions_get_unique_ids() {
        let mut draft = RuleDraft::new("r");
        draft.add_condition(ConditionType::Amount).value = "1000".to_owned();
        draft.add_condition(ConditionType::User);
        assert!(draft.remove_condition("1"));
        draft.add_condition(ConditionType::Device);
        let ids: Vec<_> = draft.conditions.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2", "1"]);
        assert_eq!(draft.conditions[1].field, "device_id");
    }

    #[test]
    fn update_condition_patches_only_given_parts() {
        let mut draft = RuleDraft::new("r");
        draft.add_condition(ConditionType::Amount);
        let patched = draft.update_condition(
            "1",
            ConditionPatch { operator: Some("greater_than".to_owned()), ..ConditionPatch::default() },
        );
        assert!(patched);
        assert_eq!(draft.conditions[0].field, "transaction_amount");
        assert_eq!(draft.conditions[0].operator, "greater_than");
        assert!(!draft.update_condition("missing", ConditionPatch::default()));
    }

    #[test]
    fn patch_preserves_statistics_and_bumps_updated_at() {
        let created = Utc::now();
        let mut rule = RuleDraft::new("r").into_rule(uuid::Uuid::new_v4(), created);
        rule.trigger_count = 17;
        let later = created + chrono::Duration::seconds(5);
        let patched = RulePatch { name: Some("renamed".to_owned()), ..RulePatch::default() }
            .apply(&rule, later);
        assert_eq!(patched.name, "renamed");
        assert_eq!(patched.trigger_count, 17);
        assert_eq!(patched.created_at, created);
        assert_eq!(patched.updated_at, later);
    }

    #[test]
    fn summary_joins_conditions_with_and() {
        let rule = RuleDraft::new("r")
            .condition(RuleCondition::new(
                "1",
                ConditionType::Amount,
                "transaction_amount",
                "greater_than",
                "1000",
            ))
            .condition(RuleCondition::new("2", ConditionType::User, "account_age", "less_than", "30"))
            .into_rule(uuid::Uuid::new_v4(), Utc::now());
        assert_eq!(
            rule.conditions_summary(),
            "transaction_amount greater_than 1000 AND account_age less_than 30"
        );
    }

    #[test]
    fn draft_json_applies_defaults() {
        let draft: RuleDraft = serde_json::from_str(
            r#"{"name": "n", "conditions": [{"id": "1", "type": "location", "field": "country", "operator": "in_list", "value": "US,CA"}]}"#,
        )
        .unwrap();
        assert!(draft.enabled);
        assert_eq!(draft.action, Action::Flag);
        assert_eq!(draft.conditions[0].condition_type, ConditionType::Location);
    }
}
