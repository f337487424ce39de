// Rust guideline compliant 2026-10-17

//! Rules installed into an empty store when no rules file is given.

use domain::{Action, ConditionType, RuleCondition, RuleDraft};

/// The two starter rules: a high-value threshold and an unusual location.
#[must_use]
pub fn seed_rules() -> Vec<RuleDraft> {
    vec![
        RuleDraft::new("High Value Transactions")
            .description("Large payments from recently opened accounts")
            .condition(RuleCondition::new(
                "1",
                ConditionType::Amount,
                "transaction_amount",
                "greater_than",
                "1000",
            ))
            .condition(RuleCondition::new("2", ConditionType::User, "account_age", "less_than", "30"))
            .action(Action::Flag),
        RuleDraft::new("Unusual Location")
            .description("Payments from outside the payer's usual country")
            .condition(RuleCondition::new(
                "1",
                ConditionType::Location,
                "country",
                "not_equals",
                "$usual_country",
            ))
            .action(Action::RequireVerification),
    ]
}
