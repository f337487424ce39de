// Rust guideline compliant 2026-10-17

//! Closed rule vocabulary: condition types, fields, operators, and actions.
//!
//! The legal `(type -> fields, operators)` pairs live in one static table so
//! that rule validation is a lookup, never string matching at evaluation time.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConditionType
// ---------------------------------------------------------------------------

/// Category of a rule condition; selects the legal fields and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Amount,
    Location,
    Time,
    Frequency,
    User,
    Device,
    Custom,
}

const AMOUNT_FIELDS: &[Field] =
    &[Field::TransactionAmount, Field::TotalDailyAmount, Field::AverageAmount];
const LOCATION_FIELDS: &[Field] = &[
    Field::Country,
    Field::IpAddress,
    Field::City,
    Field::DistanceFromUsual,
    Field::UsualCountry,
];
const TIME_FIELDS: &[Field] = &[Field::TimeOfDay, Field::DayOfWeek, Field::Hour];
const FREQUENCY_FIELDS: &[Field] =
    &[Field::TransactionsPerHour, Field::TransactionsPerDay, Field::LoginAttempts];
const USER_FIELDS: &[Field] =
    &[Field::UserAge, Field::AccountAge, Field::RiskScore, Field::PreviousChargebacks];
const DEVICE_FIELDS: &[Field] = &[Field::DeviceId, Field::Browser, Field::Os, Field::IsMobile];
const CUSTOM_FIELDS: &[Field] = &[Field::CustomExpression];

const DEFAULT_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::Contains,
    Operator::NotContains,
    Operator::InList,
    Operator::NotInList,
];
const CUSTOM_OPERATORS: &[Operator] = &[Operator::MatchesRegex, Operator::EvaluatesToTrue];

impl ConditionType {
    /// Every condition type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Amount,
        Self::Location,
        Self::Time,
        Self::Frequency,
        Self::User,
        Self::Device,
        Self::Custom,
    ];

    /// Fields that a condition of this type may reference.
    #[must_use]
    pub fn fields(self) -> &'static [Field] {
        match self {
            Self::Amount => AMOUNT_FIELDS,
            Self::Location => LOCATION_FIELDS,
            Self::Time => TIME_FIELDS,
            Self::Frequency => FREQUENCY_FIELDS,
            Self::User => USER_FIELDS,
            Self::Device => DEVICE_FIELDS,
            Self::Custom => CUSTOM_FIELDS,
        }
    }

    /// Operators that a condition of this type may use.
    #[must_use]
    pub fn operators(self) -> &'static [Operator] {
        match self {
            Self::Custom => CUSTOM_OPERATORS,
            _ => DEFAULT_OPERATORS,
        }
    }

    /// Field preselected when a condition of this type is added to a draft.
    #[must_use]
    pub fn default_field(self) -> Field {
        self.fields()[0]
    }

    /// Operator preselected when a condition of this type is added to a draft.
    #[must_use]
    pub fn default_operator(self) -> Operator {
        match self {
            Self::Custom => Operator::EvaluatesToTrue,
            _ => Operator::Equals,
        }
    }

    /// Whether `field` is registered for this type.
    #[must_use]
    pub fn allows_field(self, field: Field) -> bool {
        self.fields().contains(&field)
    }

    /// Whether `operator` is legal for this type.
    #[must_use]
    pub fn allows_operator(self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    /// Wire name, e.g. `"amount"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Location => "location",
            Self::Time => "time",
            Self::Frequency => "frequency",
            Self::User => "user",
            Self::Device => "device",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Value shape of a field; drives operand parsing and equality semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Compared numerically.
    Numeric,
    /// Free text, compared case-sensitively.
    Text,
    /// Small closed set of codes (country, browser); compared case-insensitively.
    Categorical,
    /// `true` / `false`.
    Boolean,
    /// Whole-transaction context of a custom condition.
    Context,
}

/// A transaction field addressable by a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TransactionAmount,
    TotalDailyAmount,
    AverageAmount,
    Country,
    IpAddress,
    City,
    DistanceFromUsual,
    UsualCountry,
    TimeOfDay,
    DayOfWeek,
    Hour,
    TransactionsPerHour,
    TransactionsPerDay,
    LoginAttempts,
    UserAge,
    AccountAge,
    RiskScore,
    PreviousChargebacks,
    DeviceId,
    Browser,
    Os,
    IsMobile,
    CustomExpression,
}

impl Field {
    /// Every field, in declaration order.
    pub const ALL: [Self; 23] = [
        Self::TransactionAmount,
        Self::TotalDailyAmount,
        Self::AverageAmount,
        Self::Country,
        Self::IpAddress,
        Self::City,
        Self::DistanceFromUsual,
        Self::UsualCountry,
        Self::TimeOfDay,
        Self::DayOfWeek,
        Self::Hour,
        Self::TransactionsPerHour,
        Self::TransactionsPerDay,
        Self::LoginAttempts,
        Self::UserAge,
        Self::AccountAge,
        Self::RiskScore,
        Self::PreviousChargebacks,
        Self::DeviceId,
        Self::Browser,
        Self::Os,
        Self::IsMobile,
        Self::CustomExpression,
    ];

    /// Wire name, e.g. `"transaction_amount"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TransactionAmount => "transaction_amount",
            Self::TotalDailyAmount => "total_daily_amount",
            Self::AverageAmount => "average_amount",
            Self::Country => "country",
            Self::IpAddress => "ip_address",
            Self::City => "city",
            Self::DistanceFromUsual => "distance_from_usual",
            Self::UsualCountry => "usual_country",
            Self::TimeOfDay => "time_of_day",
            Self::DayOfWeek => "day_of_week",
            Self::Hour => "hour",
            Self::TransactionsPerHour => "transactions_per_hour",
            Self::TransactionsPerDay => "transactions_per_day",
            Self::LoginAttempts => "login_attempts",
            Self::UserAge => "user_age",
            Self::AccountAge => "account_age",
            Self::RiskScore => "risk_score",
            Self::PreviousChargebacks => "previous_chargebacks",
            Self::DeviceId => "device_id",
            Self::Browser => "browser",
            Self::Os => "os",
            Self::IsMobile => "is_mobile",
            Self::CustomExpression => "custom_expression",
        }
    }

    /// Look up a field by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Value shape of this field.
    #[must_use]
    pub fn kind(self) -> FieldKind {
        match self {
            Self::TransactionAmount
            | Self::TotalDailyAmount
            | Self::AverageAmount
            | Self::DistanceFromUsual
            | Self::Hour
            | Self::TransactionsPerHour
            | Self::TransactionsPerDay
            | Self::LoginAttempts
            | Self::UserAge
            | Self::AccountAge
            | Self::RiskScore
            | Self::PreviousChargebacks => FieldKind::Numeric,
            Self::IpAddress | Self::City | Self::TimeOfDay | Self::DeviceId => FieldKind::Text,
            Self::Country | Self::UsualCountry | Self::DayOfWeek | Self::Browser | Self::Os => {
                FieldKind::Categorical
            }
            Self::IsMobile => FieldKind::Boolean,
            Self::CustomExpression => FieldKind::Context,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Comparison applied between a resolved field value and a condition operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Numbers are equal within a relative tolerance of `1e-9`; categorical
    /// text ignores ASCII case.
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    InList,
    NotInList,
    MatchesRegex,
    EvaluatesToTrue,
}

impl Operator {
    /// Every operator, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::LessThan,
        Self::Contains,
        Self::NotContains,
        Self::InList,
        Self::NotInList,
        Self::MatchesRegex,
        Self::EvaluatesToTrue,
    ];

    /// Wire name, e.g. `"greater_than"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::InList => "in_list",
            Self::NotInList => "not_in_list",
            Self::MatchesRegex => "matches_regex",
            Self::EvaluatesToTrue => "evaluates_to_true",
        }
    }

    /// Look up an operator by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Response configured on a rule, applied when the rule triggers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Flag for manual review.
    #[default]
    Flag,
    /// Block the transaction.
    Block,
    /// Send a notification only.
    Notify,
    /// Require additional verification from the payer.
    RequireVerification,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Self; 4] = [Self::Flag, Self::Block, Self::Notify, Self::RequireVerification];

    /// Wire name, e.g. `"require_verification"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Block => "block",
            Self::Notify => "notify",
            Self::RequireVerification => "require_verification",
        }
    }

    /// Look up an action by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }

    /// Whether this action marks the transaction as fraud-positive for display.
    #[must_use]
    pub fn is_fraud_positive(self) -> bool {
        matches!(self, Self::Block | Self::RequireVerification)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_belongs_to_exactly_one_type() {
        for field in Field::ALL {
            let owners: Vec<_> =
                ConditionType::ALL.into_iter().filter(|t| t.allows_field(field)).collect();
            assert_eq!(owners.len(), 1, "{field} registered for {owners:?}");
        }
    }

    #[test]
    fn custom_type_uses_custom_operators_only() {
        assert!(ConditionType::Custom.allows_operator(Operator::MatchesRegex));
        assert!(ConditionType::Custom.allows_operator(Operator::EvaluatesToTrue));
        assert!(!ConditionType::Custom.allows_operator(Operator::Equals));
        assert!(!ConditionType::Amount.allows_operator(Operator::MatchesRegex));
    }

    #[test]
    fn names_round_trip_through_lookup() {
        assert_eq!(Field::from_name("account_age"), Some(Field::AccountAge));
        assert_eq!(Field::from_name("no_such_field"), None);
        assert_eq!(Operator::from_name("in_list"), Some(Operator::InList));
        assert_eq!(Action::from_name("require_verification"), Some(Action::RequireVerification));
    }

    #[test]
    fn defaults_match_editor_preselection() {
        assert_eq!(ConditionType::Location.default_field(), Field::Country);
        assert_eq!(ConditionType::Device.default_field(), Field::DeviceId);
        assert_eq!(ConditionType::Custom.default_field(), Field::CustomExpression);
        assert_eq!(ConditionType::Custom.default_operator(), Operator::EvaluatesToTrue);
        assert_eq!(ConditionType::User.default_operator(), Operator::Equals);
    }

    #[test]
    fn country_is_categorical() {
        assert_eq!(Field::Country.kind(), FieldKind::Categorical);
        assert_eq!(Field::TransactionAmount.kind(), FieldKind::Numeric);
        assert_eq!(Field::IsMobile.kind(), FieldKind::Boolean);
    }

    #[test]
    fn only_block_and_verification_are_fraud_positive() {
        assert!(Action::Block.is_fraud_positive());
        assert!(Action::RequireVerification.is_fraud_positive());
        assert!(!Action::Flag.is_fraud_positive());
        assert!(!Action::Notify.is_fraud_positive());
    }
}
