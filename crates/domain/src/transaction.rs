// Rust guideline compliant 2026-10-17

//! Transaction record submitted for detection, and typed field access.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vocabulary::Field;

/// A single payment submitted for rule evaluation.
///
/// Every attribute is optional: upstream systems rarely know all of them.
/// A condition over an absent attribute does not match (fail-closed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    /// Unique identifier of the payment.
    pub id: uuid::Uuid,

    // -- amount --
    /// Amount of this payment.
    pub transaction_amount: Option<f64>,
    /// Sum of the payer's payments today, this one included.
    pub total_daily_amount: Option<f64>,
    /// Average amount of the payer's past payments.
    pub average_amount: Option<f64>,

    // -- location --
    /// ISO country code of the payment origin.
    pub country: Option<String>,
    /// Origin IP address.
    pub ip_address: Option<String>,
    /// Origin city.
    pub city: Option<String>,
    /// Distance in km from the payer's usual location.
    pub distance_from_usual: Option<f64>,
    /// ISO country code the payer usually pays from.
    pub usual_country: Option<String>,

    // -- time --
    /// Local time of day, `HH:MM`.
    pub time_of_day: Option<String>,
    /// Day name, e.g. `"saturday"`.
    pub day_of_week: Option<String>,
    /// Local hour, `0..=23`.
    pub hour: Option<u8>,

    // -- frequency --
    pub transactions_per_hour: Option<u32>,
    pub transactions_per_day: Option<u32>,
    pub login_attempts: Option<u32>,

    // -- user --
    /// Payer age in years.
    pub user_age: Option<u32>,
    /// Account age in days.
    pub account_age: Option<u32>,
    /// Risk score assigned upstream, `[0, 1]`.
    pub risk_score: Option<f64>,
    pub previous_chargebacks: Option<u32>,

    // -- device --
    pub device_id: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub is_mobile: Option<bool>,
}

/// A resolved scalar borrowed from a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
    Bool(bool),
}

impl FieldValue<'_> {
    /// Numeric view: numbers as-is, text when it parses as a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            FieldValue::Number(n) => Some(n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Transaction {
    /// Create an empty transaction with a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self { id: uuid::Uuid::new_v4(), ..Self::default() }
    }

    /// Value of `field`, or `None` when the attribute is absent.
    ///
    /// [`Field::CustomExpression`] has no scalar value and always yields `None`.
    #[must_use]
    pub fn value(&self, field: Field) -> Option<FieldValue<'_>> {
        match field {
            Field::TransactionAmount => self.transaction_amount.map(FieldValue::Number),
            Field::TotalDailyAmount => self.total_daily_amount.map(FieldValue::Number),
            Field::AverageAmount => self.average_amount.map(FieldValue::Number),
            Field::Country => text(self.country.as_ref()),
            Field::IpAddress => text(self.ip_address.as_ref()),
            Field::City => text(self.city.as_ref()),
            Field::DistanceFromUsual => self.distance_from_usual.map(FieldValue::Number),
            Field::UsualCountry => text(self.usual_country.as_ref()),
            Field::TimeOfDay => text(self.time_of_day.as_ref()),
            Field::DayOfWeek => text(self.day_of_week.as_ref()),
            Field::Hour => self.hour.map(|h| FieldValue::Number(f64::from(h))),
            Field::TransactionsPerHour => number(self.transactions_per_hour),
            Field::TransactionsPerDay => number(self.transactions_per_day),
            Field::LoginAttempts => number(self.login_attempts),
            Field::UserAge => number(self.user_age),
            Field::AccountAge => number(self.account_age),
            Field::RiskScore => self.risk_score.map(FieldValue::Number),
            Field::PreviousChargebacks => number(self.previous_chargebacks),
            Field::DeviceId => text(self.device_id.as_ref()),
            Field::Browser => text(self.browser.as_ref()),
            Field::Os => text(self.os.as_ref()),
            Field::IsMobile => self.is_mobile.map(FieldValue::Bool),
            Field::CustomExpression => None,
        }
    }
}

fn number(value: Option<u32>) -> Option<FieldValue<'static>> {
    value.map(|n| FieldValue::Number(f64::from(n)))
}

fn text(value: Option<&String>) -> Option<FieldValue<'_>> {
    value.map(|s| FieldValue::Text(s.as_str()))
}
