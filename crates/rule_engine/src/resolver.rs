// Rust guideline compliant 2026-10-17

//! Field resolution: condition type + field name to a transaction value.

use std::cell::OnceCell;

use domain::{ConditionError, ConditionType, Field, FieldValue, Operator, Transaction};

/// Look up `name` in the field vocabulary of `condition_type`.
///
/// # Errors
///
/// Returns `ConditionError::UnknownField` if the name is not a field, or is a
/// field registered under another condition type.
pub fn lookup_field(condition_type: ConditionType, name: &str) -> Result<Field, ConditionError> {
    Field::from_name(name)
        .filter(|field| condition_type.allows_field(*field))
        .ok_or_else(|| ConditionError::UnknownField { condition_type, field: name.to_owned() })
}

/// Look up `name` in the operator vocabulary of `condition_type`.
///
/// # Errors
///
/// Returns `ConditionError::UnknownOperator` if the operator is unknown or
/// not legal for the condition type.
pub fn lookup_operator(condition_type: ConditionType, name: &str) -> Result<Operator, ConditionError> {
    Operator::from_name(name)
        .filter(|operator| condition_type.allows_operator(*operator))
        .ok_or_else(|| ConditionError::UnknownOperator { condition_type, operator: name.to_owned() })
}

// ---------------------------------------------------------------------------
// EvaluationContext
// ---------------------------------------------------------------------------

/// One transaction under evaluation, shared by every condition of a session.
///
/// The JSON rendering used by custom conditions is produced at most once.
#[derive(Debug)]
pub struct EvaluationContext<'a> {
    tx: &'a Transaction,
    rendered: OnceCell<String>,
}

impl<'a> EvaluationContext<'a> {
    #[must_use]
    pub fn new(tx: &'a Transaction) -> Self {
        Self { tx, rendered: OnceCell::new() }
    }

    #[must_use]
    pub fn transaction(&self) -> &'a Transaction {
        self.tx
    }

    /// The transaction as canonical JSON, with absent fields as `null`.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::ExpressionEvaluation` if serialization fails.
    pub fn rendered(&self) -> Result<&str, ConditionError> {
        if let Some(rendered) = self.rendered.get() {
            return Ok(rendered);
        }
        let json = serde_json::to_string(self.tx)
            .map_err(|err| ConditionError::ExpressionEvaluation { reason: err.to_string() })?;
        Ok(self.rendered.get_or_init(|| json))
    }
}

/// What a condition's field resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    /// A scalar field value.
    Value(FieldValue<'a>),
    /// The whole transaction, for custom conditions.
    Context,
}

/// Resolve `field` for a condition of `condition_type`.
///
/// # Errors
///
/// Returns `ConditionError::UnknownField` if `field` does not belong to
/// `condition_type`, and `ConditionError::MissingValue` if the transaction
/// has no value for it.
pub fn resolve<'a>(
    ctx: &EvaluationContext<'a>,
    condition_type: ConditionType,
    field: Field,
) -> Result<Resolved<'a>, ConditionError> {
    if !condition_type.allows_field(field) {
        return Err(ConditionError::UnknownField { condition_type, field: field.name().to_owned() });
    }
    if condition_type == ConditionType::Custom {
        return Ok(Resolved::Context);
    }
    ctx.transaction().value(field).map(Resolved::Value).ok_or(ConditionError::MissingValue { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_scoped_to_their_condition_type() {
        assert_eq!(lookup_field(ConditionType::Amount, "transaction_amount"), Ok(Field::TransactionAmount));
        assert_eq!(
            lookup_field(ConditionType::Amount, "country"),
            Err(ConditionError::UnknownField { condition_type: ConditionType::Amount, field: "country".to_owned() })
        );
        assert!(lookup_field(ConditionType::Device, "shoe_size").is_err());
    }

    #[test]
    fn custom_operators_are_only_legal_for_custom() {
        assert_eq!(lookup_operator(ConditionType::Custom, "matches_regex"), Ok(Operator::MatchesRegex));
        assert!(lookup_operator(ConditionType::Custom, "equals").is_err());
        assert!(lookup_operator(ConditionType::Time, "evaluates_to_true").is_err());
        assert_eq!(lookup_operator(ConditionType::Time, "in_list"), Ok(Operator::InList));
    }

    #[test]
    fn resolves_scalars_and_reports_absent_values() {
        let tx = Transaction { account_age: Some(10), ..Transaction::new() };
        let ctx = EvaluationContext::new(&tx);
        assert!(matches!(
            resolve(&ctx, ConditionType::User, Field::AccountAge),
            Ok(Resolved::Value(FieldValue::Number(n))) if (n - 10.0).abs() < f64::EPSILON
        ));
        assert!(matches!(
            resolve(&ctx, ConditionType::User, Field::RiskScore),
            Err(ConditionError::MissingValue { field: Field::RiskScore })
        ));
        assert!(matches!(
            resolve(&ctx, ConditionType::Location, Field::AccountAge),
            Err(ConditionError::UnknownField { .. })
        ));
    }

    #[test]
    fn custom_conditions_resolve_to_the_context() {
        let tx = Transaction { country: Some("FR".to_owned()), ..Transaction::new() };
        let ctx = EvaluationContext::new(&tx);
        assert!(matches!(
            resolve(&ctx, ConditionType::Custom, Field::CustomExpression),
            Ok(Resolved::Context)
        ));
        let rendered = ctx.rendered().unwrap();
        assert!(rendered.contains(r#""country":"FR""#));
        assert!(std::ptr::eq(rendered, ctx.rendered().unwrap()));
    }
}
