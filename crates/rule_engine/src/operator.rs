// Rust guideline compliant 2026-10-17

//! Operand parsing and the default comparison operators.
//!
//! Operands are parsed once per condition, according to the field's
//! [`FieldKind`]; applying an operator only compares already-typed values.

use domain::{ConditionError, Field, FieldKind, FieldValue, Operator, Transaction};

/// Relative tolerance for numeric equality.
const NUMERIC_TOLERANCE: f64 = 1e-9;

/// `true` when `a` and `b` are equal up to rounding.
///
/// The difference may be at most `1e-9` times the larger magnitude, or
/// `1e-9` absolute below magnitude 1. So `0.1 + 0.2` equals `0.3`, while
/// `1000` and `1000.01` differ.
pub(crate) fn numbers_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= NUMERIC_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

// ---------------------------------------------------------------------------
// Operand
// ---------------------------------------------------------------------------

/// A condition's right-hand side, typed for its field.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Members of an `in_list` / `not_in_list` operand.
    List(Vec<Operand>),
    /// `$name`: another field of the same transaction.
    Field(Field),
}

impl Operand {
    /// Parse `raw` as the operand of `field <operator> raw`.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::TypeMismatch` when `raw` cannot be read as a
    /// value of the field's kind or the operator does not apply to the field,
    /// and `ConditionError::UnknownReference` for a `$name` that is not a field.
    pub fn parse(field: Field, operator: Operator, raw: &str) -> Result<Self, ConditionError> {
        let raw = raw.trim();
        let mismatch = |detail: String| ConditionError::TypeMismatch { field, detail };

        if field.kind() == FieldKind::Context {
            return Err(mismatch(format!("`{operator}` needs a scalar field")));
        }
        match operator {
            Operator::Equals | Operator::NotEquals => {
                Self::reference(field, raw).unwrap_or_else(|| Self::scalar(field, raw))
            }
            Operator::GreaterThan | Operator::LessThan => {
                if field.kind() == FieldKind::Boolean {
                    return Err(mismatch(format!("`{operator}` needs a numeric field")));
                }
                Self::reference(field, raw).unwrap_or_else(|| number(field, raw).map(Self::Number))
            }
            Operator::Contains | Operator::NotContains => Ok(Self::Text(raw.to_owned())),
            Operator::InList | Operator::NotInList => {
                let members = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|member| !member.is_empty())
                    .map(|member| Self::scalar(field, member))
                    .collect::<Result<Vec<_>, _>>()?;
                if members.is_empty() {
                    return Err(mismatch("list is empty".to_owned()));
                }
                Ok(Self::List(members))
            }
            Operator::MatchesRegex | Operator::EvaluatesToTrue => {
                Err(mismatch(format!("`{operator}` only applies to custom conditions")))
            }
        }
    }

    /// A literal of the field's kind.
    fn scalar(field: Field, raw: &str) -> Result<Self, ConditionError> {
        match field.kind() {
            FieldKind::Numeric => number(field, raw).map(Self::Number),
            FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(Self::Bool(true)),
                "false" => Ok(Self::Bool(false)),
                _ => Err(ConditionError::TypeMismatch { field, detail: format!("`{raw}` is not a boolean") }),
            },
            FieldKind::Text | FieldKind::Categorical => Ok(Self::Text(raw.to_owned())),
            FieldKind::Context => {
                Err(ConditionError::TypeMismatch { field, detail: "no scalar value".to_owned() })
            }
        }
    }

    /// `Some` when `raw` is a `$name` reference.
    fn reference(field: Field, raw: &str) -> Option<Result<Self, ConditionError>> {
        let name = raw.strip_prefix('$')?;
        let Some(target) = Field::from_name(name) else {
            return Some(Err(ConditionError::UnknownReference { name: name.to_owned() }));
        };
        let comparable = match (field.kind(), target.kind()) {
            (FieldKind::Context, _) | (_, FieldKind::Context) => false,
            (FieldKind::Text | FieldKind::Categorical, FieldKind::Text | FieldKind::Categorical) => true,
            (a, b) => a == b,
        };
        Some(if comparable {
            Ok(Self::Field(target))
        } else {
            Err(ConditionError::TypeMismatch { field, detail: format!("cannot compare with `${name}`") })
        })
    }
}

/// A finite numeric literal; `NaN` and infinities never compare usefully.
fn number(field: Field, raw: &str) -> Result<f64, ConditionError> {
    let n = raw
        .parse::<f64>()
        .map_err(|err| ConditionError::TypeMismatch { field, detail: format!("`{raw}` is not a number: {err}") })?;
    if !n.is_finite() {
        return Err(ConditionError::TypeMismatch { field, detail: format!("`{raw}` is not a finite number") });
    }
    Ok(n)
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Apply `operator` between the resolved value of `field` and `operand`.
///
/// `tx` supplies the value of `$name` operands.
///
/// # Errors
///
/// Returns `ConditionError::TypeMismatch` for values that cannot be compared
/// with `operator`, and `ConditionError::MissingValue` when a referenced field
/// is absent from `tx`.
pub fn apply(
    operator: Operator,
    field: Field,
    value: FieldValue<'_>,
    operand: &Operand,
    tx: &Transaction,
) -> Result<bool, ConditionError> {
    match operator {
        Operator::Equals => equals(field, value, operand, tx),
        Operator::NotEquals => equals(field, value, operand, tx).map(|eq| !eq),
        Operator::GreaterThan => order(field, value, operand, tx).map(std::cmp::Ordering::is_gt),
        Operator::LessThan => order(field, value, operand, tx).map(std::cmp::Ordering::is_lt),
        Operator::Contains => contains(field, value, operand),
        Operator::NotContains => contains(field, value, operand).map(|hit| !hit),
        Operator::InList => in_list(field, value, operand),
        Operator::NotInList => in_list(field, value, operand).map(|hit| !hit),
        Operator::MatchesRegex | Operator::EvaluatesToTrue => Err(ConditionError::TypeMismatch {
            field,
            detail: format!("`{operator}` only applies to custom conditions"),
        }),
    }
}

/// The operand as a value, following `$name` references into `tx`.
fn comparand<'a>(
    field: Field,
    operand: &'a Operand,
    tx: &'a Transaction,
) -> Result<(FieldValue<'a>, bool), ConditionError> {
    match operand {
        Operand::Number(n) => Ok((FieldValue::Number(*n), false)),
        Operand::Text(s) => Ok((FieldValue::Text(s), false)),
        Operand::Bool(b) => Ok((FieldValue::Bool(*b), false)),
        Operand::Field(target) => tx
            .value(*target)
            .map(|value| (value, target.kind() == FieldKind::Categorical))
            .ok_or(ConditionError::MissingValue { field: *target }),
        Operand::List(_) => Err(ConditionError::TypeMismatch {
            field,
            detail: "a list operand needs `in_list`".to_owned(),
        }),
    }
}

fn equals(field: Field, value: FieldValue<'_>, operand: &Operand, tx: &Transaction) -> Result<bool, ConditionError> {
    let (other, other_categorical) = comparand(field, operand, tx)?;
    let categorical = field.kind() == FieldKind::Categorical || other_categorical;
    values_equal(field, value, other, categorical)
}

fn values_equal(
    field: Field,
    value: FieldValue<'_>,
    other: FieldValue<'_>,
    categorical: bool,
) -> Result<bool, ConditionError> {
    match (value, other) {
        (FieldValue::Number(a), FieldValue::Number(b)) => Ok(numbers_equal(a, b)),
        (FieldValue::Bool(a), FieldValue::Bool(b)) => Ok(a == b),
        (FieldValue::Text(a), FieldValue::Text(b)) => Ok(if categorical { a.eq_ignore_ascii_case(b) } else { a == b }),
        (value, other) => Err(ConditionError::TypeMismatch {
            field,
            detail: format!("cannot compare `{value}` with `{other}`"),
        }),
    }
}

fn order(
    field: Field,
    value: FieldValue<'_>,
    operand: &Operand,
    tx: &Transaction,
) -> Result<std::cmp::Ordering, ConditionError> {
    let (other, _) = comparand(field, operand, tx)?;
    let (Some(a), Some(b)) = (value.as_number(), other.as_number()) else {
        return Err(ConditionError::TypeMismatch {
            field,
            detail: format!("`{value}` and `{other}` must both be numbers"),
        });
    };
    a.partial_cmp(&b).ok_or_else(|| ConditionError::TypeMismatch { field, detail: "not a number".to_owned() })
}

fn contains(field: Field, value: FieldValue<'_>, operand: &Operand) -> Result<bool, ConditionError> {
    let Operand::Text(needle) = operand else {
        return Err(ConditionError::TypeMismatch { field, detail: "`contains` needs a text operand".to_owned() });
    };
    Ok(match value {
        FieldValue::Text(haystack) => haystack.contains(needle.as_str()),
        other => other.to_string().contains(needle.as_str()),
    })
}

fn in_list(field: Field, value: FieldValue<'_>, operand: &Operand) -> Result<bool, ConditionError> {
    let Operand::List(members) = operand else {
        return Err(ConditionError::TypeMismatch { field, detail: "`in_list` needs a list operand".to_owned() });
    };
    let categorical = field.kind() == FieldKind::Categorical;
    for member in members {
        let member = match member {
            Operand::Number(n) => FieldValue::Number(*n),
            Operand::Text(s) => FieldValue::Text(s),
            Operand::Bool(b) => FieldValue::Bool(*b),
            Operand::List(_) | Operand::Field(_) => continue,
        };
        if values_equal(field, value, member, categorical)? {
            return Ok(true);
        }
    }
    Ok(false)
}
