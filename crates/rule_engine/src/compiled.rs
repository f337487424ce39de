// Rust guideline compliant 2026-10-17

//! Rule compilation: vocabulary checks, operand parsing, regex and
//! expression compilation.
//!
//! A [`CompiledRule`] can only be obtained through [`CompiledRule::compile`]
//! or [`CompiledRule::compile_lenient`], so every compiled rule has a name
//! and at least one condition.

use std::collections::HashSet;

use domain::{Action, ConditionError, ConditionType, Field, Operator, Rule, RuleCondition, ValidationError};
use regex::{Regex, RegexBuilder};

use crate::expression::Expression;
use crate::operator::Operand;
use crate::resolver::{lookup_field, lookup_operator};

/// Upper bound on the compiled size of a `matches_regex` pattern.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

// ---------------------------------------------------------------------------
// CompiledCondition
// ---------------------------------------------------------------------------

/// Executable form of one condition.
#[derive(Debug, Clone)]
pub(crate) enum Check {
    /// `field <operator> operand` for the default operators.
    Compare { field: Field, operator: Operator, operand: Operand },
    /// `matches_regex` over the rendered transaction.
    Regex(Regex),
    /// `evaluates_to_true`.
    Expression(Expression),
    /// A condition that failed to compile; never matches.
    Broken(ConditionError),
}

/// A condition together with its executable form.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    source: RuleCondition,
    pub(crate) check: Check,
}

impl CompiledCondition {
    /// Compile one condition.
    ///
    /// # Errors
    ///
    /// Returns the first vocabulary, operand, regex, or expression error.
    pub fn compile(source: RuleCondition) -> Result<Self, ConditionError> {
        let check = compile_check(&source)?;
        Ok(Self { source, check })
    }

    /// The condition as written.
    #[must_use]
    pub fn source(&self) -> &RuleCondition {
        &self.source
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.source.id
    }

    /// The compile error of a condition admitted by a lenient compile.
    #[must_use]
    pub fn compile_error(&self) -> Option<&ConditionError> {
        match &self.check {
            Check::Broken(err) => Some(err),
            _ => None,
        }
    }
}

fn compile_check(condition: &RuleCondition) -> Result<Check, ConditionError> {
    let field = lookup_field(condition.condition_type, &condition.field)?;
    let operator = lookup_operator(condition.condition_type, &condition.operator)?;
    match operator {
        Operator::MatchesRegex => RegexBuilder::new(&condition.value)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map(Check::Regex)
            .map_err(|err| ConditionError::InvalidExpression { reason: err.to_string() }),
        Operator::EvaluatesToTrue => Expression::parse(&condition.value).map(Check::Expression),
        _ => Operand::parse(field, operator, &condition.value)
            .map(|operand| Check::Compare { field, operator, operand }),
    }
}

// ---------------------------------------------------------------------------
// CompiledRule
// ---------------------------------------------------------------------------

/// A validated rule with its conditions compiled, ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    conditions: Vec<CompiledCondition>,
}

impl CompiledRule {
    /// Validate and compile `rule`, rejecting any invalid condition.
    ///
    /// This is the check applied before a rule is stored.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty name, an empty condition list,
    /// empty or duplicated condition ids, empty non-custom values, or the
    /// first condition that fails to compile.
    pub fn compile(rule: Rule) -> Result<Self, ValidationError> {
        check_structure(&rule)?;
        let conditions = rule
            .conditions
            .iter()
            .map(|condition| {
                CompiledCondition::compile(condition.clone())
                    .map_err(|source| ValidationError::Condition { id: condition.id.clone(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rule, conditions })
    }

    /// Compile `rule` for a dry run.
    ///
    /// Conditions that fail to compile are kept and never match; their error
    /// is reported when the rule is evaluated.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for structural problems only (empty name,
    /// empty condition list, bad condition ids, empty non-custom values).
    pub fn compile_lenient(rule: Rule) -> Result<Self, ValidationError> {
        check_structure(&rule)?;
        let conditions = rule
            .conditions
            .iter()
            .map(|condition| {
                let check = compile_check(condition).unwrap_or_else(Check::Broken);
                CompiledCondition { source: condition.clone(), check }
            })
            .collect();
        Ok(Self { rule, conditions })
    }

    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    #[must_use]
    pub fn id(&self) -> uuid::Uuid {
        self.rule.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.rule.name
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.rule.action
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.rule.enabled
    }

    #[must_use]
    pub fn conditions(&self) -> &[CompiledCondition] {
        &self.conditions
    }

    /// Same definition with replaced metadata (flag, timestamps, statistics).
    ///
    /// `conditions` must be unchanged; conditions are not recompiled.
    #[must_use]
    pub fn with_rule(&self, rule: Rule) -> Self {
        debug_assert_eq!(rule.conditions, self.rule.conditions, "conditions changed without recompiling");
        Self { rule, conditions: self.conditions.clone() }
    }
}

fn check_structure(rule: &Rule) -> Result<(), ValidationError> {
    if rule.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if rule.conditions.is_empty() {
        return Err(ValidationError::NoConditions);
    }
    let mut seen = HashSet::new();
    for condition in &rule.conditions {
        if condition.id.trim().is_empty() || !seen.insert(condition.id.as_str()) {
            return Err(ValidationError::ConditionId { id: condition.id.clone() });
        }
        if condition.condition_type != ConditionType::Custom && condition.value.trim().is_empty() {
            return Err(ValidationError::EmptyValue { id: condition.id.clone() });
        }
    }
    Ok(())
}
