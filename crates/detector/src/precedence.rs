// Rust guideline compliant 2026-10-17

//! Severity order used to pick a session's action among triggered rules.

use std::fmt;
use std::str::FromStr;

use domain::Action;

use crate::DetectorError;

/// Total order over the four actions, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPrecedence {
    order: [Action; 4],
}

impl Default for ActionPrecedence {
    /// `block > require_verification > flag > notify`.
    fn default() -> Self {
        Self { order: [Action::Block, Action::RequireVerification, Action::Flag, Action::Notify] }
    }
}

impl ActionPrecedence {
    /// Precedence from `order`, strongest first.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidConfig`] unless every action appears exactly once.
    pub fn new(order: [Action; 4]) -> Result<Self, DetectorError> {
        for action in Action::ALL {
            if order.iter().filter(|a| **a == action).count() != 1 {
                return Err(DetectorError::InvalidConfig {
                    reason: format!("precedence must list `{action}` exactly once"),
                });
            }
        }
        Ok(Self { order })
    }

    /// Position of `action`; 0 is the strongest.
    #[must_use]
    pub fn rank(&self, action: Action) -> usize {
        self.order.iter().position(|a| *a == action).unwrap_or(self.order.len())
    }

    /// Index of the strongest action in `actions`; the first one wins a tie.
    pub fn strongest(&self, actions: impl IntoIterator<Item = Action>) -> Option<usize> {
        actions
            .into_iter()
            .enumerate()
            .min_by_key(|(_, action)| self.rank(*action))
            .map(|(index, _)| index)
    }
}

impl FromStr for ActionPrecedence {
    type Err = DetectorError;

    /// Parse a comma-separated list such as `block,require_verification,flag,notify`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let names: Vec<&str> = s.split(',').map(str::trim).collect();
        let [a, b, c, d] = names.as_slice() else {
            return Err(DetectorError::InvalidConfig {
                reason: format!("precedence needs 4 actions, got {}", names.len()),
            });
        };
        let parse = |name: &str| {
            Action::from_name(name)
                .ok_or_else(|| DetectorError::InvalidConfig { reason: format!("unknown action `{name}`") })
        };
        Self::new([parse(*a)?, parse(*b)?, parse(*c)?, parse(*d)?])
    }
}

impl fmt::Display for ActionPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.order;
        write!(f, "{a} > {b} > {c} > {d}")
    }
}
