// Rust guideline compliant 2026-10-17

//! JSON loaders for rule drafts and transactions.

use std::path::Path;

use anyhow::Context as _;
use domain::{Rule, RuleDraft, Transaction};

/// Load a JSON array of rule drafts.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a draft array.
pub fn load_drafts(path: &Path) -> anyhow::Result<Vec<RuleDraft>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_drafts(&text).with_context(|| format!("invalid rules file {}", path.display()))
}

fn parse_drafts(text: &str) -> serde_json::Result<Vec<RuleDraft>> {
    serde_json::from_str(text)
}

/// Load one unsaved rule for a dry run.
///
/// The draft gets a fresh id and the current time; nothing is stored.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a rule draft.
pub fn load_draft_rule(path: &Path) -> anyhow::Result<Rule> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let draft: RuleDraft =
        serde_json::from_str(&text).with_context(|| format!("invalid rule file {}", path.display()))?;
    Ok(draft.into_rule(uuid::Uuid::new_v4(), chrono::Utc::now()))
}

/// Load transactions from a JSON object or a JSON array of objects.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_transactions(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_transactions(&text).with_context(|| format!("invalid transactions file {}", path.display()))
}

fn parse_transactions(text: &str) -> serde_json::Result<Vec<Transaction>> {
    if text.trim_start().starts_with('[') {
        serde_json::from_str(text)
    } else {
        serde_json::from_str(text).map(|tx| vec![tx])
    }
}
