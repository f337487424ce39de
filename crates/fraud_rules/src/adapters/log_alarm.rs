// Rust guideline compliant 2026-10-17

//! `Alarm` adapter that reports fraud verdicts through `tracing`.
//!
//! Always returns `Ok(())`; `AlarmError::DeliveryFailed` is unreachable here.

use domain::{Alarm, AlarmError, DetectionReport};

/// Emits one warning event per fraud-positive detection report.
#[derive(Debug)]
pub struct LogAlarm;

impl LogAlarm {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogAlarm {
    fn default() -> Self {
        Self::new()
    }
}

impl Alarm for LogAlarm {
    async fn trigger(&self, report: &DetectionReport) -> Result<(), AlarmError> {
        tracing::warn!(
            transaction_id = %report.transaction_id,
            action = ?report.action,
            score = ?report.fraud_score,
            reason = report.fraud_reason.as_deref().unwrap_or_default(),
            "log_alarm.fraud_alert"
        );
        Ok(())
    }
}
