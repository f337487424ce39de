// Rust guideline compliant 2026-10-17

//! Detector component -- runs evaluation sessions of the active rule set
//! against transactions, records triggers, and raises alarms.
//!
//! Entry points: [`Detector::run`] (one session), [`Detector::detect`],
//! [`Detector::detect_batch`], [`Detector::test_rule`] (dry run),
//! [`Detector::detect_once`] and [`Detector::run_loop`] (queue-driven).
//! Configuration via [`DetectorConfig::builder`].

mod precedence;

use std::cell::RefCell;
use std::time::Duration;

use chrono::Utc;
use domain::{
    Alarm, DetectionReport, EvaluationResult, QueueError, Rule, Scorer, SessionReport, StoreError, Transaction,
    TransactionSource, TriggeredRule, ValidationError,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rule_engine::{CompiledRule, EvalLimits, EvaluationContext, RuleEvaluator, RuleSet, RuleStore};

pub use precedence::ActionPrecedence;

// ---------------------------------------------------------------------------
// DetectorError
// ---------------------------------------------------------------------------

/// Errors that can occur during detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The supplied configuration is invalid.
    #[error("invalid detector configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The rule store could not provide a snapshot.
    #[error("rule store error")]
    Store(#[source] StoreError),
    /// A rule submitted for a dry run is structurally invalid.
    #[error("rule rejected")]
    Validation(#[source] ValidationError),
    /// A transaction source read failed.
    #[error("transaction source error")]
    Read(#[source] QueueError),
}

// ---------------------------------------------------------------------------
// DetectorConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`Detector`].
///
/// Construct via [`DetectorConfig::builder`].
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Maximum number of transactions read per batch (range: `[1, batch_max]`).
    pub batch_max: usize,
    /// Delay between successive batch reads.
    pub poll_interval: Duration,
    /// Optional upper bound on the number of batches. `None` means infinite.
    pub iterations: Option<u64>,
    /// Optional RNG seed for reproducible batch sizes. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Cost limits for custom conditions.
    pub limits: EvalLimits,
    /// Severity order resolving a session's action.
    pub precedence: ActionPrecedence,
}

/// Builder for [`DetectorConfig`].
///
/// Obtain via [`DetectorConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct DetectorConfigBuilder {
    batch_max: usize,
    poll_interval: Duration,
    iterations: Option<u64>,
    seed: Option<u64>,
    limits: EvalLimits,
    precedence: ActionPrecedence,
}

impl DetectorConfig {
    /// Create a builder. `batch_max` is the only required parameter.
    ///
    /// Default values: `poll_interval = 100 ms`, `iterations = None`,
    /// `seed = None`, default [`EvalLimits`] and [`ActionPrecedence`].
    #[must_use]
    pub fn builder(batch_max: usize) -> DetectorConfigBuilder {
        DetectorConfigBuilder {
            batch_max,
            poll_interval: Duration::from_millis(100),
            iterations: None,
            seed: None,
            limits: EvalLimits::default(),
            precedence: ActionPrecedence::default(),
        }
    }
}

impl DetectorConfigBuilder {
    /// Override the inter-batch delay.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set a finite iteration count. Without this the loop runs until the
    /// source signals `Closed`.
    #[must_use]
    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = Some(n);
        self
    }

    /// Fix the RNG seed for deterministic batch sizes (useful in tests).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Maximum expression nodes visited by one custom condition.
    #[must_use]
    pub fn step_limit(mut self, max_steps: u64) -> Self {
        self.limits.max_steps = max_steps;
        self
    }

    /// Wall-clock allowance for one custom condition.
    #[must_use]
    pub fn expression_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    #[must_use]
    pub fn precedence(mut self, precedence: ActionPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidConfig`] when `batch_max`, the step
    /// limit, or the expression timeout is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<DetectorConfig, DetectorError> {
        if self.batch_max == 0 {
            return Err(DetectorError::InvalidConfig { reason: "batch_max must be >= 1".to_owned() });
        }
        if self.limits.max_steps == 0 {
            return Err(DetectorError::InvalidConfig { reason: "step_limit must be >= 1".to_owned() });
        }
        if self.limits.timeout.is_zero() {
            return Err(DetectorError::InvalidConfig { reason: "expression_timeout must be > 0".to_owned() });
        }
        Ok(DetectorConfig {
            batch_max: self.batch_max,
            poll_interval: self.poll_interval,
            iterations: self.iterations,
            seed: self.seed,
            limits: self.limits,
            precedence: self.precedence,
        })
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Evaluates transactions against a rule store's active rules.
///
/// Generic over the hexagonal ports for zero-cost static dispatch. Holds no
/// concrete adapter references -- dependencies are injected per call.
#[derive(Debug)]
pub struct Detector {
    config: DetectorConfig,
    evaluator: RuleEvaluator,
    /// Interior mutability required because all public methods take `&self`.
    rng: RefCell<StdRng>,
}

impl Detector {
    /// Create a new detector from `config`.
    ///
    /// Seeds the RNG from `config.seed` if set, otherwise from the OS.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { evaluator: RuleEvaluator::new(config.limits), config, rng: RefCell::new(rng) }
    }

    /// Evaluate every enabled rule of `rules` against `tx`, in creation order.
    ///
    /// Pure: trigger statistics are not touched.
    #[must_use]
    pub fn evaluate_session(&self, rules: &RuleSet, tx: &Transaction) -> SessionReport {
        let ctx = EvaluationContext::new(tx);
        let mut triggered = vec![];
        let mut diagnostics = vec![];
        let mut evaluated = 0;

        for rule in rules.enabled() {
            evaluated += 1;
            let result = self.evaluator.evaluate_in(&ctx, rule);
            if result.triggered {
                triggered.push(TriggeredRule {
                    rule_id: rule.id(),
                    rule_name: rule.name().to_owned(),
                    action: rule.action(),
                    conditions: rule.rule().conditions_summary(),
                    result,
                });
            } else if result.error.is_some() {
                diagnostics.push(result);
            }
        }

        let action = self
            .config
            .precedence
            .strongest(triggered.iter().map(|t| t.action))
            .map(|index| triggered[index].action);

        tracing::debug!(
            transaction_id = %tx.id,
            evaluated,
            triggered = triggered.len(),
            diagnostics = diagnostics.len(),
            action = ?action,
            "detector.session.completed"
        );
        SessionReport { transaction_id: tx.id, triggered, action, evaluated, diagnostics }
    }

    /// Run one evaluation session of the store's active rules against `tx`
    /// and record a trigger for every rule that fired.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Store`] if the store cannot provide a snapshot.
    pub async fn run<S: RuleStore>(&self, store: &S, tx: &Transaction) -> Result<SessionReport, DetectorError> {
        let rules = store.snapshot().await.map_err(DetectorError::Store)?;
        Ok(self.session(store, &rules, tx).await)
    }

    async fn session<S: RuleStore>(&self, store: &S, rules: &RuleSet, tx: &Transaction) -> SessionReport {
        let report = self.evaluate_session(rules, tx);
        let now = Utc::now();
        for rule in &report.triggered {
            match store.record_trigger(rule.rule_id, now).await {
                Ok(()) => {}
                // Removed after the snapshot was taken.
                Err(StoreError::NotFound { id }) => {
                    tracing::warn!(rule_id = %id, "detector.record_trigger.rule_gone");
                }
                Err(e) => {
                    tracing::warn!(rule_id = %rule.rule_id, error = %e, "detector.record_trigger.failed");
                }
            }
        }
        report
    }

    /// Run a session for `tx`, attach a best-effort score, and raise an alarm
    /// if the verdict is fraud-positive.
    ///
    /// Scoring and alarm failures are logged and never change the verdict.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Store`] if the store cannot provide a snapshot.
    pub async fn detect<S, M, A>(
        &self,
        store: &S,
        scorer: &M,
        alarm: &A,
        tx: &Transaction,
    ) -> Result<DetectionReport, DetectorError>
    where
        S: RuleStore,
        M: Scorer,
        A: Alarm,
    {
        let rules = store.snapshot().await.map_err(DetectorError::Store)?;
        Ok(self.detect_with(store, &rules, scorer, alarm, tx).await)
    }

    /// [`detect`](Self::detect) over a batch, against one snapshot of the rules.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Store`] if the store cannot provide a snapshot.
    pub async fn detect_batch<S, M, A>(
        &self,
        store: &S,
        scorer: &M,
        alarm: &A,
        batch: &[Transaction],
    ) -> Result<Vec<DetectionReport>, DetectorError>
    where
        S: RuleStore,
        M: Scorer,
        A: Alarm,
    {
        let rules = store.snapshot().await.map_err(DetectorError::Store)?;
        let mut reports = Vec::with_capacity(batch.len());
        for tx in batch {
            reports.push(self.detect_with(store, &rules, scorer, alarm, tx).await);
        }
        Ok(reports)
    }

    async fn detect_with<S, M, A>(
        &self,
        store: &S,
        rules: &RuleSet,
        scorer: &M,
        alarm: &A,
        tx: &Transaction,
    ) -> DetectionReport
    where
        S: RuleStore,
        M: Scorer,
        A: Alarm,
    {
        let session = self.session(store, rules, tx).await;
        let score = match scorer.score(tx).await {
            Ok(score) => Some(score),
            Err(e) => {
                tracing::warn!(transaction_id = %tx.id, error = %e, "detector.score.failed");
                None
            }
        };
        let report = DetectionReport::from_session(session, score);
        if report.is_fraud
            && let Err(e) = alarm.trigger(&report).await
        {
            tracing::warn!(transaction_id = %tx.id, error = %e, "detector.alarm.failed");
        }
        report
    }

    /// Evaluate `rule` against `tx` without touching any store.
    ///
    /// Conditions that do not compile are reported as fail-closed diagnostics
    /// in the result instead of rejecting the rule.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Validation`] for an empty name or an empty
    /// condition list.
    pub fn test_rule(&self, rule: Rule, tx: &Transaction) -> Result<EvaluationResult, DetectorError> {
        let compiled = CompiledRule::compile_lenient(rule).map_err(DetectorError::Validation)?;
        Ok(self.evaluator.evaluate(tx, &compiled))
    }

    /// Read one batch from `source` and detect every transaction in it.
    ///
    /// Batch size is uniformly distributed in `[1, config.batch_max]`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Read`] on source failure (including `Closed`)
    /// or [`DetectorError::Store`] if no rule snapshot can be taken.
    pub async fn detect_once<Q, S, M, A>(
        &self,
        source: &Q,
        store: &S,
        scorer: &M,
        alarm: &A,
    ) -> Result<Vec<DetectionReport>, DetectorError>
    where
        Q: TransactionSource,
        S: RuleStore,
        M: Scorer,
        A: Alarm,
    {
        let max = self.rng.borrow_mut().random_range(1..=self.config.batch_max);
        let batch = source.read_batch(max).await.map_err(DetectorError::Read)?;
        tracing::debug!(size = batch.len(), "detector.batch.read");
        self.detect_batch(store, scorer, alarm, &batch).await
    }

    /// Run the detection loop until stopped.
    ///
    /// Calls [`detect_once`](Self::detect_once) repeatedly, sleeping
    /// `poll_interval` between iterations. Stops cleanly when:
    /// - the source signals [`QueueError::Closed`] (returns `Ok(())`), or
    /// - `config.iterations` batches have been processed (returns `Ok(())`).
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError`] for any hard error other than source `Closed`.
    pub async fn run_loop<Q, S, M, A>(&self, source: &Q, store: &S, scorer: &M, alarm: &A) -> Result<(), DetectorError>
    where
        Q: TransactionSource,
        S: RuleStore,
        M: Scorer,
        A: Alarm,
    {
        let mut count = 0u64;
        loop {
            match self.detect_once(source, store, scorer, alarm).await {
                Ok(reports) => {
                    let fraud = reports.iter().filter(|r| r.is_fraud).count();
                    let flagged = reports.iter().filter(|r| r.action.is_some()).count();
                    tracing::info!(
                        iteration = count + 1,
                        size = reports.len(),
                        flagged,
                        fraud,
                        "detector.batch.processed"
                    );
                }
                Err(DetectorError::Read(QueueError::Closed)) => {
                    tracing::info!(iterations = count, "detector.run.stopped: source closed");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            count += 1;
            if let Some(max) = self.config.iterations
                && count >= max
            {
                tracing::info!("detector.run.stopped: iteration limit reached");
                return Ok(());
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use domain::{
        Action, AlarmError, ConditionType, FraudSource, RuleCondition, RuleDraft, RulePatch, ScorerError,
    };
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::Arc;

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    fn make_detector() -> Detector {
        Detector::new(DetectorConfig::builder(10).seed(1).poll_interval(Duration::ZERO).build().unwrap())
    }

    fn amount_over(limit: &str) -> RuleCondition {
        RuleCondition::new("1", ConditionType::Amount, "transaction_amount", "greater_than", limit)
    }

    fn payment(amount: f64) -> Transaction {
        Transaction { transaction_amount: Some(amount), account_age: Some(10), ..Transaction::new() }
    }

    // ------------------------------------------------------------------
    // Mock adapters
    // ------------------------------------------------------------------

    /// Store holding compiled rules in creation order; counts triggers.
    struct MockRuleStore {
        rules: RefCell<Vec<Arc<CompiledRule>>>,
        triggers: RefCell<Vec<uuid::Uuid>>,
        fail_snapshot: bool,
    }

    impl MockRuleStore {
        fn new() -> Self {
            Self { rules: RefCell::new(vec![]), triggers: RefCell::new(vec![]), fail_snapshot: false }
        }

        fn with(drafts: Vec<RuleDraft>) -> Self {
            let store = Self::new();
            for draft in drafts {
                store.insert(draft.into_rule(uuid::Uuid::new_v4(), Utc::now()));
            }
            store
        }

        /// Insert without validation, as a lenient compile.
        fn insert(&self, rule: Rule) -> uuid::Uuid {
            let id = rule.id;
            self.rules.borrow_mut().push(Arc::new(CompiledRule::compile_lenient(rule).unwrap()));
            id
        }

        fn trigger_count(&self, id: uuid::Uuid) -> usize {
            self.triggers.borrow().iter().filter(|t| **t == id).count()
        }

        fn find(&self, id: uuid::Uuid) -> Result<Rule, StoreError> {
            self.rules
                .borrow()
                .iter()
                .find(|r| r.id() == id)
                .map(|r| r.rule().clone())
                .ok_or(StoreError::NotFound { id })
        }
    }

    impl RuleStore for MockRuleStore {
        async fn add(&self, draft: RuleDraft) -> Result<Rule, StoreError> {
            let rule = CompiledRule::compile(draft.into_rule(uuid::Uuid::new_v4(), Utc::now()))?;
            let stored = rule.rule().clone();
            self.rules.borrow_mut().push(Arc::new(rule));
            Ok(stored)
        }

        async fn update(&self, id: uuid::Uuid, patch: RulePatch) -> Result<Rule, StoreError> {
            let current = self.find(id)?;
            let rule = CompiledRule::compile(patch.apply(&current, Utc::now()))?;
            let stored = rule.rule().clone();
            for slot in self.rules.borrow_mut().iter_mut() {
                if slot.id() == id {
                    *slot = Arc::new(rule.clone());
                }
            }
            Ok(stored)
        }

        async fn remove(&self, id: uuid::Uuid) -> Result<Rule, StoreError> {
            let rule = self.find(id)?;
            self.rules.borrow_mut().retain(|r| r.id() != id);
            Ok(rule)
        }

        async fn toggle(&self, id: uuid::Uuid, enabled: bool) -> Result<Rule, StoreError> {
            self.update(id, RulePatch { enabled: Some(enabled), ..RulePatch::default() }).await
        }

        async fn record_trigger(&self, id: uuid::Uuid, _at: DateTime<Utc>) -> Result<(), StoreError> {
            self.find(id)?;
            self.triggers.borrow_mut().push(id);
            Ok(())
        }

        async fn get(&self, id: uuid::Uuid) -> Result<Rule, StoreError> {
            self.find(id)
        }

        async fn list(&self) -> Result<Vec<Rule>, StoreError> {
            Ok(self.rules.borrow().iter().map(|r| r.rule().clone()).collect())
        }

        async fn snapshot(&self) -> Result<RuleSet, StoreError> {
            if self.fail_snapshot {
                return Err(StoreError::Unavailable { reason: "mock failure".to_owned() });
            }
            Ok(RuleSet::new(self.rules.borrow().clone()))
        }
    }

    struct MockScorer {
        score: Option<f64>,
    }

    impl Scorer for MockScorer {
        async fn score(&self, _tx: &Transaction) -> Result<f64, ScorerError> {
            self.score.ok_or_else(|| ScorerError::Failed { reason: "mock failure".to_owned() })
        }
    }

    struct MockAlarm {
        call_count: Cell<u32>,
        always_fail: bool,
    }

    impl MockAlarm {
        fn new() -> Self {
            Self { call_count: Cell::new(0), always_fail: false }
        }

        fn always_failing() -> Self {
            Self { call_count: Cell::new(0), always_fail: true }
        }
    }

    impl Alarm for MockAlarm {
        async fn trigger(&self, report: &DetectionReport) -> Result<(), AlarmError> {
            self.call_count.set(self.call_count.get() + 1);
            if self.always_fail {
                return Err(AlarmError::DeliveryFailed { reason: format!("mock fail for tx {}", report.transaction_id) });
            }
            Ok(())
        }
    }

    struct MockSource {
        transactions: RefCell<VecDeque<Transaction>>,
    }

    impl MockSource {
        fn new(transactions: Vec<Transaction>) -> Self {
            Self { transactions: RefCell::new(VecDeque::from(transactions)) }
        }
    }

    impl TransactionSource for MockSource {
        async fn read_batch(&self, max: usize) -> Result<Vec<Transaction>, QueueError> {
            let mut queue = self.transactions.borrow_mut();
            if queue.is_empty() {
                return Err(QueueError::Closed);
            }
            let count = max.min(queue.len());
            Ok(queue.drain(..count).collect())
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_zero_values() {
        assert!(matches!(DetectorConfig::builder(0).build(), Err(DetectorError::InvalidConfig { .. })));
        assert!(DetectorConfig::builder(1).step_limit(0).build().is_err());
        assert!(DetectorConfig::builder(1).expression_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn builder_defaults() {
        let config = DetectorConfig::builder(10).build().unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.limits, EvalLimits::default());
        assert_eq!(config.precedence, ActionPrecedence::default());
        assert_eq!(config.iterations, None);
    }

    // ------------------------------------------------------------------
    // Evaluation session
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn strongest_action_wins() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Watch").condition(amount_over("100")).action(Action::Flag),
            RuleDraft::new("Stop").condition(amount_over("1000")).action(Action::Block),
        ]);
        let report = make_detector().run(&store, &payment(1500.0)).await.unwrap();
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.triggered.len(), 2);
        assert_eq!(report.action, Some(Action::Block));
        let names: Vec<_> = report.triggered.iter().map(|t| t.rule_name.as_str()).collect();
        assert_eq!(names, ["Watch", "Stop"]);
    }

    #[tokio::test]
    async fn configured_precedence_is_honoured() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Watch").condition(amount_over("100")).action(Action::Flag),
            RuleDraft::new("Stop").condition(amount_over("1000")).action(Action::Block),
        ]);
        let config = DetectorConfig::builder(1)
            .precedence("flag,block,require_verification,notify".parse().unwrap())
            .build()
            .unwrap();
        let report = Detector::new(config).run(&store, &payment(1500.0)).await.unwrap();
        assert_eq!(report.action, Some(Action::Flag));
    }

    #[tokio::test]
    async fn triggers_are_recorded_once_per_fired_rule() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Small").condition(amount_over("10")),
            RuleDraft::new("Huge").condition(amount_over("100000")),
        ]);
        let ids: Vec<_> = store.rules.borrow().iter().map(|r| r.id()).collect();
        let detector = make_detector();
        detector.run(&store, &payment(50.0)).await.unwrap();
        detector.run(&store, &payment(60.0)).await.unwrap();
        assert_eq!(store.trigger_count(ids[0]), 2);
        assert_eq!(store.trigger_count(ids[1]), 0);
    }

    #[tokio::test]
    async fn disabled_rules_are_skipped() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Off").condition(amount_over("10")).enabled(false),
        ]);
        let report = make_detector().run(&store, &payment(50.0)).await.unwrap();
        assert_eq!(report.evaluated, 0);
        assert!(report.triggered.is_empty());
        assert_eq!(report.action, None);
    }

    #[tokio::test]
    async fn broken_rule_does_not_blind_the_others() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Broken")
                .condition(RuleCondition::new(
                    "1",
                    ConditionType::Custom,
                    "custom_expression",
                    "evaluates_to_true",
                    "amount >",
                ))
                .action(Action::Block),
            RuleDraft::new("Works").condition(amount_over("1000")).action(Action::RequireVerification),
        ]);
        let report = make_detector().run(&store, &payment(1500.0)).await.unwrap();
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.action, Some(Action::RequireVerification));
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].error.as_deref().is_some_and(|e| e.starts_with("invalid expression")));
    }

    #[tokio::test]
    async fn snapshot_failure_is_a_hard_error() {
        let store = MockRuleStore { fail_snapshot: true, ..MockRuleStore::new() };
        let err = make_detector().run(&store, &payment(1.0)).await.unwrap_err();
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        assert!(matches!(err, DetectorError::Store(StoreError::Unavailable { .. })));
        assert_eq!(cause, Some(StoreError::Unavailable { reason: "mock failure".to_owned() }.to_string()));
    }

    #[tokio::test]
    async fn removed_rule_does_not_fail_the_session() {
        let store = MockRuleStore::with(vec![RuleDraft::new("Gone").condition(amount_over("10"))]);
        let rules = store.snapshot().await.unwrap();
        let id = rules.iter().next().unwrap().id();
        store.remove(id).await.unwrap();
        let report = make_detector().session(&store, &rules, &payment(50.0)).await;
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(store.trigger_count(id), 0);
    }

    // ------------------------------------------------------------------
    // Detection reports
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn fraud_positive_report_raises_one_alarm() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("High Value").condition(amount_over("1000")).action(Action::Block),
        ]);
        let alarm = MockAlarm::new();
        let report = make_detector()
            .detect(&store, &MockScorer { score: Some(0.9) }, &alarm, &payment(1500.0))
            .await
            .unwrap();
        assert!(report.is_fraud);
        assert_eq!(report.fraud_source, Some(FraudSource::Rule));
        assert_eq!(report.fraud_reason.as_deref(), Some("High Value (transaction_amount greater_than 1000)"));
        assert_eq!(report.fraud_score, Some(0.9));
        assert_eq!(alarm.call_count.get(), 1);
    }

    #[tokio::test]
    async fn flag_only_report_raises_no_alarm() {
        let store = MockRuleStore::with(vec![RuleDraft::new("Watch").condition(amount_over("10"))]);
        let alarm = MockAlarm::new();
        let report = make_detector()
            .detect(&store, &MockScorer { score: Some(0.1) }, &alarm, &payment(50.0))
            .await
            .unwrap();
        assert!(!report.is_fraud);
        assert_eq!(report.action, Some(Action::Flag));
        assert_eq!(alarm.call_count.get(), 0);
    }

    #[tokio::test]
    async fn scorer_and_alarm_failures_keep_the_verdict() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Stop").condition(amount_over("10")).action(Action::Block),
        ]);
        let alarm = MockAlarm::always_failing();
        let report =
            make_detector().detect(&store, &MockScorer { score: None }, &alarm, &payment(50.0)).await.unwrap();
        assert!(report.is_fraud);
        assert_eq!(report.fraud_score, None);
        assert_eq!(alarm.call_count.get(), 1);
    }

    #[tokio::test]
    async fn batch_detection_reports_each_transaction() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Stop").condition(amount_over("1000")).action(Action::Block),
        ]);
        let alarm = MockAlarm::new();
        let batch = [payment(5.0), payment(5000.0), payment(50.0)];
        let reports = make_detector()
            .detect_batch(&store, &MockScorer { score: Some(0.5) }, &alarm, &batch)
            .await
            .unwrap();
        let verdicts: Vec<_> = reports.iter().map(|r| r.is_fraud).collect();
        assert_eq!(verdicts, [false, true, false]);
        assert_eq!(reports[1].transaction_id, batch[1].id);
        assert_eq!(alarm.call_count.get(), 1);
    }

    // ------------------------------------------------------------------
    // Dry run
    // ------------------------------------------------------------------

    #[test]
    fn test_rule_evaluates_unsaved_rules() {
        let rule = RuleDraft::new("Draft")
            .condition(amount_over("1000"))
            .condition(RuleCondition::new("2", ConditionType::User, "account_age", "less_than", "30"))
            .into_rule(uuid::Uuid::nil(), Utc::now());
        let result = make_detector().test_rule(rule, &payment(1500.0)).unwrap();
        assert!(result.triggered);
        assert_eq!(result.matched_conditions, ["1", "2"]);
    }

    #[test]
    fn test_rule_reports_bad_conditions_as_diagnostics() {
        let rule = RuleDraft::new("Draft")
            .condition(RuleCondition::new("1", ConditionType::Amount, "country", "equals", "US"))
            .into_rule(uuid::Uuid::nil(), Utc::now());
        let result = make_detector().test_rule(rule, &payment(1500.0)).unwrap();
        assert!(!result.triggered);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_rule_rejects_empty_rules() {
        let rule = RuleDraft::new("Empty").into_rule(uuid::Uuid::nil(), Utc::now());
        let result = make_detector().test_rule(rule, &payment(1.0));
        assert!(matches!(result, Err(DetectorError::Validation(ValidationError::NoConditions))));
    }

    #[tokio::test]
    async fn dry_run_leaves_statistics_alone() {
        let store = MockRuleStore::with(vec![RuleDraft::new("Watch").condition(amount_over("10"))]);
        let rule = store.list().await.unwrap().remove(0);
        let id = rule.id;
        assert!(make_detector().test_rule(rule, &payment(50.0)).unwrap().triggered);
        assert_eq!(store.trigger_count(id), 0);
    }

    // ------------------------------------------------------------------
    // Queue-driven loop
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn run_loop_drains_the_source_and_stops_on_closed() {
        let store = MockRuleStore::with(vec![
            RuleDraft::new("Stop").condition(amount_over("1000")).action(Action::Block),
        ]);
        let source = MockSource::new((0..25).map(|i| payment(f64::from(i) * 100.0)).collect());
        let alarm = MockAlarm::new();
        let result = make_detector().run_loop(&source, &store, &MockScorer { score: Some(0.5) }, &alarm).await;
        assert!(result.is_ok(), "Closed must terminate cleanly: {result:?}");
        // Amounts 1100..=2400 exceed the limit.
        assert_eq!(alarm.call_count.get(), 14);
        assert!(source.transactions.borrow().is_empty());
    }

    #[tokio::test]
    async fn run_loop_honours_iteration_limit() {
        let store = MockRuleStore::new();
        let source = MockSource::new((0..100).map(|_| payment(1.0)).collect());
        let detector =
            Detector::new(DetectorConfig::builder(1).iterations(3).poll_interval(Duration::ZERO).build().unwrap());
        detector.run_loop(&source, &store, &MockScorer { score: Some(0.0) }, &MockAlarm::new()).await.unwrap();
        assert_eq!(source.transactions.borrow().len(), 97);
    }

    #[tokio::test]
    async fn added_rules_are_validated_by_the_store() {
        let store = MockRuleStore::new();
        let result = store.add(RuleDraft::new("Empty")).await;
        assert!(matches!(result, Err(StoreError::Validation(ValidationError::NoConditions))));
        let toggled = store.add(RuleDraft::new("On").condition(amount_over("1"))).await.unwrap();
        let off = store.toggle(toggled.id, false).await.unwrap();
        assert!(!off.enabled);
        assert!(store.get(toggled.id).await.is_ok_and(|r| !r.enabled));
    }
}
