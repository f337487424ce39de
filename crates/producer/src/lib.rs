// Rust guideline compliant 2026-10-17

//! Producer component -- generates synthetic payment batches and writes them
//! to a `TransactionSink` hexagonal port.
//!
//! Entry points: [`Producer::generate_batch`], [`Producer::produce_once`],
//! [`Producer::run`]. Configuration via [`ProducerConfig::builder`].

use domain::{QueueError, Transaction, TransactionSink};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use std::cell::RefCell;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ProducerError
// ---------------------------------------------------------------------------

/// Errors that can occur during transaction production.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The supplied configuration is invalid.
    #[error("invalid producer configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A queue write failed.
    #[error("queue error: {source}")]
    Queue {
        /// The underlying queue error.
        #[from]
        source: QueueError,
    },
}

// ---------------------------------------------------------------------------
// ProducerConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`Producer`].
///
/// Construct via [`ProducerConfig::builder`].
#[derive(Debug)]
pub struct ProducerConfig {
    /// Maximum number of transactions per batch (range: `[1, batch_max]`).
    pub batch_max: usize,
    /// Delay between successive batch writes.
    pub poll_interval: Duration,
    /// Optional upper bound on the number of iterations. `None` means infinite.
    pub iterations: Option<u64>,
    /// Optional RNG seed for reproducible batches. `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Builder for [`ProducerConfig`].
///
/// Obtain via [`ProducerConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct ProducerConfigBuilder {
    batch_max: usize,
    poll_interval: Duration,
    iterations: Option<u64>,
    seed: Option<u64>,
}

impl ProducerConfig {
    /// Create a builder. `batch_max` is the only required parameter.
    ///
    /// Default values: `poll_interval = 100 ms`, `iterations = None`, `seed = None`.
    #[must_use]
    pub fn builder(batch_max: usize) -> ProducerConfigBuilder {
        ProducerConfigBuilder {
            batch_max,
            // 100 ms chosen as a reasonable demo cadence; lower for tests.
            poll_interval: Duration::from_millis(100),
            iterations: None,
            seed: None,
        }
    }
}

impl ProducerConfigBuilder {
    /// Override the inter-batch delay.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set a finite iteration count. Without this the producer runs until the
    /// queue signals `Closed`.
    #[must_use]
    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = Some(n);
        self
    }

    /// Fix the RNG seed for deterministic output (useful in tests).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::InvalidConfig`] when `batch_max` is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<ProducerConfig, ProducerError> {
        if self.batch_max == 0 {
            return Err(ProducerError::InvalidConfig { reason: "batch_max must be >= 1".to_owned() });
        }
        Ok(ProducerConfig {
            batch_max: self.batch_max,
            poll_interval: self.poll_interval,
            iterations: self.iterations,
            seed: self.seed,
        })
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// `(country, city)` pool for payment origins.
const ORIGINS: &[(&str, &str)] = &[
    ("US", "New York"),
    ("US", "Chicago"),
    ("CA", "Toronto"),
    ("UK", "London"),
    ("FR", "Paris"),
    ("DE", "Berlin"),
    ("BR", "Sao Paulo"),
    ("NG", "Lagos"),
];

const DAYS: &[&str] = &["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const BROWSERS: &[&str] = &["Chrome", "Firefox", "Safari", "Edge"];
const OPERATING_SYSTEMS: &[&str] = &["Windows", "macOS", "Linux", "iOS", "Android"];

/// Generates synthetic payment batches and forwards them to a [`TransactionSink`] port.
///
/// Generic over `S: TransactionSink` for zero-cost static dispatch. Holds no
/// concrete queue reference -- dependency is injected per call.
#[derive(Debug)]
pub struct Producer {
    config: ProducerConfig,
    /// Interior mutability required because all public methods take `&self`.
    rng: RefCell<StdRng>,
}

impl Producer {
    /// Create a new producer from `config`.
    ///
    /// Seeds the RNG from `config.seed` if set, otherwise from the OS.
    #[must_use]
    pub fn new(config: ProducerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng: RefCell::new(rng) }
    }

    /// Generate one batch of synthetic payments.
    ///
    /// Batch size is uniformly distributed in `[1, config.batch_max]`. Every
    /// attribute of the rule vocabulary is populated; amounts lie in
    /// `[0.01, 10_000.00]` and one payment in five originates outside the
    /// payer's usual country.
    #[must_use]
    pub fn generate_batch(&self) -> Vec<Transaction> {
        let mut rng = self.rng.borrow_mut();
        let size = rng.random_range(1..=self.config.batch_max);
        (0..size).map(|_| random_transaction(&mut rng)).collect()
    }

    /// Generate one batch and write it to `sink`.
    ///
    /// # Errors
    ///
    /// Propagates any [`QueueError`] wrapped in [`ProducerError::Queue`].
    pub async fn produce_once<S: TransactionSink>(&self, sink: &S) -> Result<(), ProducerError> {
        let batch = self.generate_batch();
        tracing::debug!(size = batch.len(), "producer.batch.generated");
        sink.write_batch(batch).await?;
        Ok(())
    }

    /// Run the production loop until stopped.
    ///
    /// Calls [`produce_once`](Self::produce_once) repeatedly, sleeping
    /// `config.poll_interval` between iterations. Stops cleanly when:
    /// - the queue signals [`QueueError::Closed`] (returns `Ok(())`), or
    /// - `config.iterations` batches have been written (returns `Ok(())`).
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::Queue`] for any queue error other than `Closed`.
    pub async fn run<S: TransactionSink>(&self, sink: &S) -> Result<(), ProducerError> {
        let mut count = 0u64;
        loop {
            match self.produce_once(sink).await {
                Ok(()) => {}
                Err(ProducerError::Queue { source: QueueError::Closed }) => {
                    tracing::info!(iterations = count, "producer.run.stopped: queue closed");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            count += 1;
            tracing::debug!(iteration = count, "producer.batch.written");

            if let Some(max) = self.config.iterations
                && count >= max
            {
                tracing::info!("producer.run.stopped: iteration limit reached");
                return Ok(());
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

fn pick(rng: &mut StdRng, pool: &[&str]) -> Option<String> {
    pool.choose(rng).map(|s| (*s).to_owned())
}

fn random_transaction(rng: &mut StdRng) -> Transaction {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    let id = uuid::Builder::from_random_bytes(bytes).into_uuid();

    // Integer cents avoids float-rounding during generation.
    let amount = f64::from(rng.random_range(1u32..=1_000_000u32)) / 100.0;
    let average = f64::from(rng.random_range(1_000u32..=50_000u32)) / 100.0;

    let (home_country, _) = ORIGINS.choose(rng).copied().unwrap_or(("US", "New York"));
    let (country, city) = if rng.random_bool(0.2) {
        ORIGINS.choose(rng).copied().unwrap_or(("US", "New York"))
    } else {
        ORIGINS.iter().copied().find(|(c, _)| *c == home_country).unwrap_or(("US", "New York"))
    };

    let hour: u8 = rng.random_range(0..24);
    let os = pick(rng, OPERATING_SYSTEMS);
    let is_mobile = matches!(os.as_deref(), Some("iOS" | "Android"));

    Transaction {
        id,
        transaction_amount: Some(amount),
        total_daily_amount: Some(amount + f64::from(rng.random_range(0u32..=200_000u32)) / 100.0),
        average_amount: Some(average),
        country: Some(country.to_owned()),
        ip_address: Some(format!(
            "{}.{}.{}.{}",
            rng.random_range(1u8..=223),
            rng.random::<u8>(),
            rng.random::<u8>(),
            rng.random_range(1u8..=254)
        )),
        city: Some(city.to_owned()),
        distance_from_usual: Some(if country == home_country {
            f64::from(rng.random_range(0u32..=50))
        } else {
            f64::from(rng.random_range(500u32..=9_000))
        }),
        usual_country: Some(home_country.to_owned()),
        time_of_day: Some(format!("{hour:02}:{:02}", rng.random_range(0u8..60))),
        day_of_week: pick(rng, DAYS),
        hour: Some(hour),
        transactions_per_hour: Some(rng.random_range(0..=12)),
        transactions_per_day: Some(rng.random_range(0..=60)),
        login_attempts: Some(rng.random_range(1..=8)),
        user_age: Some(rng.random_range(18..=90)),
        account_age: Some(rng.random_range(0..=3_650)),
        risk_score: Some(f64::from(rng.random_range(0u32..=100)) / 100.0),
        previous_chargebacks: Some(if rng.random_bool(0.9) { 0 } else { rng.random_range(1..=5) }),
        device_id: Some(format!("dev-{:08x}", rng.next_u32())),
        browser: pick(rng, BROWSERS),
        os,
        is_mobile: Some(is_mobile),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{Producer, ProducerConfig, ProducerError};
    use domain::{Field, QueueError, Transaction, TransactionSink};
    use std::cell::RefCell;
    use std::time::Duration;

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    /// In-memory sink that tracks individual batches for assertion.
    struct TestSink {
        batches: RefCell<Vec<Vec<Transaction>>>,
    }

    impl TestSink {
        fn new() -> Self {
            Self { batches: RefCell::new(vec![]) }
        }

        fn batch_count(&self) -> usize {
            self.batches.borrow().len()
        }

        fn total_tx_count(&self) -> usize {
            self.batches.borrow().iter().map(Vec::len).sum()
        }
    }

    impl TransactionSink for TestSink {
        async fn write_batch(&self, batch: Vec<Transaction>) -> Result<(), QueueError> {
            self.batches.borrow_mut().push(batch);
            Ok(())
        }
    }

    /// Sink that immediately signals `Closed`.
    struct ClosedSink;

    impl TransactionSink for ClosedSink {
        async fn write_batch(&self, _batch: Vec<Transaction>) -> Result<(), QueueError> {
            Err(QueueError::Closed)
        }
    }

    /// Sink that immediately signals `Full`.
    struct FullSink;

    impl TransactionSink for FullSink {
        async fn write_batch(&self, _batch: Vec<Transaction>) -> Result<(), QueueError> {
            Err(QueueError::Full { capacity: 0 })
        }
    }

    // ------------------------------------------------------------------
    // Configuration + batch generation
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_zero() {
        let result = ProducerConfig::builder(0).build();
        assert!(matches!(result, Err(ProducerError::InvalidConfig { .. })));
    }

    #[test]
    fn batch_size_bounds() {
        let producer = Producer::new(ProducerConfig::builder(10).seed(1).build().unwrap());
        let mut seen = [false; 11]; // index 1..=10
        for _ in 0..100 {
            let sz = producer.generate_batch().len();
            assert!((1..=10).contains(&sz), "batch size {sz} out of [1, 10]");
            seen[sz] = true;
        }
        assert!(seen[1..].iter().all(|s| *s), "every size in [1, 10] should appear in 100 batches");
    }

    #[test]
    fn every_vocabulary_field_is_populated() {
        let producer = Producer::new(ProducerConfig::builder(10).seed(2).build().unwrap());
        for tx in producer.generate_batch() {
            for field in Field::ALL.into_iter().filter(|f| *f != Field::CustomExpression) {
                assert!(tx.value(field).is_some(), "{field} missing");
            }
            let amount = tx.transaction_amount.unwrap_or_default();
            assert!((0.01..=10_000.0).contains(&amount), "amount {amount} out of range");
            assert_eq!(tx.is_mobile, Some(matches!(tx.os.as_deref(), Some("iOS" | "Android"))));
        }
    }

    #[test]
    fn some_payments_originate_abroad() {
        let producer = Producer::new(ProducerConfig::builder(10).seed(3).build().unwrap());
        let txs: Vec<_> = (0..50).flat_map(|_| producer.generate_batch()).collect();
        let abroad = txs.iter().filter(|tx| tx.country != tx.usual_country).count();
        assert!(abroad > 0 && abroad < txs.len(), "abroad={abroad} of {}", txs.len());
    }

    #[test]
    fn seeded_rng_deterministic() {
        let batch1 = Producer::new(ProducerConfig::builder(10).seed(99).build().unwrap()).generate_batch();
        let batch2 = Producer::new(ProducerConfig::builder(10).seed(99).build().unwrap()).generate_batch();
        assert_eq!(batch1, batch2, "identical seeds must produce identical batches");
    }

    // ------------------------------------------------------------------
    // produce_once + run loop
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn produce_and_write() {
        let producer = Producer::new(ProducerConfig::builder(10).seed(42).build().unwrap());
        let sink = TestSink::new();

        producer.produce_once(&sink).await.unwrap();

        assert_eq!(sink.batch_count(), 1);
        let sz = sink.total_tx_count();
        assert!((1..=10).contains(&sz), "batch size {sz} out of [1, 10]");
    }

    #[tokio::test]
    async fn run_n_iterations() {
        let config =
            ProducerConfig::builder(10).seed(7).iterations(5).poll_interval(Duration::ZERO).build().unwrap();
        let producer = Producer::new(config);
        let sink = TestSink::new();

        producer.run(&sink).await.unwrap();

        assert_eq!(sink.batch_count(), 5, "expected exactly 5 batches");
        let total = sink.total_tx_count();
        assert!((5..=50).contains(&total), "total tx count {total} out of expected range");
    }

    #[tokio::test]
    async fn run_stops_on_closed() {
        let producer = Producer::new(ProducerConfig::builder(10).poll_interval(Duration::ZERO).build().unwrap());
        let result = producer.run(&ClosedSink).await;
        assert!(result.is_ok(), "Closed must terminate cleanly: {result:?}");
    }

    #[tokio::test]
    async fn run_propagates_full() {
        let producer = Producer::new(ProducerConfig::builder(10).poll_interval(Duration::ZERO).build().unwrap());
        let result = producer.run(&FullSink).await;
        assert!(
            matches!(result, Err(ProducerError::Queue { source: QueueError::Full { .. } })),
            "Full error must be propagated: {result:?}"
        );
    }
}
