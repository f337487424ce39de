// Rust guideline compliant 2026-10-17

//! `fraud_rules` entry point.
//!
//! Loads rules into an in-memory or `SQLite` rule store and then either runs
//! the synthetic detection pipeline, detects a file of transactions, dry-runs
//! one unsaved rule, or lists the stored rules with their trigger statistics.
//!
//! # Usage
//!
//! ```text
//! # Pipeline until CTRL+C, with per-session debug output
//! RUST_LOG=debug fraud_rules run
//!
//! # Ten producer batches against a persistent store
//! FRAUD_RULES_DB=sqlite:rules.db fraud_rules run --iterations 10
//!
//! fraud_rules --rules rules.json detect --input transactions.json
//! fraud_rules test-rule --rule draft.json --tx transaction.json
//! FRAUD_RULES_DB=sqlite:rules.db fraud_rules rules
//! ```

mod adapters;

use std::path::{Path, PathBuf};
use std::time::Duration;

use adapters::concurrent_queue::ConcurrentQueue;
use adapters::in_memory_rule_store::InMemoryRuleStore;
use adapters::log_alarm::LogAlarm;
use adapters::random_scorer::RandomScorer;
use adapters::rules_file;
use adapters::seed_rules::seed_rules;
use adapters::sqlite_rule_store::SqliteRuleStore;
use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use detector::{ActionPrecedence, Detector, DetectorConfig};
use producer::{Producer, ProducerConfig};
use rule_engine::RuleStore;
use tracing::Instrument as _;

/// Upper bound on transactions waiting between producer and detector.
const QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Parser)]
#[command(name = "fraud_rules")]
#[command(about = "Rule-based fraud detection over payment transactions", long_about = None)]
struct Cli {
    /// `SQLite` URL of the rule store; rules stay in memory when omitted.
    #[arg(long, global = true, env = "FRAUD_RULES_DB")]
    db: Option<String>,
    /// JSON array of rule drafts to add at start-up (names already stored are skipped).
    #[arg(long, global = true, env = "FRAUD_RULES_FILE")]
    rules: Option<PathBuf>,
    #[command(flatten)]
    engine: EngineArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct EngineArgs {
    /// Action precedence, strongest first.
    #[arg(long, global = true, default_value = "block,require_verification,flag,notify")]
    precedence: ActionPrecedence,
    /// Evaluation steps allowed per custom expression.
    #[arg(long, global = true, default_value_t = 10_000)]
    step_limit: u64,
    /// Wall-clock budget per custom condition, in milliseconds.
    #[arg(long, global = true, default_value_t = 10)]
    expression_timeout_ms: u64,
    /// RNG seed for the producer, batch sizes, and the demo scorer.
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate synthetic payments and detect them until CTRL+C.
    Run(RunArgs),
    /// Detect the transactions of a JSON file and print the reports.
    Detect {
        /// One transaction object or an array of them.
        #[arg(long)]
        input: PathBuf,
    },
    /// Evaluate one unsaved rule against one transaction.
    TestRule {
        /// Rule draft as a JSON object.
        #[arg(long)]
        rule: PathBuf,
        /// Transaction as a JSON object (the first one of an array is used).
        #[arg(long)]
        tx: PathBuf,
    },
    /// List stored rules with their trigger statistics.
    Rules,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Producer batches to generate; runs until CTRL+C when omitted.
    #[arg(long)]
    iterations: Option<u64>,
    /// Largest batch written or read at once.
    #[arg(long, default_value_t = 100)]
    batch_max: usize,
    /// Pause between producer batches, in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
    /// Pause between detector batches, in milliseconds.
    #[arg(long, default_value_t = 25)]
    detector_poll_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize the tracing subscriber before any async work.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match &cli.db {
        Some(url) => {
            let store = SqliteRuleStore::open(url).await.context("failed to open SQLite rule store")?;
            let result = execute(&cli, &store).await;
            store.close().await;
            result
        }
        None => execute(&cli, &InMemoryRuleStore::new()).await,
    }
}

async fn execute<S: RuleStore>(cli: &Cli, store: &S) -> anyhow::Result<()> {
    match &cli.command {
        Command::Run(args) => {
            install_rules(store, cli.rules.as_deref()).await?;
            run_pipeline(store, &cli.engine, args).await
        }
        Command::Detect { input } => {
            install_rules(store, cli.rules.as_deref()).await?;
            let transactions = rules_file::load_transactions(input)?;
            let detector = Detector::new(detector_config(&cli.engine, 1).build().context("invalid engine options")?);
            let reports = detector
                .detect_batch(store, &RandomScorer::new(cli.engine.seed), &LogAlarm::new(), &transactions)
                .await
                .context("detection failed")?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
        Command::TestRule { rule, tx } => {
            let rule = rules_file::load_draft_rule(rule)?;
            let tx = rules_file::load_transactions(tx)?.into_iter().next().context("transaction file is empty")?;
            let detector = Detector::new(detector_config(&cli.engine, 1).build().context("invalid engine options")?);
            let result = detector.test_rule(rule, &tx).context("rule cannot be tested")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Rules => {
            install_rules(store, cli.rules.as_deref()).await?;
            for rule in store.list().await.context("failed to list rules")? {
                let last = rule.last_triggered.map_or_else(|| "never".to_owned(), |at| at.to_rfc3339());
                println!(
                    "{}  {:<8} {:<20} triggers={:<6} last={last}  {}: {}",
                    rule.id,
                    if rule.enabled { "enabled" } else { "disabled" },
                    rule.action.name(),
                    rule.trigger_count,
                    rule.name,
                    rule.conditions_summary(),
                );
            }
            Ok(())
        }
    }
}

/// Add the drafts of `path`, or the seed rules when no file is given and the
/// store is empty.
async fn install_rules<S: RuleStore>(store: &S, path: Option<&Path>) -> anyhow::Result<()> {
    let stored = store.list().await.context("failed to list rules")?;
    let drafts = match path {
        Some(path) => rules_file::load_drafts(path)?,
        None if stored.is_empty() => seed_rules(),
        None => return Ok(()),
    };
    for draft in drafts {
        if stored.iter().any(|rule| rule.name == draft.name) {
            tracing::debug!(name = %draft.name, "main.rules.already_stored");
            continue;
        }
        let name = draft.name.clone();
        store.add(draft).await.with_context(|| format!("rule `{name}` rejected"))?;
    }
    Ok(())
}

fn detector_config(engine: &EngineArgs, batch_max: usize) -> detector::DetectorConfigBuilder {
    let builder = DetectorConfig::builder(batch_max)
        .precedence(engine.precedence)
        .step_limit(engine.step_limit)
        .expression_timeout(Duration::from_millis(engine.expression_timeout_ms));
    match engine.seed {
        Some(seed) => builder.seed(seed),
        None => builder,
    }
}

async fn run_pipeline<S: RuleStore>(store: &S, engine: &EngineArgs, args: &RunArgs) -> anyhow::Result<()> {
    let mut producer_config = ProducerConfig::builder(args.batch_max).poll_interval(Duration::from_millis(args.poll_ms));
    if let Some(n) = args.iterations {
        producer_config = producer_config.iterations(n);
    }
    if let Some(seed) = engine.seed {
        producer_config = producer_config.seed(seed);
    }
    let producer = Producer::new(producer_config.build().context("failed to build producer config")?);

    // The detector drains until the queue closes; only the producer counts iterations.
    let config = detector_config(engine, args.batch_max)
        .poll_interval(Duration::from_millis(args.detector_poll_ms))
        .build()
        .context("failed to build detector config")?;
    tracing::info!(precedence = %config.precedence, "main.detector.configured");
    let detector = Detector::new(config);

    let queue = ConcurrentQueue::new(QUEUE_CAPACITY);
    let scorer = RandomScorer::new(engine.seed);
    let alarm = LogAlarm::new();

    let pipeline = async {
        let (p, d) = tokio::join!(
            async {
                let r = producer.run(&queue).await;
                // Close the queue so the detector exits cleanly after draining.
                queue.close();
                r
            }
            .instrument(tracing::info_span!("producer")),
            detector
                .run_loop(&queue, store, &scorer, &alarm)
                .instrument(tracing::info_span!("detector"))
        );
        p.context("producer failed").and(d.context("detector failed"))
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received, closing queue");
            queue.close();
        }
        result = pipeline => {
            result?;
        }
    }

    Ok(())
}
