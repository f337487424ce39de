// Rust guideline compliant 2026-10-17

//! SQLite adapter for the `RuleStore` port.
//!
//! Rules persist in one `rules` table via `sqlx`. Compiled definitions are
//! cached in process and written through on every change. Trigger
//! statistics live only in SQL and are incremented atomically by a single
//! `UPDATE`.
//!
//! # Concurrent writers
//!
//! Definition writes of this process are serialized by an async writer lock
//! held from the first read to the cache update, so the cache applies them
//! in table order. The cache also never replaces a revision with an older
//! one.
//!
//! Other processes may write the same file. Every row carries a `revision`
//! and definition writes are conditional on the revision last seen; on
//! conflict the row is re-read and the patch is re-applied, up to
//! [`MAX_UPDATE_ATTEMPTS`] times before reporting
//! `StoreError::ConcurrentUpdate`. `snapshot` polls `PRAGMA data_version`
//! and reloads the cache when another connection has committed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use domain::{Action, Rule, RuleDraft, RulePatch, StoreError};
use parking_lot::RwLock;
use rule_engine::{CompiledRule, RuleSet, RuleStore};
use sqlx::Row as _;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};

/// Attempts of a conditional definition write before giving up.
pub const MAX_UPDATE_ATTEMPTS: u32 = 3;

const COLUMNS: &str = "id, name, description, conditions, action, enabled, \
                       created_at, updated_at, last_triggered, trigger_count, revision";

#[derive(Debug)]
struct Cached {
    compiled: Arc<CompiledRule>,
    revision: i64,
}

#[derive(Debug, Default)]
struct Cache {
    /// Creation order.
    entries: Vec<Cached>,
    snapshot: RuleSet,
    /// `PRAGMA data_version` seen by the last reload.
    data_version: Option<i64>,
}

impl Cache {
    /// Install `compiled` at `revision` unless a newer revision is cached.
    fn upsert(&mut self, compiled: CompiledRule, revision: i64) {
        let id = compiled.id();
        match self.entries.iter_mut().find(|e| e.compiled.id() == id) {
            Some(slot) if slot.revision >= revision => return,
            Some(slot) => *slot = Cached { compiled: Arc::new(compiled), revision },
            None => self.entries.push(Cached { compiled: Arc::new(compiled), revision }),
        }
        self.publish();
    }

    fn forget(&mut self, id: uuid::Uuid) {
        self.entries.retain(|e| e.compiled.id() != id);
        self.publish();
    }

    fn revision_of(&self, id: uuid::Uuid) -> Option<(&Arc<CompiledRule>, i64)> {
        self.entries.iter().find(|e| e.compiled.id() == id).map(|e| (&e.compiled, e.revision))
    }

    fn publish(&mut self) {
        self.snapshot = RuleSet::new(self.entries.iter().map(|e| Arc::clone(&e.compiled)).collect());
    }
}

/// `RuleStore` adapter backed by a SQLite database via `sqlx`.
#[derive(Debug)]
pub struct SqliteRuleStore {
    pool: SqlitePool,
    cache: RwLock<Cache>,
    /// Held across every definition write and cache reload.
    writer: tokio::sync::Mutex<()>,
}

impl SqliteRuleStore {
    /// Open or create the database at `db_url`, ensure the schema, and load
    /// every stored rule into the cache.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` when the connection, schema creation,
    /// or decoding fails.
    pub async fn open(db_url: &str) -> Result<Self, StoreError> {
        // sqlx 0.8 defaults to create_if_missing(false) for file databases.
        let opts = db_url.parse::<SqliteConnectOptions>().map_err(unavailable)?.create_if_missing(true);
        // One long-lived connection: writes are serialized and `sqlite::memory:`
        // stays a single database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(unavailable)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rules (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT    NOT NULL UNIQUE,
                name            TEXT    NOT NULL,
                description     TEXT    NOT NULL,
                conditions      TEXT    NOT NULL,   -- JSON array
                action          TEXT    NOT NULL,
                enabled         INTEGER NOT NULL,
                created_at      TEXT    NOT NULL,   -- RFC 3339, nanoseconds, UTC
                updated_at      TEXT    NOT NULL,
                last_triggered  TEXT,
                trigger_count   INTEGER NOT NULL DEFAULT 0,
                revision        INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&pool)
        .await
        .map_err(unavailable)?;

        let store = Self { pool, cache: RwLock::default(), writer: tokio::sync::Mutex::new(()) };
        store.reload().await?;
        tracing::info!(rules = store.cache.read().entries.len(), "sqlite_rule_store.opened");
        Ok(store)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn data_version(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("PRAGMA data_version").fetch_one(&self.pool).await.map_err(unavailable)
    }

    /// Rebuild the cache from the table. Callers hold `writer`.
    ///
    /// Unchanged revisions keep their compiled rule. A row that no longer
    /// compiles is skipped with a warning.
    async fn reload(&self) -> Result<(), StoreError> {
        let version = self.data_version().await?;
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM rules ORDER BY seq"))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let mut cache = self.cache.write();
        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let (rule, revision) = decode(row)?;
            let unchanged = cache
                .revision_of(rule.id)
                .filter(|&(_, cached)| cached == revision)
                .map(|(compiled, _)| Arc::clone(compiled));
            if let Some(compiled) = unchanged {
                entries.push(Cached { compiled, revision });
                continue;
            }
            match CompiledRule::compile(rule) {
                Ok(compiled) => entries.push(Cached { compiled: Arc::new(compiled), revision }),
                Err(err) => tracing::warn!(error = %err, "sqlite_rule_store.reload.invalid_rule"),
            }
        }
        cache.entries = entries;
        cache.data_version = Some(version);
        cache.publish();
        Ok(())
    }

    fn cached(&self, id: uuid::Uuid) -> Option<(Rule, i64)> {
        let cache = self.cache.read();
        cache.revision_of(id).map(|(compiled, revision)| (compiled.rule().clone(), revision))
    }

    async fn load(&self, id: uuid::Uuid) -> Result<(Rule, i64), StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM rules WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        match row {
            Some(row) => decode(&row),
            None => {
                self.cache.write().forget(id);
                Err(StoreError::NotFound { id })
            }
        }
    }
}

impl RuleStore for SqliteRuleStore {
    async fn add(&self, draft: RuleDraft) -> Result<Rule, StoreError> {
        let compiled = CompiledRule::compile(draft.into_rule(uuid::Uuid::new_v4(), Utc::now()))?;
        let rule = compiled.rule().clone();
        let _writer = self.writer.lock().await;
        sqlx::query(
            "INSERT INTO rules
             (id, name, description, conditions, action, enabled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.to_string())
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(serde_json::to_string(&rule.conditions).map_err(unavailable)?)
        .bind(rule.action.name())
        .bind(rule.enabled)
        .bind(encode_time(rule.created_at))
        .bind(encode_time(rule.updated_at))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        self.cache.write().upsert(compiled, 0);
        tracing::info!(rule_id = %rule.id, name = %rule.name, "rule_store.added");
        Ok(rule)
    }

    async fn update(&self, id: uuid::Uuid, patch: RulePatch) -> Result<Rule, StoreError> {
        let _writer = self.writer.lock().await;
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let (current, revision) = match self.cached(id) {
                Some(cached) if attempt == 1 => cached,
                _ => self.load(id).await?,
            };
            let compiled = CompiledRule::compile(patch.clone().apply(&current, Utc::now()))?;
            let rule = compiled.rule();
            let stats = sqlx::query(
                "UPDATE rules
                 SET name = ?, description = ?, conditions = ?, action = ?, enabled = ?,
                     updated_at = ?, revision = revision + 1
                 WHERE id = ? AND revision = ?
                 RETURNING trigger_count, last_triggered",
            )
            .bind(&rule.name)
            .bind(&rule.description)
            .bind(serde_json::to_string(&rule.conditions).map_err(unavailable)?)
            .bind(rule.action.name())
            .bind(rule.enabled)
            .bind(encode_time(rule.updated_at))
            .bind(id.to_string())
            .bind(revision)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

            if let Some(stats) = stats {
                let (trigger_count, last_triggered) = decode_stats(&stats)?;
                let rule = Rule { trigger_count, last_triggered, ..rule.clone() };
                self.cache.write().upsert(compiled, revision + 1);
                tracing::info!(rule_id = %id, "rule_store.updated");
                return Ok(rule);
            }
            tracing::debug!(rule_id = %id, attempt, revision, "sqlite_rule_store.update.conflict");
        }
        tracing::warn!(rule_id = %id, "sqlite_rule_store.update.gave_up");
        Err(StoreError::ConcurrentUpdate { id })
    }

    async fn remove(&self, id: uuid::Uuid) -> Result<Rule, StoreError> {
        let _writer = self.writer.lock().await;
        let row = sqlx::query(&format!("DELETE FROM rules WHERE id = ? RETURNING {COLUMNS}"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        self.cache.write().forget(id);
        let (rule, _) = decode(&row.ok_or(StoreError::NotFound { id })?)?;
        tracing::info!(rule_id = %id, "rule_store.removed");
        Ok(rule)
    }

    async fn toggle(&self, id: uuid::Uuid, enabled: bool) -> Result<Rule, StoreError> {
        self.update(id, RulePatch { enabled: Some(enabled), ..RulePatch::default() }).await
    }

    async fn record_trigger(&self, id: uuid::Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let at = encode_time(at);
        let written = sqlx::query(
            "UPDATE rules
             SET trigger_count  = trigger_count + 1,
                 last_triggered = MAX(COALESCE(last_triggered, ?), ?)
             WHERE id = ?",
        )
        .bind(&at)
        .bind(&at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected();
        if written == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    async fn get(&self, id: uuid::Uuid) -> Result<Rule, StoreError> {
        self.load(id).await.map(|(rule, _)| rule)
    }

    async fn list(&self) -> Result<Vec<Rule>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM rules ORDER BY seq"))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.iter().map(|row| decode(row).map(|(rule, _)| rule)).collect()
    }

    async fn snapshot(&self) -> Result<RuleSet, StoreError> {
        let version = self.data_version().await?;
        let stale = self.cache.read().data_version != Some(version);
        if stale {
            let _writer = self.writer.lock().await;
            tracing::debug!(data_version = version, "sqlite_rule_store.reload");
            self.reload().await?;
        }
        Ok(self.cache.read().snapshot.clone())
    }
}

// ---------------------------------------------------------------------------
// Row codec
// ---------------------------------------------------------------------------

fn unavailable(err: impl fmt::Display) -> StoreError {
    tracing::error!(error = %err, "sqlite_rule_store.failed");
    StoreError::Unavailable { reason: err.to_string() }
}

/// Fixed-width RFC 3339, so text order is time order.
fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text).map(|at| at.with_timezone(&Utc)).map_err(unavailable)
}

fn decode_stats(row: &SqliteRow) -> Result<(u64, Option<DateTime<Utc>>), StoreError> {
    let trigger_count: i64 = row.try_get("trigger_count").map_err(unavailable)?;
    let last_triggered: Option<String> = row.try_get("last_triggered").map_err(unavailable)?;
    Ok((
        u64::try_from(trigger_count).map_err(unavailable)?,
        last_triggered.as_deref().map(decode_time).transpose()?,
    ))
}

fn decode(row: &SqliteRow) -> Result<(Rule, i64), StoreError> {
    let id: String = row.try_get("id").map_err(unavailable)?;
    let conditions: String = row.try_get("conditions").map_err(unavailable)?;
    let action: String = row.try_get("action").map_err(unavailable)?;
    let created_at: String = row.try_get("created_at").map_err(unavailable)?;
    let updated_at: String = row.try_get("updated_at").map_err(unavailable)?;
    let (trigger_count, last_triggered) = decode_stats(row)?;

    let rule = Rule {
        id: uuid::Uuid::parse_str(&id).map_err(unavailable)?,
        name: row.try_get("name").map_err(unavailable)?,
        description: row.try_get("description").map_err(unavailable)?,
        conditions: serde_json::from_str(&conditions).map_err(unavailable)?,
        action: Action::from_name(&action).ok_or_else(|| unavailable(format!("unknown action `{action}`")))?,
        enabled: row.try_get("enabled").map_err(unavailable)?,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
        last_triggered,
        trigger_count,
    };
    Ok((rule, row.try_get("revision").map_err(unavailable)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
