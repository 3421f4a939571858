// Store Module
// Purpose: Narrow persistence facade consumed by the orchestrator
// Design: Trait seam so the scan pipeline never sees SQL

use crate::models::{DiscoveryRecord, DomainRecord, ResultRecord};
use crate::utils::AnalyzerResult;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Persistence contract for the scan pipeline.
///
/// Implementations must keep `name` unique case-insensitively, treat result
/// payloads as opaque blobs, and manage created/updated timestamps.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch or create the domain row, returning its id
    async fn get_or_create_domain(&self, name: &str) -> AnalyzerResult<i64>;

    /// Update tri-state flags; `None` leaves a flag untouched
    async fn update_domain_flags(
        &self,
        domain_id: i64,
        is_registered: Option<bool>,
        is_active: Option<bool>,
    ) -> AnalyzerResult<()>;

    /// Append one result row; earlier rows for the domain are kept as history
    async fn save_result(
        &self,
        domain_id: i64,
        task_id: &str,
        record: &ResultRecord,
    ) -> AnalyzerResult<()>;

    /// Upsert a captured domain (idempotent by name) and append the discovery
    /// event unconditionally. Returns whether the captured row was new.
    async fn insert_captured_domain(
        &self,
        name: &str,
        discovered_from: &str,
        method: &str,
        metadata: Option<serde_json::Value>,
    ) -> AnalyzerResult<bool>;
}

/// sqlite-backed store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_domain(&self, name: &str) -> AnalyzerResult<Option<DomainRecord>> {
        let name = name.trim().to_lowercase();
        let domain: Option<DomainRecord> =
            sqlx::query_as("SELECT * FROM domains WHERE name = ?")
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(domain)
    }

    pub async fn list_discoveries(
        &self,
        discovered_from: &str,
    ) -> AnalyzerResult<Vec<DiscoveryRecord>> {
        let rows: Vec<DiscoveryRecord> = sqlx::query_as(
            "SELECT * FROM discoveries WHERE discovered_from = ? ORDER BY id",
        )
        .bind(discovered_from)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_or_create_domain(&self, name: &str) -> AnalyzerResult<i64> {
        let name = name.trim().to_lowercase();

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM domains WHERE name = ?")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;

        if let Some((id,)) = existing {
            return Ok(id);
        }

        let result = sqlx::query("INSERT INTO domains (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Created domain row for {}", name);
        Ok(result.last_insert_rowid())
    }

    async fn update_domain_flags(
        &self,
        domain_id: i64,
        is_registered: Option<bool>,
        is_active: Option<bool>,
    ) -> AnalyzerResult<()> {
        sqlx::query(
            "UPDATE domains SET \
             is_registered = COALESCE(?, is_registered), \
             is_active = COALESCE(?, is_active), \
             updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(is_registered)
        .bind(is_active)
        .bind(domain_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_result(
        &self,
        domain_id: i64,
        task_id: &str,
        record: &ResultRecord,
    ) -> AnalyzerResult<()> {
        let data = serde_json::to_string(record)?;
        let requested = serde_json::to_string(&record.meta.profiles.requested)?;
        let executed = serde_json::to_string(&record.meta.profiles.executed)?;

        sqlx::query(
            "INSERT INTO results (domain_id, task_id, status, data, \
             profiles_requested, profiles_executed) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(domain_id)
        .bind(task_id)
        .bind(record.status.as_str())
        .bind(&data)
        .bind(&requested)
        .bind(&executed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_captured_domain(
        &self,
        name: &str,
        discovered_from: &str,
        method: &str,
        metadata: Option<serde_json::Value>,
    ) -> AnalyzerResult<bool> {
        let name = name.trim().to_lowercase();
        let metadata_json = metadata.map(|m| m.to_string());

        // Upsert keyed by name; conflicts mean the domain was already captured
        let result = sqlx::query(
            "INSERT INTO captured_domains (name, discovered_from, discovery_method, metadata) \
             VALUES (?, ?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(&name)
        .bind(discovered_from)
        .bind(method)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;

        // Discovery log is append-only; every occurrence is kept
        sqlx::query(
            "INSERT INTO discoveries (discovered_domain, discovered_from, discovery_method, metadata) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(discovered_from)
        .bind(method)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await?;

        if inserted {
            tracing::info!("Captured new domain {} via {} from {}", name, method, discovered_from);
        }

        Ok(inserted)
    }
}
