use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persistence view of a scanned domain.
///
/// `is_registered` / `is_active` are tri-state: `None` until the matching
/// gate has produced an authoritative answer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DomainRecord {
    pub id: i64,
    pub name: String,
    pub is_registered: Option<bool>,
    pub is_active: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only discovery event; the same `(discovered_domain, discovered_from)`
/// pair may appear any number of times.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiscoveryRecord {
    pub id: i64,
    pub discovered_domain: String,
    pub discovered_from: String,
    pub discovery_method: String,
    pub metadata: Option<String>,
    pub discovered_at: DateTime<Utc>,
}
