//! # Report Repository
//!
//! Persists report snapshots as audit records. Snapshots are computed by
//! `tatylu_core::report::build_report`; this module only stores them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use tatylu_core::ids::new_object_id;
use tatylu_core::report::{ReportSnapshot, SNAPSHOT_REPORT_TYPE};

/// A stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    pub id: String,
    pub report_type: String,
    pub created_at: DateTime<Utc>,
    pub snapshot: ReportSnapshot,
}

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: String,
    report_type: String,
    payload: String,
    created_at: DateTime<Utc>,
}

impl ReportRow {
    fn into_record(self) -> DbResult<ReportRecord> {
        Ok(ReportRecord {
            snapshot: serde_json::from_str(&self.payload)?,
            id: self.id,
            report_type: self.report_type,
            created_at: self.created_at,
        })
    }
}

/// Repository for report snapshots.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Stores a snapshot with type `snapshot`.
    pub async fn save_snapshot(&self, snapshot: &ReportSnapshot) -> DbResult<ReportRecord> {
        let record = ReportRecord {
            id: new_object_id(),
            report_type: SNAPSHOT_REPORT_TYPE.to_string(),
            created_at: snapshot.generated_at,
            snapshot: snapshot.clone(),
        };
        let payload = serde_json::to_string(snapshot)?;

        sqlx::query(
            "INSERT INTO reports (id, report_type, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.id)
        .bind(&record.report_type)
        .bind(payload)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        info!(
            id = %record.id,
            orders = snapshot.total_orders,
            total_sales_cents = snapshot.total_sales_cents,
            "Report snapshot saved"
        );
        Ok(record)
    }

    /// Most recent snapshot, if any.
    pub async fn latest(&self) -> DbResult<Option<ReportRecord>> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, report_type, payload, created_at
            FROM reports
            WHERE report_type = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(SNAPSHOT_REPORT_TYPE)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReportRow::into_record).transpose()
    }

    /// Snapshots newest first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<ReportRecord>> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, report_type, payload, created_at
            FROM reports
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Listed report snapshots");
        rows.into_iter().map(ReportRow::into_record).collect()
    }
}
