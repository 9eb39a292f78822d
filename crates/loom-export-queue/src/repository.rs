// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed snapshot store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{QueueError, Result};
use crate::job::JobSnapshot;
use crate::snapshot::SnapshotStore;

type JobRow = (
	String,
	String,
	String,
	String,
	String,
	i64,
	i64,
	i64,
	String,
	DateTime<Utc>,
	Option<DateTime<Utc>>,
	Option<DateTime<Utc>>,
	Option<String>,
);

#[derive(Clone)]
pub struct SqliteSnapshotStore {
	pool: SqlitePool,
}

impl SqliteSnapshotStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub async fn connect(url: &str) -> Result<Self> {
		let pool = SqlitePool::connect(url).await?;
		let store = Self::new(pool);
		store.migrate().await?;
		Ok(store)
	}

	#[tracing::instrument(skip(self))]
	pub async fn migrate(&self) -> Result<()> {
		sqlx::query(
			r#"
            CREATE TABLE IF NOT EXISTS export_jobs (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                job_type TEXT NOT NULL,
                display_name TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 0,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                result TEXT
            )
            "#,
		)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
	#[tracing::instrument(skip(self, jobs), fields(count = jobs.len()))]
	async fn save_all(&self, jobs: &[JobSnapshot]) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM export_jobs")
			.execute(&mut *tx)
			.await?;

		for (position, job) in jobs.iter().enumerate() {
			let payload = serde_json::to_string(&job.payload)?;
			let result = job.result.as_ref().map(serde_json::to_string).transpose()?;

			sqlx::query(
				r#"
                INSERT INTO export_jobs (
                    id, position, job_type, display_name, priority, status, progress,
                    retry_count, max_retries, payload, created_at, started_at, completed_at, result
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
			)
			.bind(job.id.to_string())
			.bind(position as i64)
			.bind(&job.job_type)
			.bind(&job.display_name)
			.bind(job.priority.as_str())
			.bind(job.status.as_str())
			.bind(i64::from(job.progress))
			.bind(i64::from(job.retry_count))
			.bind(i64::from(job.max_retries))
			.bind(payload)
			.bind(job.created_at)
			.bind(job.started_at)
			.bind(job.completed_at)
			.bind(result)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	async fn load_all(&self) -> Result<Vec<JobSnapshot>> {
		let rows = sqlx::query_as::<_, JobRow>(
			r#"
            SELECT id, job_type, display_name, priority, status, progress, retry_count,
                   max_retries, payload, created_at, started_at, completed_at, result
            FROM export_jobs
            ORDER BY position
            "#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(row_to_job).collect()
	}
}

fn row_to_job(row: JobRow) -> Result<JobSnapshot> {
	let (
		id,
		job_type,
		display_name,
		priority,
		status,
		progress,
		retry_count,
		max_retries,
		payload,
		created_at,
		started_at,
		completed_at,
		result,
	) = row;

	Ok(JobSnapshot {
		id: id
			.parse()
			.map_err(|e: uuid::Error| QueueError::Persistence(format!("bad job id {id}: {e}")))?,
		job_type,
		display_name,
		priority: priority.parse().map_err(QueueError::Persistence)?,
		status: status.parse().map_err(QueueError::Persistence)?,
		progress: progress.clamp(0, 100) as u8,
		retry_count: u32::try_from(retry_count).map_err(|e| {
			QueueError::Persistence(format!("bad retry_count {retry_count} for job {id}: {e}"))
		})?,
		max_retries: u32::try_from(max_retries).map_err(|e| {
			QueueError::Persistence(format!("bad max_retries {max_retries} for job {id}: {e}"))
		})?,
		payload: serde_json::from_str(&payload)?,
		created_at,
		started_at,
		completed_at,
		result: result.as_deref().map(serde_json::from_str).transpose()?,
	})
}
