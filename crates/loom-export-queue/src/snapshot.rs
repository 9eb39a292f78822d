// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot persistence contract, restart recovery and two simple stores.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{QueueError, Result};
use crate::job::JobSnapshot;
use crate::types::JobStatus;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Durable home for job metadata. Written after every registry mutation,
/// read once at startup.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
	async fn save_all(&self, jobs: &[JobSnapshot]) -> Result<()>;
	async fn load_all(&self) -> Result<Vec<JobSnapshot>>;
}

/// Applies restart rules to a loaded snapshot:
/// running jobs go back to pending with zero progress, and completed or
/// failed jobs that finished before `now - retention` are dropped.
pub fn recover(
	snapshots: Vec<JobSnapshot>,
	now: DateTime<Utc>,
	retention: Duration,
) -> Vec<JobSnapshot> {
	let cutoff = chrono::Duration::from_std(retention)
		.ok()
		.and_then(|retention| now.checked_sub_signed(retention));

	snapshots
		.into_iter()
		.filter(|job| {
			if !matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
				return true;
			}
			let finished = job.completed_at.unwrap_or(job.created_at);
			match cutoff {
				Some(cutoff) => finished >= cutoff,
				None => true,
			}
		})
		.map(|mut job| {
			job.demote_after_restart();
			job
		})
		.collect()
}

/// Loads and recovers, treating any store failure as an empty snapshot.
#[instrument(skip(store))]
pub async fn load_recovered(
	store: &dyn SnapshotStore,
	retention: Duration,
) -> Vec<JobSnapshot> {
	match store.load_all().await {
		Ok(snapshots) => {
			let loaded = snapshots.len();
			let recovered = recover(snapshots, Utc::now(), retention);
			debug!(loaded, kept = recovered.len(), "Recovered job snapshot");
			recovered
		}
		Err(e) => {
			warn!(error = %e, "Discarding unreadable job snapshot");
			Vec::new()
		}
	}
}

/// Keeps the last saved snapshot in memory.
#[derive(Default)]
pub struct MemorySnapshotStore {
	jobs: Mutex<Vec<JobSnapshot>>,
}

impl MemorySnapshotStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_jobs(jobs: Vec<JobSnapshot>) -> Self {
		Self {
			jobs: Mutex::new(jobs),
		}
	}

	pub async fn jobs(&self) -> Vec<JobSnapshot> {
		self.jobs.lock().await.clone()
	}
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
	async fn save_all(&self, jobs: &[JobSnapshot]) -> Result<()> {
		*self.jobs.lock().await = jobs.to_vec();
		Ok(())
	}

	async fn load_all(&self) -> Result<Vec<JobSnapshot>> {
		Ok(self.jobs.lock().await.clone())
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
	version: u32,
	saved_at: DateTime<Utc>,
	jobs: Vec<JobSnapshot>,
}

/// JSON document on disk, replaced atomically via a sibling temp file.
pub struct FileSnapshotStore {
	path: PathBuf,
}

impl FileSnapshotStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn temp_path(&self) -> PathBuf {
		let mut name = self
			.path
			.file_name()
			.map(|n| n.to_os_string())
			.unwrap_or_default();
		name.push(".tmp");
		self.path.with_file_name(name)
	}
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
	#[instrument(skip(self, jobs), fields(path = %self.path.display(), count = jobs.len()))]
	async fn save_all(&self, jobs: &[JobSnapshot]) -> Result<()> {
		let document = SnapshotDocument {
			version: SNAPSHOT_FORMAT_VERSION,
			saved_at: Utc::now(),
			jobs: jobs.to_vec(),
		};
		let bytes = serde_json::to_vec_pretty(&document)?;

		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await?;
			}
		}
		let temp = self.temp_path();
		tokio::fs::write(&temp, bytes).await?;
		tokio::fs::rename(&temp, &self.path).await?;
		Ok(())
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	async fn load_all(&self) -> Result<Vec<JobSnapshot>> {
		let bytes = match tokio::fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("No snapshot file yet");
				return Ok(Vec::new());
			}
			Err(e) => return Err(e.into()),
		};

		let document: SnapshotDocument = serde_json::from_slice(&bytes)?;
		if document.version != SNAPSHOT_FORMAT_VERSION {
			return Err(QueueError::Persistence(format!(
				"unsupported snapshot version {}",
				document.version
			)));
		}
		Ok(document.jobs)
	}
}
