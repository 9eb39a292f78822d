// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque job identifier. Assigned once at submission and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl std::str::FromStr for JobId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Uuid::parse_str(s).map(Self)
	}
}

/// Scheduling priority. Declaration order gives `Low < Normal < High`.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	Low,
	#[default]
	Normal,
	High,
}

impl Priority {
	pub fn as_str(&self) -> &'static str {
		match self {
			Priority::Low => "low",
			Priority::Normal => "normal",
			Priority::High => "high",
		}
	}
}

impl std::str::FromStr for Priority {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"low" => Ok(Priority::Low),
			"normal" => Ok(Priority::Normal),
			"high" => Ok(Priority::High),
			_ => Err(format!("unknown priority: {s}")),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Pending,
	Running,
	Completed,
	Failed,
	Cancelled,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Pending => "pending",
			JobStatus::Running => "running",
			JobStatus::Completed => "completed",
			JobStatus::Failed => "failed",
			JobStatus::Cancelled => "cancelled",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
		)
	}

	/// The lifecycle edge set. Everything not listed here is rejected.
	pub fn can_transition_to(&self, next: JobStatus) -> bool {
		matches!(
			(self, next),
			(JobStatus::Pending, JobStatus::Running)
				| (JobStatus::Pending, JobStatus::Cancelled)
				| (JobStatus::Running, JobStatus::Completed)
				| (JobStatus::Running, JobStatus::Failed)
				| (JobStatus::Running, JobStatus::Cancelled)
				| (JobStatus::Running, JobStatus::Pending)
		)
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"pending" => Ok(JobStatus::Pending),
			"running" => Ok(JobStatus::Running),
			"completed" => Ok(JobStatus::Completed),
			"failed" => Ok(JobStatus::Failed),
			"cancelled" => Ok(JobStatus::Cancelled),
			_ => Err(format!("unknown job status: {s}")),
		}
	}
}

/// Outcome recorded on a job once it reaches `completed` or `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
	pub success: bool,
	/// Executor-defined reference to the produced artifact (path, URL, key).
	pub output: Option<String>,
	pub error: Option<String>,
}

impl JobResult {
	pub fn succeeded(output: Option<String>) -> Self {
		Self {
			success: true,
			output,
			error: None,
		}
	}

	pub fn failed(error: impl Into<String>) -> Self {
		Self {
			success: false,
			output: None,
			error: Some(error.into()),
		}
	}
}

/// A submission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
	pub job_type: String,
	pub display_name: String,
	pub payload: serde_json::Value,
	pub priority: Priority,
	/// Falls back to the scheduler's configured default when `None`.
	pub max_retries: Option<u32>,
}

impl NewJob {
	pub fn new(job_type: impl Into<String>, display_name: impl Into<String>) -> Self {
		Self {
			job_type: job_type.into(),
			display_name: display_name.into(),
			payload: serde_json::Value::Null,
			priority: Priority::Normal,
			max_retries: None,
		}
	}

	pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
		self.payload = payload;
		self
	}

	pub fn with_priority(mut self, priority: Priority) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = Some(max_retries);
		self
	}
}

/// Conjunctive filter for [`crate::JobRegistry::list`]. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
	pub status: Option<JobStatus>,
	pub job_type: Option<String>,
	pub priority: Option<Priority>,
}

impl JobFilter {
	pub fn status(status: JobStatus) -> Self {
		Self {
			status: Some(status),
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
	pub total: usize,
	pub pending: usize,
	pub running: usize,
	pub completed: usize,
	pub failed: usize,
	pub cancelled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateProgress {
	/// Mean progress over every job in the registry, terminal ones included.
	pub average_progress: f64,
	pub total_jobs: usize,
	pub completed_jobs: usize,
	pub failed_jobs: usize,
	/// Display name of some running job. Advisory only.
	pub current_job_name: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_priority_order() {
		assert!(Priority::High > Priority::Normal);
		assert!(Priority::Normal > Priority::Low);
	}

	#[test]
	fn test_status_roundtrip_str() {
		for status in [
			JobStatus::Pending,
			JobStatus::Running,
			JobStatus::Completed,
			JobStatus::Failed,
			JobStatus::Cancelled,
		] {
			assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
		}
		assert!("paused".parse::<JobStatus>().is_err());
	}

	#[test]
	fn test_terminal_states_have_no_exits() {
		let all = [
			JobStatus::Pending,
			JobStatus::Running,
			JobStatus::Completed,
			JobStatus::Failed,
			JobStatus::Cancelled,
		];
		for from in all.iter().filter(|s| s.is_terminal()) {
			for to in all {
				assert!(!from.can_transition_to(to), "{from} -> {to}");
			}
		}
	}

	#[test]
	fn test_pending_cannot_skip_to_completed() {
		assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
		assert!(!JobStatus::Pending.can_transition_to(JobStatus::Failed));
		assert!(JobStatus::Running.can_transition_to(JobStatus::Pending));
	}

	#[test]
	fn test_job_id_parse() {
		let id = JobId::new();
		let parsed: JobId = id.to_string().parse().unwrap();
		assert_eq!(id, parsed);
		assert_eq!(parsed.as_uuid().get_version_num(), 4);
	}

	#[test]
	fn test_priority_serializes_snake_case() {
		assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
	}
}
