// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JobId, JobResult, JobStatus, NewJob, Priority};

/// One unit of schedulable export work.
///
/// Callers only ever see clones; the live instance is owned by
/// [`crate::JobRegistry`], which is the sole caller of the transition methods
/// below. Each transition checks [`JobStatus::can_transition_to`] and returns
/// `false` without touching the job when the edge is not allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub id: JobId,
	pub job_type: String,
	pub display_name: String,
	pub priority: Priority,
	pub payload: serde_json::Value,
	pub status: JobStatus,
	pub progress: u8,
	pub retry_count: u32,
	pub max_retries: u32,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub result: Option<JobResult>,
}

/// Persisted form of a job. Payloads are structured JSON and are stored as-is.
pub type JobSnapshot = Job;

impl Job {
	pub(crate) fn new(
		id: JobId,
		request: NewJob,
		max_retries: u32,
		created_at: DateTime<Utc>,
	) -> Self {
		Self {
			id,
			job_type: request.job_type,
			display_name: request.display_name,
			priority: request.priority,
			payload: request.payload,
			status: JobStatus::Pending,
			progress: 0,
			retry_count: 0,
			max_retries,
			created_at,
			started_at: None,
			completed_at: None,
			result: None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		self.status.is_terminal()
	}

	/// Attempts left before a failure becomes terminal.
	pub fn remaining_retries(&self) -> u32 {
		self.max_retries.saturating_sub(self.retry_count)
	}

	pub(crate) fn start(&mut self, now: DateTime<Utc>) -> bool {
		if !self.status.can_transition_to(JobStatus::Running) {
			return false;
		}
		self.status = JobStatus::Running;
		self.progress = 0;
		self.started_at = Some(now);
		self.completed_at = None;
		true
	}

	/// Progress only moves forward and only while running.
	pub(crate) fn record_progress(&mut self, progress: u8) -> bool {
		let progress = progress.min(100);
		if self.status != JobStatus::Running || progress <= self.progress {
			return false;
		}
		self.progress = progress;
		true
	}

	pub(crate) fn complete(&mut self, output: Option<String>, now: DateTime<Utc>) -> bool {
		if !self.status.can_transition_to(JobStatus::Completed) {
			return false;
		}
		self.status = JobStatus::Completed;
		self.progress = 100;
		self.completed_at = Some(now);
		self.result = Some(JobResult::succeeded(output));
		true
	}

	pub(crate) fn retry(&mut self) -> bool {
		if !self.status.can_transition_to(JobStatus::Pending) || self.remaining_retries() == 0 {
			return false;
		}
		self.status = JobStatus::Pending;
		self.retry_count += 1;
		self.progress = 0;
		self.started_at = None;
		self.completed_at = None;
		self.result = None;
		true
	}

	pub(crate) fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> bool {
		if !self.status.can_transition_to(JobStatus::Failed) {
			return false;
		}
		self.status = JobStatus::Failed;
		self.completed_at = Some(now);
		self.result = Some(JobResult::failed(error));
		true
	}

	pub(crate) fn cancel(&mut self, now: DateTime<Utc>) -> bool {
		if !self.status.can_transition_to(JobStatus::Cancelled) {
			return false;
		}
		self.status = JobStatus::Cancelled;
		self.completed_at = Some(now);
		true
	}

	/// Demotes a job that was running when the process went away.
	pub(crate) fn demote_after_restart(&mut self) {
		if self.status == JobStatus::Running {
			self.status = JobStatus::Pending;
			self.progress = 0;
			self.started_at = None;
		}
	}
}
