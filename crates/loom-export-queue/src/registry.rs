// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory owner of every job and the only writer of job state.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{QueueError, Result};
use crate::events::{EventSink, QueueEvent};
use crate::job::{Job, JobSnapshot};
use crate::policy::{Decision, Outcome, RetryPolicy};
use crate::types::{AggregateProgress, JobFilter, JobId, JobStatus, NewJob, QueueStats};

struct Entry {
	job: Job,
	/// Submission order. FIFO within a priority class follows this, never
	/// the wall clock.
	seq: u64,
	/// Retry gate. `None` means eligible now.
	eligible_after: Option<Instant>,
}

pub struct JobRegistry {
	jobs: HashMap<JobId, Entry>,
	job_types: HashSet<String>,
	default_max_retries: u32,
	events: Arc<dyn EventSink>,
	next_seq: u64,
	revision: u64,
}

impl JobRegistry {
	pub fn new(
		job_types: impl IntoIterator<Item = String>,
		default_max_retries: u32,
		events: Arc<dyn EventSink>,
	) -> Self {
		Self {
			jobs: HashMap::new(),
			job_types: job_types.into_iter().collect(),
			default_max_retries,
			events,
			next_seq: 0,
			revision: 0,
		}
	}

	/// Bumped on every mutation; the scheduler persists when it changes.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Loads recovered jobs in snapshot order, ahead of anything already
	/// queued. Existing ids are left untouched.
	pub fn restore(&mut self, jobs: Vec<Job>) -> usize {
		let mut fresh: Vec<Job> = Vec::with_capacity(jobs.len());
		for job in jobs {
			if self.jobs.contains_key(&job.id) || fresh.iter().any(|j| j.id == job.id) {
				warn!(job_id = %job.id, "Duplicate job id in snapshot, skipping");
				continue;
			}
			fresh.push(job);
		}

		let restored = fresh.len();
		let shift = restored as u64;
		for entry in self.jobs.values_mut() {
			entry.seq += shift;
		}
		self.next_seq += shift;

		for (seq, mut job) in fresh.into_iter().enumerate() {
			job.demote_after_restart();
			self.jobs.insert(
				job.id,
				Entry {
					job,
					seq: seq as u64,
					eligible_after: None,
				},
			);
		}
		if restored > 0 {
			self.touch();
			self.emit_stats();
		}
		restored
	}

	pub fn submit(&mut self, request: NewJob) -> Result<JobId> {
		self.validate(&request)?;
		let id = self.insert(request);
		self.touch();
		self.emit_stats();
		Ok(id)
	}

	/// Validates every request before inserting any, so a bad entry rejects
	/// the whole batch.
	pub fn submit_batch(&mut self, requests: Vec<NewJob>) -> Result<Vec<JobId>> {
		for request in &requests {
			self.validate(request)?;
		}
		if requests.is_empty() {
			return Ok(Vec::new());
		}

		let total = requests.len();
		let mut ids = Vec::with_capacity(total);
		for (index, mut request) in requests.into_iter().enumerate() {
			request.display_name = format!("{} ({}/{})", request.display_name, index + 1, total);
			ids.push(self.insert(request));
		}

		self.touch();
		self.events.emit(&QueueEvent::BatchAdded {
			job_ids: ids.clone(),
		});
		self.emit_stats();
		Ok(ids)
	}

	pub fn get(&self, id: &JobId) -> Option<Job> {
		self.jobs.get(id).map(|entry| entry.job.clone())
	}

	pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
		self
			.jobs
			.values()
			.map(|entry| &entry.job)
			.filter(|job| filter.status.map_or(true, |s| job.status == s))
			.filter(|job| {
				filter
					.job_type
					.as_deref()
					.map_or(true, |t| job.job_type == t)
			})
			.filter(|job| filter.priority.map_or(true, |p| job.priority == p))
			.cloned()
			.collect()
	}

	/// Returns `false` for unknown or already-terminal jobs.
	pub fn cancel(&mut self, id: &JobId) -> bool {
		if !self.cancel_one(id) {
			return false;
		}
		self.touch();
		self.emit_stats();
		true
	}

	pub fn cancel_all(&mut self) -> usize {
		let ids: Vec<JobId> = self
			.ordered()
			.into_iter()
			.filter(|entry| !entry.job.is_terminal())
			.map(|entry| entry.job.id)
			.collect();

		let count = ids.iter().filter(|id| self.cancel_one(id)).count();
		if count > 0 {
			self.touch();
		}
		self.events.emit(&QueueEvent::BatchCancelled { count });
		self.emit_stats();
		count
	}

	pub fn purge_terminal(&mut self) -> usize {
		let before = self.jobs.len();
		self.jobs.retain(|_, entry| !entry.job.is_terminal());
		let removed = before - self.jobs.len();
		if removed > 0 {
			self.touch();
		}
		self.events.emit(&QueueEvent::QueueCleared { removed });
		self.emit_stats();
		removed
	}

	pub fn stats(&self) -> QueueStats {
		let mut stats = QueueStats {
			total: self.jobs.len(),
			..Default::default()
		};
		for entry in self.jobs.values() {
			match entry.job.status {
				JobStatus::Pending => stats.pending += 1,
				JobStatus::Running => stats.running += 1,
				JobStatus::Completed => stats.completed += 1,
				JobStatus::Failed => stats.failed += 1,
				JobStatus::Cancelled => stats.cancelled += 1,
			}
		}
		stats
	}

	/// Mean progress over all jobs, terminal ones included.
	pub fn aggregate_progress(&self) -> AggregateProgress {
		let stats = self.stats();
		let sum: u64 = self
			.jobs
			.values()
			.map(|entry| u64::from(entry.job.progress))
			.sum();
		let average_progress = if stats.total == 0 {
			0.0
		} else {
			sum as f64 / stats.total as f64
		};
		let current_job_name = self
			.jobs
			.values()
			.filter(|entry| entry.job.status == JobStatus::Running)
			.min_by_key(|entry| entry.seq)
			.map(|entry| entry.job.display_name.clone());

		AggregateProgress {
			average_progress,
			total_jobs: stats.total,
			completed_jobs: stats.completed,
			failed_jobs: stats.failed,
			current_job_name,
		}
	}

	pub fn running_count(&self) -> usize {
		self
			.jobs
			.values()
			.filter(|entry| entry.job.status == JobStatus::Running)
			.count()
	}

	/// Every job in submission order, for persistence.
	pub fn snapshots(&self) -> Vec<JobSnapshot> {
		self
			.ordered()
			.into_iter()
			.map(|entry| entry.job.clone())
			.collect()
	}

	/// Pending jobs past their retry gate, best first: priority, then
	/// submission order.
	pub(crate) fn ready_candidates(&self, now: Instant, limit: usize) -> Vec<JobId> {
		let mut ready: Vec<&Entry> = self
			.jobs
			.values()
			.filter(|entry| entry.job.status == JobStatus::Pending)
			.filter(|entry| entry.eligible_after.map_or(true, |at| at <= now))
			.collect();
		ready.sort_by_key(|entry| (Reverse(entry.job.priority), entry.seq));
		ready
			.into_iter()
			.take(limit)
			.map(|entry| entry.job.id)
			.collect()
	}

	/// pending -> running. Returns the job as dispatched.
	pub(crate) fn start(&mut self, id: &JobId) -> Option<Job> {
		let entry = self.jobs.get_mut(id)?;
		if !entry.job.start(Utc::now()) {
			debug!(job_id = %id, status = %entry.job.status, "Rejected start transition");
			return None;
		}
		entry.eligible_after = None;
		let job = entry.job.clone();
		self.touch();
		self.events.emit(&QueueEvent::JobStarted {
			job_id: *id,
			attempt: job.retry_count,
		});
		self.emit_stats();
		Some(job)
	}

	pub(crate) fn record_progress(&mut self, id: &JobId, attempt: u32, progress: u8) -> bool {
		let Some(entry) = self.current_attempt(id, attempt) else {
			return false;
		};
		if !entry.job.record_progress(progress) {
			return false;
		}
		let progress = entry.job.progress;
		self.touch();
		self.events.emit(&QueueEvent::JobProgress {
			job_id: *id,
			progress,
		});
		true
	}

	/// Applies the outcome of attempt `attempt`. Outcomes for anything but the
	/// job's current running attempt are stale and dropped.
	pub(crate) fn finish(
		&mut self,
		id: &JobId,
		attempt: u32,
		outcome: Outcome,
		policy: &RetryPolicy,
		now: Instant,
	) -> Option<Decision> {
		let Some(entry) = self.current_attempt(id, attempt) else {
			debug!(job_id = %id, attempt, "Discarding stale executor outcome");
			return None;
		};

		let decision = policy.decide(&entry.job, &outcome);
		let event = match &decision {
			Decision::Complete => {
				let output = match outcome {
					Outcome::Success(output) => output.output,
					_ => None,
				};
				entry.job.complete(output.clone(), Utc::now());
				info!(job_id = %id, attempt, "Export job completed");
				QueueEvent::JobCompleted {
					job_id: *id,
					output,
				}
			}
			Decision::Retry { attempt, delay } => {
				let error = match &outcome {
					Outcome::Error(error) => error.clone(),
					_ => String::new(),
				};
				entry.job.retry();
				entry.eligible_after = Some(now + *delay);
				warn!(
					job_id = %id,
					attempt,
					delay_ms = delay.as_millis() as u64,
					error = %error,
					"Export job failed, retrying"
				);
				QueueEvent::JobRetry {
					job_id: *id,
					attempt: *attempt,
					error,
				}
			}
			Decision::Fail { error } => {
				entry.job.fail(error.clone(), Utc::now());
				warn!(job_id = %id, attempt, error = %error, "Export job failed");
				QueueEvent::JobFailed {
					job_id: *id,
					error: error.clone(),
				}
			}
		};

		self.touch();
		self.events.emit(&event);
		self.emit_stats();
		Some(decision)
	}

	/// Fails a running job outright, bypassing the retry policy.
	pub(crate) fn abort(&mut self, id: &JobId, error: &str) -> bool {
		let Some(entry) = self.jobs.get_mut(id) else {
			return false;
		};
		if !entry.job.fail(error, Utc::now()) {
			return false;
		}
		warn!(job_id = %id, error = %error, "Export job aborted");
		self.touch();
		self.events.emit(&QueueEvent::JobFailed {
			job_id: *id,
			error: error.to_string(),
		});
		self.emit_stats();
		true
	}

	fn validate(&self, request: &NewJob) -> Result<()> {
		if !self.job_types.contains(&request.job_type) {
			return Err(QueueError::InvalidArgument(format!(
				"unregistered job type: {}",
				request.job_type
			)));
		}
		if request.display_name.trim().is_empty() {
			return Err(QueueError::InvalidArgument(
				"display name must not be empty".to_string(),
			));
		}
		Ok(())
	}

	fn insert(&mut self, request: NewJob) -> JobId {
		let id = JobId::new();
		let max_retries = request.max_retries.unwrap_or(self.default_max_retries);
		let job = Job::new(id, request, max_retries, Utc::now());
		self.events.emit(&QueueEvent::JobAdded {
			job_id: id,
			job_type: job.job_type.clone(),
			display_name: job.display_name.clone(),
			priority: job.priority,
		});
		let seq = self.take_seq();
		self.jobs.insert(
			id,
			Entry {
				job,
				seq,
				eligible_after: None,
			},
		);
		id
	}

	fn cancel_one(&mut self, id: &JobId) -> bool {
		let Some(entry) = self.jobs.get_mut(id) else {
			return false;
		};
		if !entry.job.cancel(Utc::now()) {
			return false;
		}
		entry.eligible_after = None;
		self.events.emit(&QueueEvent::JobCancelled { job_id: *id });
		true
	}

	fn current_attempt(&mut self, id: &JobId, attempt: u32) -> Option<&mut Entry> {
		self
			.jobs
			.get_mut(id)
			.filter(|entry| entry.job.status == JobStatus::Running && entry.job.retry_count == attempt)
	}

	fn ordered(&self) -> Vec<&Entry> {
		let mut entries: Vec<&Entry> = self.jobs.values().collect();
		entries.sort_by_key(|entry| entry.seq);
		entries
	}

	fn take_seq(&mut self) -> u64 {
		let seq = self.next_seq;
		self.next_seq += 1;
		seq
	}

	fn touch(&mut self) {
		self.revision += 1;
	}

	fn emit_stats(&self) {
		self.events.emit(&QueueEvent::QueueUpdated {
			stats: self.stats(),
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::RecordingSink;
	use crate::executor::ExecutorOutput;
	use crate::types::Priority;
	use proptest::prelude::*;
	use std::time::Duration;

	fn registry() -> (JobRegistry, Arc<RecordingSink>) {
		let sink = Arc::new(RecordingSink::new());
		let registry = JobRegistry::new(
			["csv".to_string(), "png".to_string()],
			2,
			sink.clone(),
		);
		(registry, sink)
	}

	fn csv(name: &str) -> NewJob {
		NewJob::new("csv", name)
	}

	#[test]
	fn test_submit_creates_pending_job() {
		let (mut registry, sink) = registry();
		let id = registry.submit(csv("Sales")).unwrap();

		let job = registry.get(&id).unwrap();
		assert_eq!(job.status, JobStatus::Pending);
		assert_eq!(job.max_retries, 2);
		assert_eq!(job.progress, 0);
		assert_eq!(sink.event_types(), vec!["job.added", "queue.updated"]);
		assert_eq!(registry.revision(), 1);
	}

	#[test]
	fn test_submit_unknown_type_rejected() {
		let (mut registry, sink) = registry();
		let err = registry.submit(NewJob::new("docx", "Report")).unwrap_err();
		assert!(matches!(err, QueueError::InvalidArgument(_)));
		assert_eq!(registry.stats().total, 0);
		assert!(sink.events().is_empty());
	}

	#[test]
	fn test_submit_blank_name_rejected() {
		let (mut registry, _) = registry();
		assert!(matches!(
			registry.submit(csv("   ")),
			Err(QueueError::InvalidArgument(_))
		));
	}

	#[test]
	fn test_submit_batch_suffixes_names() {
		let (mut registry, sink) = registry();
		let ids = registry
			.submit_batch(vec![csv("Region"), csv("Region"), csv("Region")])
			.unwrap();

		let names: Vec<String> = ids
			.iter()
			.map(|id| registry.get(id).unwrap().display_name)
			.collect();
		assert_eq!(names, vec!["Region (1/3)", "Region (2/3)", "Region (3/3)"]);
		assert_eq!(
			sink.event_types(),
			vec![
				"job.added",
				"job.added",
				"job.added",
				"batch.added",
				"queue.updated"
			]
		);
	}

	#[test]
	fn test_submit_batch_is_all_or_nothing() {
		let (mut registry, _) = registry();
		let result = registry.submit_batch(vec![csv("ok"), NewJob::new("docx", "bad")]);
		assert!(result.is_err());
		assert_eq!(registry.stats().total, 0);
	}

	#[test]
	fn test_list_filters_combine() {
		let (mut registry, _) = registry();
		registry.submit(csv("a").with_priority(Priority::High)).unwrap();
		registry.submit(csv("b")).unwrap();
		registry
			.submit(NewJob::new("png", "c").with_priority(Priority::High))
			.unwrap();

		let filter = JobFilter {
			job_type: Some("csv".to_string()),
			priority: Some(Priority::High),
			..Default::default()
		};
		let jobs = registry.list(&filter);
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].display_name, "a");
		assert_eq!(registry.list(&JobFilter::status(JobStatus::Pending)).len(), 3);
		assert_eq!(registry.list(&JobFilter::default()).len(), 3);
	}

	#[test]
	fn test_cancel_is_idempotent() {
		let (mut registry, _) = registry();
		let id = registry.submit(csv("Sales")).unwrap();

		assert!(registry.cancel(&id));
		assert!(!registry.cancel(&id));
		assert!(!registry.cancel(&JobId::new()));

		let job = registry.get(&id).unwrap();
		assert_eq!(job.status, JobStatus::Cancelled);
		assert!(job.completed_at.is_some());
		assert!(job.result.is_none());
	}

	#[test]
	fn test_cancelled_pending_job_is_never_dispatched() {
		let (mut registry, _) = registry();
		let id = registry.submit(csv("Sales")).unwrap();
		registry.cancel(&id);

		assert!(registry.ready_candidates(Instant::now(), 10).is_empty());
		assert!(registry.start(&id).is_none());
		assert_eq!(registry.stats().cancelled, 1);
	}

	#[test]
	fn test_cancel_terminal_job_returns_false() {
		let (mut registry, _) = registry();
		let id = registry.submit(csv("Sales")).unwrap();
		registry.start(&id).unwrap();
		registry.finish(
			&id,
			0,
			Outcome::Success(ExecutorOutput::default()),
			&RetryPolicy::default(),
			Instant::now(),
		);
		assert!(!registry.cancel(&id));
		assert_eq!(registry.get(&id).unwrap().status, JobStatus::Completed);
	}

	#[test]
	fn test_cancel_all_counts_live_jobs() {
		let (mut registry, sink) = registry();
		let a = registry.submit(csv("a")).unwrap();
		registry.submit(csv("b")).unwrap();
		let c = registry.submit(csv("c")).unwrap();
		registry.start(&a).unwrap();
		registry.cancel(&c);

		assert_eq!(registry.cancel_all(), 2);
		let stats = registry.stats();
		assert_eq!(stats.cancelled, 3);
		assert_eq!(stats.running, 0);

		let types = sink.event_types();
		assert_eq!(types.iter().filter(|t| **t == "batch.cancelled").count(), 1);
		assert_eq!(types.iter().filter(|t| **t == "job.cancelled").count(), 3);
	}

	#[test]
	fn test_purge_terminal_keeps_live_jobs() {
		let (mut registry, sink) = registry();
		let a = registry.submit(csv("a")).unwrap();
		let b = registry.submit(csv("b")).unwrap();
		registry.cancel(&a);

		assert_eq!(registry.purge_terminal(), 1);
		assert!(registry.get(&a).is_none());
		assert!(registry.get(&b).is_some());
		assert!(sink.event_types().contains(&"queue.cleared"));
	}

	#[test]
	fn test_priority_beats_age() {
		let (mut registry, _) = registry();
		let older_normal = registry.submit(csv("normal")).unwrap();
		let newer_high = registry
			.submit(csv("high").with_priority(Priority::High))
			.unwrap();

		let ready = registry.ready_candidates(Instant::now(), 1);
		assert_eq!(ready, vec![newer_high]);
		let ready = registry.ready_candidates(Instant::now(), 2);
		assert_eq!(ready, vec![newer_high, older_normal]);
	}

	#[test]
	fn test_fifo_within_priority() {
		let (mut registry, _) = registry();
		let ids: Vec<JobId> = (0..5)
			.map(|i| registry.submit(csv(&format!("job {i}"))).unwrap())
			.collect();
		assert_eq!(registry.ready_candidates(Instant::now(), 5), ids);
	}

	#[test]
	fn test_fifo_survives_clock_step_back() {
		let (mut registry, _) = registry();
		let first = registry.submit(csv("first")).unwrap();
		let second = registry.submit(csv("second")).unwrap();
		let earlier = registry.get(&first).unwrap().created_at - chrono::Duration::hours(1);
		if let Some(entry) = registry.jobs.get_mut(&second) {
			entry.job.created_at = earlier;
		}

		assert_eq!(registry.ready_candidates(Instant::now(), 2), vec![first, second]);
	}

	#[test]
	fn test_restored_jobs_run_before_new_submissions() {
		let (mut source, _) = registry();
		let old_a = source.submit(csv("old a")).unwrap();
		let old_b = source.submit(csv("old b")).unwrap();

		let (mut registry, _) = registry();
		let fresh = registry.submit(csv("fresh")).unwrap();
		assert_eq!(registry.restore(source.snapshots()), 2);
		let later = registry.submit(csv("later")).unwrap();

		assert_eq!(
			registry.ready_candidates(Instant::now(), 4),
			vec![old_a, old_b, fresh, later]
		);
		assert_eq!(registry.restore(source.snapshots()), 0);
	}

	#[test]
	fn test_retry_gate_delays_eligibility() {
		let (mut registry, sink) = registry();
		let id = registry.submit(csv("flaky")).unwrap();
		let policy = RetryPolicy::new(Duration::from_millis(500));
		let now = Instant::now();

		registry.start(&id).unwrap();
		let decision = registry
			.finish(&id, 0, Outcome::Error("socket reset".into()), &policy, now)
			.unwrap();
		assert_eq!(
			decision,
			Decision::Retry {
				attempt: 1,
				delay: Duration::from_millis(500)
			}
		);

		let job = registry.get(&id).unwrap();
		assert_eq!(job.status, JobStatus::Pending);
		assert_eq!(job.retry_count, 1);
		assert!(job.started_at.is_none());

		assert!(registry.ready_candidates(now, 1).is_empty());
		assert!(registry
			.ready_candidates(now + Duration::from_millis(499), 1)
			.is_empty());
		assert_eq!(
			registry.ready_candidates(now + Duration::from_millis(500), 1),
			vec![id]
		);
		assert!(sink.events().contains(&QueueEvent::JobRetry {
			job_id: id,
			attempt: 1,
			error: "socket reset".to_string(),
		}));
	}

	#[test]
	fn test_stale_outcome_discarded() {
		let (mut registry, _) = registry();
		let id = registry.submit(csv("flaky")).unwrap();
		let policy = RetryPolicy::new(Duration::ZERO);

		registry.start(&id).unwrap();
		registry.finish(&id, 0, Outcome::Error("first".into()), &policy, Instant::now());
		registry.start(&id).unwrap();

		// Late success from attempt 0 must not complete attempt 1.
		let stale = registry.finish(
			&id,
			0,
			Outcome::Success(ExecutorOutput::default()),
			&policy,
			Instant::now(),
		);
		assert!(stale.is_none());
		assert_eq!(registry.get(&id).unwrap().status, JobStatus::Running);
		assert!(!registry.record_progress(&id, 0, 50));
		assert!(registry.record_progress(&id, 1, 50));
	}

	#[test]
	fn test_outcome_after_cancel_discarded() {
		let (mut registry, _) = registry();
		let id = registry.submit(csv("slow")).unwrap();
		registry.start(&id).unwrap();
		registry.cancel(&id);

		let late = registry.finish(
			&id,
			0,
			Outcome::Success(ExecutorOutput::default()),
			&RetryPolicy::default(),
			Instant::now(),
		);
		assert!(late.is_none());
		assert_eq!(registry.get(&id).unwrap().status, JobStatus::Cancelled);
	}

	#[test]
	fn test_timeout_fails_and_late_success_ignored() {
		let (mut registry, _) = registry();
		let id = registry.submit(csv("hung")).unwrap();
		let policy = RetryPolicy::default();
		registry.start(&id).unwrap();

		registry.finish(
			&id,
			0,
			Outcome::Timeout {
				after: Duration::from_millis(50),
			},
			&policy,
			Instant::now(),
		);
		let late = registry.finish(
			&id,
			0,
			Outcome::Success(ExecutorOutput::with_output("late.png")),
			&policy,
			Instant::now(),
		);
		assert!(late.is_none());

		let job = registry.get(&id).unwrap();
		assert_eq!(job.status, JobStatus::Failed);
		assert_eq!(job.retry_count, 0);
		assert!(job.result.unwrap().error.unwrap().contains("timeout"));
	}

	#[test]
	fn test_aggregate_progress_includes_terminal_jobs() {
		let (mut registry, _) = registry();
		let done = registry.submit(csv("done")).unwrap();
		let running = registry.submit(csv("running")).unwrap();
		registry.submit(csv("waiting")).unwrap();

		registry.start(&done).unwrap();
		registry.finish(
			&done,
			0,
			Outcome::Success(ExecutorOutput::default()),
			&RetryPolicy::default(),
			Instant::now(),
		);
		registry.start(&running).unwrap();
		registry.record_progress(&running, 0, 50);

		let progress = registry.aggregate_progress();
		assert_eq!(progress.total_jobs, 3);
		assert_eq!(progress.completed_jobs, 1);
		assert!((progress.average_progress - 50.0).abs() < f64::EPSILON);
		assert_eq!(progress.current_job_name.as_deref(), Some("running"));
	}

	#[test]
	fn test_aggregate_progress_empty() {
		let (registry, _) = registry();
		let progress = registry.aggregate_progress();
		assert_eq!(progress.average_progress, 0.0);
		assert!(progress.current_job_name.is_none());
	}

	#[test]
	fn test_restore_demotes_running_jobs() {
		let (mut source, _) = registry();
		let id = source.submit(csv("mid-flight")).unwrap();
		source.start(&id).unwrap();
		source.record_progress(&id, 0, 80);

		let (mut registry, _) = registry();
		assert_eq!(registry.restore(source.snapshots()), 1);
		let job = registry.get(&id).unwrap();
		assert_eq!(job.status, JobStatus::Pending);
		assert_eq!(job.progress, 0);
		assert_eq!(registry.ready_candidates(Instant::now(), 1), vec![id]);
	}

	#[test]
	fn test_abort_fails_running_job() {
		let (mut registry, _) = registry();
		let id = registry.submit(csv("orphan")).unwrap();
		assert!(!registry.abort(&id, "no executor"));
		registry.start(&id).unwrap();
		assert!(registry.abort(&id, "no executor"));
		assert_eq!(registry.get(&id).unwrap().status, JobStatus::Failed);
	}

	fn priority_strategy() -> impl Strategy<Value = Priority> {
		prop_oneof![
			Just(Priority::Low),
			Just(Priority::Normal),
			Just(Priority::High)
		]
	}

	proptest! {
		/// Dispatch order is priority-major and submission order within a class.
		#[test]
		fn candidates_sorted_by_priority_then_submission(
			priorities in prop::collection::vec(priority_strategy(), 1..30)
		) {
			let (mut registry, _) = registry();
			let submitted: Vec<(JobId, Priority)> = priorities
				.iter()
				.map(|p| (registry.submit(csv("job").with_priority(*p)).unwrap(), *p))
				.collect();

			let ready = registry.ready_candidates(Instant::now(), submitted.len());
			let mut expected = submitted.clone();
			expected.sort_by_key(|(_, p)| Reverse(*p));
			let expected: Vec<JobId> = expected.into_iter().map(|(id, _)| id).collect();
			prop_assert_eq!(ready, expected);
		}
	}
}
