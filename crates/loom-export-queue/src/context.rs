// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::policy::Outcome;
use crate::types::JobId;

/// Everything an executor gets for one attempt.
pub struct ExecutionContext {
	pub job_id: JobId,
	pub job_type: String,
	/// Zero-based; equals the job's retry count when the attempt started.
	pub attempt: u32,
	pub payload: serde_json::Value,
	pub progress: ProgressReporter,
	pub cancellation_token: CancellationToken,
}

impl ExecutionContext {
	/// A context wired to nothing, for driving an executor outside a scheduler.
	pub fn detached(job_type: impl Into<String>, payload: serde_json::Value) -> Self {
		let (tx, _rx) = mpsc::unbounded_channel();
		let job_id = JobId::new();
		Self {
			job_id,
			job_type: job_type.into(),
			attempt: 0,
			payload,
			progress: ProgressReporter::new(job_id, 0, tx),
			cancellation_token: CancellationToken::new(),
		}
	}

	pub fn report_progress(&self, progress: u8) {
		self.progress.report(progress);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation_token.is_cancelled()
	}
}

#[derive(Clone)]
pub struct CancellationToken {
	cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self {
			cancelled: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}
}

impl Default for CancellationToken {
	fn default() -> Self {
		Self::new()
	}
}

/// Message from a worker task back to the scheduling loop.
#[derive(Debug)]
pub(crate) struct WorkerMessage {
	pub job_id: JobId,
	pub attempt: u32,
	pub kind: WorkerMessageKind,
}

#[derive(Debug)]
pub(crate) enum WorkerMessageKind {
	Progress(u8),
	Finished(Outcome),
}

/// Forwards progress (0-100) to the scheduler. Values that do not move
/// forward are dropped here so a chatty executor cannot flood the loop.
#[derive(Clone)]
pub struct ProgressReporter {
	job_id: JobId,
	attempt: u32,
	last: Arc<AtomicU8>,
	tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl ProgressReporter {
	pub(crate) fn new(job_id: JobId, attempt: u32, tx: mpsc::UnboundedSender<WorkerMessage>) -> Self {
		Self {
			job_id,
			attempt,
			last: Arc::new(AtomicU8::new(0)),
			tx,
		}
	}

	pub fn report(&self, progress: u8) {
		let progress = progress.min(100);
		let previous = self.last.fetch_max(progress, Ordering::SeqCst);
		if progress <= previous {
			return;
		}
		// The loop may already be gone; progress is advisory.
		let _ = self.tx.send(WorkerMessage {
			job_id: self.job_id,
			attempt: self.attempt,
			kind: WorkerMessageKind::Progress(progress),
		});
	}

	pub fn last_reported(&self) -> u8 {
		self.last.load(Ordering::SeqCst)
	}
}
