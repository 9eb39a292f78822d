// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle notifications.
//!
//! # Events
//!
//! - `job.added` / `batch.added` - submission
//! - `job.started` - a job entered `running`
//! - `job.progress` - executor reported progress
//! - `job.completed` / `job.failed` - terminal outcome
//! - `job.retry` - failed attempt sent back to `pending`
//! - `job.cancelled` / `batch.cancelled` - cancellation
//! - `queue.cleared` - terminal jobs purged
//! - `queue.updated` - stats after any mutation
//!
//! Delivery is fire-and-forget. Broadcast subscribers that fall behind lose
//! events; sinks run inline and must return quickly.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{JobId, Priority, QueueStats};

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum QueueEvent {
	#[serde(rename = "job.added")]
	JobAdded {
		job_id: JobId,
		job_type: String,
		display_name: String,
		priority: Priority,
	},

	#[serde(rename = "batch.added")]
	BatchAdded { job_ids: Vec<JobId> },

	#[serde(rename = "job.started")]
	JobStarted { job_id: JobId, attempt: u32 },

	#[serde(rename = "job.progress")]
	JobProgress { job_id: JobId, progress: u8 },

	#[serde(rename = "job.completed")]
	JobCompleted {
		job_id: JobId,
		output: Option<String>,
	},

	#[serde(rename = "job.failed")]
	JobFailed { job_id: JobId, error: String },

	#[serde(rename = "job.retry")]
	JobRetry {
		job_id: JobId,
		attempt: u32,
		error: String,
	},

	#[serde(rename = "job.cancelled")]
	JobCancelled { job_id: JobId },

	#[serde(rename = "batch.cancelled")]
	BatchCancelled { count: usize },

	#[serde(rename = "queue.cleared")]
	QueueCleared { removed: usize },

	#[serde(rename = "queue.updated")]
	QueueUpdated { stats: QueueStats },
}

impl QueueEvent {
	pub fn event_type(&self) -> &'static str {
		match self {
			QueueEvent::JobAdded { .. } => "job.added",
			QueueEvent::BatchAdded { .. } => "batch.added",
			QueueEvent::JobStarted { .. } => "job.started",
			QueueEvent::JobProgress { .. } => "job.progress",
			QueueEvent::JobCompleted { .. } => "job.completed",
			QueueEvent::JobFailed { .. } => "job.failed",
			QueueEvent::JobRetry { .. } => "job.retry",
			QueueEvent::JobCancelled { .. } => "job.cancelled",
			QueueEvent::BatchCancelled { .. } => "batch.cancelled",
			QueueEvent::QueueCleared { .. } => "queue.cleared",
			QueueEvent::QueueUpdated { .. } => "queue.updated",
		}
	}

	/// The job this event concerns, for per-job events.
	pub fn job_id(&self) -> Option<JobId> {
		match self {
			QueueEvent::JobAdded { job_id, .. }
			| QueueEvent::JobStarted { job_id, .. }
			| QueueEvent::JobProgress { job_id, .. }
			| QueueEvent::JobCompleted { job_id, .. }
			| QueueEvent::JobFailed { job_id, .. }
			| QueueEvent::JobRetry { job_id, .. }
			| QueueEvent::JobCancelled { job_id } => Some(*job_id),
			_ => None,
		}
	}
}

/// Synchronous receiver of queue events.
pub trait EventSink: Send + Sync {
	fn emit(&self, event: &QueueEvent);
}

/// Fan-out to broadcast subscribers and registered sinks.
#[derive(Clone)]
pub struct EventBus {
	inner: Arc<EventBusInner>,
}

struct EventBusInner {
	tx: broadcast::Sender<QueueEvent>,
	sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self {
			inner: Arc::new(EventBusInner {
				tx,
				sinks: RwLock::new(Vec::new()),
			}),
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
		self.inner.tx.subscribe()
	}

	pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
		let mut sinks = self
			.inner
			.sinks
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		sinks.push(sink);
	}

	pub fn subscriber_count(&self) -> usize {
		self.inner.tx.receiver_count()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_EVENT_CAPACITY)
	}
}

impl EventSink for EventBus {
	fn emit(&self, event: &QueueEvent) {
		// No receivers is not an error.
		let _ = self.inner.tx.send(event.clone());

		let sinks = self
			.inner
			.sinks
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		for sink in sinks.iter() {
			sink.emit(event);
		}
	}
}

/// Sink that remembers every event. Handy for tests and debugging.
#[derive(Default)]
pub struct RecordingSink {
	events: std::sync::Mutex<Vec<QueueEvent>>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<QueueEvent> {
		self
			.events
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.clone()
	}

	pub fn event_types(&self) -> Vec<&'static str> {
		self.events().iter().map(QueueEvent::event_type).collect()
	}
}

impl EventSink for RecordingSink {
	fn emit(&self, event: &QueueEvent) {
		self
			.events
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.push(event.clone());
	}
}
