// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Export job queue for Loom.
//!
//! Long-running exports (PDF reports, chart images, CSV dumps) are submitted
//! as jobs and run by pluggable executors under a global concurrency cap.
//! Jobs are dispatched by priority, then age, retried with linear backoff,
//! bounded by a per-attempt timeout, and snapshotted so a restart resumes
//! the queue.

pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod global;
pub mod job;
pub mod policy;
pub mod registry;
pub mod repository;
pub mod scheduler;
pub mod snapshot;
pub mod types;

pub use context::{CancellationToken, ExecutionContext, ProgressReporter};
pub use error::{QueueError, Result};
pub use events::{EventBus, EventSink, QueueEvent, RecordingSink};
pub use executor::{Executor, ExecutorOutput, ExecutorRegistry, FnExecutor};
pub use global::{global, install_global};
pub use job::{Job, JobSnapshot};
pub use policy::{Decision, Outcome, RetryPolicy};
pub use registry::JobRegistry;
pub use repository::SqliteSnapshotStore;
pub use scheduler::{JobScheduler, SchedulerConfig};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use types::{
	AggregateProgress, JobFilter, JobId, JobResult, JobStatus, NewJob, Priority, QueueStats,
};
