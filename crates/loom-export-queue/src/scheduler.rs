// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_export_queue_config::ExportQueueConfig;
use tokio::sync::{broadcast, mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::context::{
	CancellationToken, ExecutionContext, ProgressReporter, WorkerMessage, WorkerMessageKind,
};
use crate::error::{QueueError, Result};
use crate::events::{EventBus, EventSink, QueueEvent};
use crate::executor::{Executor, ExecutorRegistry};
use crate::job::{Job, JobSnapshot};
use crate::policy::{Outcome, RetryPolicy};
use crate::registry::JobRegistry;
use crate::snapshot::{
	load_recovered, FileSnapshotStore, MemorySnapshotStore, SnapshotStore, DEFAULT_RETENTION,
};
use crate::types::{AggregateProgress, JobFilter, JobId, NewJob, QueueStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
	pub max_concurrent: usize,
	pub tick_interval: Duration,
	pub job_timeout: Duration,
	pub retry_base_delay: Duration,
	pub default_max_retries: u32,
	pub retention: Duration,
	pub event_capacity: usize,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self::from(&ExportQueueConfig::default())
	}
}

impl From<&ExportQueueConfig> for SchedulerConfig {
	fn from(config: &ExportQueueConfig) -> Self {
		Self {
			max_concurrent: config.queue.max_concurrent.max(1),
			tick_interval: Duration::from_millis(config.queue.tick_interval_ms.max(1)),
			job_timeout: Duration::from_secs(config.queue.job_timeout_secs),
			retry_base_delay: Duration::from_millis(config.queue.retry_base_delay_ms),
			default_max_retries: config.queue.default_max_retries,
			retention: Duration::from_secs(
				config.persistence.retention_hours.saturating_mul(60 * 60),
			),
			event_capacity: config.queue.event_capacity,
		}
	}
}

struct InFlight {
	attempt: u32,
	cancellation_token: CancellationToken,
	timer: JoinHandle<()>,
}

impl InFlight {
	fn stop(self) {
		self.timer.abort();
		self.cancellation_token.cancel();
	}
}

struct QueueState {
	registry: JobRegistry,
	in_flight: HashMap<JobId, InFlight>,
	published_revision: u64,
}

struct Shared {
	state: Mutex<QueueState>,
	executors: ExecutorRegistry,
	policy: RetryPolicy,
	config: SchedulerConfig,
	events: EventBus,
	store: Arc<dyn SnapshotStore>,
	worker_tx: mpsc::UnboundedSender<WorkerMessage>,
	snapshot_tx: watch::Sender<Vec<JobSnapshot>>,
	wake: Notify,
}

/// Bounded-concurrency, priority-ordered export queue.
///
/// Submissions land in the [`JobRegistry`] as `pending`. Once [`start`]ed, a
/// single loop dispatches ready jobs on every tick (and right after each
/// submission), applies executor results, progress and timeouts coming back
/// over a channel, and publishes every registry change to the snapshot store.
///
/// [`start`]: JobScheduler::start
pub struct JobScheduler {
	shared: Arc<Shared>,
	worker_rx: Mutex<Option<mpsc::UnboundedReceiver<WorkerMessage>>>,
	snapshot_rx: Mutex<Option<watch::Receiver<Vec<JobSnapshot>>>>,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
	is_shut_down: AtomicBool,
}

impl JobScheduler {
	pub fn new(
		config: SchedulerConfig,
		executors: ExecutorRegistry,
		store: Arc<dyn SnapshotStore>,
	) -> Self {
		let events = EventBus::new(config.event_capacity);
		let registry = JobRegistry::new(
			executors.job_types(),
			config.default_max_retries,
			Arc::new(events.clone()),
		);
		let (worker_tx, worker_rx) = mpsc::unbounded_channel();
		let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
		let (shutdown_tx, _) = broadcast::channel(1);

		Self {
			shared: Arc::new(Shared {
				state: Mutex::new(QueueState {
					registry,
					in_flight: HashMap::new(),
					published_revision: 0,
				}),
				executors,
				policy: RetryPolicy::new(config.retry_base_delay),
				config,
				events,
				store,
				worker_tx,
				snapshot_tx,
				wake: Notify::new(),
			}),
			worker_rx: Mutex::new(Some(worker_rx)),
			snapshot_rx: Mutex::new(Some(snapshot_rx)),
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
			is_shut_down: AtomicBool::new(false),
		}
	}

	/// Builds a scheduler from resolved configuration, persisting to the
	/// configured snapshot file or keeping snapshots in memory.
	pub fn from_config(config: &ExportQueueConfig, executors: ExecutorRegistry) -> Self {
		let store: Arc<dyn SnapshotStore> = match &config.persistence.snapshot_path {
			Some(path) => Arc::new(FileSnapshotStore::new(path)),
			None => Arc::new(MemorySnapshotStore::new()),
		};
		Self::new(SchedulerConfig::from(config), executors, store)
	}

	pub fn config(&self) -> &SchedulerConfig {
		&self.shared.config
	}

	/// Loads the persisted snapshot, then spawns the scheduling loop and the
	/// persistence task.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		if self.is_shut_down.load(Ordering::SeqCst) {
			return Err(QueueError::ShutDown);
		}
		let Some(worker_rx) = self.worker_rx.lock().await.take() else {
			return Err(QueueError::AlreadyStarted);
		};
		let Some(snapshot_rx) = self.snapshot_rx.lock().await.take() else {
			return Err(QueueError::AlreadyStarted);
		};

		let retention = if self.shared.config.retention.is_zero() {
			DEFAULT_RETENTION
		} else {
			self.shared.config.retention
		};
		let recovered = load_recovered(self.shared.store.as_ref(), retention).await;
		{
			let mut state = self.shared.state.lock().await;
			let restored = state.registry.restore(recovered);
			if restored > 0 {
				info!(restored, "Restored export jobs from snapshot");
			}
			self.shared.publish(&mut state);
		}

		if self.shared.executors.is_empty() {
			warn!("No executors registered, every submission will be rejected");
		}

		let mut handles = self.handles.lock().await;
		handles.push(tokio::spawn(run_persister(
			Arc::clone(&self.shared),
			snapshot_rx,
			self.shutdown_tx.subscribe(),
		)));
		handles.push(tokio::spawn(run_loop(
			Arc::clone(&self.shared),
			worker_rx,
			self.shutdown_tx.subscribe(),
		)));

		info!(
			max_concurrent = self.shared.config.max_concurrent,
			tick_interval_ms = self.shared.config.tick_interval.as_millis() as u64,
			job_timeout_ms = self.shared.config.job_timeout.as_millis() as u64,
			retry_base_delay_ms = self.shared.policy.base_delay().as_millis() as u64,
			job_types = ?self.shared.executors.job_types(),
			"Export job scheduler started"
		);
		Ok(())
	}

	/// Stops the loop, signals every in-flight executor and writes a final
	/// snapshot. Jobs still running stay `running` in the snapshot and are
	/// demoted to `pending` by the next start.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		if self.is_shut_down.swap(true, Ordering::SeqCst) {
			return;
		}
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		let snapshots = {
			let mut state = self.shared.state.lock().await;
			for (_, flight) in state.in_flight.drain() {
				flight.stop();
			}
			state.registry.snapshots()
		};
		persist(self.shared.store.as_ref(), &snapshots).await;

		info!("Export job scheduler shut down");
	}

	#[instrument(skip(self, request), fields(job_type = %request.job_type))]
	pub async fn submit(&self, request: NewJob) -> Result<JobId> {
		self.ensure_open()?;
		let id = {
			let mut state = self.shared.state.lock().await;
			let id = state.registry.submit(request)?;
			self.shared.publish(&mut state);
			id
		};
		debug!(job_id = %id, "Export job submitted");
		self.shared.wake.notify_one();
		Ok(id)
	}

	#[instrument(skip(self, requests), fields(count = requests.len()))]
	pub async fn submit_batch(&self, requests: Vec<NewJob>) -> Result<Vec<JobId>> {
		self.ensure_open()?;
		let ids = {
			let mut state = self.shared.state.lock().await;
			let ids = state.registry.submit_batch(requests)?;
			self.shared.publish(&mut state);
			ids
		};
		self.shared.wake.notify_one();
		Ok(ids)
	}

	pub async fn get(&self, id: &JobId) -> Option<Job> {
		self.shared.state.lock().await.registry.get(id)
	}

	pub async fn list(&self, filter: &JobFilter) -> Vec<Job> {
		self.shared.state.lock().await.registry.list(filter)
	}

	/// Returns `false` if the job is unknown or already terminal.
	#[instrument(skip(self))]
	pub async fn cancel(&self, id: &JobId) -> bool {
		let mut state = self.shared.state.lock().await;
		if !state.registry.cancel(id) {
			return false;
		}
		if let Some(flight) = state.in_flight.remove(id) {
			flight.stop();
		}
		self.shared.publish(&mut state);
		info!(job_id = %id, "Export job cancelled");
		true
	}

	#[instrument(skip(self))]
	pub async fn cancel_all(&self) -> usize {
		let mut state = self.shared.state.lock().await;
		let count = state.registry.cancel_all();
		for (_, flight) in state.in_flight.drain() {
			flight.stop();
		}
		self.shared.publish(&mut state);
		info!(count, "Cancelled all live export jobs");
		count
	}

	#[instrument(skip(self))]
	pub async fn purge_terminal(&self) -> usize {
		let mut state = self.shared.state.lock().await;
		let removed = state.registry.purge_terminal();
		self.shared.publish(&mut state);
		removed
	}

	pub async fn stats(&self) -> QueueStats {
		self.shared.state.lock().await.registry.stats()
	}

	pub async fn aggregate_progress(&self) -> AggregateProgress {
		self.shared.state.lock().await.registry.aggregate_progress()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
		self.shared.events.subscribe()
	}

	pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
		self.shared.events.add_sink(sink);
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_shut_down.load(Ordering::SeqCst) {
			return Err(QueueError::ShutDown);
		}
		Ok(())
	}
}

impl Shared {
	/// Starts as many ready jobs as there are free slots.
	async fn dispatch(&self) {
		let mut state = self.state.lock().await;
		let running = state.registry.running_count();
		let free = self.config.max_concurrent.saturating_sub(running);
		if free == 0 {
			return;
		}

		for id in state.registry.ready_candidates(Instant::now(), free) {
			let Some(job) = state.registry.start(&id) else {
				continue;
			};
			let attempt = job.retry_count;

			let Some(executor) = self.executors.get(&job.job_type) else {
				let error = format!("no executor registered for job type {}", job.job_type);
				state.registry.abort(&id, &error);
				continue;
			};

			debug!(job_id = %id, attempt, job_type = %job.job_type, "Dispatching export job");
			let cancellation_token = CancellationToken::new();
			let ctx = ExecutionContext {
				job_id: id,
				job_type: job.job_type,
				attempt,
				payload: job.payload,
				progress: ProgressReporter::new(id, attempt, self.worker_tx.clone()),
				cancellation_token: cancellation_token.clone(),
			};
			spawn_worker(executor, ctx, self.worker_tx.clone());
			let timer = spawn_timer(self.config.job_timeout, id, attempt, self.worker_tx.clone());

			state.in_flight.insert(
				id,
				InFlight {
					attempt,
					cancellation_token,
					timer,
				},
			);
		}

		self.publish(&mut state);
	}

	async fn handle_worker_message(&self, message: WorkerMessage) {
		let WorkerMessage {
			job_id,
			attempt,
			kind,
		} = message;
		let mut state = self.state.lock().await;

		match kind {
			WorkerMessageKind::Progress(progress) => {
				state.registry.record_progress(&job_id, attempt, progress);
			}
			WorkerMessageKind::Finished(outcome) => {
				let decided = state
					.registry
					.finish(&job_id, attempt, outcome, &self.policy, Instant::now())
					.is_some();
				if !decided {
					return;
				}
				let finished_flight = state
					.in_flight
					.get(&job_id)
					.is_some_and(|flight| flight.attempt == attempt);
				if finished_flight {
					if let Some(flight) = state.in_flight.remove(&job_id) {
						flight.stop();
					}
				}
				self.wake.notify_one();
			}
		}

		self.publish(&mut state);
	}

	/// Hands the current job list to the persistence task if anything changed.
	fn publish(&self, state: &mut QueueState) {
		let revision = state.registry.revision();
		if revision == state.published_revision {
			return;
		}
		state.published_revision = revision;
		self.snapshot_tx.send_replace(state.registry.snapshots());
	}
}

fn spawn_worker(
	executor: Arc<dyn Executor>,
	ctx: ExecutionContext,
	tx: mpsc::UnboundedSender<WorkerMessage>,
) {
	let job_id = ctx.job_id;
	let attempt = ctx.attempt;
	tokio::spawn(async move {
		// Run on a separate task so a panicking executor surfaces as a JoinError.
		let execution = tokio::spawn(async move { executor.execute(ctx).await });
		let outcome = match execution.await {
			Ok(Ok(output)) => Outcome::Success(output),
			Ok(Err(QueueError::Execution(message))) => Outcome::Error(message),
			Ok(Err(e)) => Outcome::Error(e.to_string()),
			Err(e) => Outcome::Error(format!("executor panicked: {e}")),
		};
		let _ = tx.send(WorkerMessage {
			job_id,
			attempt,
			kind: WorkerMessageKind::Finished(outcome),
		});
	});
}

fn spawn_timer(
	timeout: Duration,
	job_id: JobId,
	attempt: u32,
	tx: mpsc::UnboundedSender<WorkerMessage>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		tokio::time::sleep(timeout).await;
		let _ = tx.send(WorkerMessage {
			job_id,
			attempt,
			kind: WorkerMessageKind::Finished(Outcome::Timeout { after: timeout }),
		});
	})
}

async fn run_loop(
	shared: Arc<Shared>,
	mut worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	let mut tick = tokio::time::interval(shared.config.tick_interval);
	tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			_ = shutdown_rx.recv() => {
				info!("Stopping export job scheduling loop");
				break;
			}
			Some(message) = worker_rx.recv() => {
				shared.handle_worker_message(message).await;
			}
			_ = shared.wake.notified() => {
				shared.dispatch().await;
			}
			_ = tick.tick() => {
				shared.dispatch().await;
			}
		}
	}
}

async fn run_persister(
	shared: Arc<Shared>,
	mut snapshot_rx: watch::Receiver<Vec<JobSnapshot>>,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	loop {
		tokio::select! {
			_ = shutdown_rx.recv() => break,
			changed = snapshot_rx.changed() => {
				if changed.is_err() {
					break;
				}
				let snapshots = snapshot_rx.borrow_and_update().clone();
				persist(shared.store.as_ref(), &snapshots).await;
			}
		}
	}
}

async fn persist(store: &dyn SnapshotStore, snapshots: &[JobSnapshot]) {
	if let Err(e) = store.save_all(snapshots).await {
		warn!(error = %e, count = snapshots.len(), "Failed to persist export job snapshot");
	}
}
