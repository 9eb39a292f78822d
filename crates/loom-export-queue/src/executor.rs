// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Executor capability and the static job-type table.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::Result;

/// Performs the actual work for one job type (rendering, serialization, ...).
///
/// An executor must eventually return. It may report progress any number of
/// times through the context, and it must not rely on its result being used:
/// after a timeout or cancellation the scheduler discards whatever comes back.
#[async_trait]
pub trait Executor: Send + Sync {
	async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorOutput {
	/// Reference to the produced artifact, if any.
	pub output: Option<String>,
}

impl ExecutorOutput {
	pub fn with_output(output: impl Into<String>) -> Self {
		Self {
			output: Some(output.into()),
		}
	}
}

/// Adapts an async closure into an [`Executor`].
pub struct FnExecutor<F> {
	f: F,
}

impl<F> FnExecutor<F> {
	pub fn new(f: F) -> Self {
		Self { f }
	}
}

#[async_trait]
impl<F, Fut> Executor for FnExecutor<F>
where
	F: Fn(ExecutionContext) -> Fut + Send + Sync,
	Fut: Future<Output = Result<ExecutorOutput>> + Send + 'static,
{
	async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
		(self.f)(ctx).await
	}
}

/// Job type to executor table, filled in before the scheduler starts.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
	executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, job_type: impl Into<String>, executor: Arc<dyn Executor>) {
		self.executors.insert(job_type.into(), executor);
	}

	pub fn with(mut self, job_type: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
		self.register(job_type, executor);
		self
	}

	pub fn get(&self, job_type: &str) -> Option<Arc<dyn Executor>> {
		self.executors.get(job_type).cloned()
	}

	pub fn contains(&self, job_type: &str) -> bool {
		self.executors.contains_key(job_type)
	}

	pub fn job_types(&self) -> Vec<String> {
		let mut types: Vec<String> = self.executors.keys().cloned().collect();
		types.sort();
		types
	}

	pub fn is_empty(&self) -> bool {
		self.executors.is_empty()
	}
}

impl std::fmt::Debug for ExecutorRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExecutorRegistry")
			.field("job_types", &self.job_types())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::QueueError;

	struct CsvExecutor;

	#[async_trait]
	impl Executor for CsvExecutor {
		async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
			let rows = ctx.payload["rows"].as_u64().unwrap_or(0);
			ctx.report_progress(100);
			Ok(ExecutorOutput::with_output(format!("exports/{rows}-rows.csv")))
		}
	}

	#[tokio::test]
	async fn test_registry_lookup() {
		assert!(ExecutorRegistry::new().is_empty());
		let registry = ExecutorRegistry::new().with("csv", Arc::new(CsvExecutor));
		assert!(!registry.is_empty());
		assert!(registry.contains("csv"));
		assert!(!registry.contains("pdf"));
		assert_eq!(registry.job_types(), vec!["csv".to_string()]);

		let executor = registry.get("csv").unwrap();
		let output = executor
			.execute(ExecutionContext::detached("csv", serde_json::json!({"rows": 12})))
			.await
			.unwrap();
		assert_eq!(output.output.as_deref(), Some("exports/12-rows.csv"));
	}

	#[tokio::test]
	async fn test_fn_executor() {
		let executor = FnExecutor::new(|ctx: ExecutionContext| async move {
			if ctx.payload.is_null() {
				Err(QueueError::execution("empty payload"))
			} else {
				Ok(ExecutorOutput::default())
			}
		});

		let err = executor
			.execute(ExecutionContext::detached("png", serde_json::Value::Null))
			.await
			.unwrap_err();
		assert!(matches!(err, QueueError::Execution(_)));
	}
}
