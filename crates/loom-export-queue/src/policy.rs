// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry and timeout decisions.
//!
//! Backoff is linear in the attempt number. Timeouts are terminal regardless
//! of how many retries remain: an executor that hangs once is assumed to be
//! wedged, and re-running it would only pin another concurrency slot.

use std::time::Duration;

use crate::error::QueueError;
use crate::executor::ExecutorOutput;
use crate::job::Job;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// How an execution attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
	Success(ExecutorOutput),
	Error(String),
	Timeout { after: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
	Complete,
	Retry { attempt: u32, delay: Duration },
	Fail { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	base_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(DEFAULT_BASE_DELAY)
	}
}

impl RetryPolicy {
	pub fn new(base_delay: Duration) -> Self {
		Self { base_delay }
	}

	pub fn base_delay(&self) -> Duration {
		self.base_delay
	}

	/// Delay before retry number `attempt` (1-based) becomes eligible.
	pub fn backoff_delay(&self, attempt: u32) -> Duration {
		self.base_delay.saturating_mul(attempt)
	}

	pub fn decide(&self, job: &Job, outcome: &Outcome) -> Decision {
		match outcome {
			Outcome::Success(_) => Decision::Complete,
			Outcome::Timeout { after } => Decision::Fail {
				error: QueueError::Timeout {
					after_ms: after.as_millis() as u64,
				}
				.to_string(),
			},
			Outcome::Error(error) => {
				let attempt = job.retry_count.saturating_add(1);
				if attempt <= job.max_retries {
					Decision::Retry {
						attempt,
						delay: self.backoff_delay(attempt),
					}
				} else {
					Decision::Fail {
						error: error.clone(),
					}
				}
			}
		}
	}
}
