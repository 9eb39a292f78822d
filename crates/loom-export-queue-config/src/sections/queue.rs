// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduling configuration section.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueueConfigLayer {
	pub max_concurrent: Option<usize>,
	pub tick_interval_ms: Option<u64>,
	pub job_timeout_secs: Option<u64>,
	pub retry_base_delay_ms: Option<u64>,
	pub default_max_retries: Option<u32>,
	pub event_capacity: Option<usize>,
}

impl QueueConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_concurrent.is_some() {
			self.max_concurrent = other.max_concurrent;
		}
		if other.tick_interval_ms.is_some() {
			self.tick_interval_ms = other.tick_interval_ms;
		}
		if other.job_timeout_secs.is_some() {
			self.job_timeout_secs = other.job_timeout_secs;
		}
		if other.retry_base_delay_ms.is_some() {
			self.retry_base_delay_ms = other.retry_base_delay_ms;
		}
		if other.default_max_retries.is_some() {
			self.default_max_retries = other.default_max_retries;
		}
		if other.event_capacity.is_some() {
			self.event_capacity = other.event_capacity;
		}
	}

	pub fn finalize(self) -> QueueConfig {
		QueueConfig {
			max_concurrent: self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT),
			tick_interval_ms: self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
			job_timeout_secs: self.job_timeout_secs.unwrap_or(DEFAULT_JOB_TIMEOUT_SECS),
			retry_base_delay_ms: self
				.retry_base_delay_ms
				.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
			default_max_retries: self.default_max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
			event_capacity: self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
	/// Global cap on simultaneously running jobs.
	pub max_concurrent: usize,
	/// Period of the dispatch tick.
	pub tick_interval_ms: u64,
	/// Per-attempt execution timeout.
	pub job_timeout_secs: u64,
	/// Retry backoff unit, multiplied by the attempt number.
	pub retry_base_delay_ms: u64,
	/// Retry ceiling applied when a submission does not specify one.
	pub default_max_retries: u32,
	/// Buffer size of the broadcast event channel.
	pub event_capacity: usize,
}

impl Default for QueueConfig {
	fn default() -> Self {
		QueueConfigLayer::default().finalize()
	}
}
