// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the export queue.

use thiserror::Error;

/// Result type for export queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("execution failed: {0}")]
	Execution(String),

	#[error("timeout: job did not finish within {after_ms}ms")]
	Timeout { after_ms: u64 },

	#[error("persistence error: {0}")]
	Persistence(String),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("scheduler already started")]
	AlreadyStarted,

	#[error("scheduler is shut down")]
	ShutDown,
}

impl QueueError {
	/// Shorthand for executors reporting a failed attempt.
	pub fn execution(message: impl Into<String>) -> Self {
		QueueError::Execution(message.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_timeout_message_mentions_timeout() {
		let err = QueueError::Timeout { after_ms: 50 };
		assert!(err.to_string().contains("timeout"));
		assert!(err.to_string().contains("50ms"));
	}

	#[test]
	fn test_execution_shorthand() {
		let err = QueueError::execution("renderer crashed");
		assert_eq!(err.to_string(), "execution failed: renderer crashed");
	}
}
