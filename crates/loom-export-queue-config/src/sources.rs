// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ExportQueueConfigLayer;
use crate::sections::{PersistenceConfigLayer, QueueConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ExportQueueConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ExportQueueConfigLayer, ConfigError> {
		Ok(ExportQueueConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/export-queue.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ExportQueueConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ExportQueueConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ExportQueueConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LOOM_EXPORT_QUEUE_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ExportQueueConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ExportQueueConfigLayer {
			queue: Some(load_queue_from_env()?),
			persistence: Some(load_persistence_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_queue_from_env() -> Result<QueueConfigLayer, ConfigError> {
	Ok(QueueConfigLayer {
		max_concurrent: env_usize("LOOM_EXPORT_QUEUE_MAX_CONCURRENT")?,
		tick_interval_ms: env_u64("LOOM_EXPORT_QUEUE_TICK_INTERVAL_MS")?,
		job_timeout_secs: env_u64("LOOM_EXPORT_QUEUE_JOB_TIMEOUT_SECS")?,
		retry_base_delay_ms: env_u64("LOOM_EXPORT_QUEUE_RETRY_BASE_DELAY_MS")?,
		default_max_retries: env_u32("LOOM_EXPORT_QUEUE_DEFAULT_MAX_RETRIES")?,
		event_capacity: env_usize("LOOM_EXPORT_QUEUE_EVENT_CAPACITY")?,
	})
}

fn load_persistence_from_env() -> Result<PersistenceConfigLayer, ConfigError> {
	Ok(PersistenceConfigLayer {
		snapshot_path: env_var("LOOM_EXPORT_QUEUE_SNAPSHOT_PATH").map(PathBuf::from),
		retention_hours: env_u64("LOOM_EXPORT_QUEUE_RETENTION_HOURS")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_toml_source_missing_file_is_empty() {
		let source = TomlSource::new("/nonexistent/loom/export-queue.toml");
		let layer = source.load().unwrap();
		assert_eq!(layer, ExportQueueConfigLayer::default());
	}

	#[test]
	fn test_toml_source_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[queue]\nmax_concurrent = 9\njob_timeout_secs = 30").unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let queue = layer.queue.unwrap();
		assert_eq!(queue.max_concurrent, Some(9));
		assert_eq!(queue.job_timeout_secs, Some(30));
	}

	#[test]
	fn test_toml_source_parse_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[queue]\nmax_concurrent = \"lots\"").unwrap();

		let result = TomlSource::new(file.path()).load();
		assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
	}

	#[test]
	fn test_env_u64_rejects_garbage() {
		std::env::set_var("LOOM_EXPORT_QUEUE_TEST_GARBAGE_U64", "soon");
		let result = env_u64("LOOM_EXPORT_QUEUE_TEST_GARBAGE_U64");
		assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
	}

	#[test]
	fn test_env_var_ignores_empty() {
		std::env::set_var("LOOM_EXPORT_QUEUE_TEST_EMPTY", "");
		assert!(env_var("LOOM_EXPORT_QUEUE_TEST_EMPTY").is_none());
	}
}
