// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Loom export job queue.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`/etc/loom/export-queue.toml`)
//! 3. Environment variables (`LOOM_EXPORT_QUEUE_*`)

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ExportQueueConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved export queue configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportQueueConfig {
	pub queue: QueueConfig,
	pub persistence: PersistenceConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<ExportQueueConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ExportQueueConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ExportQueueConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ExportQueueConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved config.
pub fn finalize(layer: ExportQueueConfigLayer) -> Result<ExportQueueConfig, ConfigError> {
	let queue = layer.queue.unwrap_or_default().finalize();
	let persistence = layer.persistence.unwrap_or_default().finalize();

	validate_queue(&queue)?;

	info!(
		max_concurrent = queue.max_concurrent,
		tick_interval_ms = queue.tick_interval_ms,
		job_timeout_secs = queue.job_timeout_secs,
		snapshot_configured = persistence.snapshot_path.is_some(),
		retention_hours = persistence.retention_hours,
		"Export queue configuration loaded"
	);

	Ok(ExportQueueConfig { queue, persistence })
}

fn validate_queue(queue: &QueueConfig) -> Result<(), ConfigError> {
	if queue.max_concurrent == 0 {
		return Err(ConfigError::Validation(
			"max_concurrent must be at least 1".to_string(),
		));
	}
	if queue.tick_interval_ms == 0 {
		return Err(ConfigError::Validation(
			"tick_interval_ms must be at least 1".to_string(),
		));
	}
	if queue.job_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"job_timeout_secs must be at least 1".to_string(),
		));
	}
	Ok(())
}
