// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot persistence configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RETENTION_HOURS: u64 = 24;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistenceConfigLayer {
	pub snapshot_path: Option<PathBuf>,
	pub retention_hours: Option<u64>,
}

impl PersistenceConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.snapshot_path.is_some() {
			self.snapshot_path = other.snapshot_path;
		}
		if other.retention_hours.is_some() {
			self.retention_hours = other.retention_hours;
		}
	}

	pub fn finalize(self) -> PersistenceConfig {
		PersistenceConfig {
			snapshot_path: self.snapshot_path,
			retention_hours: self.retention_hours.unwrap_or(DEFAULT_RETENTION_HOURS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistenceConfig {
	/// Where the JSON snapshot lives. `None` keeps the queue in memory only.
	pub snapshot_path: Option<PathBuf>,
	/// Completed and failed jobs older than this are dropped on reload.
	pub retention_hours: u64,
}

impl Default for PersistenceConfig {
	fn default() -> Self {
		Self {
			snapshot_path: None,
			retention_hours: DEFAULT_RETENTION_HOURS,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = PersistenceConfigLayer::default().finalize();
		assert!(config.snapshot_path.is_none());
		assert_eq!(config.retention_hours, 24);
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: PersistenceConfigLayer =
			toml::from_str(r#"snapshot_path = "/var/lib/loom/exports.json""#).unwrap();
		assert_eq!(
			layer.snapshot_path,
			Some(PathBuf::from("/var/lib/loom/exports.json"))
		);
		assert!(layer.retention_hours.is_none());
	}
}
