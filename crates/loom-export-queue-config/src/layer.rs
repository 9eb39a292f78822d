// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::sections::{PersistenceConfigLayer, QueueConfigLayer};

/// One partially-specified configuration source. Later layers win field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExportQueueConfigLayer {
	pub queue: Option<QueueConfigLayer>,
	pub persistence: Option<PersistenceConfigLayer>,
}

impl ExportQueueConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if let Some(queue) = other.queue {
			self.queue.get_or_insert_with(Default::default).merge(queue);
		}
		if let Some(persistence) = other.persistence {
			self
				.persistence
				.get_or_insert_with(Default::default)
				.merge(persistence);
		}
	}
}
