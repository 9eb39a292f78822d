// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod persistence;
mod queue;

pub use persistence::{PersistenceConfig, PersistenceConfigLayer};
pub use queue::{QueueConfig, QueueConfigLayer};
