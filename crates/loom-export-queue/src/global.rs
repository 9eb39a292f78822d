// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide scheduler handle for callers that cannot thread one through.

use std::sync::OnceLock;

use crate::scheduler::JobScheduler;

static GLOBAL: OnceLock<JobScheduler> = OnceLock::new();

/// Installs the process-wide scheduler. Hands the scheduler back if one is
/// already installed.
pub fn install_global(scheduler: JobScheduler) -> Result<(), JobScheduler> {
	GLOBAL.set(scheduler)?;
	tracing::debug!("Installed global export job scheduler");
	Ok(())
}

pub fn global() -> Option<&'static JobScheduler> {
	GLOBAL.get()
}
