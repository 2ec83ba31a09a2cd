// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod taxonomy;
pub mod types;

pub use config::PipelineConfig;
pub use error::{Result, ScanwerkError};
pub use taxonomy::{FailureScope, failure_scope, is_fatal};
pub use types::*;
