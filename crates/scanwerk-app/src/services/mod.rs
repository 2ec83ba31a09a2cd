// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — wires the scanwerk backend crates together for the CLI.

pub mod app_services;
pub mod config_file;
pub mod inputs;
