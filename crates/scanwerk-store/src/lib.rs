// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Store — the SQLite result cache keyed by content hash, and the
// on-disk layout of extracted photos, archived scans and photo metadata.

pub mod cache;
pub mod layout;

pub use cache::{CacheScope, CacheValue, ContentAddressedCache};
pub use layout::OutputLayout;
