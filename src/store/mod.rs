// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Concurrent entry storage.
//!
//! A single in-memory backend: [`EntryStore`], a `DashMap` keyed by item
//! identity. Admission, flush passes and cleanup all share one instance and
//! rely only on its per-operation atomicity.

pub mod memory;

pub use memory::EntryStore;
