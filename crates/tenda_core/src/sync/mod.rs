//! Realtime listing synchronization.
//!
//! # Responsibility
//! - Turn full collection snapshots into per-kind display lists.
//!
//! # Invariants
//! - Snapshots are recomputed wholesale; no incremental diffing.
//! - The last applied snapshot wins.

pub mod listing_sync;
