// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! icarus-storage: durable event log, snapshots, and materialized state.
//!
//! All persisted facts are [`icarus_core::Event`]s appended to a
//! write-ahead log; [`MaterializedState`] is derived by idempotent replay.
//! A snapshot accelerates recovery: load it, then replay WAL entries after
//! its sequence number.

mod snapshot;
mod state;
mod wal;

pub use snapshot::{load_snapshot, save_snapshot, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{MaterializedState, TELEMETRY_HISTORY};
pub use wal::{Wal, WalEntry, WalError};
