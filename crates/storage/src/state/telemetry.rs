// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry and audit event handlers.

use super::{MaterializedState, TELEMETRY_HISTORY};
use icarus_core::{AuditRecord, Event, TelemetrySample};
use std::collections::VecDeque;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::TelemetrySampled { job_id, cpu_percent, ram_mb, current_tool, at_ms } => {
            // Samples for unknown jobs are dropped; the gateway already
            // 404s them, this guards replay of a pruned job's tail.
            if !state.jobs.contains_key(job_id.as_str()) {
                return;
            }
            let ring = state
                .telemetry
                .entry(job_id.to_string())
                .or_insert_with(|| VecDeque::with_capacity(TELEMETRY_HISTORY));
            // Replay guard: identical timestamp for the same job is the
            // same sample.
            if ring.back().is_some_and(|last| last.at_ms == *at_ms) {
                return;
            }
            if ring.len() == TELEMETRY_HISTORY {
                ring.pop_front();
            }
            ring.push_back(TelemetrySample {
                job_id: *job_id,
                at_ms: *at_ms,
                cpu_percent: *cpu_percent,
                ram_mb: *ram_mb,
                current_tool: current_tool.clone(),
            });
        }

        Event::AuditRecorded { job_id, payload, at_ms } => {
            // Exactly zero or one record per job; immutable once written.
            state.audits.entry(job_id.to_string()).or_insert_with(|| AuditRecord {
                job_id: *job_id,
                payload: payload.clone(),
                created_at_ms: *at_ms,
            });
        }

        _ => {}
    }
}
