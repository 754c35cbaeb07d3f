//! Per-source liveness supervision
//!
//! The [`ConnectionSupervisor`] owns the health record of every configured
//! source and derives the healthy set the synchronizer is allowed to align:
//!
//! ```text
//! INIT ──first sample──▶ ONLINE ──connection loss──▶ RECONNECTING
//!                          │  ▲                          │
//!                 timeout  │  └───────next sample────────┘
//!                          ▼
//!                        STALE ──next sample──▶ ONLINE (recovery)
//! ```
//!
//! Transitions are driven by worker events plus a staleness scan the
//! coordinator runs every tick.

use crate::source::worker::{SourceEvent, SourceEventKind};
use crate::types::{SourceHealth, SourceState};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks liveness of all configured sources
#[derive(Debug)]
pub struct ConnectionSupervisor {
    source_order: Vec<String>,
    health: HashMap<String, SourceHealth>,
    stale_timeout: Duration,
}

impl ConnectionSupervisor {
    /// Create a supervisor for the given sources
    pub fn new(source_ids: impl IntoIterator<Item = String>, stale_timeout: Duration) -> Self {
        let source_order: Vec<String> = source_ids.into_iter().collect();
        let health = source_order
            .iter()
            .map(|id| (id.clone(), SourceHealth::new()))
            .collect();
        Self {
            source_order,
            health,
            stale_timeout,
        }
    }

    /// Apply one worker event at wall-clock `now`
    pub fn on_event(&mut self, event: &SourceEvent, now: Instant) {
        let Some(health) = self.health.get_mut(&event.source_id) else {
            tracing::warn!("Event from unknown source '{}'", event.source_id);
            return;
        };
        match event.kind {
            SourceEventKind::Connected => {
                // Health flips to ONLINE only on actual data.
                tracing::debug!("Source '{}' connection established", event.source_id);
            }
            SourceEventKind::Disconnected => {
                if health.state != SourceState::Reconnecting {
                    tracing::warn!("Source '{}' lost, reconnecting", event.source_id);
                }
                health.state = SourceState::Reconnecting;
            }
            SourceEventKind::Sample(_) => {
                match health.state {
                    SourceState::Init => {
                        tracing::info!("Source '{}' online", event.source_id);
                    }
                    SourceState::Stale => {
                        tracing::info!("Source '{}' recovered from staleness", event.source_id);
                    }
                    SourceState::Reconnecting => {
                        tracing::info!("Source '{}' back online", event.source_id);
                    }
                    SourceState::Online => {}
                }
                health.state = SourceState::Online;
                health.last_seen = Some(now);
            }
        }
    }

    /// Demote ONLINE sources that have gone quiet past the stale timeout
    pub fn check_staleness(&mut self, now: Instant) {
        for (id, health) in &mut self.health {
            if health.state != SourceState::Online {
                continue;
            }
            let quiet = health
                .last_seen
                .map(|seen| now.duration_since(seen))
                .unwrap_or(Duration::MAX);
            if quiet > self.stale_timeout {
                tracing::warn!(
                    "Source '{}' stale: no sample for {:.1}s",
                    id,
                    quiet.as_secs_f64()
                );
                health.state = SourceState::Stale;
            }
        }
    }

    /// Sources currently ONLINE, in configured order
    pub fn healthy(&self) -> Vec<String> {
        self.source_order
            .iter()
            .filter(|id| {
                self.health
                    .get(*id)
                    .is_some_and(|h| h.state == SourceState::Online)
            })
            .cloned()
            .collect()
    }

    /// Number of sources currently ONLINE
    pub fn healthy_count(&self) -> usize {
        self.health
            .values()
            .filter(|h| h.state == SourceState::Online)
            .count()
    }

    /// Total number of supervised sources
    pub fn total(&self) -> usize {
        self.source_order.len()
    }

    /// Health state of one source, if known
    pub fn state_of(&self, source_id: &str) -> Option<SourceState> {
        self.health.get(source_id).map(|h| h.state)
    }
}
