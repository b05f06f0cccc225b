//! Shared per-target health map.
//!
//! The monitor cycle is the only writer, status queries read snapshots.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::alerts::Alert;
use super::types::{HealthState, ProbeResult, Target};

/// Last known [`HealthState`] per target key
#[derive(Debug, Default)]
pub struct HealthTracker {
    states: RwLock<HashMap<String, HealthState>>,
}

impl HealthTracker {
    /// Every key starts out [`HealthState::Unknown`]
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let states = keys.into_iter().map(|key| (key.into(), HealthState::Unknown)).collect();
        Self { states: RwLock::new(states) }
    }

    pub fn for_targets(targets: &[Target]) -> Self {
        Self::new(targets.iter().map(|target| target.key.as_str()))
    }

    pub fn get(&self, key: &str) -> HealthState {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states.get(key).copied().unwrap_or_default()
    }

    /// Consistent copy of every stored state
    pub fn snapshot(&self) -> HashMap<String, HealthState> {
        self.states.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Store `next` for `key` if it differs from the current value.
    ///
    /// Returns the previous state when a transition happened.
    pub fn compare_and_set(&self, key: &str, next: HealthState) -> Option<HealthState> {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        let current = states.entry(key.to_string()).or_default();
        if *current == next {
            return None;
        }

        let previous = *current;
        *current = next;
        Some(previous)
    }

    /// Record a probe result, returning the alert for a state change
    pub fn evaluate(&self, target: &Target, result: &ProbeResult) -> Option<Alert> {
        let next = result.state();
        let previous = self.compare_and_set(&target.key, next)?;

        tracing::info!(
            target_key = %target.key,
            from = %previous,
            to = %next,
            status_code = ?result.status_code,
            "Target changed state"
        );

        let name = target.name.clone();
        let alert = match next {
            HealthState::Up => {
                Alert::Up { name, status_code: result.status_code, latency: result.latency }
            }
            _ => Alert::Down { name, status_code: result.status_code, latency: result.latency },
        };
        Some(alert)
    }
}
