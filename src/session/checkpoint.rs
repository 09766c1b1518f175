//! Snapshots of session state for all-or-nothing programs.

use crate::exec::state::KbState;

/// Owned copy of every mutable part of a session: scope, vocabulary, facts,
/// rules, graphs, semantic and rewrite indices, references, theories,
/// warnings, solve records and configuration.
///
/// Nothing is shared with the live state, so later mutation cannot leak into
/// the snapshot.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    state: KbState,
}

impl Checkpoint {
    pub fn capture(state: &KbState) -> Self {
        Self {
            state: state.clone(),
        }
    }

    /// Number of facts at capture time.
    pub fn fact_count(&self) -> usize {
        self.state.store.len()
    }

    /// Replace `target` with the snapshot. Fact indices are rebuilt from the
    /// restored fact log rather than copied.
    pub fn restore(self, target: &mut KbState) {
        let mut state = self.state;
        let facts = state.store.facts().to_vec();
        let next_id = state.store.next_id();
        state.store.restore(facts, next_id);
        *target = state;
    }
}
