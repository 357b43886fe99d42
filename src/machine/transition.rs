//! Push, change and pop, and the root's bookkeeping of the current state.
//!
//! Every transition is admitted by the root before any node is exited. The
//! root counts admissions per tick; reaching the configured ceiling aborts
//! the transition with [`HsmError::RunawayTransition`] while the tree still
//! has its pre-transition shape.

use super::StateMachine;
use crate::core::{StateId, TransitionRecord};
use crate::error::{HsmError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

/// A committed change of the current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub previous: StateId,
    pub next: StateId,
    pub tick: u64,
    /// Position of the transition within its tick, starting at 1
    pub sequence: u32,
}

/// Per-tick transition counter and the names entered during that tick.
#[derive(Debug, Default)]
pub(super) struct TransitionBudget {
    pub(super) tick: Option<u64>,
    pub(super) count: u32,
    pub(super) trail: Vec<String>,
}

impl TransitionBudget {
    fn reset(&mut self, tick: u64) {
        self.tick = Some(tick);
        self.count = 0;
        self.trail.clear();
    }
}

impl StateMachine {
    /// Enter `child_name`, a child of `id`, replacing `id`'s active child.
    ///
    /// Does nothing when the child already is the current state and self
    /// transitions are disabled.
    pub fn push(&mut self, id: StateId, child_name: &str) -> Result<()> {
        let node = self.live_node(id)?;
        let target = node.child(child_name).ok_or_else(|| HsmError::ChildNotFound {
            state: node.path().to_string(),
            name: child_name.to_string(),
        })?;
        self.transit(id, target)
    }

    /// Replace `id` with its sibling `sibling_name`.
    pub fn change(&mut self, id: StateId, sibling_name: &str) -> Result<()> {
        let parent = self.parent_of(id)?;
        let parent_node = self.live_node(parent)?;
        let target = parent_node
            .child(sibling_name)
            .ok_or_else(|| HsmError::ChildNotFound {
                state: parent_node.path().to_string(),
                name: sibling_name.to_string(),
            })?;
        self.transit(parent, target)
    }

    /// Leave `id`: exit the parent's active child and make the parent the
    /// current state without entering anything new.
    pub fn pop(&mut self, id: StateId) -> Result<()> {
        let parent = self.parent_of(id)?;
        self.admit_transition(parent)?;
        self.exit_active_child(parent)?;
        self.commit_current_state(parent);
        Ok(())
    }

    /// Record `next` as the current state, subject to the per-tick ceiling.
    ///
    /// Push, change and pop call this on their own; calling it directly only
    /// moves the pointer and does not enter or exit anything.
    pub fn set_current_state(&mut self, next: StateId) -> Result<()> {
        self.live_node(next)?;
        self.admit_transition(next)?;
        self.commit_current_state(next);
        Ok(())
    }

    /// Transitions admitted during the current tick.
    pub fn transition_count(&self) -> u32 {
        if self.budget.tick == Some(self.ticks.tick()) {
            self.budget.count
        } else {
            0
        }
    }

    fn transit(&mut self, owner: StateId, target: StateId) -> Result<()> {
        self.live_node(target)?;
        if self.current == Some(target) && !self.config.can_transit_self {
            trace!(
                "{}: '{}' is already current, ignoring",
                self.config.name,
                self.path_of(target)
            );
            return Ok(());
        }

        self.admit_transition(target)?;
        self.exit_active_child(owner)?;
        self.node_mut(owner)?.set_active_child(Some(target));
        self.commit_current_state(target);
        self.enter(target)
    }

    fn parent_of(&self, id: StateId) -> Result<StateId> {
        let node = self.live_node(id)?;
        node.parent().ok_or_else(|| HsmError::NoParent {
            state: node.path().to_string(),
        })
    }

    pub(super) fn exit_active_child(&mut self, owner: StateId) -> Result<()> {
        if let Some(child) = self.node(owner)?.active_child() {
            let exited = self.exit(child);
            self.node_mut(owner)?.release_active_child(child);
            exited?;
        }
        Ok(())
    }

    /// Count a transition against the current tick.
    fn admit_transition(&mut self, next: StateId) -> Result<()> {
        let tick = self.ticks.tick();
        if self.budget.tick != Some(tick) {
            self.budget.reset(tick);
        }

        let name = self.node(next)?.name().to_string();
        self.budget.trail.push(name);
        self.budget.count += 1;

        if self.budget.count >= self.config.max_transitions_per_tick {
            let trail = self.budget.trail.clone();
            error!(
                "{}: runaway transition on tick {tick}: {}",
                self.config.name,
                trail.join(" > ")
            );
            return Err(HsmError::RunawayTransition {
                machine: self.config.name.clone(),
                limit: self.config.max_transitions_per_tick,
                trail,
            });
        }
        Ok(())
    }

    pub(super) fn commit_current_state(&mut self, next: StateId) {
        let previous = self.current.replace(next).unwrap_or(StateId::ROOT);
        let change = StateChange {
            previous,
            next,
            tick: self.budget.tick.unwrap_or_else(|| self.ticks.tick()),
            sequence: self.budget.count,
        };

        let from = self.path_of(previous);
        let to = self.path_of(next);
        debug!(
            "{}: {from} -> {to} (tick {}, #{})",
            self.config.name, change.tick, change.sequence
        );
        self.history.record(TransitionRecord {
            from,
            to,
            tick: change.tick,
            sequence: change.sequence,
            timestamp: Utc::now(),
        });

        let observers = self.state_observers.clone();
        for observer in observers {
            observer(self, &change);
        }
    }
}
