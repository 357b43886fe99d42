//! Run, stop and terminate, plus the per-node enter/exit/update/destroy
//! recursion they are built from.

use super::StateMachine;
use crate::core::{Phase, StateId};
use crate::error::{HsmError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Machine-level lifecycle notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Running,
    Stopped,
    Terminated,
}

impl StateMachine {
    /// Run Awake hooks over the whole tree, parents before children.
    ///
    /// Happens at most once; [`run`](Self::run) calls it if needed.
    pub fn awake(&mut self) -> Result<()> {
        if self.awakened {
            return Ok(());
        }
        self.awakened = true;
        self.visit_preorder(StateId::ROOT, Phase::Awake)
    }

    /// Start the machine in the root's child `initial`.
    ///
    /// Calling `run` on a running machine does nothing. Start hooks run on
    /// the first run only; a machine that was stopped resumes without them.
    pub fn run(&mut self, initial: &str) -> Result<()> {
        if self.terminated {
            return Err(HsmError::Terminated {
                machine: self.config.name.clone(),
            });
        }
        if self.is_run {
            return Ok(());
        }
        if self.live_node(StateId::ROOT)?.child(initial).is_none() {
            return Err(HsmError::ChildNotFound {
                state: self.config.name.clone(),
                name: initial.to_string(),
            });
        }

        self.awake()?;
        self.is_run = true;
        info!("{}: running, initial state '{initial}'", self.config.name);
        self.notify_lifecycle(Lifecycle::Running);

        if !self.started {
            self.started = true;
            self.visit_preorder(StateId::ROOT, Phase::Start)?;
        }

        self.push(StateId::ROOT, initial)
    }

    /// Exit the active chain and park the machine at its root.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_run {
            return Ok(());
        }

        self.exit(StateId::ROOT)?;
        self.current = Some(StateId::ROOT);
        self.node_mut(StateId::ROOT)?.set_active(true);
        self.is_run = false;

        info!("{}: stopped", self.config.name);
        self.notify_lifecycle(Lifecycle::Stopped);
        Ok(())
    }

    /// Destroy every node and shut the machine down for good.
    ///
    /// Only a running machine is torn down; the fired-message ledger is
    /// cleared in every case.
    pub fn terminate(&mut self) -> Result<()> {
        let result = if self.is_run { self.shutdown() } else { Ok(()) };
        self.fired_messages.clear();
        result
    }

    /// Destroy `id` and its whole subtree, leaves first.
    ///
    /// Active nodes are exited before their Destroy hooks run. When the
    /// current state lies inside the subtree it retreats to `id`'s parent.
    /// Destroying the root terminates the machine.
    pub fn destroy(&mut self, id: StateId) -> Result<()> {
        if id.is_root() {
            let result = self.shutdown();
            self.fired_messages.clear();
            return result;
        }

        let parent = self.live_node(id)?.parent();
        let current_inside = self
            .current
            .is_some_and(|current| self.ancestry(current).contains(&id));

        self.destroy_subtree(id)?;

        if let (true, Some(parent)) = (current_inside, parent) {
            self.commit_current_state(parent);
        }
        Ok(())
    }

    /// Mark `id` active and run its Enter hooks.
    pub fn enter(&mut self, id: StateId) -> Result<()> {
        self.live_node_mut(id)?.set_active(true);
        self.run_hooks(id, Phase::Enter)
    }

    /// Deactivate `id`, exit its active child first, then run its Exit hooks.
    pub fn exit(&mut self, id: StateId) -> Result<()> {
        self.node_mut(id)?.set_active(false);
        if let Some(child) = self.node(id)?.active_child() {
            let exited = self.exit(child);
            self.node_mut(id)?.release_active_child(child);
            exited?;
        }
        self.run_hooks(id, Phase::Exit)
    }

    /// Update the active chain, deepest node first. Does nothing unless
    /// the machine is running.
    pub fn update(&mut self) -> Result<()> {
        if !self.is_run {
            return Ok(());
        }
        self.update_state(StateId::ROOT)
    }

    /// Update `id`'s active child, then run `id`'s own Update hooks.
    pub fn update_state(&mut self, id: StateId) -> Result<()> {
        if let Some(child) = self.live_node(id)?.active_child() {
            self.update_state(child)?;
        }
        self.run_hooks(id, Phase::Update)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.is_run = false;
        self.terminated = true;
        let result = self.destroy_subtree(StateId::ROOT);
        self.current = None;

        info!("{}: terminated", self.config.name);
        self.notify_lifecycle(Lifecycle::Terminated);
        result
    }

    fn destroy_subtree(&mut self, id: StateId) -> Result<()> {
        let node = self.node(id)?;
        if node.is_destroyed() {
            return Ok(());
        }
        let children: Vec<StateId> = node.children().collect();
        for child in children {
            self.destroy_subtree(child)?;
        }

        if self.node(id)?.is_active() {
            self.exit(id)?;
        }
        self.run_hooks(id, Phase::Destroy)?;

        if let Some(parent) = self.node(id)?.parent() {
            self.node_mut(parent)?.release_active_child(id);
        }
        self.node_mut(id)?.mark_destroyed();
        debug!("{}: destroyed '{}'", self.config.name, self.path_of(id));
        Ok(())
    }

    fn visit_preorder(&mut self, id: StateId, phase: Phase) -> Result<()> {
        self.run_hooks(id, phase)?;
        let children: Vec<StateId> = self.live_node(id)?.children().collect();
        for child in children {
            self.visit_preorder(child, phase)?;
        }
        Ok(())
    }

    fn notify_lifecycle(&self, event: Lifecycle) {
        for observer in self.lifecycle_observers.clone() {
            observer(self, event);
        }
    }
}
