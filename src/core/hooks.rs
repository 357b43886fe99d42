//! Lifecycle phases and the callback types a node can register.

use super::state::StateId;
use crate::error::HookResult;
use crate::machine::StateMachine;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Lifecycle hook. Receives the machine and the id of the node it was
/// registered on, so it may request transitions reentrantly.
pub type Hook = Rc<dyn Fn(&mut StateMachine, StateId) -> HookResult>;

/// Named event handler. The argument is whatever the trigger call passed.
pub type EventHandler = Rc<dyn Fn(&mut StateMachine, StateId, &dyn Any) -> HookResult>;

/// Typed message handler, stored type-erased.
pub(crate) type MessageHandler = Rc<dyn Fn(&mut StateMachine, StateId, &dyn Any) -> HookResult>;

/// Lifecycle phase of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Once per node when the tree is built.
    Awake,
    /// Once per node on the machine's first run.
    Start,
    Enter,
    Exit,
    /// Once per node when the machine is torn down.
    Destroy,
    Update,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Awake,
        Phase::Start,
        Phase::Enter,
        Phase::Exit,
        Phase::Destroy,
        Phase::Update,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Awake => "awake",
            Self::Start => "start",
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Destroy => "destroy",
            Self::Update => "update",
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered hook lists, one per phase.
#[derive(Clone, Default)]
pub(crate) struct HookSet {
    phases: [Vec<Hook>; 6],
}

impl HookSet {
    pub(crate) fn push(&mut self, phase: Phase, hook: Hook) {
        self.phases[phase.slot()].push(hook);
    }

    /// Cloned list of hooks for `phase`, safe to invoke while the node is
    /// mutated by the hooks themselves.
    pub(crate) fn snapshot(&self, phase: Phase) -> Vec<Hook> {
        self.phases[phase.slot()].clone()
    }

    pub(crate) fn len(&self, phase: Phase) -> usize {
        self.phases[phase.slot()].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_slots_are_distinct() {
        let mut slots: Vec<usize> = Phase::ALL.iter().map(|p| p.slot()).collect();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), Phase::ALL.len());
    }

    #[test]
    fn hooks_accumulate_per_phase() {
        let mut set = HookSet::default();
        let hook: Hook = Rc::new(|_: &mut StateMachine, _: StateId| -> HookResult { Ok(()) });

        set.push(Phase::Enter, Rc::clone(&hook));
        set.push(Phase::Enter, Rc::clone(&hook));
        set.push(Phase::Exit, hook);

        assert_eq!(set.len(Phase::Enter), 2);
        assert_eq!(set.len(Phase::Exit), 1);
        assert_eq!(set.len(Phase::Update), 0);
        assert_eq!(set.snapshot(Phase::Enter).len(), 2);
    }

    #[test]
    fn phase_names_are_lowercase() {
        assert_eq!(Phase::Awake.to_string(), "awake");
        assert_eq!(Phase::Destroy.name(), "destroy");
    }
}
