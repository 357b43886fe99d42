//! Binding a behavior object's methods as the hooks of one node.

use super::StateMachine;
use crate::core::{Hook, Phase, StateId};
use crate::error::{HookResult, Result};
use std::rc::Rc;

/// Per-state behavior. Every method defaults to doing nothing, so an
/// implementation only overrides the phases it cares about.
pub trait StateBehavior {
    fn awake(&self, _machine: &mut StateMachine, _id: StateId) -> HookResult {
        Ok(())
    }

    fn start(&self, _machine: &mut StateMachine, _id: StateId) -> HookResult {
        Ok(())
    }

    fn on_enter(&self, _machine: &mut StateMachine, _id: StateId) -> HookResult {
        Ok(())
    }

    fn on_exit(&self, _machine: &mut StateMachine, _id: StateId) -> HookResult {
        Ok(())
    }

    fn on_destroy(&self, _machine: &mut StateMachine, _id: StateId) -> HookResult {
        Ok(())
    }

    fn update(&self, _machine: &mut StateMachine, _id: StateId) -> HookResult {
        Ok(())
    }
}

impl StateMachine {
    /// Register each method of `behavior` as a hook on `id`.
    ///
    /// The hooks are appended after any already registered for the same
    /// phase.
    pub fn bind_behavior<B: StateBehavior + 'static>(
        &mut self,
        id: StateId,
        behavior: Rc<B>,
    ) -> Result<()> {
        self.live_node(id)?;
        for phase in Phase::ALL {
            let behavior = Rc::clone(&behavior);
            let hook: Hook = Rc::new(
                move |machine: &mut StateMachine, state: StateId| -> HookResult {
                    match phase {
                        Phase::Awake => behavior.awake(machine, state),
                        Phase::Start => behavior.start(machine, state),
                        Phase::Enter => behavior.on_enter(machine, state),
                        Phase::Exit => behavior.on_exit(machine, state),
                        Phase::Destroy => behavior.on_destroy(machine, state),
                        Phase::Update => behavior.update(machine, state),
                    }
                },
            );
            self.add_shared_hook(id, phase, hook)?;
        }
        Ok(())
    }
}
