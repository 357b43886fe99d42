//! Named event dispatch along the active chain.

use super::StateMachine;
use crate::core::{EventHandler, StateId};
use crate::error::{HsmError, Result};
use std::any::Any;
use tracing::trace;

impl StateMachine {
    /// Invoke the handler for `name` on the current state only.
    ///
    /// Returns whether a handler ran. Pass `&()` when the event carries no
    /// arguments.
    pub fn trigger_event(&mut self, name: &str, args: &dyn Any) -> Result<bool> {
        let current = self.dispatch_origin()?;
        match self.event_handler(current, name) {
            Some(handler) => {
                trace!("{}: event '{name}' on '{}'", self.config.name, self.path_of(current));
                handler(self, current, args)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Invoke the first handler for `name` found walking from the current
    /// state up to the root.
    pub fn trigger_event_upwards(&mut self, name: &str, args: &dyn Any) -> Result<bool> {
        let current = self.dispatch_origin()?;
        for id in self.ancestry(current) {
            if let Some(handler) = self.event_handler(id, name) {
                trace!("{}: event '{name}' handled by '{}'", self.config.name, self.path_of(id));
                handler(self, id, args)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Invoke every handler for `name` from the current state up to the
    /// root. Returns how many handlers ran.
    pub fn broadcast_event(&mut self, name: &str, args: &dyn Any) -> Result<usize> {
        let current = self.dispatch_origin()?;
        let mut handled = 0;
        for id in self.ancestry(current) {
            if let Some(handler) = self.event_handler(id, name) {
                trace!("{}: broadcast '{name}' to '{}'", self.config.name, self.path_of(id));
                handler(self, id, args)?;
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// The current state, provided the machine may dispatch right now.
    pub(super) fn dispatch_origin(&self) -> Result<StateId> {
        let Some(current) = self.current else {
            return Err(HsmError::NoCurrentState {
                machine: self.config.name.clone(),
            });
        };
        if !self.is_run {
            return Err(HsmError::NotRunning {
                machine: self.config.name.clone(),
            });
        }
        Ok(current)
    }

    fn event_handler(&self, id: StateId, name: &str) -> Option<EventHandler> {
        self.nodes.get(id.index())?.events.get(name).cloned()
    }
}
