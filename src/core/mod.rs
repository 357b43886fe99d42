//! Core tree types.
//!
//! This module contains the data the state machine is made of:
//! - Nodes and their arena identifiers
//! - Lifecycle phases and callback types
//! - The external tick source
//! - Bounded transition history
//!
//! Behavior (transitions, lifecycle, dispatch) lives on
//! [`StateMachine`](crate::StateMachine), which owns every node.

mod history;
mod hooks;
mod state;
mod tick;

pub(crate) use hooks::MessageHandler;
pub use history::{TransitionHistory, TransitionRecord};
pub use hooks::{EventHandler, Hook, Phase};
pub use state::{StateId, StateNode};
pub use tick::{FrameClock, TickSource};
