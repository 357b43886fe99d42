//! Canopy: a hierarchical state machine runtime
//!
//! A machine is a tree of named states. Each state may have at most one
//! active child, so the active states always form a chain from the root
//! down. Behavior is attached as ordered hook lists per lifecycle phase,
//! named event handlers and typed message handlers.
//!
//! # Core Concepts
//!
//! - **StateMachine**: owns every node and referees transitions. Counts
//!   transitions per tick and aborts runaway chains.
//! - **Push / Change / Pop**: enter a child, replace self with a sibling,
//!   leave to the parent. Hooks may request transitions reentrantly.
//! - **Events**: delivered to the current state, the first handler upwards,
//!   or every handler upwards.
//! - **MessageRouter**: process-wide typed publish/subscribe.
//!
//! # Example
//!
//! ```rust
//! use canopy::{FrameClock, StateMachine};
//! use std::rc::Rc;
//!
//! let clock = Rc::new(FrameClock::new());
//! let mut machine = StateMachine::new("Guard", clock.clone()).unwrap();
//! let root = machine.root();
//! let patrol = machine.add_child(root, "Patrol").unwrap();
//! let chase = machine.add_child(root, "Chase").unwrap();
//!
//! machine
//!     .add_event(patrol, "spotted", |machine, id, _| machine.change(id, "Chase"))
//!     .unwrap();
//!
//! machine.run("Patrol").unwrap();
//! clock.advance();
//! assert!(machine.trigger_event("spotted", &()).unwrap());
//! assert_eq!(machine.current_state(), Some(chase));
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod machine;
pub mod router;
pub mod snapshot;

// Re-export commonly used types
pub use config::{ConfigViolation, MachineConfig};
pub use core::{
    FrameClock, Phase, StateId, StateNode, TickSource, TransitionHistory, TransitionRecord,
};
pub use error::{HookResult, HsmError, Result};
pub use machine::{Lifecycle, StateBehavior, StateChange, StateMachine};
pub use router::{Handler, MessageRouter, Subscription};
pub use snapshot::{MachineSnapshot, SnapshotError};
