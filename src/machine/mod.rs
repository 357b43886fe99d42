//! The state machine: root of the tree and referee of every transition.
//!
//! [`StateMachine`] owns all nodes in an arena and is the only place where
//! the current state, the per-tick transition counter and the fired-message
//! ledger live. Node operations take the [`StateId`] of the node they act on.
//!
//! Hooks and handlers receive `&mut StateMachine`, so any hook may push,
//! change or pop reentrantly. The runaway-transition ceiling is the only
//! guard against unbounded chains.

mod behavior;
mod events;
mod lifecycle;
mod messages;
mod transition;

pub use behavior::StateBehavior;
pub use lifecycle::Lifecycle;
pub use transition::StateChange;

use crate::config::MachineConfig;
use crate::core::{
    EventHandler, FrameClock, Hook, MessageHandler, Phase, StateId, StateNode, TickSource,
    TransitionHistory,
};
use crate::error::{HookResult, HsmError, Result};
use messages::MessageLedger;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::rc::Rc;
use transition::TransitionBudget;
use uuid::Uuid;

type StateObserver = Rc<dyn Fn(&StateMachine, &StateChange)>;
type LifecycleObserver = Rc<dyn Fn(&StateMachine, Lifecycle)>;

/// Hierarchical state machine.
///
/// # Example
///
/// ```rust
/// use canopy::{FrameClock, StateMachine};
/// use std::rc::Rc;
///
/// let clock = Rc::new(FrameClock::new());
/// let mut machine = StateMachine::new("Guard", clock.clone()).unwrap();
/// let root = machine.root();
/// let patrol = machine.add_child(root, "Patrol").unwrap();
/// machine.add_child(root, "Chase").unwrap();
///
/// machine.run("Patrol").unwrap();
/// assert_eq!(machine.current_state(), Some(patrol));
///
/// clock.advance();
/// machine.change(patrol, "Chase").unwrap();
/// assert_eq!(machine.current_path(), Some("Guard/Chase"));
/// ```
pub struct StateMachine {
    id: Uuid,
    config: MachineConfig,
    nodes: Vec<StateNode>,
    current: Option<StateId>,
    is_run: bool,
    awakened: bool,
    started: bool,
    terminated: bool,
    ticks: Rc<dyn TickSource>,
    budget: TransitionBudget,
    fired_messages: MessageLedger,
    history: TransitionHistory,
    state_observers: Vec<StateObserver>,
    lifecycle_observers: Vec<LifecycleObserver>,
}

impl StateMachine {
    /// Create a machine with default settings and the given root name.
    pub fn new(name: impl Into<String>, ticks: Rc<dyn TickSource>) -> Result<Self> {
        Self::with_config(MachineConfig::new(name), ticks)
    }

    /// Create a machine driven by its own [`FrameClock`] that never advances.
    ///
    /// Useful for tools and tests that never run more than one logical frame.
    pub fn single_frame(name: impl Into<String>) -> Result<Self> {
        Self::new(name, Rc::new(FrameClock::new()))
    }

    /// Create a machine from a validated configuration.
    pub fn with_config(config: MachineConfig, ticks: Rc<dyn TickSource>) -> Result<Self> {
        config.validate()?;

        let mut root = StateNode::new(config.name.clone(), config.name.clone(), None);
        root.set_active(true);

        Ok(Self {
            id: Uuid::new_v4(),
            history: TransitionHistory::with_capacity(config.history_capacity),
            config,
            nodes: vec![root],
            current: Some(StateId::ROOT),
            is_run: false,
            awakened: false,
            started: false,
            terminated: false,
            ticks,
            budget: TransitionBudget::default(),
            fired_messages: MessageLedger::default(),
            state_observers: Vec::new(),
            lifecycle_observers: Vec::new(),
        })
    }

    // Queries

    /// Unique id of this machine instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn root(&self) -> StateId {
        StateId::ROOT
    }

    /// Tick identifier reported by the tick source right now.
    pub fn tick(&self) -> u64 {
        self.ticks.tick()
    }

    pub fn is_running(&self) -> bool {
        self.is_run
    }

    pub fn is_awake(&self) -> bool {
        self.awakened
    }

    /// True once the machine was terminated; it can never run again.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn can_transit_self(&self) -> bool {
        self.config.can_transit_self
    }

    pub fn set_can_transit_self(&mut self, allowed: bool) {
        self.config.can_transit_self = allowed;
    }

    /// The node most recently entered through a transition.
    ///
    /// `None` only after the machine was terminated.
    pub fn current_state(&self) -> Option<StateId> {
        self.current
    }

    pub fn current_path(&self) -> Option<&str> {
        let id = self.current?;
        self.nodes.get(id.index()).map(StateNode::path)
    }

    /// Look up a node by id.
    pub fn state(&self, id: StateId) -> Result<&StateNode> {
        self.nodes.get(id.index()).ok_or(HsmError::UnknownState(id))
    }

    /// Number of nodes ever created, destroyed ones included.
    pub fn state_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve a full path such as `"Guard/Combat/Melee"`.
    pub fn find(&self, path: &str) -> Option<StateId> {
        let mut segments = path.split(self.config.path_separator.as_str());
        if segments.next()? != self.config.name {
            return None;
        }
        segments.try_fold(StateId::ROOT, |id, segment| {
            self.nodes.get(id.index())?.child(segment)
        })
    }

    /// The chain of active nodes from the root down to the deepest one.
    pub fn active_path(&self) -> Vec<StateId> {
        let mut path = Vec::new();
        let mut cursor = Some(StateId::ROOT);
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id.index()) else {
                break;
            };
            if !node.is_active() {
                break;
            }
            path.push(id);
            cursor = node.active_child();
        }
        path
    }

    /// Number of hooks registered on `id` for `phase`.
    pub fn hook_count(&self, id: StateId, phase: Phase) -> Result<usize> {
        Ok(self.state(id)?.hooks.len(phase))
    }

    pub fn history(&self) -> &TransitionHistory {
        &self.history
    }

    // Tree construction

    /// Create a node named `name` under `parent`.
    pub fn add_child(&mut self, parent: StateId, name: impl Into<String>) -> Result<StateId> {
        let name = name.into();
        self.check_state_name(&name)?;

        let parent_node = self.live_node(parent)?;
        if parent_node.child(&name).is_some() {
            return Err(HsmError::DuplicateChildName {
                parent: parent_node.path().to_string(),
                name,
            });
        }

        let path = format!(
            "{}{}{}",
            parent_node.path(),
            self.config.path_separator,
            name
        );
        let id = StateId::from_index(self.nodes.len());
        self.nodes.push(StateNode::new(name.clone(), path, Some(parent)));
        self.node_mut(parent)?.insert_child(name, id);
        Ok(id)
    }

    /// Append a hook to `phase` of node `id`.
    pub fn add_hook<F>(&mut self, id: StateId, phase: Phase, hook: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId) -> HookResult + 'static,
    {
        self.add_shared_hook(id, phase, Rc::new(hook))
    }

    /// Append an already shared hook, so one callback can serve many nodes.
    pub fn add_shared_hook(&mut self, id: StateId, phase: Phase, hook: Hook) -> Result<()> {
        self.live_node_mut(id)?.hooks.push(phase, hook);
        Ok(())
    }

    pub fn add_awake<F>(&mut self, id: StateId, hook: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId) -> HookResult + 'static,
    {
        self.add_hook(id, Phase::Awake, hook)
    }

    pub fn add_start<F>(&mut self, id: StateId, hook: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId) -> HookResult + 'static,
    {
        self.add_hook(id, Phase::Start, hook)
    }

    pub fn add_enter<F>(&mut self, id: StateId, hook: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId) -> HookResult + 'static,
    {
        self.add_hook(id, Phase::Enter, hook)
    }

    pub fn add_exit<F>(&mut self, id: StateId, hook: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId) -> HookResult + 'static,
    {
        self.add_hook(id, Phase::Exit, hook)
    }

    pub fn add_destroy<F>(&mut self, id: StateId, hook: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId) -> HookResult + 'static,
    {
        self.add_hook(id, Phase::Destroy, hook)
    }

    pub fn add_update<F>(&mut self, id: StateId, hook: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId) -> HookResult + 'static,
    {
        self.add_hook(id, Phase::Update, hook)
    }

    /// Register the handler for event `name` on node `id`.
    ///
    /// Each node handles an event name at most once.
    pub fn add_event<F>(&mut self, id: StateId, name: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&mut StateMachine, StateId, &dyn Any) -> HookResult + 'static,
    {
        let name = name.into();
        let node = self.live_node_mut(id)?;
        if node.has_event(&name) {
            return Err(HsmError::DuplicateEventName {
                state: node.path().to_string(),
                event: name,
            });
        }
        let handler: EventHandler = Rc::new(handler);
        node.events.insert(name, handler);
        Ok(())
    }

    /// Register an event handler whose argument is downcast to `T`.
    ///
    /// Triggering the event with any other argument type fails with
    /// [`HsmError::EventArgsMismatch`].
    pub fn add_typed_event<T, F>(
        &mut self,
        id: StateId,
        name: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        T: Any,
        F: Fn(&mut StateMachine, StateId, &T) -> HookResult + 'static,
    {
        let name = name.into();
        let event = name.clone();
        self.add_event(id, name, move |machine, state, args| {
            match args.downcast_ref::<T>() {
                Some(args) => handler(machine, state, args),
                None => Err(HsmError::EventArgsMismatch {
                    event: event.clone(),
                    expected: type_name::<T>(),
                }),
            }
        })
    }

    /// Register a handler for messages of type `T` delivered through
    /// [`StateMachine::send_message`]. Handlers for the same type run in
    /// registration order.
    pub fn add_message<T, F>(&mut self, id: StateId, handler: F) -> Result<()>
    where
        T: Any,
        F: Fn(&mut StateMachine, StateId, &T) -> HookResult + 'static,
    {
        let erased: MessageHandler = Rc::new(
            move |machine: &mut StateMachine, state: StateId, message: &dyn Any| -> HookResult {
                match message.downcast_ref::<T>() {
                    Some(message) => handler(machine, state, message),
                    None => Ok(()),
                }
            },
        );
        self.live_node_mut(id)?
            .messages
            .entry(TypeId::of::<T>())
            .or_default()
            .push(erased);
        Ok(())
    }

    // Observers

    /// Observe every committed `(previous, next)` change of the current state.
    pub fn on_state_changed<F>(&mut self, observer: F)
    where
        F: Fn(&StateMachine, &StateChange) + 'static,
    {
        self.state_observers.push(Rc::new(observer));
    }

    /// Observe run, stop and terminate.
    pub fn on_lifecycle<F>(&mut self, observer: F)
    where
        F: Fn(&StateMachine, Lifecycle) + 'static,
    {
        self.lifecycle_observers.push(Rc::new(observer));
    }

    // Internals

    pub(crate) fn node(&self, id: StateId) -> Result<&StateNode> {
        self.state(id)
    }

    pub(crate) fn node_mut(&mut self, id: StateId) -> Result<&mut StateNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or(HsmError::UnknownState(id))
    }

    /// Node that exists and was not destroyed.
    pub(crate) fn live_node(&self, id: StateId) -> Result<&StateNode> {
        let node = self.node(id)?;
        if node.is_destroyed() {
            return Err(HsmError::StateDestroyed {
                state: node.path().to_string(),
            });
        }
        Ok(node)
    }

    pub(crate) fn live_node_mut(&mut self, id: StateId) -> Result<&mut StateNode> {
        let node = self.node_mut(id)?;
        if node.is_destroyed() {
            return Err(HsmError::StateDestroyed {
                state: node.path().to_string(),
            });
        }
        Ok(node)
    }

    pub(crate) fn path_of(&self, id: StateId) -> String {
        self.nodes
            .get(id.index())
            .map(|node| node.path().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Invoke the hooks of `phase` on `id` in registration order.
    ///
    /// Stops as soon as the node is destroyed, including by one of its own
    /// hooks.
    pub(crate) fn run_hooks(&mut self, id: StateId, phase: Phase) -> HookResult {
        let hooks = self.node(id)?.hooks.snapshot(phase);
        for hook in hooks {
            if self.node(id)?.is_destroyed() {
                break;
            }
            hook(self, id)?;
        }
        Ok(())
    }

    /// `id` followed by each of its ancestors up to the root.
    pub(crate) fn ancestry(&self, id: StateId) -> Vec<StateId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self
                .nodes
                .get(current.index())
                .and_then(StateNode::parent);
        }
        chain
    }

    fn check_state_name(&self, name: &str) -> Result<()> {
        let reason = if name.is_empty() {
            "name must not be empty".to_string()
        } else if name.contains(self.config.path_separator.as_str()) {
            format!(
                "name must not contain the path separator '{}'",
                self.config.path_separator
            )
        } else {
            return Ok(());
        };
        Err(HsmError::InvalidStateName {
            name: name.to_string(),
            reason,
        })
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("states", &self.nodes.len())
            .field("current", &self.current_path())
            .field("is_run", &self.is_run)
            .field("terminated", &self.terminated)
            .field("transition_count", &self.budget.count)
            .finish_non_exhaustive()
    }
}
