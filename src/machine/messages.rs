//! Tree-local typed messages and the per-tick fired-message ledger.

use super::StateMachine;
use crate::core::MessageHandler;
use crate::error::Result;
use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::trace;

/// Hash bucket of a message value: its type plus the hash of its contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct MessageKey {
    type_id: TypeId,
    hash: u64,
}

impl MessageKey {
    fn of<M: Any + Hash>(message: &M) -> Self {
        let mut hasher = DefaultHasher::new();
        message.hash(&mut hasher);
        Self {
            type_id: TypeId::of::<M>(),
            hash: hasher.finish(),
        }
    }
}

/// Messages fired during a single tick.
///
/// Values are kept so that two messages whose hashes collide are still told
/// apart by equality. Registering on a new tick drops everything from the
/// previous one.
#[derive(Default)]
pub(super) struct MessageLedger {
    tick: Option<u64>,
    fired: HashMap<MessageKey, Vec<Box<dyn Any>>>,
}

impl MessageLedger {
    fn contains<M: Any + Hash + Eq>(&self, tick: u64, message: &M) -> bool {
        self.tick == Some(tick)
            && self.fired.get(&MessageKey::of(message)).is_some_and(|values| {
                values
                    .iter()
                    .any(|value| value.downcast_ref::<M>() == Some(message))
            })
    }

    fn insert<M: Any + Hash + Eq + Clone>(&mut self, tick: u64, message: &M) {
        if self.tick != Some(tick) {
            self.fired.clear();
            self.tick = Some(tick);
        }
        if !self.contains(tick, message) {
            self.fired
                .entry(MessageKey::of(message))
                .or_default()
                .push(Box::new(message.clone()));
        }
    }

    fn len(&self) -> usize {
        self.fired.values().map(Vec::len).sum()
    }

    pub(super) fn clear(&mut self) {
        self.fired.clear();
        self.tick = None;
    }
}

impl StateMachine {
    /// Remember that `message` fired during the current tick.
    pub fn register_fired_message<M: Any + Hash + Eq + Clone>(&mut self, message: &M) {
        let tick = self.ticks.tick();
        self.fired_messages.insert(tick, message);
    }

    /// False when an equal message already fired during the current tick.
    pub fn can_fire_message<M: Any + Hash + Eq>(&self, message: &M) -> bool {
        !self.fired_messages.contains(self.ticks.tick(), message)
    }

    /// Number of distinct messages in the ledger.
    pub fn fired_message_count(&self) -> usize {
        self.fired_messages.len()
    }

    /// Deliver `message` to every handler for its type, from the current
    /// state up to the root.
    ///
    /// An equal message is delivered at most once per tick; a repeat returns
    /// `Ok(false)` without invoking anything.
    pub fn send_message<M: Any + Hash + Eq + Clone>(&mut self, message: &M) -> Result<bool> {
        let current = self.dispatch_origin()?;
        if !self.can_fire_message(message) {
            trace!(
                "{}: {} already fired this tick",
                self.config.name,
                std::any::type_name::<M>()
            );
            return Ok(false);
        }
        self.register_fired_message(message);

        let type_id = TypeId::of::<M>();
        for id in self.ancestry(current) {
            let handlers: Vec<MessageHandler> = match self.nodes.get(id.index()) {
                Some(node) => node.messages.get(&type_id).cloned().unwrap_or_default(),
                None => continue,
            };
            for handler in handlers {
                trace!("{}: message delivered to '{}'", self.config.name, self.path_of(id));
                handler(self, id, message)?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::core::StateId;
    use crate::error::HsmError;

    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Alarm {
        level: u8,
    }

    /// Every value lands in the same hash bucket.
    #[derive(Clone, PartialEq, Eq)]
    struct Crowded(u32);

    impl Hash for Crowded {
        fn hash<H: Hasher>(&self, state: &mut H) {
            0u8.hash(state);
        }
    }

    #[test]
    fn ledger_blocks_repeats_within_a_tick() {
        let f = fixture();
        let mut machine = f.machine;
        let alarm = Alarm { level: 3 };

        assert!(machine.can_fire_message(&alarm));
        machine.register_fired_message(&alarm);
        assert!(!machine.can_fire_message(&alarm));
        assert!(machine.can_fire_message(&Alarm { level: 4 }));

        f.clock.advance();
        assert!(machine.can_fire_message(&alarm));
    }

    #[test]
    fn equal_values_of_different_types_are_distinct() {
        let mut f = fixture();
        f.machine.register_fired_message(&7u32);

        assert!(!f.machine.can_fire_message(&7u32));
        assert!(f.machine.can_fire_message(&7u64));
    }

    #[test]
    fn colliding_hashes_do_not_block_unequal_messages() {
        let mut f = fixture();
        f.machine.register_fired_message(&Crowded(1));

        assert!(!f.machine.can_fire_message(&Crowded(1)));
        assert!(f.machine.can_fire_message(&Crowded(2)));

        f.machine.register_fired_message(&Crowded(2));
        f.machine.register_fired_message(&Crowded(2));
        assert!(!f.machine.can_fire_message(&Crowded(2)));
        assert_eq!(f.machine.fired_message_count(), 2);
    }

    #[test]
    fn ledger_keeps_only_the_current_tick() {
        let f = fixture();
        let mut machine = f.machine;

        for tick in 0..10_000u64 {
            machine.register_fired_message(&tick);
            f.clock.advance();
        }
        machine.register_fired_message(&Alarm { level: 1 });
        machine.register_fired_message(&Alarm { level: 2 });

        assert_eq!(machine.fired_message_count(), 2);
        assert!(machine.can_fire_message(&9_999u64));
    }

    #[test]
    fn send_message_walks_leaf_to_root_once_per_tick() {
        let mut f = fixture();
        f.machine.run("Combat").unwrap();
        f.machine.push(f.combat, "Melee").unwrap();
        f.journal.clear();

        for (id, label) in [(StateId::ROOT, "agent"), (f.melee, "melee"), (f.idle, "idle")] {
            let journal = f.journal.clone();
            f.machine
                .add_message::<Alarm, _>(id, move |_, _, alarm| {
                    journal.log(format!("{label}:{}", alarm.level));
                    Ok(())
                })
                .unwrap();
        }

        assert!(f.machine.send_message(&Alarm { level: 2 }).unwrap());
        assert!(!f.machine.send_message(&Alarm { level: 2 }).unwrap());
        assert_eq!(f.journal.entries(), vec!["melee:2", "agent:2"]);

        f.clock.advance();
        assert!(f.machine.send_message(&Alarm { level: 2 }).unwrap());
        assert_eq!(f.journal.count("melee:2"), 2);
    }

    #[test]
    fn send_message_requires_running_machine() {
        let mut f = fixture();
        let err = f.machine.send_message(&Alarm { level: 1 }).unwrap_err();
        assert!(matches!(err, HsmError::NotRunning { .. }));
    }

    #[test]
    fn terminate_clears_ledger() {
        let mut f = fixture();
        f.machine.run("Idle").unwrap();
        f.machine.register_fired_message(&Alarm { level: 1 });
        assert_eq!(f.machine.fired_message_count(), 1);

        f.machine.terminate().unwrap();

        assert_eq!(f.machine.fired_message_count(), 0);
    }
}
