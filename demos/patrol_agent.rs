//! Patrol Agent
//!
//! This example drives a guard through a hierarchical state machine from a
//! fixed-step game loop.
//!
//! Key concepts:
//! - Nested states (Combat owns Melee and Ranged)
//! - Transitions requested from update hooks and event handlers
//! - A behavior object bound to a state
//! - The process-wide message router feeding events into the machine
//! - Snapshots for inspection
//!
//! Run with: cargo run --example patrol_agent

use canopy::{FrameClock, HookResult, MessageRouter, StateBehavior, StateId, StateMachine};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Broadcast by the world whenever something is heard.
struct Noise {
    distance: u32,
}

/// Walks between waypoints and gets bored after a while.
#[derive(Default)]
struct Patrol {
    steps: Cell<u32>,
}

impl StateBehavior for Patrol {
    fn on_enter(&self, _machine: &mut StateMachine, _id: StateId) -> HookResult {
        self.steps.set(0);
        println!("  [Patrol] Starting route");
        Ok(())
    }

    fn update(&self, machine: &mut StateMachine, id: StateId) -> HookResult {
        self.steps.set(self.steps.get() + 1);
        if self.steps.get() == 4 {
            println!("  [Patrol] Route finished, resting");
            machine.change(id, "Idle")?;
        }
        Ok(())
    }
}

fn build_guard(clock: Rc<FrameClock>) -> canopy::Result<StateMachine> {
    let mut machine = StateMachine::new("Guard", clock)?;
    let root = machine.root();

    let idle = machine.add_child(root, "Idle")?;
    let patrol = machine.add_child(root, "Patrol")?;
    let combat = machine.add_child(root, "Combat")?;
    machine.add_child(combat, "Melee")?;
    machine.add_child(combat, "Ranged")?;

    machine.bind_behavior(patrol, Rc::new(Patrol::default()))?;

    machine.add_enter(idle, |_, _| {
        println!("  [Idle] Sitting down");
        Ok(())
    })?;
    machine.add_update(idle, |machine, id| {
        if machine.tick() % 3 == 0 {
            machine.change(id, "Patrol")?;
        }
        Ok(())
    })?;

    machine.add_enter(combat, |machine, id| {
        println!("  [Combat] Drawing weapon");
        machine.push(id, "Ranged")
    })?;
    machine.add_typed_event::<u32, _>(combat, "noise", |machine, _, distance| {
        let current = machine.current_state();
        let melee = machine.find("Guard/Combat/Melee");
        if *distance < 5 && current != melee {
            if let Some(state) = current {
                machine.change(state, "Melee")?;
            }
        }
        Ok(())
    })?;

    // Any state outside combat reacts to noise by switching into it.
    machine.add_typed_event::<u32, _>(root, "noise", |machine, root, distance| {
        println!("  [Guard] Heard something {distance}m away");
        machine.push(root, "Combat")
    })?;

    machine.on_state_changed(|machine, change| {
        let from = machine.state(change.previous).map(|s| s.path()).unwrap_or("?");
        let to = machine.state(change.next).map(|s| s.path()).unwrap_or("?");
        println!("  -> {from} => {to} (tick {}, #{})", change.tick, change.sequence);
    });

    Ok(machine)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Patrol Agent ===\n");

    let clock = Rc::new(FrameClock::new());
    let mut guard = build_guard(clock.clone())?;

    let heard = Arc::new(Mutex::new(Vec::new()));
    let inbox = Arc::clone(&heard);
    let _subscription = MessageRouter::global().subscribe_fn(move |noise: &Noise| {
        if let Ok(mut inbox) = inbox.lock() {
            inbox.push(noise.distance);
        }
        Ok(())
    });

    guard.run("Patrol")?;

    for frame in 1..=12 {
        clock.advance();
        println!("Frame {frame}:");

        match frame {
            8 => MessageRouter::global().publish(&Noise { distance: 12 })?,
            10 => MessageRouter::global().publish(&Noise { distance: 3 })?,
            _ => {}
        }

        let pending: Vec<u32> = heard
            .lock()
            .map(|mut inbox| inbox.drain(..).collect())
            .unwrap_or_default();
        for distance in pending {
            guard.trigger_event_upwards("noise", &distance)?;
        }

        guard.update()?;
    }

    let snapshot = guard.snapshot();
    println!("\nSnapshot:");
    println!("{}", snapshot.to_json()?);

    guard.terminate()?;
    MessageRouter::global().teardown();
    println!("\nGuard terminated: {}", guard.is_terminated());
    Ok(())
}
