//! End-to-end scenarios driving a machine the way a game loop would.

use canopy::{
    FrameClock, HsmError, Lifecycle, MachineConfig, MessageRouter, Phase, StateId, StateMachine,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    fn hook(&self, entry: String) -> impl Fn(&mut StateMachine, StateId) -> canopy::HookResult {
        let journal = self.clone();
        move |_, _| {
            journal.0.borrow_mut().push(entry.clone());
            Ok(())
        }
    }

    fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

struct Scene {
    machine: StateMachine,
    clock: Rc<FrameClock>,
    journal: Journal,
    a: StateId,
    a1: StateId,
    a2: StateId,
}

/// Root → { A → { A1, A2 }, B }
fn scene() -> Scene {
    let clock = Rc::new(FrameClock::new());
    let mut machine = StateMachine::new("Root", clock.clone()).unwrap();
    let journal = Journal::default();

    let a = machine.add_child(StateId::ROOT, "A").unwrap();
    let b = machine.add_child(StateId::ROOT, "B").unwrap();
    let a1 = machine.add_child(a, "A1").unwrap();
    let a2 = machine.add_child(a, "A2").unwrap();

    for (id, name) in [(a, "A"), (b, "B"), (a1, "A1"), (a2, "A2")] {
        machine
            .add_enter(id, journal.hook(format!("enter:{name}")))
            .unwrap();
        machine
            .add_exit(id, journal.hook(format!("exit:{name}")))
            .unwrap();
    }

    Scene {
        machine,
        clock,
        journal,
        a,
        a1,
        a2,
    }
}

#[test]
fn enter_hook_redirects_to_sibling() {
    let mut s = scene();
    let a = s.a;
    s.machine
        .add_enter(s.a1, move |machine, _| machine.push(a, "A2"))
        .unwrap();

    s.machine.run("A").unwrap();
    s.clock.advance();
    s.machine.push(s.a, "A1").unwrap();

    assert_eq!(s.machine.current_state(), Some(s.a2));
    assert_eq!(s.machine.state(s.a).unwrap().active_child(), Some(s.a2));
    assert_eq!(s.journal.count("enter:A1"), 1);
    assert_eq!(s.journal.count("exit:A1"), 1);
    assert!(!s.machine.state(s.a1).unwrap().is_active());
    assert!(s.machine.state(s.a2).unwrap().is_active());
    assert_eq!(s.machine.transition_count(), 2);
    assert_eq!(
        s.machine.active_path(),
        vec![StateId::ROOT, s.a, s.a2]
    );
}

#[test]
fn driver_loop_changes_state_from_update_hooks() {
    let mut s = scene();
    let frames = Rc::new(RefCell::new(0u32));
    let counter = Rc::clone(&frames);
    s.machine
        .add_update(s.a, move |machine, id| {
            *counter.borrow_mut() += 1;
            if *counter.borrow() == 3 {
                machine.change(id, "B")?;
            }
            Ok(())
        })
        .unwrap();

    s.machine.run("A").unwrap();
    for _ in 0..5 {
        s.clock.advance();
        s.machine.update().unwrap();
    }

    assert_eq!(*frames.borrow(), 3);
    assert_eq!(s.machine.current_path(), Some("Root/B"));
    assert_eq!(
        s.journal.entries(),
        vec!["enter:A", "exit:A", "enter:B"]
    );
}

#[test]
fn stop_then_run_resumes_and_terminate_is_final() {
    let mut s = scene();
    let lifecycle = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lifecycle);
    s.machine
        .on_lifecycle(move |_, event| sink.borrow_mut().push(event));
    let starts = Rc::new(RefCell::new(0));
    let start_count = Rc::clone(&starts);
    s.machine
        .add_hook(s.a1, Phase::Start, move |_, _| {
            *start_count.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

    s.machine.run("A").unwrap();
    s.machine.stop().unwrap();
    s.machine.run("B").unwrap();
    s.machine.terminate().unwrap();

    assert_eq!(*starts.borrow(), 1);
    assert_eq!(
        *lifecycle.borrow(),
        vec![
            Lifecycle::Running,
            Lifecycle::Stopped,
            Lifecycle::Running,
            Lifecycle::Terminated
        ]
    );
    assert!(matches!(
        s.machine.run("A"),
        Err(HsmError::Terminated { .. })
    ));
    assert!(matches!(
        s.machine.trigger_event("anything", &()),
        Err(HsmError::NoCurrentState { .. })
    ));
}

#[test]
fn events_bubble_through_the_active_chain() {
    let mut s = scene();
    let seen = Journal::default();
    let log = seen.clone();
    s.machine
        .add_typed_event::<u32, _>(s.a, "noise", move |machine, _, level| {
            log.0.borrow_mut().push(format!("A heard {level}"));
            if *level > 5 {
                machine.push(StateId::ROOT, "B")?;
            }
            Ok(())
        })
        .unwrap();

    s.machine.run("A").unwrap();
    s.machine.push(s.a, "A1").unwrap();

    assert!(!s.machine.trigger_event("noise", &3u32).unwrap());
    assert!(s.machine.trigger_event_upwards("noise", &3u32).unwrap());
    assert_eq!(s.machine.current_state(), Some(s.a1));

    s.clock.advance();
    assert_eq!(s.machine.broadcast_event("noise", &9u32).unwrap(), 1);
    assert_eq!(s.machine.current_path(), Some("Root/B"));
    assert_eq!(seen.entries(), vec!["A heard 3", "A heard 9"]);
}

#[test]
fn router_bridges_machines() {
    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Alarm {
        zone: u8,
    }

    let router = MessageRouter::new();
    let mut s = scene();
    s.machine.run("A").unwrap();

    let inbox = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&inbox);
    let _subscription = router.subscribe_fn(move |alarm: &Alarm| {
        sink.lock().unwrap().push(alarm.zone);
        Ok(())
    });

    router.publish(&Alarm { zone: 4 }).unwrap();
    let pending: Vec<u8> = inbox.lock().unwrap().drain(..).collect();
    for zone in pending {
        let alarm = Alarm { zone };
        if s.machine.can_fire_message(&alarm) {
            s.machine.register_fired_message(&alarm);
            s.machine.change(s.a, "B").unwrap();
        }
    }

    assert_eq!(s.machine.current_path(), Some("Root/B"));
    assert!(!s.machine.can_fire_message(&Alarm { zone: 4 }));
}

#[test]
fn runaway_cycle_is_fatal_and_reports_trail() {
    let config = MachineConfig::new("Loop").with_transition_limit(10);
    let mut machine = StateMachine::with_config(config, Rc::new(FrameClock::new())).unwrap();
    let ping = machine.add_child(StateId::ROOT, "Ping").unwrap();
    let pong = machine.add_child(StateId::ROOT, "Pong").unwrap();
    machine
        .add_enter(ping, |machine, id| machine.change(id, "Pong"))
        .unwrap();
    machine
        .add_enter(pong, |machine, id| machine.change(id, "Ping"))
        .unwrap();

    let err = machine.run("Ping").unwrap_err();

    let message = err.to_string();
    assert!(err.is_runaway());
    assert!(message.contains("Loop"));
    assert!(message.contains("Ping > Pong > Ping"));
}
