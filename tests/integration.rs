//! Integration tests for the control protocol, end to end on the host.

mod common;

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use common::{FakePeer, MemoryPersistence};
use hidreplay::config::MAX_STEPS;
use hidreplay::engine::{Action, Button, Engine, Point, Step};
use hidreplay::Control;

type TestEngine = Engine<NoopRawMutex>;

struct Link<'a> {
    control: Control<'a, NoopRawMutex, MemoryPersistence, FakePeer>,
    out: Vec<u8>,
}

impl<'a> Link<'a> {
    fn new(engine: &'a TestEngine, persist: &MemoryPersistence, peer: &FakePeer) -> Self {
        Self {
            control: Control::new(engine, persist.clone(), peer.clone()),
            out: vec![0; 32 * 1024],
        }
    }

    fn request(&mut self, line: &str) -> String {
        let n = block_on(self.control.handle_line(line, &mut self.out));
        String::from_utf8(self.out[..n].to_vec()).unwrap()
    }
}

const OK: &str = r#"{"ok":true}"#;

#[test]
fn add_then_list() {
    let engine = TestEngine::default();
    let persist = MemoryPersistence::default();
    let mut link = Link::new(&engine, &persist, &FakePeer::default());

    assert_eq!(
        link.request(r#"add {"type":"tap","x":10,"y":20}"#),
        r#"{"ok":true,"index":0}"#
    );
    assert_eq!(
        link.request(r#"add {"type":"key","text":"ctrl+s","delayMs":250}"#),
        r#"{"ok":true,"index":1}"#
    );

    assert_eq!(
        link.request("steps"),
        concat!(
            r#"{"steps":["#,
            r#"{"type":"tap","x":10,"y":20,"x2":0,"y2":0,"text":"","btn":"left","delayMs":0,"durMs":600,"stepsN":1},"#,
            r#"{"type":"key","x":0,"y":0,"x2":0,"y2":0,"text":"ctrl+s","btn":"left","delayMs":250,"durMs":600,"stepsN":1}"#,
            r#"]}"#
        )
    );
    assert_eq!(persist.saves(), 2);
    assert_eq!(persist.saved().unwrap().1.len(), 2);
}

#[test]
fn status_reports_count_and_idle() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    link.request(r#"add {"type":"wait"}"#);
    assert_eq!(
        link.request("status"),
        r#"{"running":false,"loop":false,"step":0,"count":1,"loops_left":0}"#
    );
}

#[test]
fn unknown_command_and_bad_json() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    assert_eq!(link.request("dance"), r#"{"error":"json"}"#);
    assert_eq!(link.request("add {not json"), r#"{"error":"json"}"#);
    assert_eq!(link.request(r#"add {"type":"jump"}"#), r#"{"error":"json"}"#);
    assert_eq!(block_on(engine.step_count()), 0);
}

#[test]
fn index_errors() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    assert_eq!(link.request("del 0"), r#"{"error":"index"}"#);
    assert_eq!(link.request("del -1"), r#"{"error":"index"}"#);
    assert_eq!(
        link.request(r#"insert 1 {"type":"wait"}"#),
        r#"{"error":"index"}"#
    );
    assert_eq!(link.request(r#"insert 0 {"type":"wait"}"#), OK);
    // Moving past either end is a no-op.
    assert_eq!(link.request("up 0"), OK);
    assert_eq!(link.request("down 0"), OK);
    assert_eq!(link.request("up 3"), r#"{"error":"index"}"#);
}

#[test]
fn insert_move_delete() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    link.request(r#"add {"type":"tap","x":1,"y":1}"#);
    link.request(r#"add {"type":"tap","x":3,"y":3}"#);
    assert_eq!(link.request(r#"insert 1 {"type":"tap","x":2,"y":2}"#), OK);

    let xs = |engine: &TestEngine| -> Vec<i32> {
        block_on(engine.lock_steps())
            .iter()
            .map(|s| match s.action {
                Action::Tap { at, .. } => at.x,
                _ => unreachable!(),
            })
            .collect()
    };
    assert_eq!(xs(&engine), [1, 2, 3]);

    assert_eq!(link.request("down 0"), OK);
    assert_eq!(xs(&engine), [2, 1, 3]);
    assert_eq!(link.request("up 2"), OK);
    assert_eq!(xs(&engine), [2, 3, 1]);
    assert_eq!(link.request("del 1"), OK);
    assert_eq!(xs(&engine), [2, 1]);
    assert_eq!(link.request("clear"), OK);
    assert!(xs(&engine).is_empty());
}

#[test]
fn store_capacity() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    for _ in 0..MAX_STEPS {
        link.request(r#"add {"type":"wait"}"#);
    }
    assert_eq!(
        link.request(r#"add {"type":"wait"}"#),
        r#"{"error":"max steps"}"#
    );
    assert_eq!(
        link.request(r#"insert 0 {"type":"wait"}"#),
        r#"{"error":"max steps"}"#
    );
    assert_eq!(block_on(engine.step_count()), MAX_STEPS);
}

#[test]
fn import_replaces_steps_and_merges_config() {
    let engine = TestEngine::default();
    let persist = MemoryPersistence::default();
    let mut link = Link::new(&engine, &persist, &FakePeer::default());

    link.request(r#"add {"type":"wait"}"#);
    assert_eq!(
        link.request(concat!(
            r#"import {"config":{"cpp":2.5,"delay":300},"steps":["#,
            r#"{"type":"type","text":"hi"},{"type":"drag","x":0,"y":0,"x2":50,"y2":60,"durMs":0,"stepsN":4}]}"#
        )),
        OK
    );

    let config = block_on(engine.config());
    assert_eq!(config.counts_per_pixel, 2.5);
    assert_eq!(config.default_post_delay_ms, 300);
    assert_eq!(config.screen_width, 1920);

    let steps = block_on(engine.lock_steps());
    assert_eq!(steps.len(), 2);
    assert_eq!(steps.get(0), Step::type_text("hi").as_ref());
    match steps.get(1).map(|s| &s.action) {
        Some(Action::Drag {
            to,
            duration_ms,
            steps,
            ..
        }) => {
            assert_eq!(*to, Point::new(50, 60));
            assert_eq!(*duration_ms, 0);
            assert_eq!(steps.get(), 4);
        }
        other => panic!("expected a drag, got {:?}", other),
    }
    drop(steps);

    let (saved_config, saved_steps) = persist.saved().unwrap();
    assert_eq!(saved_config, config);
    assert_eq!(saved_steps.len(), 2);
}

#[test]
fn malformed_import_changes_nothing() {
    let engine = TestEngine::default();
    let persist = MemoryPersistence::default();
    let mut link = Link::new(&engine, &persist, &FakePeer::default());

    link.request(r#"add {"type":"tap","x":5,"y":5}"#);
    let saves = persist.saves();

    assert_eq!(
        link.request(r#"import {"config":{"cpp":9},"steps":[{"type":"wait"},{"type":"bogus"}]}"#),
        r#"{"error":"json"}"#
    );
    assert_eq!(
        link.request(r#"import {"config":{"cpp":9},"steps":[{"type":"wait"}"#),
        r#"{"error":"json"}"#
    );

    assert_eq!(block_on(engine.step_count()), 1);
    assert_eq!(block_on(engine.config()).counts_per_pixel, 5.0);
    assert_eq!(persist.saves(), saves);
}

#[test]
fn import_truncates_to_capacity() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    let mut line = String::from(r#"import {"steps":["#);
    for i in 0..MAX_STEPS + 10 {
        if i > 0 {
            line.push(',');
        }
        line.push_str(r#"{"type":"wait","ms":10}"#);
    }
    line.push_str("]}");

    assert_eq!(link.request(&line), OK);
    assert_eq!(block_on(engine.step_count()), MAX_STEPS);
}

#[test]
fn set_without_steps_clears() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    link.request(r#"add {"type":"wait"}"#);
    assert_eq!(link.request(r#"set {"steps":[{"type":"wait"},{"type":"wait"}]}"#), OK);
    assert_eq!(block_on(engine.step_count()), 2);
    assert_eq!(link.request("set {}"), OK);
    assert_eq!(block_on(engine.step_count()), 0);
}

#[test]
fn export_carries_config_and_steps() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    link.request(r#"add {"type":"wait","delayMs":40}"#);
    let export = link.request("export");
    assert!(export.starts_with(r#"{"config":{"w":1920,"h":1080,"#), "{export}");
    assert!(export.contains(r#""host":"127.0.0.1","port":5005}"#), "{export}");
    assert!(export.ends_with(
        r#""steps":[{"type":"wait","x":0,"y":0,"x2":0,"y2":0,"text":"","btn":"left","delayMs":40,"durMs":600,"stepsN":1}]}"#
    ));

    // What export writes, import takes back.
    let other = TestEngine::default();
    let mut other_link = Link::new(&other, &MemoryPersistence::default(), &FakePeer::default());
    assert_eq!(other_link.request(&format!("import {export}")), OK);
    assert_eq!(
        block_on(other.step(0)),
        Some(Step::wait(0).with_post_delay(40))
    );
}

#[test]
fn config_query_and_patch() {
    let engine = TestEngine::default();
    let persist = MemoryPersistence::default();
    let mut link = Link::new(&engine, &persist, &FakePeer::default());

    let current = link.request("config");
    assert!(current.contains(r#""autorun":false"#), "{current}");

    assert_eq!(link.request(r#"config {"autorun":true,"port":6000}"#), OK);
    let config = block_on(engine.config());
    assert!(config.autorun);
    assert_eq!(config.peer_port, 6000);
    assert_eq!(persist.saved().unwrap().0, config);

    // Non-positive calibration is ignored.
    assert_eq!(link.request(r#"config {"cpp":0}"#), OK);
    assert_eq!(block_on(engine.config()).counts_per_pixel, 5.0);
}

#[test]
fn edits_are_refused_while_running() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    link.request(r#"add {"type":"wait"}"#);
    assert_eq!(link.request("loop 3"), OK);
    assert_eq!(link.request("run"), r#"{"error":"busy"}"#);
    assert_eq!(link.request(r#"add {"type":"wait"}"#), r#"{"error":"busy"}"#);
    assert_eq!(link.request("clear"), r#"{"error":"busy"}"#);
    assert_eq!(link.request(r#"set {"steps":[]}"#), r#"{"error":"busy"}"#);
    assert_eq!(
        link.request("status"),
        r#"{"running":true,"loop":true,"step":0,"count":1,"loops_left":3}"#
    );

    // Configuration may still change.
    assert_eq!(link.request(r#"config {"delay":10}"#), OK);
    assert_eq!(link.request("stop"), OK);
    assert_eq!(block_on(engine.step_count()), 1);
}

#[test]
fn position_queries() {
    let engine = TestEngine::default();
    let peer = FakePeer::at(640, 360);
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &peer);

    assert_eq!(link.request("pos"), r#"{"x":640,"y":360}"#);
    assert_eq!(link.request("capture"), r#"{"x":640,"y":360}"#);
    assert_eq!(link.request("capture 90"), r#"{"x":640,"y":360}"#);
    assert_eq!(peer.requests(), [None, Some(3), Some(30)]);
}

#[test]
fn tap_here_records_a_tap() {
    let engine = TestEngine::default();
    let peer = FakePeer::at(100, 200);
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &peer);

    assert_eq!(link.request("tap-here"), r#"{"ok":true,"index":0}"#);
    assert_eq!(
        link.request(r#"tap-here {"btn":"right","delayMs":75,"capture":5}"#),
        r#"{"ok":true,"index":1}"#
    );
    assert_eq!(peer.requests(), [None, Some(5)]);

    assert_eq!(
        block_on(engine.step(1)),
        Some(Step::tap(Point::new(100, 200), Button::Right).with_post_delay(75))
    );
}

#[test]
fn unreachable_peer() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    assert_eq!(link.request("pos"), r#"{"error":"pc not reachable"}"#);
    assert_eq!(link.request("tap-here"), r#"{"error":"pc not reachable"}"#);
    assert_eq!(block_on(engine.step_count()), 0);
}

#[test]
fn storage_failure_is_reported_after_the_change() {
    let engine = TestEngine::default();
    let persist = MemoryPersistence::default();
    let mut link = Link::new(&engine, &persist, &FakePeer::default());

    persist.fail(true);
    assert_eq!(link.request(r#"add {"type":"wait"}"#), r#"{"error":"storage"}"#);
    assert_eq!(block_on(engine.step_count()), 1);
    assert!(persist.saved().is_none());
}

#[test]
fn restore_brings_back_the_saved_macro() {
    let persist = MemoryPersistence::default();
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &persist, &FakePeer::default());
    link.request(r#"add {"type":"tap","x":4,"y":5}"#);
    link.request(r#"config {"autorun":true}"#);

    let rebooted = TestEngine::default();
    assert_eq!(block_on(rebooted.restore(&mut persist.clone())), Ok(()));
    assert_eq!(
        block_on(rebooted.step(0)),
        Some(Step::tap(Point::new(4, 5), Button::Left))
    );
    assert!(block_on(rebooted.config()).autorun);

    // An unreadable copy leaves a clean engine behind.
    persist.fail(true);
    assert_eq!(
        block_on(rebooted.restore(&mut persist.clone())),
        Err(hidreplay::Error::Storage)
    );
    assert_eq!(block_on(rebooted.step_count()), 0);
    assert!(!block_on(rebooted.config()).autorun);
}

#[test]
fn long_text_steps_are_kept_whole() {
    let engine = TestEngine::default();
    let mut link = Link::new(&engine, &MemoryPersistence::default(), &FakePeer::default());

    let text = "The quick brown fox jumps over the lazy dog. ".repeat(5);
    assert!(text.len() > 200);
    let add = format!(r#"add {{"type":"type","text":"{text}"}}"#);
    assert_eq!(link.request(&add), r#"{"ok":true,"index":0}"#);
    let set = format!(r#"set {{"steps":[{{"type":"wait"}},{{"type":"key","text":"{text}"}}]}}"#);
    assert_eq!(link.request(&set), OK);
    assert_eq!(block_on(engine.step_count()), 2);
    assert_eq!(
        block_on(engine.step(1)).map(|s| s.action),
        Some(Action::Key {
            combo: text.as_str().try_into().unwrap()
        })
    );

    let other = TestEngine::default();
    let mut other_link = Link::new(&other, &MemoryPersistence::default(), &FakePeer::default());
    let export = link.request("export");
    assert_eq!(other_link.request(&format!("import {export}")), OK);
    assert_eq!(block_on(other.step(1)), block_on(engine.step(1)));
}
