//! Runner behaviour against recorded HID output and a virtual clock.

mod common;

use embassy_futures::{block_on, join::join, yield_now};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use common::{RecordingSink, TickingClock, VirtualClock};
use hidreplay::engine::{
    Button, ConfigPatch, Engine, EngineConfig, Phase, Point, Runner, Step, StepStore,
};
use hidreplay::config::{COORD_LIMIT, INTER_PASS_PAUSE_MS, NUDGE_PAUSE_MS};
use hidreplay::control::wire::parse_step;
use hidreplay::hid::mouse::button;
use hidreplay::hid::HidReport;
use hidreplay::ReportSink;

type TestEngine = Engine<NoopRawMutex>;

fn engine_with(steps: impl IntoIterator<Item = Step>) -> TestEngine {
    let mut store = StepStore::new();
    for step in steps {
        store.push(step).unwrap();
    }
    Engine::new(EngineConfig::default(), store)
}

/// Distance covered by one homing sweep on each axis.
const HOME: i64 = -30 * 127;

#[test]
fn run_once_taps_at_target() {
    let engine = engine_with([Step::tap(Point::new(10, 20), Button::Left)]);
    let sink = RecordingSink::default();
    let mut runner = Runner::new(&engine, sink.clone(), VirtualClock::default());

    engine.start_once().unwrap();
    block_on(runner.serve());

    assert_eq!(sink.nudges(), 1);
    // Home, then 10×20 px at 5 counts per pixel.
    assert_eq!(sink.total_motion(), (HOME + 50, HOME + 100));
    let presses: Vec<_> = sink.mouse().into_iter().filter(|m| m.buttons != 0).collect();
    assert_eq!(presses.len(), 1);
    assert_eq!(presses[0].buttons, button::LEFT);
    assert_eq!(sink.mouse().last().map(|m| m.buttons), Some(0));
    assert_eq!(engine.runner().phase(), Phase::Idle);
}

#[test]
fn loop_runs_exactly_n_passes() {
    let engine = engine_with([Step::wait(0)]);
    let sink = RecordingSink::default();
    let clock = VirtualClock::default();
    let mut runner = Runner::new(&engine, sink.clone(), clock.clone());

    engine.start_loop(3).unwrap();
    block_on(runner.serve());

    assert_eq!(sink.nudges(), 3);
    let snap = engine.runner().snapshot();
    assert_eq!(snap.phase, Phase::Idle);
    assert_eq!(snap.loops_remaining, 0);
    assert_eq!(snap.step, 0);
    // Three default post-delays plus two inter-pass pauses at least.
    assert!(clock.elapsed_ms() >= 3 * 1500 + 2 * 200);
}

#[test]
fn endless_loop_stops_on_request() {
    let engine = engine_with([Step::wait(100), Step::wait(100)]);
    let sink = RecordingSink::default();
    let mut runner = Runner::new(&engine, sink.clone(), VirtualClock::default());

    engine.start_loop(0).unwrap();
    block_on(join(runner.serve(), async {
        for _ in 0..40 {
            yield_now().await;
        }
        assert_eq!(engine.runner().snapshot().loops_remaining, -1);
        engine.stop();
    }));

    assert!(sink.nudges() >= 1);
    assert!(engine.runner().is_idle());
    // A fresh start works after a stop.
    engine.start_once().unwrap();
}

#[test]
fn stop_cuts_the_inter_pass_pause_short() {
    let engine = engine_with([Step::wait(1)]);
    let sink = RecordingSink::default();
    let clock = TickingClock::default();
    let mut runner = Runner::new(&engine, sink.clone(), clock.clone());

    // One pass: the nudge's two pauses plus the step's post-delay.
    let pass_ms = u64::from(2 * NUDGE_PAUSE_MS + 1);
    let pause_ms = u64::from(INTER_PASS_PAUSE_MS);
    let stop_at = pass_ms + pause_ms / 4;

    engine.start_loop(0).unwrap();
    let (_, stopped_at) = block_on(join(runner.serve(), async {
        while clock.elapsed_ms() < stop_at {
            yield_now().await;
        }
        assert_eq!(sink.nudges(), 1);
        engine.stop();
        clock.elapsed_ms()
    }));

    assert!(engine.runner().is_idle());
    assert!(clock.elapsed_ms() - stopped_at < pause_ms);
    assert!(clock.elapsed_ms() < pass_ms + pause_ms);
    // No second pass began.
    assert_eq!(sink.nudges(), 1);
}

#[test]
fn far_off_drag_is_clamped_and_lands() {
    let step =
        parse_step(r#"{"type":"drag","x":-2000000000,"y":0,"x2":2000000000,"y2":0,"durMs":0}"#)
            .unwrap();
    let engine = engine_with([step]);
    let sink = RecordingSink::default();
    let mut runner = Runner::new(&engine, sink.clone(), VirtualClock::default());

    engine.start_once().unwrap();
    block_on(runner.serve());

    // Home, to the clamped start (which the corner stops at), then across.
    let limit = i64::from(COORD_LIMIT) * 5;
    assert_eq!(sink.total_motion(), (HOME - limit + 2 * limit, HOME));
    assert_eq!(sink.mouse().last().map(|m| m.buttons), Some(0));
    assert!(engine.runner().is_idle());
}

#[test]
fn serve_waits_for_a_start() {
    let engine = engine_with([Step::wait(0)]);
    let sink = RecordingSink::default();
    let mut runner = Runner::new(&engine, sink.clone(), VirtualClock::default());

    block_on(join(runner.serve(), async {
        for _ in 0..5 {
            yield_now().await;
        }
        assert!(sink.mouse().is_empty());
        engine.start_once().unwrap();
    }));

    assert_eq!(sink.nudges(), 1);
    assert!(engine.runner().is_idle());
}

/// Requests a stop as soon as any mouse button goes down.
struct StopOnPress<'a> {
    engine: &'a TestEngine,
    log: RecordingSink,
}

impl ReportSink for StopOnPress<'_> {
    async fn send(&mut self, report: HidReport) {
        if matches!(report, HidReport::Mouse(m) if m.buttons != 0) {
            self.engine.stop();
        }
        self.log.send(report).await;
    }
}

#[test]
fn stop_mid_drag_releases_and_skips_the_rest() {
    let engine = engine_with([
        Step::drag(Point::new(0, 0), Point::new(100, 0), Button::Right),
        Step::type_text("x").unwrap(),
    ]);
    let log = RecordingSink::default();
    let sink = StopOnPress {
        engine: &engine,
        log: log.clone(),
    };
    let mut runner = Runner::new(&engine, sink, VirtualClock::default());

    engine.start_loop(0).unwrap();
    block_on(runner.serve());

    // The drag finishes with its button released; the next step never runs.
    assert_eq!(log.mouse().last().map(|m| m.buttons), Some(0));
    assert!(log.keyboard().iter().all(|k| k.keycodes == [0; 6]));
    assert_eq!(log.nudges(), 1);
    assert!(engine.runner().is_idle());
}

/// Drops the calibration to 1 count per pixel after the first click.
struct RecalibrateAfterClick<'a> {
    engine: &'a TestEngine,
    log: RecordingSink,
    pressed: bool,
    done: bool,
}

impl ReportSink for RecalibrateAfterClick<'_> {
    async fn send(&mut self, report: HidReport) {
        if let HidReport::Mouse(m) = report {
            if m.buttons != 0 {
                self.pressed = true;
            } else if self.pressed && !self.done {
                let patch = ConfigPatch {
                    counts_per_pixel: Some(1.0),
                    ..Default::default()
                };
                self.engine.update_config(&patch).await;
                self.done = true;
            }
        }
        self.log.send(report).await;
    }
}

#[test]
fn config_changes_apply_from_the_next_step() {
    let target = Point::new(10, 0);
    let engine = engine_with([
        Step::tap(target, Button::Left),
        Step::tap(target, Button::Left),
    ]);
    let log = RecordingSink::default();
    let sink = RecalibrateAfterClick {
        engine: &engine,
        log: log.clone(),
        pressed: false,
        done: false,
    };
    let mut runner = Runner::new(&engine, sink, VirtualClock::default());

    engine.start_once().unwrap();
    block_on(runner.serve());

    // First tap at 5 counts per pixel, second at 1.
    assert_eq!(log.total_motion(), (2 * HOME + 50 + 10, 2 * HOME));
}

#[test]
fn typed_text_reaches_the_keyboard() {
    let engine = engine_with([Step::type_text("Hi").unwrap()]);
    let sink = RecordingSink::default();
    let mut runner = Runner::new(&engine, sink.clone(), VirtualClock::default());

    engine.start_once().unwrap();
    block_on(runner.serve());

    let pressed: Vec<_> = sink
        .keyboard()
        .into_iter()
        .filter(|k| k.keycodes[0] != 0)
        .collect();
    assert_eq!(pressed.len(), 2);
    // 'H' needs shift, 'i' doesn't.
    assert_eq!(pressed[0].modifier & 0x02, 0x02);
    assert_eq!(pressed[0].keycodes[0], 0x0B);
    assert_eq!(pressed[1].modifier, 0);
    assert_eq!(pressed[1].keycodes[0], 0x0C);
    assert!(sink.keyboard().last().unwrap().is_empty());
}
