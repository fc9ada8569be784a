//! JSON wire records for the control link.
//!
//! Steps travel as a flat record with every field optional:
//!
//! ```text
//! { "type": "tap"|"drag"|"type"|"key"|"wait",
//!   "x","y","x2","y2": int, "text": string,
//!   "btn": "left"|"right"|"middle"   (alias "button"),
//!   "delayMs": int                   (alias "ms"),
//!   "durMs": int, "stepsN": int }
//! ```
//!
//! Incoming records are validated into [`Step`] as soon as they are
//! parsed; an unknown `type` rejects the whole payload. Outgoing records
//! always carry every field.

use core::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::config::{COORD_LIMIT, DEFAULT_DRAG_DURATION_MS};
use crate::engine::settings::{ConfigPatch, EngineConfig};
use crate::engine::step::{interpolation_steps, Action, Button, Point, Step, StepKind, StepText};
use crate::engine::StepStore;
use crate::error::Error;

/// Longest accepted `type` or `btn` value.
type Word = heapless::String<16>;

/// A step as received. Everything is optional; [`StepRecord::into_step`]
/// applies the defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StepRecord {
    #[serde(rename = "type")]
    pub kind: Option<Word>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub x2: Option<i32>,
    pub y2: Option<i32>,
    pub text: Option<StepText>,
    #[serde(alias = "button")]
    pub btn: Option<Word>,
    #[serde(rename = "delayMs", alias = "ms")]
    pub delay_ms: Option<i64>,
    #[serde(rename = "durMs")]
    pub dur_ms: Option<i64>,
    #[serde(rename = "stepsN")]
    pub steps_n: Option<i64>,
}

fn clamp_ms(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

fn point(x: Option<i32>, y: Option<i32>) -> Point {
    let clamp = |v: Option<i32>| v.unwrap_or(0).clamp(-COORD_LIMIT, COORD_LIMIT);
    Point::new(clamp(x), clamp(y))
}

impl StepRecord {
    pub fn into_step(self) -> Result<Step, Error> {
        let kind = self
            .kind
            .as_deref()
            .and_then(StepKind::from_name)
            .ok_or(Error::MalformedInput)?;
        // Unknown button names fall back to the left button.
        let button = self
            .btn
            .as_deref()
            .and_then(Button::from_name)
            .unwrap_or_default();
        let at = point(self.x, self.y);

        let action = match kind {
            StepKind::Tap => Action::Tap { at, button },
            StepKind::Drag => Action::Drag {
                from: at,
                to: point(self.x2, self.y2),
                button,
                duration_ms: self
                    .dur_ms
                    .map(clamp_ms)
                    .unwrap_or(DEFAULT_DRAG_DURATION_MS),
                steps: interpolation_steps(self.steps_n.unwrap_or(1)),
            },
            StepKind::Type => Action::Type {
                text: self.text.unwrap_or_default(),
            },
            StepKind::Key => Action::Key {
                combo: self.text.unwrap_or_default(),
            },
            StepKind::Wait => Action::Wait,
        };

        Ok(Step {
            action,
            post_delay_ms: self.delay_ms.map(clamp_ms).unwrap_or(0),
        })
    }
}

/// Parse a single step record.
pub fn parse_step(json: &str) -> Result<Step, Error> {
    let record: StepRecord = from_str(json)?;
    record.into_step()
}

/// A step as sent.
#[derive(Serialize)]
pub struct StepOut<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    x: i32,
    y: i32,
    x2: i32,
    y2: i32,
    text: &'a str,
    btn: &'static str,
    #[serde(rename = "delayMs")]
    delay_ms: u32,
    #[serde(rename = "durMs")]
    dur_ms: u32,
    #[serde(rename = "stepsN")]
    steps_n: u16,
}

impl<'a> From<&'a Step> for StepOut<'a> {
    fn from(step: &'a Step) -> Self {
        let mut out = StepOut {
            kind: step.kind().name(),
            x: 0,
            y: 0,
            x2: 0,
            y2: 0,
            text: "",
            btn: Button::default().name(),
            delay_ms: step.post_delay_ms,
            dur_ms: DEFAULT_DRAG_DURATION_MS,
            steps_n: 1,
        };
        match &step.action {
            Action::Tap { at, button } => {
                (out.x, out.y) = (at.x, at.y);
                out.btn = button.name();
            }
            Action::Drag {
                from,
                to,
                button,
                duration_ms,
                steps,
            } => {
                (out.x, out.y, out.x2, out.y2) = (from.x, from.y, to.x, to.y);
                out.btn = button.name();
                out.dur_ms = *duration_ms;
                out.steps_n = steps.get();
            }
            Action::Type { text } => out.text = text.as_str(),
            Action::Key { combo } => out.text = combo.as_str(),
            Action::Wait => {}
        }
        out
    }
}

/// Serializes a step slice as a JSON array of [`StepOut`].
pub struct StepsOut<'a>(pub &'a [Step]);

impl Serialize for StepsOut<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(StepOut::from))
    }
}

#[derive(Serialize)]
pub struct StepsReply<'a> {
    pub steps: StepsOut<'a>,
}

/// `export` response.
#[derive(Serialize)]
pub struct ExportReply<'a> {
    pub config: &'a EngineConfig,
    pub steps: StepsOut<'a>,
}

/// An array of step records, validated and truncated to capacity.
#[derive(Clone, Debug, Default)]
pub struct StepList {
    pub steps: StepStore,
    /// Valid records that did not fit.
    pub dropped: usize,
}

impl<'de> Deserialize<'de> for StepList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(StepListVisitor)
    }
}

struct StepListVisitor;

impl<'de> Visitor<'de> for StepListVisitor {
    type Value = StepList;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of steps")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StepList, A::Error> {
        let mut list = StepList::default();
        // Records past capacity are still validated so a bad one anywhere
        // rejects the payload.
        while let Some(record) = seq.next_element::<StepRecord>()? {
            let step = record
                .into_step()
                .map_err(|_| <A::Error as de::Error>::custom("unknown step type"))?;
            if list.steps.push(step).is_err() {
                list.dropped += 1;
            }
        }
        Ok(list)
    }
}

/// `set` request: `{"steps":[...]}`. A missing array means "no steps".
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetSteps {
    pub steps: Option<StepList>,
}

/// `import` request and the shape of `export`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub config: Option<ConfigPatch>,
    pub steps: Option<StepList>,
}

/// `tap-here` request.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TapHere {
    #[serde(alias = "button")]
    pub btn: Option<Word>,
    #[serde(rename = "delayMs", alias = "ms")]
    pub delay_ms: Option<i64>,
    /// Capture after this many seconds instead of reading the position now.
    pub capture: Option<u8>,
}

impl TapHere {
    pub fn into_step(self, at: Point) -> Step {
        let button = self
            .btn
            .as_deref()
            .and_then(Button::from_name)
            .unwrap_or_default();
        Step::tap(at, button).with_post_delay(self.delay_ms.map(clamp_ms).unwrap_or(0))
    }
}

/// Reply of the peer position service: `{"x":..,"y":..}`, or
/// `{"ok":false,"error":..}` on failure.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PeerReply {
    pub x: Option<i32>,
    pub y: Option<i32>,
}

impl PeerReply {
    pub fn position(&self) -> Result<Point, Error> {
        match (self.x, self.y) {
            (Some(_), Some(_)) => Ok(point(self.x, self.y)),
            _ => Err(Error::UnreachablePeer),
        }
    }
}

/// A position answer arriving on the request side of the link, left over
/// from a peer query that already timed out.
pub fn is_peer_reply(line: &str) -> bool {
    line.trim_start().starts_with('{')
        && from_str::<PeerReply>(line).is_ok_and(|reply| reply.position().is_ok())
}

#[derive(Serialize)]
pub struct OkReply {
    pub ok: bool,
}

pub const OK: OkReply = OkReply { ok: true };

#[derive(Serialize)]
pub struct Added {
    pub ok: bool,
    pub index: usize,
}

#[derive(Serialize)]
pub struct ErrorReply {
    pub error: &'static str,
}

/// Deserialize `json`, unescaping strings through a scratch buffer.
pub fn from_str<'a, T: Deserialize<'a>>(json: &'a str) -> Result<T, Error> {
    let mut scratch = [0u8; crate::config::JSON_UNESCAPE_CAPACITY];
    let (value, _) = serde_json_core::from_str_escaped(json, &mut scratch)?;
    Ok(value)
}

/// Serialize `value` into `out`, returning the length written.
pub fn to_slice<T: Serialize + ?Sized>(value: &T, out: &mut [u8]) -> Result<usize, Error> {
    Ok(serde_json_core::to_slice(value, out)?)
}
