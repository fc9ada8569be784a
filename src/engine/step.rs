//! Step model: one recorded macro action.
//!
//! Each kind carries exactly the payload it needs; the flat record with
//! every field present only exists at the wire boundary
//! ([`crate::control::wire`]).

use core::num::NonZeroU16;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DRAG_DURATION_MS, STEP_TEXT_CAPACITY};
use crate::hid::mouse::button;

/// Text payload of a `Type` or `Key` step.
pub type StepText = heapless::String<STEP_TEXT_CAPACITY>;

/// Mouse button used by taps and drags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    #[default]
    Left,
    Right,
    Middle,
}

impl Button {
    /// Bit in the HID mouse report's button field.
    pub const fn mask(self) -> u8 {
        match self {
            Button::Left => button::LEFT,
            Button::Right => button::RIGHT,
            Button::Middle => button::MIDDLE,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Button::Left => "left",
            Button::Right => "right",
            Button::Middle => "middle",
        }
    }

    /// Parse a button name, case-insensitively. Unknown names are `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        [Button::Left, Button::Right, Button::Middle]
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(name))
    }
}

/// A screen position in pixels, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Discriminant of [`Action`], used for display and the wire `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepKind {
    Tap,
    Drag,
    Type,
    Key,
    Wait,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::Tap,
        StepKind::Drag,
        StepKind::Type,
        StepKind::Key,
        StepKind::Wait,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            StepKind::Tap => "tap",
            StepKind::Drag => "drag",
            StepKind::Type => "type",
            StepKind::Key => "key",
            StepKind::Wait => "wait",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

/// What a step does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Move to `at` and click `button`.
    Tap { at: Point, button: Button },
    /// Press `button` at `from`, move to `to` through `steps` waypoints
    /// spread over `duration_ms`, release.
    Drag {
        from: Point,
        to: Point,
        button: Button,
        duration_ms: u32,
        steps: NonZeroU16,
    },
    /// Type `text` literally, one character at a time.
    Type { text: StepText },
    /// Send a key combo such as `ctrl+shift+s`.
    Key { combo: StepText },
    /// Do nothing; only the post delay applies.
    Wait,
}

/// One macro action plus the delay that follows it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Step {
    pub action: Action,
    /// Delay after the action (ms). `0` means "use the engine default".
    pub post_delay_ms: u32,
}

impl Step {
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            post_delay_ms: 0,
        }
    }

    pub const fn tap(at: Point, button: Button) -> Self {
        Self::new(Action::Tap { at, button })
    }

    /// A drag with the default duration and a single waypoint.
    pub const fn drag(from: Point, to: Point, button: Button) -> Self {
        Self::new(Action::Drag {
            from,
            to,
            button,
            duration_ms: DEFAULT_DRAG_DURATION_MS,
            steps: NonZeroU16::MIN,
        })
    }

    pub const fn wait(ms: u32) -> Self {
        Self {
            action: Action::Wait,
            post_delay_ms: ms,
        }
    }

    /// A `Type` step. Fails if `text` exceeds the payload capacity.
    pub fn type_text(text: &str) -> Option<Self> {
        let text = StepText::try_from(text).ok()?;
        Some(Self::new(Action::Type { text }))
    }

    /// A `Key` step. Fails if `combo` exceeds the payload capacity.
    pub fn key(combo: &str) -> Option<Self> {
        let combo = StepText::try_from(combo).ok()?;
        Some(Self::new(Action::Key { combo }))
    }

    pub const fn with_post_delay(mut self, ms: u32) -> Self {
        self.post_delay_ms = ms;
        self
    }

    pub const fn kind(&self) -> StepKind {
        match self.action {
            Action::Tap { .. } => StepKind::Tap,
            Action::Drag { .. } => StepKind::Drag,
            Action::Type { .. } => StepKind::Type,
            Action::Key { .. } => StepKind::Key,
            Action::Wait => StepKind::Wait,
        }
    }

    /// The delay to apply after this step, given the engine default.
    pub const fn effective_post_delay(&self, default_ms: u32) -> u32 {
        if self.post_delay_ms > 0 {
            self.post_delay_ms
        } else {
            default_ms
        }
    }
}

/// Clamp a requested waypoint count into the valid range (at least one).
pub fn interpolation_steps(requested: i64) -> NonZeroU16 {
    let clamped = requested.clamp(1, u16::MAX as i64) as u16;
    NonZeroU16::new(clamped).unwrap_or(NonZeroU16::MIN)
}
