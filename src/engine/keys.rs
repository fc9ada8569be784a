//! Key combo expressions and literal text typing.
//!
//! A combo is `+`-separated tokens, e.g. `ctrl+shift+s`, `f5`, `return`.
//! Every token but the last must name a modifier; the last is the main key,
//! looked up in a named-key table and otherwise typed literally with the
//! modifiers held. Matching is case-insensitive and ignores surrounding
//! whitespace.

use embedded_hal_async::delay::DelayNs;

use crate::config::TYPE_PACE_MS;
use crate::hid::keyboard::modifier;
use crate::hid::keycodes::{self, function_key};
use crate::hid::ReportSink;

use super::emitter::Emitter;

/// Most distinct modifiers a combo can hold.
const MAX_COMBO_MODIFIERS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Gui,
}

impl Modifier {
    pub fn from_name(name: &str) -> Option<Self> {
        const NAMES: &[(&str, Modifier)] = &[
            ("ctrl", Modifier::Ctrl),
            ("control", Modifier::Ctrl),
            ("alt", Modifier::Alt),
            ("shift", Modifier::Shift),
            ("gui", Modifier::Gui),
            ("cmd", Modifier::Gui),
            ("win", Modifier::Gui),
        ];
        let name = name.trim();
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, m)| *m)
    }

    /// Bit in the keyboard report's modifier byte.
    pub const fn bits(self) -> u8 {
        match self {
            Modifier::Ctrl => modifier::LEFT_CTRL,
            Modifier::Alt => modifier::LEFT_ALT,
            Modifier::Shift => modifier::LEFT_SHIFT,
            Modifier::Gui => modifier::LEFT_GUI,
        }
    }
}

/// Look up a named key (`enter`, `esc`, `f5`, ...).
pub fn named_key(name: &str) -> Option<u8> {
    const NAMES: &[(&str, u8)] = &[
        ("enter", keycodes::KEY_ENTER),
        ("return", keycodes::KEY_ENTER),
        ("esc", keycodes::KEY_ESCAPE),
        ("escape", keycodes::KEY_ESCAPE),
        ("tab", keycodes::KEY_TAB),
        ("space", keycodes::KEY_SPACE),
        ("spacebar", keycodes::KEY_SPACE),
        ("backspace", keycodes::KEY_BACKSPACE),
        ("delete", keycodes::KEY_DELETE),
        ("del", keycodes::KEY_DELETE),
        ("up", keycodes::KEY_UP),
        ("down", keycodes::KEY_DOWN),
        ("left", keycodes::KEY_LEFT),
        ("right", keycodes::KEY_RIGHT),
        ("home", keycodes::KEY_HOME),
        ("end", keycodes::KEY_END),
        ("pageup", keycodes::KEY_PAGE_UP),
        ("pagedown", keycodes::KEY_PAGE_DOWN),
        ("insert", keycodes::KEY_INSERT),
    ];
    let name = name.trim();
    if let Some((_, usage)) = NAMES.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        return Some(*usage);
    }
    let digits = name
        .strip_prefix('f')
        .or_else(|| name.strip_prefix('F'))?;
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    function_key(digits.parse().ok()?)
}

/// The key sent after the modifiers are down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MainKey<'a> {
    /// A key from the named-key table.
    Usage(u8),
    /// Anything else, typed character by character.
    Literal(&'a str),
}

/// A parsed combo expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCombo<'a> {
    /// In the order they are pressed, without duplicates.
    pub modifiers: heapless::Vec<Modifier, MAX_COMBO_MODIFIERS>,
    /// `None` when the expression names modifiers only.
    pub key: Option<MainKey<'a>>,
}

impl<'a> KeyCombo<'a> {
    /// Parse `expr`. Returns `None` for expressions that do nothing: empty
    /// input, a trailing `+`, or a non-modifier before the last token.
    pub fn parse(expr: &'a str) -> Option<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }

        let mut tokens = expr.split('+').map(str::trim);
        let last = tokens.next_back()?;
        if last.is_empty() {
            return None;
        }

        let mut modifiers = heapless::Vec::new();
        for token in tokens {
            add_modifier(&mut modifiers, Modifier::from_name(token)?);
        }

        let key = if let Some(usage) = named_key(last) {
            Some(MainKey::Usage(usage))
        } else if let Some(m) = Modifier::from_name(last) {
            add_modifier(&mut modifiers, m);
            None
        } else {
            Some(MainKey::Literal(last))
        };

        Some(Self { modifiers, key })
    }
}

fn add_modifier(list: &mut heapless::Vec<Modifier, MAX_COMBO_MODIFIERS>, m: Modifier) {
    // Four variants, four slots: a new one always fits.
    if !list.contains(&m) {
        let _ = list.push(m);
    }
}

impl<S: ReportSink, D: DelayNs> Emitter<S, D> {
    /// Press the modifiers in order, send the main key, release the
    /// modifiers in reverse order.
    pub async fn send_combo(&mut self, combo: &KeyCombo<'_>) {
        for m in &combo.modifiers {
            self.press_modifier(m.bits()).await;
        }
        match combo.key {
            Some(MainKey::Usage(usage)) => self.tap_key(usage).await,
            Some(MainKey::Literal(text)) => {
                for c in text.chars() {
                    if !self.type_char(c).await {
                        warn!("combo: no key for {}", c);
                    }
                }
            }
            None => {}
        }
        for m in combo.modifiers.iter().rev() {
            self.release_modifier(m.bits()).await;
        }
    }

    /// Parse and send a combo expression. Invalid expressions send nothing.
    pub async fn key_combo(&mut self, expr: &str) {
        match KeyCombo::parse(expr) {
            Some(combo) => self.send_combo(&combo).await,
            None => warn!("combo: ignoring '{}'", expr),
        }
    }

    /// Type `text` one character at a time, pausing after each.
    pub async fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            if !self.type_char(c).await {
                warn!("type: no key for {}", c);
            }
            self.pause_ms(TYPE_PACE_MS).await;
        }
    }
}
