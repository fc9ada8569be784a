//! Runtime-tunable engine configuration.
//!
//! Unlike the constants in [`crate::config`], these values are edited over
//! the control link and persisted alongside the macro. The runner reads a
//! fresh copy at the start of every step, so a change applies from the next
//! action onwards.

use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_COUNTS_PER_PIXEL, DEFAULT_PEER_HOST, DEFAULT_PEER_PORT, DEFAULT_POST_DELAY_MS,
    DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH, PEER_HOST_CAPACITY,
};

pub type PeerHost = heapless::String<PEER_HOST_CAPACITY>;

/// Calibration, default delay and peer address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Screen width in pixels. Informational only; targets are not checked
    /// against it.
    #[serde(rename = "w")]
    pub screen_width: u16,
    #[serde(rename = "h")]
    pub screen_height: u16,
    /// Device motion units per screen pixel.
    #[serde(rename = "cpp")]
    pub counts_per_pixel: f32,
    /// Delay applied after a step whose own delay is 0 (ms).
    #[serde(rename = "delay")]
    pub default_post_delay_ms: u32,
    /// Start an infinite loop at boot.
    pub autorun: bool,
    #[serde(rename = "host")]
    pub peer_host: PeerHost,
    #[serde(rename = "port")]
    pub peer_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            counts_per_pixel: DEFAULT_COUNTS_PER_PIXEL,
            default_post_delay_ms: DEFAULT_POST_DELAY_MS,
            autorun: false,
            peer_host: default_peer_host(),
            peer_port: DEFAULT_PEER_PORT,
        }
    }
}

fn default_peer_host() -> PeerHost {
    let mut host = PeerHost::new();
    // Fits: the default is shorter than the capacity.
    let _ = host.push_str(DEFAULT_PEER_HOST);
    host
}

impl EngineConfig {
    /// Merge the keys present in `patch`, leaving the others untouched.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(w) = patch.screen_width {
            self.screen_width = w;
        }
        if let Some(h) = patch.screen_height {
            self.screen_height = h;
        }
        if let Some(cpp) = patch.counts_per_pixel {
            if cpp.is_finite() && cpp > 0.0 {
                self.counts_per_pixel = cpp;
            }
        }
        if let Some(delay) = patch.default_post_delay_ms {
            self.default_post_delay_ms = delay;
        }
        if let Some(autorun) = patch.autorun {
            self.autorun = autorun;
        }
        if let Some(host) = &patch.peer_host {
            self.peer_host = host.clone();
        }
        if let Some(port) = patch.peer_port {
            self.peer_port = port;
        }
    }
}

/// A partial [`EngineConfig`]: every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ConfigPatch {
    #[serde(rename = "w", default)]
    pub screen_width: Option<u16>,
    #[serde(rename = "h", default)]
    pub screen_height: Option<u16>,
    #[serde(rename = "cpp", default)]
    pub counts_per_pixel: Option<f32>,
    #[serde(rename = "delay", default)]
    pub default_post_delay_ms: Option<u32>,
    #[serde(default)]
    pub autorun: Option<bool>,
    #[serde(rename = "host", default)]
    pub peer_host: Option<PeerHost>,
    #[serde(rename = "port", default)]
    pub peer_port: Option<u16>,
}
