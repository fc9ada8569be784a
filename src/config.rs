//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, capacities, and protocol constants live here
//! so they can be tuned in one place. Runtime-tunable values (calibration,
//! default delay, peer address) live in [`crate::engine::settings`].

// Macro store

/// Maximum number of steps in one macro.
pub const MAX_STEPS: usize = 160;

/// Capacity (bytes) of a step's text payload (`type` text or `key` combo).
/// Matches [`JSON_UNESCAPE_CAPACITY`], the longest string the wire decoder
/// can unescape.
pub const STEP_TEXT_CAPACITY: usize = JSON_UNESCAPE_CAPACITY;

/// Upper bound (bytes) of one `postcard`-encoded step: the text payload plus
/// length prefix, variant tag and the largest varint fields.
pub const STEP_RECORD_CAPACITY: usize = STEP_TEXT_CAPACITY + 16;

/// Capacity (bytes) of the peer host name.
pub const PEER_HOST_CAPACITY: usize = 64;

// Motion

/// Largest accepted pixel coordinate magnitude. Incoming coordinates are
/// clamped to `±COORD_LIMIT`.
pub const COORD_LIMIT: i32 = 65_535;

/// Largest per-report relative displacement on either axis.
pub const HID_MAX_DELTA: i32 = 127;

/// Number of maximal negative reports used to drive the cursor into the
/// top-left corner.
pub const HOME_REPORT_COUNT: usize = 30;

/// Pause after every relative motion report (ms).
pub const REPORT_PAUSE_MS: u32 = 1;

/// Settle time after homing, before the real move (ms).
pub const HOME_SETTLE_MS: u32 = 8;

/// Button hold time for a click (ms).
pub const CLICK_HOLD_MS: u32 = 25;

/// Settle time between reaching a drag start and pressing the button (ms).
pub const DRAG_PRESS_SETTLE_MS: u32 = 10;

/// Hold time after pressing the drag button before moving (ms).
pub const DRAG_HOLD_MS: u32 = 15;

/// Settle time after the last drag waypoint before releasing (ms).
pub const DRAG_RELEASE_SETTLE_MS: u32 = 10;

/// Pause between the two halves of the pass wake-up nudge (ms).
pub const NUDGE_PAUSE_MS: u32 = 5;

// Keyboard

/// Pause after each typed character (ms).
pub const TYPE_PACE_MS: u32 = 5;

// Runner

/// Longest pause between two loop passes (ms). A stop request ends it early.
pub const INTER_PASS_PAUSE_MS: u32 = 200;

// Engine defaults

pub const DEFAULT_SCREEN_WIDTH: u16 = 1920;
pub const DEFAULT_SCREEN_HEIGHT: u16 = 1080;
pub const DEFAULT_COUNTS_PER_PIXEL: f32 = 5.0;
pub const DEFAULT_POST_DELAY_MS: u32 = 1500;
pub const DEFAULT_DRAG_DURATION_MS: u32 = 600;
pub const DEFAULT_PEER_HOST: &str = "127.0.0.1";
pub const DEFAULT_PEER_PORT: u16 = 5005;

// Peer position service

/// Timeout for an immediate position query (ms).
pub const PEER_POS_TIMEOUT_MS: u64 = 3_000;

/// Timeout for a delayed capture, on top of the capture delay (ms).
pub const PEER_CAPTURE_TIMEOUT_MS: u64 = 35_000;

/// Capture delay used when the request doesn't name one (s).
pub const PEER_CAPTURE_DEFAULT_DELAY_S: u8 = 3;

/// Longest accepted capture delay (s).
pub const PEER_CAPTURE_MAX_DELAY_S: u8 = 30;

// Control link

/// Longest accepted control line, including a full `import` envelope.
pub const CONTROL_LINE_CAPACITY: usize = 32 * 1024;

/// Size of the response buffer for a single control line.
pub const CONTROL_RESPONSE_CAPACITY: usize = 32 * 1024;

/// Scratch space for unescaping JSON strings.
pub const JSON_UNESCAPE_CAPACITY: usize = 256;

// USB

/// USB VID/PID - use the "pid.codes" open-source test VID.
/// Replace with your own allocated VID/PID for production.
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0002;

/// USB device strings.
pub const USB_MANUFACTURER: &str = "hidreplay";
pub const USB_PRODUCT: &str = "HID Macro Replayer";
pub const USB_SERIAL_NUMBER: &str = "000001";

/// USB HID polling interval (ms). 1 ms = 1000 Hz for lowest latency.
pub const USB_HID_POLL_MS: u8 = 1;

/// Max packet size of the CDC-ACM control interface.
pub const USB_CDC_PACKET_SIZE: u16 = 64;

// Macro storage

/// Flash page index where macro storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 236;

/// Number of flash pages reserved for macro storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 20;
