//! USB HID keyboard usage IDs (Usage Page 0x07) and a US-layout
//! character map.

pub const KEY_A: u8 = 0x04;
pub const KEY_1: u8 = 0x1E;
pub const KEY_0: u8 = 0x27;
pub const KEY_ENTER: u8 = 0x28;
pub const KEY_ESCAPE: u8 = 0x29;
pub const KEY_BACKSPACE: u8 = 0x2A;
pub const KEY_TAB: u8 = 0x2B;
pub const KEY_SPACE: u8 = 0x2C;
pub const KEY_MINUS: u8 = 0x2D;
pub const KEY_EQUAL: u8 = 0x2E;
pub const KEY_LEFT_BRACKET: u8 = 0x2F;
pub const KEY_RIGHT_BRACKET: u8 = 0x30;
pub const KEY_BACKSLASH: u8 = 0x31;
pub const KEY_SEMICOLON: u8 = 0x33;
pub const KEY_QUOTE: u8 = 0x34;
pub const KEY_GRAVE: u8 = 0x35;
pub const KEY_COMMA: u8 = 0x36;
pub const KEY_DOT: u8 = 0x37;
pub const KEY_SLASH: u8 = 0x38;
pub const KEY_F1: u8 = 0x3A;
pub const KEY_F12: u8 = 0x45;
pub const KEY_INSERT: u8 = 0x49;
pub const KEY_HOME: u8 = 0x4A;
pub const KEY_PAGE_UP: u8 = 0x4B;
pub const KEY_DELETE: u8 = 0x4C;
pub const KEY_END: u8 = 0x4D;
pub const KEY_PAGE_DOWN: u8 = 0x4E;
pub const KEY_RIGHT: u8 = 0x4F;
pub const KEY_LEFT: u8 = 0x50;
pub const KEY_DOWN: u8 = 0x51;
pub const KEY_UP: u8 = 0x52;

/// Map a character to `(usage, needs_shift)` on a US layout.
///
/// Returns `None` for characters a US keyboard can't produce directly
/// (non-ASCII, most control characters).
pub fn char_to_usage(c: char) -> Option<(u8, bool)> {
    Some(match c {
        'a'..='z' => (KEY_A + (c as u8 - b'a'), false),
        'A'..='Z' => (KEY_A + (c as u8 - b'A'), true),
        '1'..='9' => (KEY_1 + (c as u8 - b'1'), false),
        '0' => (KEY_0, false),
        '!' => (KEY_1, true),
        '@' => (KEY_1 + 1, true),
        '#' => (KEY_1 + 2, true),
        '$' => (KEY_1 + 3, true),
        '%' => (KEY_1 + 4, true),
        '^' => (KEY_1 + 5, true),
        '&' => (KEY_1 + 6, true),
        '*' => (KEY_1 + 7, true),
        '(' => (KEY_1 + 8, true),
        ')' => (KEY_0, true),
        '\n' | '\r' => (KEY_ENTER, false),
        '\t' => (KEY_TAB, false),
        '\x08' => (KEY_BACKSPACE, false),
        '\x1B' => (KEY_ESCAPE, false),
        ' ' => (KEY_SPACE, false),
        '-' => (KEY_MINUS, false),
        '_' => (KEY_MINUS, true),
        '=' => (KEY_EQUAL, false),
        '+' => (KEY_EQUAL, true),
        '[' => (KEY_LEFT_BRACKET, false),
        '{' => (KEY_LEFT_BRACKET, true),
        ']' => (KEY_RIGHT_BRACKET, false),
        '}' => (KEY_RIGHT_BRACKET, true),
        '\\' => (KEY_BACKSLASH, false),
        '|' => (KEY_BACKSLASH, true),
        ';' => (KEY_SEMICOLON, false),
        ':' => (KEY_SEMICOLON, true),
        '\'' => (KEY_QUOTE, false),
        '"' => (KEY_QUOTE, true),
        '`' => (KEY_GRAVE, false),
        '~' => (KEY_GRAVE, true),
        ',' => (KEY_COMMA, false),
        '<' => (KEY_COMMA, true),
        '.' => (KEY_DOT, false),
        '>' => (KEY_DOT, true),
        '/' => (KEY_SLASH, false),
        '?' => (KEY_SLASH, true),
        _ => return None,
    })
}

/// Usage for function key `Fn`, `n` in `1..=12`.
pub const fn function_key(n: u8) -> Option<u8> {
    if n >= 1 && n <= 12 {
        Some(KEY_F1 + n - 1)
    } else {
        None
    }
}
