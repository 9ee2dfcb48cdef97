//! Kick-message templates, one per reject reason.

use crate::verdict::RejectReason;

/// Alternate formatting marker accepted in configured messages.
const ALT_COLOR_CHAR: char = '&';
/// Formatting marker understood by legacy clients.
const COLOR_CHAR: char = '\u{a7}';

/// Formatting codes that may follow the alternate marker.
const COLOR_CODES: &str = "0123456789AaBbCcDdEeFfKkLlMmNnOoRrXx";

/// The set of kick messages shown to rejected connections.
///
/// Loaded once at startup, immutable afterwards.
#[derive(Debug, Clone)]
pub struct KickMessages {
    /// Shown on [`RejectReason::NoProperties`].
    pub no_properties: String,
    /// Shown on [`RejectReason::NoToken`].
    pub no_token: String,
    /// Shown on [`RejectReason::InvalidToken`].
    pub invalid_token: String,
    /// Shown on [`RejectReason::AlreadyOnline`].
    pub already_online: String,
    /// Shown on [`RejectReason::Internal`] (fail-closed path).
    pub internal_error: String,
}

impl KickMessages {
    /// The message configured for `reason`.
    pub fn for_reason(&self, reason: RejectReason) -> &str {
        match reason {
            RejectReason::NoProperties => &self.no_properties,
            RejectReason::NoToken => &self.no_token,
            RejectReason::InvalidToken => &self.invalid_token,
            RejectReason::AlreadyOnline => &self.already_online,
            RejectReason::Internal => &self.internal_error,
        }
    }
}

/// Translate `&x` formatting sequences into the legacy `§x` form.
///
/// Only `&` followed by a known formatting code is rewritten; any other `&`
/// passes through untouched.
pub fn translate_color_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ALT_COLOR_CHAR {
            if let Some(&next) = chars.peek() {
                if COLOR_CODES.contains(next) {
                    out.push(COLOR_CHAR);
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
