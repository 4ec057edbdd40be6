//! Maintenance window detection
//!
//! Presence only. Whether the window is sensible is a scheduling concern.

use once_cell::sync::Lazy;
use regex::Regex;

static WINDOW_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([01]?\d|2[0-3]):[0-5]\d\s*(-|–|to)\s*([01]?\d|2[0-3]):[0-5]\d\b")
        .expect("window pattern is a valid regex")
});

/// Whether the text contains an `HH:MM-HH:MM` style range
#[must_use]
pub fn references_window(text: &str) -> bool {
    WINDOW_RANGE.is_match(text)
}
