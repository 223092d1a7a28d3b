//! Instrument Identity Types
//!
//! Exchange-qualified instrument keys and the data classes they can be
//! subscribed under.
//!
//! # Design
//!
//! An instrument key is an opaque string: the exchange segment and the
//! instrument token joined by `|` (e.g. `"NSE|26000"`). The crate never
//! parses a key; it only joins keys with `#` when building a control frame
//! and splits such lists back apart. Whatever the platform accepts as a
//! key passes through unchanged.

use std::fmt;

// =============================================================================
// Types
// =============================================================================

/// An exchange-qualified instrument key (e.g. `"NSE|26000"`).
pub type InstrumentKey = String;

/// Delimiter between the exchange segment and the instrument token.
pub const KEY_DELIMITER: &str = "|";

/// Delimiter between instrument keys in a single control frame.
pub const LIST_DELIMITER: &str = "#";

/// Stream data class an instrument can be subscribed under.
///
/// Each class has an independent subscription set; subscribing a key for
/// one class has no effect on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataClass {
    /// Top-of-book/summary price updates (protocol name: touchline).
    Market,
    /// Full order-book-level updates.
    Depth,
}

impl DataClass {
    /// Get all data classes.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Market, Self::Depth]
    }

    /// Short lowercase name for logging and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Depth => "depth",
        }
    }
}

impl fmt::Display for DataClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Key Construction and Transport Form
// =============================================================================

/// Build an instrument key from an exchange segment and an instrument token.
#[must_use]
pub fn instrument_key(exchange: &str, token: &str) -> InstrumentKey {
    format!("{exchange}{KEY_DELIMITER}{token}")
}

/// Join keys into the `#`-delimited wire list form.
#[must_use]
pub fn join_keys(keys: &[InstrumentKey]) -> String {
    keys.join(LIST_DELIMITER)
}

/// Split a `#`-delimited wire list back into keys.
///
/// Empty segments are dropped, so a trailing delimiter does not produce a
/// phantom key.
#[must_use]
pub fn split_keys(list: &str) -> Vec<InstrumentKey> {
    list.split(LIST_DELIMITER)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
