//! Internal helpers shared across the engine operations.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Absolute tolerance when comparing stored currency amounts. Absorbs the
/// rounding noise of amounts derived from weight × price.
pub(crate) const BALANCE_TOLERANCE: f64 = 0.01;

/// Round a currency amount to two decimals.
pub(crate) fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| EngineError::InvalidArgument(format!("invalid {label} id")))
}

/// Append a line to an optional notes field without discarding history.
pub(crate) fn append_note(existing: Option<&str>, addition: &str) -> String {
    match existing {
        Some(current) if !current.trim().is_empty() => format!("{current}\n{addition}"),
        _ => addition.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_currency_two_decimals() {
        assert_eq!(round_currency(10.006), 10.01);
        assert_eq!(round_currency(10.004), 10.0);
        assert_eq!(round_currency(-0.016), -0.02);
        assert_eq!(round_currency(0.0), 0.0);
    }

    #[test]
    fn append_note_keeps_history() {
        assert_eq!(append_note(None, "first"), "first");
        assert_eq!(append_note(Some(""), "first"), "first");
        assert_eq!(append_note(Some("first"), "second"), "first\nsecond");
    }
}
