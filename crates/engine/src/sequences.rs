//! Date-scoped invoice number primitives.
//!
//! Numbers are an 8-digit date prefix (`YYYYMMDD`) plus a 4-digit zero-padded
//! sequence; collision retries may append a `-NN` suffix. The
//! `invoice_sequences` table holds one counter row per prefix.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;

pub(crate) fn date_prefix(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub(crate) fn format_number(prefix: &str, seq: i64) -> String {
    format!("{prefix}{seq:04}")
}

/// Parse the numeric sequence out of `number`, ignoring any disambiguating
/// suffix after `-`. Returns `None` for numbers not in the standard format
/// (e.g. timestamp fallbacks).
pub(crate) fn parse_sequence(number: &str, prefix: &str) -> Option<i64> {
    let trailing = number.strip_prefix(prefix)?;
    let digits = trailing.split('-').next()?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Degraded identifier used when the sequence tables cannot be read; second
/// granularity keeps it unique with overwhelming probability.
pub(crate) fn timestamp_number(now: DateTime<Utc>) -> String {
    format!("INV-{}", now.format("%Y%m%d%H%M%S"))
}

/// Per-prefix counter row; `last_seq` is the last sequence handed out.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoice_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub prefix: String,
    pub last_seq: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(date_prefix(date), "20260315");
        assert_eq!(format_number("20260315", 1), "202603150001");
        assert_eq!(format_number("20260315", 437), "202603150437");
    }

    #[test]
    fn parse_ignores_suffix() {
        assert_eq!(parse_sequence("202603150007", "20260315"), Some(7));
        assert_eq!(parse_sequence("202603150007-42", "20260315"), Some(7));
        assert_eq!(parse_sequence("INV-20260315120000", "20260315"), None);
        assert_eq!(parse_sequence("202604010001", "20260315"), None);
    }

    #[test]
    fn timestamp_format() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 15)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap()
            .and_utc();
        assert_eq!(timestamp_number(now), "INV-20260315123045");
    }
}
