//! Ticket identifiers: `POS` + two-digit year + two-digit month + six-digit
//! sequence, e.g. `POS2610000042`. The sequence restarts at 1 each month.

use chrono::{Datelike, NaiveDate};

pub const TICKET_PREFIX: &str = "POS";
pub const SEQUENCE_DIGITS: usize = 6;
pub const MAX_SEQUENCE: u32 = 999_999;

const MONTH_PREFIX_LEN: usize = TICKET_PREFIX.len() + 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketIdError {
    #[error("ticket sequence for {0} is exhausted")]
    SequenceExhausted(String),
    #[error("malformed ticket id '{0}'")]
    Malformed(String),
}

/// `POSYYMM` for the month containing `date`.
pub fn month_prefix(date: NaiveDate) -> String {
    format!(
        "{}{:02}{:02}",
        TICKET_PREFIX,
        date.year().rem_euclid(100),
        date.month()
    )
}

pub fn format_ticket_id(prefix: &str, seq: u32) -> Result<String, TicketIdError> {
    if seq == 0 || seq > MAX_SEQUENCE {
        return Err(TicketIdError::SequenceExhausted(prefix.to_string()));
    }
    Ok(format!("{}{:0width$}", prefix, seq, width = SEQUENCE_DIGITS))
}

/// Splits an id into its month prefix and sequence number.
pub fn parse_ticket_id(id: &str) -> Result<(String, u32), TicketIdError> {
    let malformed = || TicketIdError::Malformed(id.to_string());

    if !id.is_ascii()
        || id.len() != MONTH_PREFIX_LEN + SEQUENCE_DIGITS
        || !id.starts_with(TICKET_PREFIX)
    {
        return Err(malformed());
    }
    let (prefix, seq) = id.split_at(MONTH_PREFIX_LEN);
    if !prefix[TICKET_PREFIX.len()..].bytes().all(|b| b.is_ascii_digit())
        || !seq.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }
    let month: u32 = prefix[TICKET_PREFIX.len() + 2..]
        .parse()
        .map_err(|_| malformed())?;
    if !(1..=12).contains(&month) {
        return Err(malformed());
    }
    let seq: u32 = seq.parse().map_err(|_| malformed())?;
    if seq == 0 {
        return Err(malformed());
    }
    Ok((prefix.to_string(), seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_uses_two_digit_year_and_month() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(month_prefix(d), "POS2603");
        let d = NaiveDate::from_ymd_opt(2100, 12, 31).unwrap();
        assert_eq!(month_prefix(d), "POS0012");
    }

    #[test]
    fn sequence_is_zero_padded() {
        assert_eq!(format_ticket_id("POS2610", 42).unwrap(), "POS2610000042");
        assert_eq!(
            format_ticket_id("POS2610", MAX_SEQUENCE).unwrap(),
            "POS2610999999"
        );
    }

    #[test]
    fn sequence_bounds_are_enforced() {
        assert!(matches!(
            format_ticket_id("POS2610", MAX_SEQUENCE + 1),
            Err(TicketIdError::SequenceExhausted(_))
        ));
        assert!(format_ticket_id("POS2610", 0).is_err());
    }

    #[test]
    fn parse_splits_prefix_and_sequence() {
        assert_eq!(
            parse_ticket_id("POS2610000042").unwrap(),
            ("POS2610".to_string(), 42)
        );
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in [
            "",
            "POS261000004",
            "POS26100000420",
            "PXS2610000042",
            "POS26A0000042",
            "POS2613000042",
            "POS2610000000",
            "POS26100000-1",
        ] {
            assert!(parse_ticket_id(bad).is_err(), "{bad} should be rejected");
        }
    }
}
