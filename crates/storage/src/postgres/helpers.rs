//! Shared helper functions for PostgreSQL row conversion.
//!
//! NUMERIC(39, 0) columns travel as decimal strings on both sides of
//! the driver (`$n::NUMERIC` on bind, `::TEXT` on read), so these
//! helpers do the string <-> 128-bit conversions with field-named
//! errors.

use meridian_core::error::{StorageError, StorageResult};
use meridian_core::models::{Direction, EventCause, EventStatus};

/// Parse a NUMERIC text value into a u128.
pub fn parse_u128(value: &str, field_name: &str) -> StorageResult<u128> {
    value.parse().map_err(|e| {
        StorageError::SerializationError(format!(
            "{} is not a valid u128: {} (value: {})",
            field_name, e, value
        ))
    })
}

/// Parse an optional NUMERIC text value into an i128.
pub fn parse_opt_i128(value: Option<&str>, field_name: &str) -> StorageResult<Option<i128>> {
    value
        .map(|v| {
            v.parse().map_err(|e| {
                StorageError::SerializationError(format!(
                    "{} is not a valid i128: {} (value: {})",
                    field_name, e, v
                ))
            })
        })
        .transpose()
}

/// Parse a stored cause string back into the enum.
pub fn parse_cause(value: &str) -> StorageResult<EventCause> {
    EventCause::try_from_str(value).ok_or_else(|| {
        StorageError::SerializationError(format!("unknown event cause: {}", value))
    })
}

/// Parse a stored direction string back into the enum.
pub fn parse_direction(value: &str) -> StorageResult<Direction> {
    Direction::try_from_str(value).ok_or_else(|| {
        StorageError::SerializationError(format!("unknown event direction: {}", value))
    })
}

/// Parse a stored status string back into the enum.
pub fn parse_status(value: &str) -> StorageResult<EventStatus> {
    EventStatus::try_from_str(value).ok_or_else(|| {
        StorageError::SerializationError(format!("unknown event status: {}", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u128_full_range() {
        assert_eq!(parse_u128("0", "x").unwrap(), 0);
        assert_eq!(
            parse_u128("340282366920938463463374607431768211455", "x").unwrap(),
            u128::MAX
        );
    }

    // Test critique: erreurs incluent le nom du champ pour debug
    #[test]
    fn test_error_includes_field_name() {
        let err = parse_u128("not-a-number", "event.absolute_staked_amount").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("event.absolute_staked_amount"));
        assert!(msg.contains("not-a-number"));
    }

    #[test]
    fn test_parse_opt_i128() {
        assert_eq!(parse_opt_i128(None, "x").unwrap(), None);
        assert_eq!(parse_opt_i128(Some("-42"), "x").unwrap(), Some(-42));
        assert!(parse_opt_i128(Some("nope"), "x").is_err());
    }

    // Un enum inconnu en base signale une corruption, pas un défaut silencieux
    #[test]
    fn test_unknown_enum_values_are_rejected() {
        assert!(parse_cause("MINTING").is_err());
        assert!(parse_direction("SIDEWAYS").is_err());
        assert!(parse_status("MAYBE").is_err());
        assert!(parse_cause("TRANSACTION").is_ok());
    }
}
