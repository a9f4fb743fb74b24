//! Line validation: turns raw dump lines into records or rejection reasons.
//!
//! Every function here is pure. The verdict for a line depends only on the
//! line and the column mapping, never on what was seen before, so chunks can
//! be validated on any number of threads.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::record::{Field, Record};
use crate::schema::{Column, ColumnMapping, DELIMITER};
use crate::stats::RejectionCounts;

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])(?:\.(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])){3}$",
    )
    .expect("IPv4 pattern is valid")
});

/// Why a data line did not become a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("column {column} is empty")]
    EmptyField { column: usize },
    #[error("value supplied for unrecognised column '{name}'")]
    UnknownColumn { name: String },
    #[error("no value for field '{field}'")]
    MissingField { field: Field },
    #[error("latitude is not a number in [-90, 90]")]
    InvalidLatitude,
    #[error("longitude is not a number in [-180, 180]")]
    InvalidLongitude,
    #[error("ip is not a dotted-decimal IPv4 address")]
    InvalidIp,
    #[error("line is not valid UTF-8")]
    Encoding,
}

/// Outcome of validating one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Non-empty lines seen in the chunk.
    pub lines: u64,
    /// Records handed to the caller.
    pub accepted: u64,
    pub rejections: RejectionCounts,
}

/// Strict dotted-decimal IPv4 check: four groups of 0-255, no leading zeros,
/// no whitespace, nothing else.
pub fn is_valid_ipv4(candidate: &str) -> bool {
    IPV4_RE.is_match(candidate)
}

fn coordinate_in_range(text: &str, limit: f64) -> bool {
    match text.parse::<f64>() {
        // Rejects NaN as well as out-of-range values.
        Ok(value) => (-limit..=limit).contains(&value),
        Err(_) => false,
    }
}

/// Validate a single data line against the column mapping.
pub fn validate_line(line: &str, mapping: &ColumnMapping) -> Result<Record, Rejection> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let values: Vec<&str> = line.split(DELIMITER).collect();

    if values.len() != mapping.len() {
        return Err(Rejection::FieldCount {
            expected: mapping.len(),
            found: values.len(),
        });
    }

    if let Some(column) = values.iter().position(|value| value.is_empty()) {
        return Err(Rejection::EmptyField { column });
    }

    let mut slots: [Option<&str>; 7] = [None; 7];
    for (index, value) in values.iter().enumerate() {
        match mapping.column(index) {
            Some(Column::Known(field)) => slots[field.index()] = Some(*value),
            Some(Column::Unknown(name)) => {
                return Err(Rejection::UnknownColumn { name: name.clone() });
            }
            None => {
                return Err(Rejection::FieldCount {
                    expected: mapping.len(),
                    found: values.len(),
                });
            }
        }
    }

    let take = |field: Field| slots[field.index()].ok_or(Rejection::MissingField { field });
    let ip = take(Field::Ip)?;
    let country_code = take(Field::CountryCode)?;
    let country = take(Field::Country)?;
    let city = take(Field::City)?;
    let latitude = take(Field::Latitude)?;
    let longitude = take(Field::Longitude)?;
    let mystery_value = take(Field::MysteryValue)?;

    if !coordinate_in_range(latitude, 90.0) {
        return Err(Rejection::InvalidLatitude);
    }
    if !coordinate_in_range(longitude, 180.0) {
        return Err(Rejection::InvalidLongitude);
    }
    if !is_valid_ipv4(ip) {
        return Err(Rejection::InvalidIp);
    }

    Ok(Record::new(
        ip,
        country_code,
        country,
        city,
        latitude,
        longitude,
        mystery_value,
    ))
}

/// Validate every line of a newline-aligned chunk.
///
/// Accepted records are passed to `on_record` in line order. If it returns an
/// error, validation stops and the error is returned.
pub fn validate_chunk<F, E>(
    chunk: &[u8],
    mapping: &ColumnMapping,
    mut on_record: F,
) -> Result<ChunkOutcome, E>
where
    F: FnMut(Record) -> Result<(), E>,
{
    let mut outcome = ChunkOutcome::default();

    for raw in chunk.split(|byte| *byte == b'\n') {
        if raw.is_empty() || raw == b"\r" {
            continue;
        }
        outcome.lines += 1;

        let verdict = match std::str::from_utf8(raw) {
            Ok(line) => validate_line(line, mapping),
            Err(_) => Err(Rejection::Encoding),
        };

        match verdict {
            Ok(record) => {
                outcome.accepted += 1;
                on_record(record)?;
            }
            Err(rejection) => outcome.rejections.record(&rejection),
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const HEADER: &str = "ip,country_code,country,city,latitude,longitude,mystery_value";

    fn mapping() -> ColumnMapping {
        ColumnMapping::from_header(HEADER)
    }

    #[test]
    fn test_valid_line() {
        let record = validate_line(
            "70.95.73.73,SI,Nepal,DuBuquemouth,-84.87503094689836,7.206435933364332,7823011346",
            &mapping(),
        )
        .unwrap();
        assert_eq!(record.ip(), "70.95.73.73");
        assert_eq!(record.country_code(), "SI");
        assert_eq!(record.latitude(), "-84.87503094689836");
        assert_eq!(record.mystery_value(), "7823011346");
    }

    #[test]
    fn test_missing_ip() {
        let result = validate_line(
            ",SI,Nepal,DuBuquemouth,-84.87503094689836,7.206435933364332,7823011346",
            &mapping(),
        );
        assert_eq!(result, Err(Rejection::EmptyField { column: 0 }));
    }

    #[test]
    fn test_extra_field() {
        let result = validate_line(
            "70.95.73.73,SI,Nepal,DuBuquemouth,-84.87503094689836,7.206435933364332,7823011346,70.95.73.73",
            &mapping(),
        );
        assert_eq!(
            result,
            Err(Rejection::FieldCount {
                expected: 7,
                found: 8
            })
        );
    }

    #[test]
    fn test_invalid_ip_octet() {
        let result = validate_line(
            "7012.95.73.73,SI,Nepal,DuBuquemouth,-84.87503094689836,7.206435933364332,7823011346",
            &mapping(),
        );
        assert_eq!(result, Err(Rejection::InvalidIp));
    }

    #[test]
    fn test_latitude_out_of_range() {
        let result = validate_line(
            "70.95.73.73,SI,Nepal,DuBuquemouth,1027.2064359333643,7.206435933364332,7823011346",
            &mapping(),
        );
        assert_eq!(result, Err(Rejection::InvalidLatitude));
    }

    #[test]
    fn test_longitude_out_of_range_and_unparseable() {
        let m = mapping();
        assert_eq!(
            validate_line("1.2.3.4,SI,Nepal,X,10.0,180.5,1", &m),
            Err(Rejection::InvalidLongitude)
        );
        assert_eq!(
            validate_line("1.2.3.4,SI,Nepal,X,10.0,east,1", &m),
            Err(Rejection::InvalidLongitude)
        );
        assert_eq!(
            validate_line("1.2.3.4,SI,Nepal,X,NaN,10.0,1", &m),
            Err(Rejection::InvalidLatitude)
        );
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let m = mapping();
        assert!(validate_line("1.2.3.4,SI,Nepal,X,90,-180,1", &m).is_ok());
        assert!(validate_line("1.2.3.5,SI,Nepal,X,-90.0,180.0,1", &m).is_ok());
    }

    #[test]
    fn test_unknown_column_rejects_line() {
        let m = ColumnMapping::from_header(
            "ip,country_code,country,city,lat,longitude,mystery_value",
        );
        assert_eq!(
            validate_line("1.2.3.4,SI,Nepal,X,10.0,20.0,1", &m),
            Err(Rejection::UnknownColumn {
                name: "lat".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_header_field_rejects_line() {
        let m = ColumnMapping::from_header("ip,ip,country,city,latitude,longitude,mystery_value");
        assert_eq!(
            validate_line("1.2.3.4,1.2.3.4,Nepal,X,10.0,20.0,1", &m),
            Err(Rejection::MissingField {
                field: Field::CountryCode
            })
        );
    }

    #[test]
    fn test_reordered_header() {
        let m = ColumnMapping::from_header(
            "mystery_value,city,ip,country,country_code,longitude,latitude",
        );
        let record = validate_line("42,Lisbon,10.0.0.1,Portugal,PT,-9.14,38.72", &m).unwrap();
        assert_eq!(record.ip(), "10.0.0.1");
        assert_eq!(record.latitude(), "38.72");
        assert_eq!(record.longitude(), "-9.14");
        assert_eq!(record.mystery_value(), "42");
    }

    #[test]
    fn test_crlf_line_ending() {
        let record = validate_line("1.2.3.4,SI,Nepal,X,10.0,20.0,1\r", &mapping()).unwrap();
        assert_eq!(record.mystery_value(), "1");
    }

    #[test]
    fn test_ipv4_format() {
        assert!(is_valid_ipv4("192.0.2.146"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(is_valid_ipv4("255.255.255.255"));
        assert!(!is_valid_ipv4("192. 0.2.146"));
        assert!(!is_valid_ipv4("192.0.2.146.123"));
        assert!(!is_valid_ipv4(" 192.0.2.146"));
        assert!(!is_valid_ipv4("192.0.2.256"));
        assert!(!is_valid_ipv4("192.0.2"));
        assert!(!is_valid_ipv4("192.0.02.1"));
        assert!(!is_valid_ipv4("::1"));
    }

    #[test]
    fn test_validate_chunk_counts() {
        let chunk = b"1.2.3.4,SI,Nepal,X,10.0,20.0,1\n\
                      \n\
                      ,SI,Nepal,X,10.0,20.0,1\n\
                      1.2.3.5,SI,Nepal,X,10.0,20.0,1,extra\n\
                      1.2.3.6,SI,Nepal,X,95.0,20.0,1\n\
                      1.2.3.7,SI,Nepal,X,11.0,21.0,1";
        let mut records = Vec::new();
        let outcome = validate_chunk::<_, Infallible>(chunk, &mapping(), |record| {
            records.push(record);
            Ok(())
        })
        .unwrap();

        assert_eq!(outcome.lines, 5);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejections.empty_field, 1);
        assert_eq!(outcome.rejections.field_count, 1);
        assert_eq!(outcome.rejections.invalid_latitude, 1);
        assert_eq!(outcome.rejections.total(), 3);
        assert_eq!(records[1].ip(), "1.2.3.7");
    }

    #[test]
    fn test_validate_chunk_non_utf8_line() {
        let chunk = b"1.2.3.4,SI,Nepal,X,10.0,20.0,\xff\xfe\n";
        let outcome =
            validate_chunk::<_, Infallible>(chunk, &mapping(), |_| Ok(())).unwrap();
        assert_eq!(outcome.rejections.encoding, 1);
        assert_eq!(outcome.accepted, 0);
    }

    #[test]
    fn test_validate_chunk_stops_on_callback_error() {
        let chunk = b"1.2.3.4,SI,Nepal,X,10.0,20.0,1\n1.2.3.5,SI,Nepal,X,11.0,20.0,1\n";
        let mut calls = 0;
        let result = validate_chunk(chunk, &mapping(), |_| {
            calls += 1;
            Err("closed")
        });
        assert_eq!(result, Err("closed"));
        assert_eq!(calls, 1);
    }
}
