mod common;
use common::HEADER;

use geoimport::{validate_line, ColumnMapping, Rejection};
use proptest::prelude::*;

fn mapping() -> ColumnMapping {
    ColumnMapping::from_header(HEADER)
}

fn octet() -> impl Strategy<Value = u8> {
    any::<u8>()
}

fn ipv4() -> impl Strategy<Value = String> {
    (octet(), octet(), octet(), octet()).prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
}

fn token() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{0,12}"
}

fn line(ip: &str, lat: &str, lon: &str, city: &str) -> String {
    format!("{ip},SI,Nepal,{city},{lat},{lon},7823011346")
}

proptest! {
    #[test]
    fn valid_lines_are_accepted(
        ip in ipv4(),
        lat in -90.0f64..=90.0,
        lon in -180.0f64..=180.0,
        city in token(),
    ) {
        let lat = lat.to_string();
        let lon = lon.to_string();
        let record = validate_line(&line(&ip, &lat, &lon, &city), &mapping()).unwrap();
        prop_assert_eq!(record.ip(), ip.as_str());
        prop_assert_eq!(record.latitude(), lat.as_str());
        prop_assert_eq!(record.longitude(), lon.as_str());
    }

    #[test]
    fn wrong_field_count_is_rejected(fields in prop::collection::vec("[0-9a-z.]{1,8}", 0..20usize)) {
        prop_assume!(fields.len() != 7);
        let joined = fields.join(",");
        prop_assume!(!joined.is_empty());
        let verdict = validate_line(&joined, &mapping());
        let is_field_count = matches!(verdict, Err(Rejection::FieldCount { .. }));
        prop_assert!(is_field_count);
    }

    #[test]
    fn out_of_range_latitude_is_rejected(
        ip in ipv4(),
        lat in prop_oneof![90.000001f64..1e6, -1e6f64..-90.000001],
        lon in -180.0f64..=180.0,
    ) {
        let verdict = validate_line(&line(&ip, &lat.to_string(), &lon.to_string(), "X"), &mapping());
        prop_assert_eq!(verdict, Err(Rejection::InvalidLatitude));
    }

    #[test]
    fn out_of_range_longitude_is_rejected(
        ip in ipv4(),
        lat in -90.0f64..=90.0,
        lon in prop_oneof![180.000001f64..1e6, -1e6f64..-180.000001],
    ) {
        let verdict = validate_line(&line(&ip, &lat.to_string(), &lon.to_string(), "X"), &mapping());
        prop_assert_eq!(verdict, Err(Rejection::InvalidLongitude));
    }

    #[test]
    fn octets_above_255_are_rejected(
        a in 256u32..1000,
        b in octet(),
        c in octet(),
        d in octet(),
    ) {
        let ip = format!("{b}.{c}.{a}.{d}");
        let verdict = validate_line(&line(&ip, "1.0", "2.0", "X"), &mapping());
        prop_assert_eq!(verdict, Err(Rejection::InvalidIp));
    }

    #[test]
    fn validation_is_pure(raw in "[0-9a-zA-Z.,\\- ]{0,80}") {
        let first = validate_line(&raw, &mapping());
        let second = validate_line(&raw, &mapping());
        prop_assert_eq!(first, second);
    }
}
