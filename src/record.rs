//! Geolocation record types shared by every pipeline stage.

use serde::Serialize;
use std::fmt;

/// Canonical column names a geolocation dump may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Ip,
    CountryCode,
    Country,
    City,
    Latitude,
    Longitude,
    MysteryValue,
}

impl Field {
    /// Every field a complete record must hold, in storage order.
    pub const ALL: [Field; 7] = [
        Field::Ip,
        Field::CountryCode,
        Field::Country,
        Field::City,
        Field::Latitude,
        Field::Longitude,
        Field::MysteryValue,
    ];

    /// Header token naming this field.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Ip => "ip",
            Field::CountryCode => "country_code",
            Field::Country => "country",
            Field::City => "city",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::MysteryValue => "mystery_value",
        }
    }

    /// Position of this field in [`Field::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Resolve a header token; matching is exact.
    pub fn from_header(token: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.as_str() == token)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated geolocation row.
///
/// Coordinates keep the exact text from the dump so that persisting a record
/// never reformats its values. Construction goes through the line validator
/// (or [`Record::new`] in tests and stores) and every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub(crate) ip: String,
    pub(crate) country_code: String,
    pub(crate) country: String,
    pub(crate) city: String,
    pub(crate) latitude: String,
    pub(crate) longitude: String,
    pub(crate) mystery_value: String,
}

impl Record {
    pub fn new(
        ip: impl Into<String>,
        country_code: impl Into<String>,
        country: impl Into<String>,
        city: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        mystery_value: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            country_code: country_code.into(),
            country: country.into(),
            city: city.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            mystery_value: mystery_value.into(),
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn latitude(&self) -> &str {
        &self.latitude
    }

    pub fn longitude(&self) -> &str {
        &self.longitude
    }

    pub fn mystery_value(&self) -> &str {
        &self.mystery_value
    }

    /// Value of a single field by name.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Ip => &self.ip,
            Field::CountryCode => &self.country_code,
            Field::Country => &self.country,
            Field::City => &self.city,
            Field::Latitude => &self.latitude,
            Field::Longitude => &self.longitude,
            Field::MysteryValue => &self.mystery_value,
        }
    }

    /// Textual location key used for coordinate deduplication.
    ///
    /// `7.0` and `7.00` produce different keys on purpose.
    pub fn coordinate_key(&self) -> String {
        format!("{}+{}", self.latitude, self.longitude)
    }
}

/// A sealed group of admitted records handed to the store in one call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(id: u64, records: Vec<Record>) -> Self {
        Self { id, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}
