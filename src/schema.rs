//! Header resolution: maps column positions to record fields.

use crate::record::Field;

/// Column delimiter used by geolocation dumps.
pub const DELIMITER: char = ',';

/// A header token resolved to a known field, or kept verbatim when unknown.
///
/// Unknown columns are not an error here; any data line that carries a value
/// for one is rejected later by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Known(Field),
    Unknown(String),
}

/// Position-to-field mapping built once from the header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<Column>,
}

impl ColumnMapping {
    /// Build the mapping from a header line. Never fails.
    pub fn from_header(header: &str) -> Self {
        let header = header.strip_suffix('\r').unwrap_or(header);
        let columns = header
            .split(DELIMITER)
            .map(|token| {
                let token = token.trim();
                match Field::from_header(token) {
                    Some(field) => Column::Known(field),
                    None => Column::Unknown(token.to_string()),
                }
            })
            .collect();
        Self { columns }
    }

    /// Number of columns every data line must carry.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// True when every field is mapped exactly once and nothing else is.
    pub fn is_complete(&self) -> bool {
        self.columns.len() == Field::ALL.len()
            && Field::ALL.iter().all(|field| {
                self.columns
                    .iter()
                    .filter(|column| **column == Column::Known(*field))
                    .count()
                    == 1
            })
    }

    /// Header tokens that did not resolve to a field.
    pub fn unknown_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|column| match column {
                Column::Unknown(name) => Some(name.as_str()),
                Column::Known(_) => None,
            })
            .collect()
    }
}
