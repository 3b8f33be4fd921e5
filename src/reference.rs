//! FIPS reference table.
//!
//! The table is the Census county list: five unquoted fields per row and no
//! header, `state, state_fips, county_fips, county_name, class_code`, e.g.
//! `WV,54,007,Braxton County,H1`. The state column may hold either the postal
//! abbreviation or the full name; both spellings are indexed.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::info;

use crate::error::{LookupError, ReferenceError};
use crate::rules::STATES;

const FIELDS_PER_ROW: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct County {
    pub name: String,
    /// Census class code (H1, H4, H5, H6, C7).
    pub class_code: String,
}

#[derive(Debug, Clone)]
struct State {
    name: String,
    counties: HashMap<String, County>,
}

/// How a caller identifies the state of a 3-digit county code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey<'a> {
    Fips(&'a str),
    Name(&'a str),
}

/// Read-only after load; share it by reference across workers.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    states: HashMap<String, State>,
    /// Lowercased name or postal abbreviation -> state FIPS.
    state_names: HashMap<String, String>,
}

impl ReferenceTable {
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let file = File::open(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file, path)?;
        info!(
            path = %path.display(),
            states = table.states.len(),
            counties = table.county_count(),
            "loaded FIPS reference table"
        );
        Ok(table)
    }

    /// `origin` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, ReferenceError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::default();
        for row in reader.records() {
            let row = row.map_err(|source| ReferenceError::Csv {
                path: origin.to_path_buf(),
                source,
            })?;
            table.insert_row(&row, origin)?;
        }
        Ok(table)
    }

    fn insert_row(&mut self, row: &StringRecord, origin: &Path) -> Result<(), ReferenceError> {
        let line = row.position().map(|position| position.line()).unwrap_or(0);
        let malformed = |message: String| ReferenceError::MalformedRow {
            path: origin.to_path_buf(),
            line,
            message,
        };
        let conflicting = |message: String| ReferenceError::ConflictingRow {
            path: origin.to_path_buf(),
            line,
            message,
        };

        if row.len() != FIELDS_PER_ROW {
            return Err(malformed(format!(
                "expected {FIELDS_PER_ROW} fields, found {}",
                row.len()
            )));
        }
        let field = |index: usize| row.get(index).unwrap_or("").trim();
        let (state_name, state_fips, county_fips, county_name, class_code) =
            (field(0), field(1), field(2), field(3), field(4));

        if state_name.is_empty() || county_name.is_empty() {
            return Err(malformed("state and county names must not be empty".to_string()));
        }
        if !is_code(state_fips, 2) {
            return Err(malformed(format!("state FIPS '{state_fips}' is not 2 digits")));
        }
        if !is_code(county_fips, 3) {
            return Err(malformed(format!("county FIPS '{county_fips}' is not 3 digits")));
        }

        let state = self
            .states
            .entry(state_fips.to_string())
            .or_insert_with(|| State {
                name: state_name.to_string(),
                counties: HashMap::new(),
            });
        if state.name != state_name {
            return Err(conflicting(format!(
                "state FIPS {state_fips} is both '{}' and '{state_name}'",
                state.name
            )));
        }

        if let Some(existing) = state.counties.get(county_fips) {
            if existing.name != county_name {
                return Err(conflicting(format!(
                    "county {state_fips}{county_fips} is both '{}' and '{county_name}'",
                    existing.name
                )));
            }
            return Ok(());
        }
        state.counties.insert(
            county_fips.to_string(),
            County {
                name: county_name.to_string(),
                class_code: class_code.to_string(),
            },
        );

        self.index_state_name(state_name, state_fips);
        Ok(())
    }

    fn index_state_name(&mut self, name: &str, fips: &str) {
        self.state_names
            .insert(name.to_lowercase(), fips.to_string());
        for (code, full_name) in STATES {
            if code.eq_ignore_ascii_case(name) {
                self.state_names
                    .insert(full_name.to_lowercase(), fips.to_string());
            } else if full_name.eq_ignore_ascii_case(name) {
                self.state_names.insert(code.to_lowercase(), fips.to_string());
            }
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn county_count(&self) -> usize {
        self.states.values().map(|state| state.counties.len()).sum()
    }

    pub fn state_name_for(&self, state_fips: &str) -> Result<&str, LookupError> {
        self.states
            .get(state_fips)
            .map(|state| state.name.as_str())
            .ok_or_else(|| LookupError::StateNotFound(state_fips.to_string()))
    }

    /// Accepts the table's own spelling, the full name or the postal abbreviation.
    pub fn state_fips_for(&self, state_name: &str) -> Result<&str, LookupError> {
        self.state_names
            .get(&state_name.trim().to_lowercase())
            .map(|fips| fips.as_str())
            .ok_or_else(|| LookupError::StateNameNotFound(state_name.to_string()))
    }

    pub fn county(&self, state: StateKey<'_>, county_fips: &str) -> Result<&County, LookupError> {
        let state_fips = match state {
            StateKey::Fips(fips) => fips,
            StateKey::Name(name) => self.state_fips_for(name)?,
        };
        self.states
            .get(state_fips)
            .and_then(|entry| entry.counties.get(county_fips))
            .ok_or_else(|| LookupError::CountyNotFound {
                state: state_fips.to_string(),
                county: county_fips.to_string(),
            })
    }

    pub fn county_name_for(&self, state: StateKey<'_>, county_fips: &str) -> Result<&str, LookupError> {
        self.county(state, county_fips)
            .map(|county| county.name.as_str())
    }

    /// Resolves a 5-digit `SSCCC` code.
    pub fn county_name_for_fips(&self, fips: &str) -> Result<&str, LookupError> {
        if !is_code(fips, 5) {
            return Err(LookupError::InvalidFips(fips.to_string()));
        }
        let (state_fips, county_fips) = fips.split_at(2);
        self.county_name_for(StateKey::Fips(state_fips), county_fips)
    }
}

fn is_code(value: &str, digits: usize) -> bool {
    value.len() == digits && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    pub(crate) const SAMPLE_TABLE: &str = "\
Alabama,01,001,Autauga County,H1
Alabama,01,009,Blount County,H1
California,06,039,Madera County,H1
West Virginia,54,015,Clay County,H1
West Virginia,54,039,Braxton County,H1
West Virginia,54,047,McDowell County,H1
Kentucky,21,195,Pike County,H1
";

    pub(crate) fn sample_table() -> ReferenceTable {
        ReferenceTable::from_reader(SAMPLE_TABLE.as_bytes(), Path::new("sample.csv")).unwrap()
    }

    #[test]
    fn partial_key_lookups() {
        let table = sample_table();
        assert_eq!(table.state_count(), 4);
        assert_eq!(table.county_count(), 7);
        assert_eq!(table.state_name_for("54").unwrap(), "West Virginia");
        assert_eq!(
            table.county_name_for(StateKey::Fips("54"), "039").unwrap(),
            "Braxton County"
        );
        assert_eq!(
            table.county_name_for(StateKey::Fips("06"), "039").unwrap(),
            "Madera County"
        );
        assert_eq!(
            table.county(StateKey::Fips("54"), "015").unwrap().class_code,
            "H1"
        );
    }

    #[test]
    fn state_names_and_abbreviations_are_interchangeable() {
        let table = sample_table();
        assert_eq!(table.state_fips_for("West Virginia").unwrap(), "54");
        assert_eq!(table.state_fips_for("wv").unwrap(), "54");
        assert_eq!(
            table.county_name_for(StateKey::Name("WV"), "047").unwrap(),
            "McDowell County"
        );

        let census = ReferenceTable::from_reader(
            "WV,54,007,Braxton County,H1\n".as_bytes(),
            Path::new("census.csv"),
        )
        .unwrap();
        assert_eq!(census.state_fips_for("West Virginia").unwrap(), "54");
    }

    #[test]
    fn full_fips_matches_split_lookup() {
        let table = sample_table();
        let full = table.county_name_for_fips("01009").unwrap();
        let state = table.state_name_for("01").unwrap();
        let split = table.county_name_for(StateKey::Name(state), "009").unwrap();
        assert_eq!(full, "Blount County");
        assert_eq!(full, split);
    }

    #[test]
    fn misses_are_not_found() {
        let table = sample_table();
        assert_eq!(
            table.state_name_for("99"),
            Err(LookupError::StateNotFound("99".to_string()))
        );
        assert!(matches!(
            table.county_name_for(StateKey::Fips("54"), "999"),
            Err(LookupError::CountyNotFound { .. })
        ));
        assert!(matches!(
            table.county_name_for(StateKey::Name("Atlantis"), "001"),
            Err(LookupError::StateNameNotFound(_))
        ));
        assert!(matches!(
            table.county_name_for_fips("5403"),
            Err(LookupError::InvalidFips(_))
        ));
    }

    #[test]
    fn short_rows_are_fatal() {
        let err = ReferenceTable::from_reader(
            "West Virginia,54,007,Braxton County,H1\nWest Virginia,54,009\n".as_bytes(),
            Path::new("broken.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, ReferenceError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn conflicting_rows_are_fatal() {
        let err = ReferenceTable::from_reader(
            "West Virginia,54,007,Braxton County,H1\nWest Virginia,54,007,Clay County,H1\n"
                .as_bytes(),
            Path::new("conflict.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, ReferenceError::ConflictingRow { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = ReferenceTable::load(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, ReferenceError::Io { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fips.csv");
        std::fs::write(&path, SAMPLE_TABLE).unwrap();
        let table = ReferenceTable::load(&path).unwrap();
        assert_eq!(table.county_name_for_fips("21195").unwrap(), "Pike County");
    }
}
