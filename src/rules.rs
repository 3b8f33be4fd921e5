//! Static configuration: which keys to skip, how state names are spelled,
//! and the handful of hand-corrected source records.

use std::collections::{HashMap, HashSet};

use crate::classify::Category;
use crate::model::EntityKind;

/// Characters reserved for internal parsing. A key containing any of them is
/// dropped before classification.
pub const DISALLOWED_KEY_CHARS: [char; 16] = [
    '=', '+', '/', '&', '<', '>', ';', '\'', '"', '?', '%', '#', '$', '@', ',', '.',
];

/// Keys that look geographic but are not.
pub const IGNORED_KEYS: [&str; 3] = ["state_capital", "source:hgv:state_network", "hgv:state_network"];

/// Keys carrying a state even though the key does not say "state".
pub const STATE_ALIAS_KEYS: [&str; 4] = ["gnis:ST_alpha", "gnis:ST_num", "ST_num", "ST_alpha"];

pub const AMENITY_KEYS: [&str; 3] = ["amenity", "shop", "healthcare"];

/// `(key, value) -> (key, value)` corrections for mis-tagged amenities.
pub const AMENITY_FIXES: [((&str, &str), (&str, &str)); 2] = [
    (("amenity", "ATV Trails"), ("leisure", "track")),
    (("shop", "Tiles"), ("shop", "tiles")),
];

/// Postal code and full name for every state-level FIPS entity.
pub const STATES: [(&str, &str); 52] = [
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
    ("PR", "Puerto Rico"),
];

/// Abbreviations seen in the wild, beyond the full names in [`STATES`].
pub const STATE_ABBREVIATIONS: [(&str, &str); 14] = [
    ("w. va.", "WV"),
    ("w.va.", "WV"),
    ("w va", "WV"),
    ("w.v.", "WV"),
    ("west va", "WV"),
    ("wva", "WV"),
    ("va.", "VA"),
    ("virg.", "VA"),
    ("ky.", "KY"),
    ("kent.", "KY"),
    ("tenn.", "TN"),
    ("penn.", "PA"),
    ("penna.", "PA"),
    ("calif.", "CA"),
];

/// Last-word replacements for `addr:street` values.
pub const STREET_TYPES: [(&str, &str); 17] = [
    ("St", "Street"),
    ("St.", "Street"),
    ("Ave", "Avenue"),
    ("Ave.", "Avenue"),
    ("Rd", "Road"),
    ("Rd.", "Road"),
    ("Rd,", "Road"),
    ("RD", "Road"),
    ("Dr.", "Drive"),
    ("Dr", "Drive"),
    ("Ln", "Lane"),
    ("Avevue", "Avenue"),
    ("Driver", "Drive"),
    ("Hwy", "Highway"),
    ("HWY", "Highway"),
    ("Ctr.", "Center"),
    ("hill", "Hill"),
];

/// Source records known to be wrong, replaced before parsing.
pub const ENTITY_OVERRIDES: [(EntityKind, &str, Category, &str); 2] = [
    // postcode recorded as a Washington zip
    (EntityKind::Node, "2625119248", Category::PostalCode, "24801"),
    // state recorded as CA
    (EntityKind::Way, "398603731", Category::State, "WV"),
];

pub fn is_disallowed_key(key: &str) -> bool {
    key.chars()
        .any(|c| c.is_whitespace() || DISALLOWED_KEY_CHARS.contains(&c))
}

type OverrideKey = (EntityKind, String, Category);

#[derive(Debug, Clone)]
pub struct TagRules {
    pub ignore_keys: HashSet<String>,
    pub state_alias_keys: HashSet<String>,
    /// Lowercased alias -> canonical 2-letter code.
    pub alias_map: HashMap<String, String>,
    pub amenity_fixes: HashMap<(String, String), (String, String)>,
    pub street_types: HashMap<String, String>,
    pub overrides: HashMap<OverrideKey, String>,
}

impl Default for TagRules {
    fn default() -> Self {
        let mut alias_map = HashMap::new();
        for (code, name) in STATES {
            alias_map.insert(name.to_lowercase(), code.to_string());
        }
        for (alias, code) in STATE_ABBREVIATIONS {
            alias_map.insert(alias.to_string(), code.to_string());
        }

        Self {
            ignore_keys: IGNORED_KEYS.iter().map(|key| key.to_string()).collect(),
            state_alias_keys: STATE_ALIAS_KEYS.iter().map(|key| key.to_string()).collect(),
            alias_map,
            amenity_fixes: AMENITY_FIXES
                .iter()
                .map(|((key, value), (new_key, new_value))| {
                    (
                        (key.to_string(), value.to_string()),
                        (new_key.to_string(), new_value.to_string()),
                    )
                })
                .collect(),
            street_types: STREET_TYPES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            overrides: ENTITY_OVERRIDES
                .iter()
                .map(|(kind, id, category, value)| ((*kind, id.to_string(), *category), value.to_string()))
                .collect(),
        }
    }
}

impl TagRules {
    pub fn with_ignored_key(mut self, key: impl Into<String>) -> Self {
        self.ignore_keys.insert(key.into());
        self
    }

    pub fn with_override(
        mut self,
        kind: EntityKind,
        id: impl Into<String>,
        category: Category,
        value: impl Into<String>,
    ) -> Self {
        self.overrides.insert((kind, id.into(), category), value.into());
        self
    }

    pub fn override_for(&self, kind: EntityKind, id: &str, category: Category) -> Option<&str> {
        self.overrides
            .get(&(kind, id.to_string(), category))
            .map(|value| value.as_str())
    }

    /// Maps a state spelling to its 2-letter code. Unknown spellings come back trimmed.
    pub fn canonical_state(&self, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return trimmed.to_ascii_uppercase();
        }
        self.alias_map
            .get(&trimmed.to_lowercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }

    pub fn fix_amenity(&self, key: &str, value: &str) -> Option<(&str, &str)> {
        self.amenity_fixes
            .get(&(key.to_string(), value.to_string()))
            .map(|(new_key, new_value)| (new_key.as_str(), new_value.as_str()))
    }

    /// Expands an abbreviated street type in the last word of `name`.
    pub fn expand_street_type(&self, name: &str) -> String {
        let trimmed = name.trim();
        let Some((head, last)) = trimmed.rsplit_once(' ') else {
            return trimmed.to_string();
        };
        match self.street_types.get(last) {
            Some(full) => format!("{head} {full}"),
            None => trimmed.to_string(),
        }
    }
}
