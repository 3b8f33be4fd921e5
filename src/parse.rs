//! Turns one raw tag value into normalized candidates.
//!
//! Parsing never fails: values that cannot be read come out as the
//! [`UNIDENTIFIABLE`] marker or pass through unchanged. Anything that needs
//! sibling tags (a county code without its state) is returned as a
//! [`Candidate::CountyCode`] for the resolver to finish.

use std::collections::HashSet;

use crate::classify::Category;
use crate::model::{RawTag, TYPE_ADDR, TYPE_REGULAR, UNIDENTIFIABLE};
use crate::reference::ReferenceTable;
use crate::rules::TagRules;

pub const POSTCODE_KEY: &str = "postcode";
pub const COUNTY_KEY: &str = "county";
pub const STATE_KEY: &str = "state";
const STREET_KEY: &str = "addr:street";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Tag {
        key: String,
        value: String,
        tag_type: String,
    },
    County(String),
    /// 3-digit county FIPS still waiting for a state.
    CountyCode(String),
    State {
        value: String,
        /// Set when the reference table knows the state.
        fips: Option<String>,
    },
}

impl Candidate {
    fn tag(key: impl Into<String>, value: impl Into<String>, tag_type: impl Into<String>) -> Self {
        Candidate::Tag {
            key: key.into(),
            value: value.into(),
            tag_type: tag_type.into(),
        }
    }
}

pub fn parse(
    category: Category,
    tag: &RawTag,
    rules: &TagRules,
    lookup: &ReferenceTable,
) -> Vec<Candidate> {
    match category {
        Category::PostalCode => parse_postcode(&tag.value),
        Category::County => parse_county(&tag.value, rules, lookup),
        Category::State => vec![parse_state(&tag.value, rules, lookup)],
        Category::Amenity => vec![parse_amenity(tag, rules)],
        Category::Generic => vec![parse_generic(tag, rules)],
    }
}

fn parse_postcode(value: &str) -> Vec<Candidate> {
    let value = value.trim();
    let codes = if is_all_digits(value) {
        vec![value.to_string()]
    } else if value.contains('-') {
        vec![value.chars().take(5).collect()]
    } else if value.contains([':', ';']) {
        split_unique(value)
    } else {
        vec![value.to_string()]
    };
    codes
        .into_iter()
        .map(|code| Candidate::tag(POSTCODE_KEY, code, TYPE_ADDR))
        .collect()
}

fn parse_county(value: &str, rules: &TagRules, lookup: &ReferenceTable) -> Vec<Candidate> {
    let value = value.trim();
    let mut candidates = Vec::new();
    if value.contains([':', ';']) {
        for segment in split_unique(value) {
            push_county_segment(&segment, rules, lookup, &mut candidates);
        }
    } else {
        push_county_segment(value, rules, lookup, &mut candidates);
    }
    candidates
}

/// `"Braxton, WV"` yields a county and a state; anything else is county only.
fn push_county_segment(
    segment: &str,
    rules: &TagRules,
    lookup: &ReferenceTable,
    candidates: &mut Vec<Candidate>,
) {
    match segment.split_once(',') {
        Some((county, state)) => {
            candidates.push(county_value(county, lookup));
            if !state.trim().is_empty() {
                candidates.push(parse_state(state, rules, lookup));
            }
        }
        None => candidates.push(county_value(segment, lookup)),
    }
}

fn county_value(value: &str, lookup: &ReferenceTable) -> Candidate {
    let value = value.trim();
    if !is_all_digits(value) {
        return Candidate::County(value.to_string());
    }
    match value.len() {
        1..=3 => Candidate::CountyCode(format!("{value:0>3}")),
        5 => {
            let name = lookup
                .county_name_for_fips(value)
                .unwrap_or(UNIDENTIFIABLE);
            Candidate::County(name.to_string())
        }
        // neither a county code nor a full FIPS; never guess the state
        _ => Candidate::County(UNIDENTIFIABLE.to_string()),
    }
}

fn parse_state(value: &str, rules: &TagRules, lookup: &ReferenceTable) -> Candidate {
    let value = value.trim();
    if is_all_digits(value) {
        if value.len() > 2 {
            return Candidate::State {
                value: UNIDENTIFIABLE.to_string(),
                fips: None,
            };
        }
        let fips = format!("{value:0>2}");
        let name = lookup.state_name_for(&fips).unwrap_or(UNIDENTIFIABLE);
        return Candidate::State {
            value: name.to_string(),
            fips: Some(fips),
        };
    }

    let canonical = rules.canonical_state(value);
    let fips = lookup.state_fips_for(&canonical).ok().map(str::to_string);
    Candidate::State {
        value: canonical,
        fips,
    }
}

fn parse_amenity(tag: &RawTag, rules: &TagRules) -> Candidate {
    match rules.fix_amenity(&tag.key, &tag.value) {
        Some((key, value)) => Candidate::tag(key, value, TYPE_REGULAR),
        None => Candidate::tag(tag.key.as_str(), tag.value.as_str(), TYPE_REGULAR),
    }
}

fn parse_generic(tag: &RawTag, rules: &TagRules) -> Candidate {
    let value = if tag.key == STREET_KEY {
        rules.expand_street_type(&tag.value)
    } else {
        tag.value.clone()
    };
    match tag.key.split_once(':') {
        Some((prefix, rest)) => Candidate::tag(rest, value, prefix),
        None => Candidate::tag(tag.key.as_str(), value, TYPE_REGULAR),
    }
}

/// Splits on `:` and `;` (one level of `;` nested inside `:` groups), trims,
/// and drops empty and repeated segments. Falls back to the whole value.
fn split_unique(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut seen = HashSet::new();
    for group in value.split(':') {
        for part in group.split(';') {
            let part = part.trim();
            if !part.is_empty() && seen.insert(part.to_string()) {
                segments.push(part.to_string());
            }
        }
    }
    if segments.is_empty() {
        segments.push(value.trim().to_string());
    }
    segments
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::tests::sample_table;

    fn run(category: Category, key: &str, value: &str) -> Vec<Candidate> {
        parse(
            category,
            &RawTag::new(key, value),
            &TagRules::default(),
            &sample_table(),
        )
    }

    fn postcodes(value: &str) -> Vec<String> {
        run(Category::PostalCode, "addr:postcode", value)
            .into_iter()
            .map(|candidate| match candidate {
                Candidate::Tag { key, value, tag_type } => {
                    assert_eq!(key, POSTCODE_KEY);
                    assert_eq!(tag_type, TYPE_ADDR);
                    value
                }
                other => panic!("unexpected candidate {other:?}"),
            })
            .collect()
    }

    fn state(value: &str, fips: Option<&str>) -> Candidate {
        Candidate::State {
            value: value.to_string(),
            fips: fips.map(str::to_string),
        }
    }

    #[test]
    fn postcode_variants() {
        assert_eq!(postcodes("25313"), vec!["25313"]);
        assert_eq!(postcodes("12345-6789"), vec!["12345"]);
        assert_eq!(
            postcodes("12345:23456;34567"),
            vec!["12345", "23456", "34567"]
        );
        assert_eq!(postcodes(" WV 25313 "), vec!["WV 25313"]);
        assert_eq!(postcodes(""), vec![""]);
    }

    #[test]
    fn county_codes_by_width() {
        assert_eq!(
            run(Category::County, "gnis:County_num", "039"),
            vec![Candidate::CountyCode("039".to_string())]
        );
        assert_eq!(
            run(Category::County, "gnis:County_num", "39"),
            vec![Candidate::CountyCode("039".to_string())]
        );
        assert_eq!(
            run(Category::County, "county_fips", "54039"),
            vec![Candidate::County("Braxton County".to_string())]
        );
        assert_eq!(
            run(Category::County, "county_fips", "1009"),
            vec![Candidate::County(UNIDENTIFIABLE.to_string())]
        );
        assert_eq!(
            run(Category::County, "county_fips", "99999"),
            vec![Candidate::County(UNIDENTIFIABLE.to_string())]
        );
        assert_eq!(
            run(Category::County, "county_fips", "5403912"),
            vec![Candidate::County(UNIDENTIFIABLE.to_string())]
        );
    }

    #[test]
    fn county_with_state_suffix() {
        assert_eq!(
            run(Category::County, "tiger:county", "Braxton, WV"),
            vec![
                Candidate::County("Braxton".to_string()),
                state("WV", Some("54")),
            ]
        );
    }

    #[test]
    fn county_lists_are_flattened_and_deduplicated() {
        assert_eq!(
            run(
                Category::County,
                "tiger:county",
                "McDowell, WV:Pike, KY;McDowell, WV"
            ),
            vec![
                Candidate::County("McDowell".to_string()),
                state("WV", Some("54")),
                Candidate::County("Pike".to_string()),
                state("KY", Some("21")),
            ]
        );
        assert_eq!(
            run(Category::County, "is_in:county", "Braxton;Clay"),
            vec![
                Candidate::County("Braxton".to_string()),
                Candidate::County("Clay".to_string()),
            ]
        );
    }

    #[test]
    fn state_values() {
        assert_eq!(
            run(Category::State, "gnis:ST_num", "54"),
            vec![state("West Virginia", Some("54"))]
        );
        assert_eq!(
            run(Category::State, "gnis:ST_num", "99"),
            vec![state(UNIDENTIFIABLE, Some("99"))]
        );
        assert_eq!(
            run(Category::State, "addr:state", "W. Va."),
            vec![state("WV", Some("54"))]
        );
        assert_eq!(
            run(Category::State, "addr:state", "Ohio"),
            vec![state("OH", None)]
        );
    }

    #[test]
    fn amenity_corrections() {
        assert_eq!(
            run(Category::Amenity, "amenity", "ATV Trails"),
            vec![Candidate::tag("leisure", "track", TYPE_REGULAR)]
        );
        assert_eq!(
            run(Category::Amenity, "amenity", "cafe"),
            vec![Candidate::tag("amenity", "cafe", TYPE_REGULAR)]
        );
    }

    #[test]
    fn generic_keys_split_on_first_colon() {
        assert_eq!(
            run(Category::Generic, "tiger:name_base:1", "Main"),
            vec![Candidate::tag("name_base:1", "Main", "tiger")]
        );
        assert_eq!(
            run(Category::Generic, "highway", "residential"),
            vec![Candidate::tag("highway", "residential", TYPE_REGULAR)]
        );
        assert_eq!(
            run(Category::Generic, "addr:street", "Baldwin Rd."),
            vec![Candidate::tag("street", "Baldwin Road", TYPE_ADDR)]
        );
    }
}
