use crate::model::RawTag;
use crate::rules::{TagRules, AMENITY_KEYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    PostalCode,
    County,
    State,
    Amenity,
    Generic,
}

type KeyPredicate = fn(&str, &TagRules) -> bool;

/// Evaluated top to bottom; the first match wins.
const RULES: [(KeyPredicate, Category); 4] = [
    (is_postcode_key, Category::PostalCode),
    (is_county_key, Category::County),
    (is_state_key, Category::State),
    (is_amenity_key, Category::Amenity),
];

pub fn classify(tag: &RawTag, rules: &TagRules) -> Category {
    if rules.ignore_keys.contains(&tag.key) {
        return Category::Generic;
    }
    RULES
        .iter()
        .find(|(matches, _)| matches(&tag.key, rules))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Generic)
}

fn is_postcode_key(key: &str, _rules: &TagRules) -> bool {
    let key = key.to_lowercase();
    key.contains("postcode") || key.contains("zip")
}

fn is_county_key(key: &str, _rules: &TagRules) -> bool {
    key.to_lowercase().contains("county")
}

fn is_state_key(key: &str, rules: &TagRules) -> bool {
    key.to_lowercase().contains("state") || has_st_token(key) || rules.state_alias_keys.contains(key)
}

fn is_amenity_key(key: &str, _rules: &TagRules) -> bool {
    AMENITY_KEYS.contains(&key)
}

/// Case-sensitive `ST` as a whole `:`/`_` separated token, as in `gnis:ST_alpha`.
fn has_st_token(key: &str) -> bool {
    key.split([':', '_']).any(|part| part == "ST")
}
