//! Per-entity resolution.
//!
//! Tags are folded one at a time into a [`ResolutionContext`]. County codes
//! that need a state are parked as pending and re-resolved every time a new
//! state shows up; whatever they hold when the entity is flushed is what gets
//! written. One state resolves them, none or several make them
//! [`UNIDENTIFIABLE`].

use tracing::{debug, trace};

use crate::classify::classify;
use crate::model::{Entity, NormalizedRecord, RawTag, TYPE_ADDR, UNIDENTIFIABLE};
use crate::parse::{parse, Candidate, COUNTY_KEY, STATE_KEY};
use crate::reference::{ReferenceTable, StateKey};
use crate::rules::{is_disallowed_key, TagRules};

#[derive(Debug, Clone, PartialEq, Eq)]
enum StateIdentity {
    Fips(String),
    Name(String),
}

impl StateIdentity {
    fn key(&self) -> StateKey<'_> {
        match self {
            StateIdentity::Fips(fips) => StateKey::Fips(fips),
            StateIdentity::Name(name) => StateKey::Name(name),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCounty {
    code: String,
    resolved: Option<String>,
}

/// Working state for one entity. Created by [`EntityResolver::resolve`] and
/// consumed by its flush, so nothing carries over to the next entity.
#[derive(Debug)]
struct ResolutionContext {
    entity_id: String,
    records: Vec<NormalizedRecord>,
    pending_counties: Vec<PendingCounty>,
    states: Vec<StateIdentity>,
    dropped_tags: usize,
}

impl ResolutionContext {
    fn new(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            records: Vec::new(),
            pending_counties: Vec::new(),
            states: Vec::new(),
            dropped_tags: 0,
        }
    }

    fn push(&mut self, key: &str, value: &str, tag_type: &str) {
        let exists = self
            .records
            .iter()
            .any(|record| record.key == key && record.value == value);
        if !exists {
            self.records
                .push(NormalizedRecord::new(&self.entity_id, key, value, tag_type));
        }
    }

    /// County names compare case-insensitively so repeated source tags collapse.
    fn push_county(&mut self, name: &str) {
        let lowered = name.to_lowercase();
        let exists = self
            .records
            .iter()
            .any(|record| record.key == COUNTY_KEY && record.value.to_lowercase() == lowered);
        if !exists {
            self.records
                .push(NormalizedRecord::new(&self.entity_id, COUNTY_KEY, name, TYPE_ADDR));
        }
    }

    fn defer_county(&mut self, code: String) {
        if !self.pending_counties.iter().any(|pending| pending.code == code) {
            self.pending_counties.push(PendingCounty {
                code,
                resolved: None,
            });
        }
    }

    fn note_state(&mut self, identity: StateIdentity) {
        if !self.states.contains(&identity) {
            self.states.push(identity);
        }
    }
}

/// Output of one flushed entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub records: Vec<NormalizedRecord>,
    pub dropped_tags: usize,
    /// Records of any key carrying [`UNIDENTIFIABLE`], states included.
    pub unidentifiable: usize,
}

/// Borrows only read-only tables, so one resolver can serve many threads.
#[derive(Debug, Clone, Copy)]
pub struct EntityResolver<'a> {
    rules: &'a TagRules,
    lookup: &'a ReferenceTable,
}

impl<'a> EntityResolver<'a> {
    pub fn new(rules: &'a TagRules, lookup: &'a ReferenceTable) -> Self {
        Self { rules, lookup }
    }

    pub fn resolve(&self, entity: &Entity) -> Resolution {
        let mut context = ResolutionContext::new(&entity.id);
        for tag in &entity.tags {
            self.process_tag(entity, tag, &mut context);
        }
        self.flush(context)
    }

    fn process_tag(&self, entity: &Entity, tag: &RawTag, context: &mut ResolutionContext) {
        if is_disallowed_key(&tag.key) {
            trace!(entity = %entity.id, key = %tag.key, "dropping tag with reserved characters in key");
            context.dropped_tags += 1;
            return;
        }

        let category = classify(tag, self.rules);
        let overridden;
        let tag = match self.rules.override_for(entity.kind, &entity.id, category) {
            Some(value) => {
                debug!(entity = %entity.id, key = %tag.key, from = %tag.value, to = %value, "applying entity override");
                overridden = RawTag::new(tag.key.as_str(), value);
                &overridden
            }
            None => tag,
        };

        for candidate in parse(category, tag, self.rules, self.lookup) {
            match candidate {
                Candidate::Tag {
                    key,
                    value,
                    tag_type,
                } => context.push(&key, &value, &tag_type),
                Candidate::County(name) => context.push_county(&name),
                Candidate::CountyCode(code) => {
                    context.defer_county(code);
                    self.resolve_pending(context);
                }
                Candidate::State { value, fips } => {
                    context.push(STATE_KEY, &value, TYPE_ADDR);
                    let identity = match fips {
                        Some(fips) => StateIdentity::Fips(fips),
                        None => StateIdentity::Name(value.to_uppercase()),
                    };
                    context.note_state(identity);
                    self.resolve_pending(context);
                }
            }
        }
    }

    /// Re-derives every pending county from the states seen so far.
    fn resolve_pending(&self, context: &mut ResolutionContext) {
        let resolved = match context.states.as_slice() {
            [] => return,
            [state] => Some(state),
            _ => None,
        };
        for pending in &mut context.pending_counties {
            let name = resolved
                .and_then(|state| {
                    self.lookup
                        .county_name_for(state.key(), &pending.code)
                        .ok()
                })
                .unwrap_or(UNIDENTIFIABLE);
            pending.resolved = Some(name.to_string());
        }
    }

    fn flush(&self, mut context: ResolutionContext) -> Resolution {
        for pending in std::mem::take(&mut context.pending_counties) {
            let name = pending.resolved.unwrap_or_else(|| UNIDENTIFIABLE.to_string());
            if name == UNIDENTIFIABLE {
                debug!(
                    entity = %context.entity_id,
                    code = %pending.code,
                    states = context.states.len(),
                    "county FIPS code left unidentifiable"
                );
            }
            context.push_county(&name);
        }

        let unidentifiable = context
            .records
            .iter()
            .filter(|record| record.value == UNIDENTIFIABLE)
            .count();
        Resolution {
            records: context.records,
            dropped_tags: context.dropped_tags,
            unidentifiable,
        }
    }
}
