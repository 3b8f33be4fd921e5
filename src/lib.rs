//! Normalizes OpenStreetMap node and way tags into `(id, key, value, type)`
//! rows ready for bulk load.
//!
//! Postal codes, counties and states are cleaned and cross-checked against the
//! Census FIPS table; county codes are only resolved once every state tag of
//! the entity has been seen, and conflicting states produce
//! [`model::UNIDENTIFIABLE`] instead of a guess.

pub mod classify;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod osm;
pub mod parse;
pub mod pipeline;
pub mod reference;
pub mod resolve;
pub mod rules;

pub use error::{Error, Result};
pub use export::CsvSink;
pub use model::{Entity, EntityKind, NormalizedRecord, RawTag, UNIDENTIFIABLE};
pub use pipeline::{NormalizationPipeline, PipelineSummary, RecordSink};
pub use reference::ReferenceTable;
pub use resolve::{EntityResolver, Resolution};
pub use rules::TagRules;
