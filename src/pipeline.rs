//! Drives entities through the resolver and into a sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

use crate::error::{ExportError, Result, SourceError};
use crate::model::{Entity, EntityKind, NormalizedRecord};
use crate::reference::ReferenceTable;
use crate::resolve::{EntityResolver, Resolution};
use crate::rules::TagRules;

/// Entities handed to each worker per batch when running with several jobs.
const ENTITIES_PER_JOB: usize = 256;

/// Receives every entity together with its normalized tag rows.
pub trait RecordSink {
    fn write_entity(&mut self, entity: &Entity, records: &[NormalizedRecord]) -> std::result::Result<(), ExportError>;

    fn finish(&mut self) -> std::result::Result<(), ExportError> {
        Ok(())
    }
}

impl RecordSink for Vec<(EntityKind, NormalizedRecord)> {
    fn write_entity(&mut self, entity: &Entity, records: &[NormalizedRecord]) -> std::result::Result<(), ExportError> {
        self.extend(records.iter().cloned().map(|record| (entity.kind, record)));
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub entities: usize,
    pub nodes: usize,
    pub ways: usize,
    pub records: usize,
    pub dropped_tags: usize,
    pub unidentifiable: usize,
    pub cancelled: bool,
}

impl PipelineSummary {
    fn add(&mut self, entity: &Entity, resolution: &Resolution) {
        self.entities += 1;
        match entity.kind {
            EntityKind::Node => self.nodes += 1,
            EntityKind::Way => self.ways += 1,
        }
        self.records += resolution.records.len();
        self.dropped_tags += resolution.dropped_tags;
        self.unidentifiable += resolution.unidentifiable;
    }
}

pub struct NormalizationPipeline {
    rules: TagRules,
    lookup: ReferenceTable,
    jobs: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl NormalizationPipeline {
    pub fn new(lookup: ReferenceTable) -> Self {
        Self {
            rules: TagRules::default(),
            lookup,
            jobs: 1,
            cancel: None,
        }
    }

    pub fn with_rules(mut self, rules: TagRules) -> Self {
        self.rules = rules;
        self
    }

    /// Number of worker threads; values below 1 are treated as 1.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Checked before each entity is taken from the source. Entities already
    /// resolved are always written, so no entity is flushed halfway.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn resolver(&self) -> EntityResolver<'_> {
        EntityResolver::new(&self.rules, &self.lookup)
    }

    pub fn run<I, S>(&self, entities: I, sink: &mut S) -> Result<PipelineSummary>
    where
        I: IntoIterator<Item = std::result::Result<Entity, SourceError>>,
        S: RecordSink + ?Sized,
    {
        info!(jobs = self.jobs, "normalizing entities");
        let pool = if self.jobs > 1 {
            Some(ThreadPoolBuilder::new().num_threads(self.jobs).build()?)
        } else {
            None
        };
        let batch_size = if pool.is_some() {
            self.jobs * ENTITIES_PER_JOB
        } else {
            1
        };

        let mut summary = PipelineSummary::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut entities = entities.into_iter();
        loop {
            if self.is_cancelled() {
                warn!(
                    entities = summary.entities + batch.len(),
                    "cancelled; no further entities will be read"
                );
                summary.cancelled = true;
                break;
            }
            let Some(entity) = entities.next() else {
                break;
            };
            batch.push(entity?);
            if batch.len() >= batch_size {
                self.write_batch(pool.as_ref(), &batch, sink, &mut summary)?;
                batch.clear();
            }
        }
        // entities already read are finished even after a cancel
        if !batch.is_empty() {
            self.write_batch(pool.as_ref(), &batch, sink, &mut summary)?;
        }
        sink.finish()?;

        info!(
            entities = summary.entities,
            nodes = summary.nodes,
            ways = summary.ways,
            records = summary.records,
            dropped_tags = summary.dropped_tags,
            unidentifiable = summary.unidentifiable,
            "normalization finished"
        );
        Ok(summary)
    }

    fn write_batch<S>(
        &self,
        pool: Option<&ThreadPool>,
        batch: &[Entity],
        sink: &mut S,
        summary: &mut PipelineSummary,
    ) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        for (entity, resolution) in batch.iter().zip(self.resolve_batch(pool, batch)) {
            sink.write_entity(entity, &resolution.records)?;
            summary.add(entity, &resolution);
        }
        Ok(())
    }

    /// Resolves `entities` on `pool` when there is one, keeping input order.
    fn resolve_batch(&self, pool: Option<&ThreadPool>, entities: &[Entity]) -> Vec<Resolution> {
        let resolver = self.resolver();
        match pool {
            Some(pool) => pool.install(|| {
                entities
                    .par_iter()
                    .map(|entity| resolver.resolve(entity))
                    .collect()
            }),
            None => entities.iter().map(|entity| resolver.resolve(entity)).collect(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNIDENTIFIABLE;
    use crate::reference::tests::sample_table;

    fn entities() -> Vec<Entity> {
        vec![
            Entity::node("1")
                .with_coord(38.6, -80.7)
                .with_tag("gnis:County_num", "039")
                .with_tag("gnis:ST_num", "54"),
            Entity::node("2")
                .with_coord(38.7, -80.8)
                .with_tag("gnis:County_num", "039"),
            Entity::way("10")
                .with_tag("highway", "residential")
                .with_tag("bad key", "x"),
        ]
    }

    fn sourced(entities: Vec<Entity>) -> Vec<std::result::Result<Entity, SourceError>> {
        entities.into_iter().map(Ok).collect()
    }

    #[test]
    fn run_routes_records_and_counts() {
        let pipeline = NormalizationPipeline::new(sample_table());
        let mut sink: Vec<(EntityKind, NormalizedRecord)> = Vec::new();
        let summary = pipeline.run(sourced(entities()), &mut sink).unwrap();

        assert_eq!(
            summary,
            PipelineSummary {
                entities: 3,
                nodes: 2,
                ways: 1,
                records: 4,
                dropped_tags: 1,
                unidentifiable: 1,
                cancelled: false,
            }
        );
        assert_eq!(
            sink,
            vec![
                (
                    EntityKind::Node,
                    NormalizedRecord::new("1", "state", "West Virginia", "addr")
                ),
                (
                    EntityKind::Node,
                    NormalizedRecord::new("1", "county", "Braxton County", "addr")
                ),
                (
                    EntityKind::Node,
                    NormalizedRecord::new("2", "county", UNIDENTIFIABLE, "addr")
                ),
                (
                    EntityKind::Way,
                    NormalizedRecord::new("10", "highway", "residential", "regular")
                ),
            ]
        );
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let mut many = Vec::new();
        for round in 0..50 {
            for mut entity in entities() {
                entity.id = format!("{}-{round}", entity.id);
                many.push(entity);
            }
        }

        let sequential = NormalizationPipeline::new(sample_table());
        let parallel = NormalizationPipeline::new(sample_table()).with_jobs(4);
        let mut expected: Vec<(EntityKind, NormalizedRecord)> = Vec::new();
        let mut actual: Vec<(EntityKind, NormalizedRecord)> = Vec::new();
        sequential.run(sourced(many.clone()), &mut expected).unwrap();
        parallel.run(sourced(many), &mut actual).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn cancel_flag_stops_before_next_entity() {
        let flag = Arc::new(AtomicBool::new(true));
        let pipeline = NormalizationPipeline::new(sample_table()).with_cancel_flag(flag);
        let mut sink: Vec<(EntityKind, NormalizedRecord)> = Vec::new();
        let summary = pipeline.run(sourced(entities()), &mut sink).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.entities, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn cancel_mid_run_finishes_entities_already_read() {
        let flag = Arc::new(AtomicBool::new(false));
        let pipeline = NormalizationPipeline::new(sample_table())
            .with_jobs(2)
            .with_cancel_flag(Arc::clone(&flag));
        let source = (0..10).map(move |index| {
            if index == 4 {
                flag.store(true, Ordering::Relaxed);
            }
            Ok(Entity::node(index.to_string()).with_tag("name", "Sutton"))
        });
        let mut sink: Vec<(EntityKind, NormalizedRecord)> = Vec::new();
        let summary = pipeline.run(source, &mut sink).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.entities, 5);
        let ids: Vec<&str> = sink
            .iter()
            .map(|(_, record)| record.entity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn source_errors_abort_the_run() {
        let pipeline = NormalizationPipeline::new(sample_table());
        let mut sink: Vec<(EntityKind, NormalizedRecord)> = Vec::new();
        let input = vec![
            Ok(Entity::node("1").with_tag("name", "A")),
            Err(SourceError::MissingAttribute {
                element: "node",
                attribute: "id",
            }),
        ];
        let err = pipeline.run(input, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Source(SourceError::MissingAttribute { .. })
        ));
    }
}
