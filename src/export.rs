//! CSV tables ready for bulk load, one file per table.

use std::fs::{self, File};
use std::path::Path;

use csv::Writer;
use tracing::info;

use crate::error::ExportError;
use crate::model::{Entity, EntityKind, NormalizedRecord};
use crate::pipeline::RecordSink;

pub const NODES_FILE: &str = "nodes.csv";
pub const NODES_TAGS_FILE: &str = "nodes_tags.csv";
pub const WAYS_FILE: &str = "ways.csv";
pub const WAYS_TAGS_FILE: &str = "ways_tags.csv";
pub const WAYS_NODES_FILE: &str = "ways_nodes.csv";

const NODE_FIELDS: [&str; 3] = ["id", "lat", "lon"];
const TAG_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
const WAY_FIELDS: [&str; 1] = ["id"];
const WAY_NODE_FIELDS: [&str; 3] = ["id", "node_id", "position"];

pub struct CsvSink {
    nodes: Writer<File>,
    nodes_tags: Writer<File>,
    ways: Writer<File>,
    ways_tags: Writer<File>,
    ways_nodes: Writer<File>,
}

fn create_table(dir: &Path, name: &str, header: &[&str]) -> Result<Writer<File>, ExportError> {
    let mut writer = Writer::from_path(dir.join(name))?;
    writer.write_record(header)?;
    Ok(writer)
}

impl CsvSink {
    pub fn create(dir: &Path) -> Result<Self, ExportError> {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
        info!(dir = %dir.display(), "writing CSV tables");
        Ok(Self {
            nodes: create_table(dir, NODES_FILE, &NODE_FIELDS)?,
            nodes_tags: create_table(dir, NODES_TAGS_FILE, &TAG_FIELDS)?,
            ways: create_table(dir, WAYS_FILE, &WAY_FIELDS)?,
            ways_tags: create_table(dir, WAYS_TAGS_FILE, &TAG_FIELDS)?,
            ways_nodes: create_table(dir, WAYS_NODES_FILE, &WAY_NODE_FIELDS)?,
        })
    }
}

impl RecordSink for CsvSink {
    fn write_entity(&mut self, entity: &Entity, records: &[NormalizedRecord]) -> Result<(), ExportError> {
        let tags = match entity.kind {
            EntityKind::Node => {
                if let Some((lat, lon)) = entity.coord {
                    self.nodes
                        .write_record([entity.id.clone(), format!("{lat}"), format!("{lon}")])?;
                }
                &mut self.nodes_tags
            }
            EntityKind::Way => {
                self.ways.write_record([entity.id.as_str()])?;
                for (position, node_id) in entity.node_refs.iter().enumerate() {
                    self.ways_nodes.write_record([
                        entity.id.clone(),
                        node_id.to_string(),
                        position.to_string(),
                    ])?;
                }
                &mut self.ways_tags
            }
        };
        for record in records {
            tags.write_record(record.fields())?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        for writer in [
            &mut self.nodes,
            &mut self.nodes_tags,
            &mut self.ways,
            &mut self.ways_tags,
            &mut self.ways_nodes,
        ] {
            writer.flush()?;
        }
        Ok(())
    }
}
