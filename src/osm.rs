//! Entity sources: OSM XML through quick-xml and OSM PBF through osmpbfreader.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use osmpbfreader::{OsmObj, OsmPbfReader};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::SourceError;
use crate::model::{Entity, RawTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Xml,
    Pbf,
}

impl InputFormat {
    /// `.osm` is XML; everything else is read as PBF.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("osm") => InputFormat::Xml,
            _ => InputFormat::Pbf,
        }
    }
}

fn get_attr_value(event: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, SourceError> {
    for attr in event.attributes().with_checks(false) {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

fn required_id(event: &BytesStart<'_>, element: &'static str) -> Result<String, SourceError> {
    get_attr_value(event, b"id")?
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(SourceError::MissingAttribute {
            element,
            attribute: "id",
        })
}

#[derive(Default)]
struct XmlState {
    current: Option<Entity>,
}

impl XmlState {
    /// Returns an entity when a self-closing `<node/>` or `<way/>` completes it.
    fn open(&mut self, event: &BytesStart<'_>, empty: bool) -> Result<Option<Entity>, SourceError> {
        let entity = match event.name().as_ref() {
            b"node" => {
                let mut node = Entity::node(required_id(event, "node")?);
                let lat = get_attr_value(event, b"lat")?.and_then(|value| value.parse::<f64>().ok());
                let lon = get_attr_value(event, b"lon")?.and_then(|value| value.parse::<f64>().ok());
                if let (Some(lat), Some(lon)) = (lat, lon) {
                    node.coord = Some((lat, lon));
                }
                node
            }
            b"way" => Entity::way(required_id(event, "way")?),
            b"tag" => {
                // tags under <relation> land here with no current entity
                if let Some(entity) = self.current.as_mut() {
                    let key = get_attr_value(event, b"k")?;
                    let value = get_attr_value(event, b"v")?;
                    if let (Some(key), Some(value)) = (key, value) {
                        entity.tags.push(RawTag::new(key, value));
                    }
                }
                return Ok(None);
            }
            b"nd" => {
                if let Some(way) = self.current.as_mut() {
                    if let Some(reference) =
                        get_attr_value(event, b"ref")?.and_then(|value| value.parse::<i64>().ok())
                    {
                        way.node_refs.push(reference);
                    }
                }
                return Ok(None);
            }
            _ => return Ok(None),
        };

        if empty {
            return Ok(Some(entity));
        }
        self.current = Some(entity);
        Ok(None)
    }

    fn close(&mut self, name: &[u8]) -> Option<Entity> {
        match name {
            b"node" | b"way" => self.current.take(),
            _ => None,
        }
    }
}

/// Streams nodes and ways out of an `.osm` document in file order.
pub struct OsmXmlEntities<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    state: XmlState,
    done: bool,
}

impl OsmXmlEntities<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> OsmXmlEntities<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            state: XmlState::default(),
            done: false,
        }
    }

    fn next_entity(&mut self) -> Result<Option<Entity>, SourceError> {
        loop {
            let finished = match self.reader.read_event_into(&mut self.buf)? {
                Event::Eof => return Ok(None),
                Event::Start(e) => self.state.open(&e, false)?,
                Event::Empty(e) => self.state.open(&e, true)?,
                Event::End(e) => self.state.close(e.name().as_ref()),
                _ => None,
            };
            self.buf.clear();
            if finished.is_some() {
                return Ok(finished);
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmXmlEntities<R> {
    type Item = Result<Entity, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entity() {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Nodes and ways from a PBF reader. Tags come in the reader's key order.
pub fn pbf_entities<R>(
    pbf: &mut OsmPbfReader<R>,
) -> impl Iterator<Item = Result<Entity, SourceError>> + '_
where
    R: io::Read + io::Seek,
{
    pbf.iter().filter_map(|obj| match obj {
        Ok(OsmObj::Node(node)) => {
            let mut entity = Entity::node(node.id.0.to_string()).with_coord(node.lat(), node.lon());
            entity.tags = node
                .tags
                .iter()
                .map(|(key, value)| RawTag::new(key.to_string(), value.to_string()))
                .collect();
            Some(Ok(entity))
        }
        Ok(OsmObj::Way(way)) => {
            let mut entity = Entity::way(way.id.0.to_string());
            entity.tags = way
                .tags
                .iter()
                .map(|(key, value)| RawTag::new(key.to_string(), value.to_string()))
                .collect();
            entity.node_refs = way.nodes.iter().map(|node_id| node_id.0).collect();
            Some(Ok(entity))
        }
        Ok(OsmObj::Relation(_)) => None,
        Err(err) => Some(Err(SourceError::from(err))),
    })
}
