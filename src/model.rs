use std::fmt;

/// Value written in place of a county or state that could not be pinned down.
pub const UNIDENTIFIABLE: &str = "Unidentifiable (FIPS ambiguity)";

pub const TYPE_ADDR: &str = "addr";
pub const TYPE_REGULAR: &str = "regular";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    pub key: String,
    pub value: String,
}

impl RawTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Way,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => f.write_str("node"),
            EntityKind::Way => f.write_str("way"),
        }
    }
}

/// A node or way as read from the map document. Tag order is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub tags: Vec<RawTag>,
    /// `(lat, lon)` for nodes.
    pub coord: Option<(f64, f64)>,
    /// Ordered node references for ways.
    pub node_refs: Vec<i64>,
}

impl Entity {
    pub fn node(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Node,
            tags: Vec::new(),
            coord: None,
            node_refs: Vec::new(),
        }
    }

    pub fn way(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Way,
            tags: Vec::new(),
            coord: None,
            node_refs: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(RawTag::new(key, value));
        self
    }

    pub fn with_coord(mut self, lat: f64, lon: f64) -> Self {
        self.coord = Some((lat, lon));
        self
    }

    pub fn is_node(&self) -> bool {
        self.kind == EntityKind::Node
    }
}

/// One output row: `(entity_id, key, value, type)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub entity_id: String,
    pub key: String,
    pub value: String,
    pub tag_type: String,
}

impl NormalizedRecord {
    pub fn new(
        entity_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        tag_type: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            key: key.into(),
            value: value.into(),
            tag_type: tag_type.into(),
        }
    }

    pub fn fields(&self) -> [&str; 4] {
        [&self.entity_id, &self.key, &self.value, &self.tag_type]
    }
}
