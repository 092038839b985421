//! Collector for `{node, schema}` pairs visited during validation;
//! this is what completion and hover use to find the schemas that
//! apply at a cursor.
use crate::ast::{NodeId, YamlDocument};
use crate::schema::SchemaNode;

#[derive(Clone, Debug)]
pub struct MatchingSchema {
    pub node: NodeId,
    pub schema: SchemaNode,
    /// Set when the pair was gathered under a `not`.
    pub inverted: bool,
}

#[derive(Debug)]
pub enum SchemaCollector {
    Collecting {
        /// When set, only nodes whose span contains this offset are
        /// collected (and descended into).
        focus: Option<usize>,
        exclude: Option<NodeId>,
        schemas: Vec<MatchingSchema>,
    },
    NoOp,
}

impl SchemaCollector {
    pub fn collecting(focus: Option<usize>, exclude: Option<NodeId>) -> SchemaCollector {
        SchemaCollector::Collecting {
            focus,
            exclude,
            schemas: Vec::new(),
        }
    }

    pub fn noop() -> SchemaCollector {
        SchemaCollector::NoOp
    }

    /// Whether validation should bother with this node at all.
    pub fn include(&self, doc: &YamlDocument, node: NodeId) -> bool {
        match self {
            SchemaCollector::NoOp => true,
            SchemaCollector::Collecting { focus, exclude, .. } => {
                let in_focus = match focus {
                    Some(offset) => doc.contains(node, *offset, true),
                    None => true,
                };
                in_focus && *exclude != Some(node)
            }
        }
    }

    pub fn add(&mut self, matching: MatchingSchema) {
        if let SchemaCollector::Collecting { schemas, .. } = self {
            schemas.push(matching);
        }
    }

    /// Fork an empty collector for an alternative arm; the focus filter
    /// is dropped so the arm is explored fully, only the exclusion is
    /// kept.
    pub fn new_sub(&self) -> SchemaCollector {
        match self {
            SchemaCollector::NoOp => SchemaCollector::NoOp,
            SchemaCollector::Collecting { exclude, .. } => {
                SchemaCollector::collecting(None, *exclude)
            }
        }
    }

    /// Absorb a sub-collector.
    pub fn merge(&mut self, other: SchemaCollector) {
        if let (
            SchemaCollector::Collecting { schemas, .. },
            SchemaCollector::Collecting {
                schemas: incoming, ..
            },
        ) = (self, other)
        {
            schemas.extend(incoming);
        }
    }

    /// Absorb a sub-collector with the inverted flag flipped (for
    /// schemas gathered under `not`).
    pub fn merge_inverted(&mut self, other: SchemaCollector) {
        if let (
            SchemaCollector::Collecting { schemas, .. },
            SchemaCollector::Collecting {
                schemas: incoming, ..
            },
        ) = (self, other)
        {
            schemas.extend(incoming.into_iter().map(|mut m| {
                m.inverted = !m.inverted;
                m
            }));
        }
    }

    pub fn into_schemas(self) -> Vec<MatchingSchema> {
        match self {
            SchemaCollector::Collecting { schemas, .. } => schemas,
            SchemaCollector::NoOp => Vec::new(),
        }
    }
}
