//! The JSON-compatible abstract syntax tree over a YAML document.
//!
//! Nodes live in a per-document arena and refer to each other by index,
//! so parent backrefs never create ownership cycles. Offsets and lengths
//! are byte positions within the document text.
use crate::problems::Problem;
use ahash::AHashMap;
use serde_json::{Map, Number, Value};

/// Index of a node inside its document's arena.
pub type NodeId = u32;

/// Extra information carried over from the YAML tokenizer: collection
/// style, explicit tag, anchor/alias names. Used for range fix-ups,
/// style diagnostics and anchor bookkeeping only; validation semantics
/// never depend on it directly.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// The node was written in flow style (`[a, b]` / `{a: b}`).
    pub flow: bool,
    /// Fully resolved tag, e.g. `tag:yaml.org,2002:str` or `!Ref`.
    pub tag: Option<String>,
    /// Anchor name if the node carries `&name`.
    pub anchor: Option<String>,
    /// Alias name if the node is a `*name` reference. Alias nodes are
    /// String leaves; the document's anchor table resolves them.
    pub alias: Option<String>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Null,
    Boolean(bool),
    Number { value: f64, is_integer: bool },
    String(String),
    Array { items: Vec<NodeId> },
    Object { properties: Vec<NodeId> },
    Property { key: NodeId, value: Option<NodeId> },
}

#[derive(Clone, Debug)]
pub struct AstNode {
    pub kind: NodeKind,
    pub offset: usize,
    pub length: usize,
    pub parent: Option<NodeId>,
    pub source: SourceInfo,
}

impl AstNode {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// The node's JSON type name as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Null => "null",
            NodeKind::Boolean(_) => "boolean",
            NodeKind::Number { .. } => "number",
            NodeKind::String(_) => "string",
            NodeKind::Array { .. } => "array",
            NodeKind::Object { .. } => "object",
            NodeKind::Property { .. } => "property",
        }
    }

    pub fn is_alias(&self) -> bool {
        self.source.alias.is_some()
    }
}

/// An anchor definition token, kept for unused-anchor diagnostics.
#[derive(Clone, Debug)]
pub struct AnchorToken {
    pub name: String,
    pub offset: usize,
    pub length: usize,
}

/// One document of a YAML stream, with its node arena and anchor table.
#[derive(Debug, Default)]
pub struct YamlDocument {
    nodes: Vec<AstNode>,
    pub root: Option<NodeId>,
    /// `anchor name → anchored node`. Later definitions shadow earlier
    /// ones, matching YAML alias lookup.
    pub(crate) anchors: AHashMap<String, NodeId>,
    pub(crate) anchor_tokens: Vec<AnchorToken>,
    /// Alias names referenced anywhere in the document.
    pub(crate) used_aliases: Vec<String>,
    /// Problems found during conversion (duplicate keys, unresolvable
    /// aliases).
    pub(crate) problems: Vec<Problem>,
}

impl YamlDocument {
    pub(crate) fn alloc(&mut self, node: AstNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Child node ids in source order. Properties contribute their key
    /// and value, mirroring the tree the offset queries descend.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).kind {
            NodeKind::Array { items } => items.clone(),
            NodeKind::Object { properties } => properties.clone(),
            NodeKind::Property { key, value } => {
                let mut out = vec![*key];
                if let Some(value) = value {
                    out.push(*value);
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// Whether `offset` falls inside the node's span. The right bound is
    /// inclusive when `include_right_bound` is set; user offsets sit
    /// between characters, so a cursor at the very end of a token still
    /// belongs to it.
    pub fn contains(&self, id: NodeId, offset: usize, include_right_bound: bool) -> bool {
        let node = self.node(id);
        offset >= node.offset
            && (offset < node.end() || (include_right_bound && offset == node.end()))
    }

    /// Deepest node containing `offset`, descending iteratively so deep
    /// documents cannot overflow the stack.
    pub fn find_node_at_offset(
        &self,
        from: NodeId,
        offset: usize,
        include_right_bound: bool,
    ) -> Option<NodeId> {
        if !self.contains(from, offset, include_right_bound) {
            return None;
        }
        let mut current = from;
        'descend: loop {
            for child in self.children(current) {
                if self.node(child).offset <= offset
                    && self.contains(child, offset, include_right_bound)
                {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    /// Smallest enclosing node for `offset` with the right bound
    /// inclusive; ties are broken towards the shortest span.
    pub fn node_from_offset_end_inclusive(&self, from: NodeId, offset: usize) -> Option<NodeId> {
        if !self.contains(from, offset, true) {
            return None;
        }
        let mut current = from;
        'descend: loop {
            let mut best: Option<NodeId> = None;
            for child in self.children(current) {
                if self.contains(child, offset, true) {
                    let better = match best {
                        Some(b) => self.node(child).length < self.node(b).length,
                        None => true,
                    };
                    if better {
                        best = Some(child);
                    }
                }
            }
            match best {
                Some(child) => {
                    current = child;
                    continue 'descend;
                }
                None => return Some(current),
            }
        }
    }

    /// Resolve an alias node to its referent, transitively. Returns the
    /// node itself when it is not an alias or the chain does not
    /// resolve; cycles stop at the first repetition.
    pub fn resolve_alias(&self, id: NodeId) -> NodeId {
        let mut current = id;
        let mut seen: Vec<&str> = Vec::new();
        while let Some(alias) = self.node(current).source.alias.as_deref() {
            if seen.iter().any(|s| *s == alias) {
                return current;
            }
            match self.anchors.get(alias) {
                Some(&target) => {
                    seen.push(alias);
                    current = target;
                }
                None => return current,
            }
        }
        current
    }

    /// Key text of a Property node.
    pub fn property_key(&self, prop: NodeId) -> &str {
        if let NodeKind::Property { key, .. } = &self.node(prop).kind {
            if let NodeKind::String(s) = &self.node(*key).kind {
                return s;
            }
        }
        ""
    }

    /// Reify the subtree as a plain JSON value. Aliases resolve through
    /// the anchor table; reference cycles collapse to null.
    pub fn get_value(&self, id: NodeId) -> Value {
        self.reify(id, &mut Vec::new())
    }

    fn reify(&self, id: NodeId, visiting: &mut Vec<String>) -> Value {
        let node = self.node(id);
        if let Some(alias) = node.source.alias.clone() {
            if visiting.contains(&alias) {
                return Value::Null;
            }
            if let Some(&target) = self.anchors.get(&alias) {
                visiting.push(alias);
                let value = self.reify(target, visiting);
                visiting.pop();
                return value;
            }
        }
        match &node.kind {
            NodeKind::Null => Value::Null,
            NodeKind::Boolean(b) => Value::Bool(*b),
            NodeKind::Number { value, is_integer } => {
                if *is_integer
                    && value.fract() == 0.0
                    && *value >= i64::MIN as f64
                    && *value <= i64::MAX as f64
                {
                    Value::Number(Number::from(*value as i64))
                } else {
                    Number::from_f64(*value).map(Value::Number).unwrap_or(Value::Null)
                }
            }
            NodeKind::String(s) => Value::String(s.clone()),
            NodeKind::Array { items } => {
                Value::Array(items.iter().map(|item| self.reify(*item, visiting)).collect())
            }
            NodeKind::Object { properties } => {
                let mut map = Map::new();
                for prop in properties {
                    if let NodeKind::Property { key: _, value } = &self.node(*prop).kind {
                        let key = self.property_key(*prop).to_string();
                        let value = match value {
                            Some(value) => self.reify(*value, visiting),
                            None => Value::Null,
                        };
                        map.insert(key, value);
                    }
                }
                Value::Object(map)
            }
            NodeKind::Property { value, .. } => match value {
                Some(value) => self.reify(*value, visiting),
                None => Value::Null,
            },
        }
    }

    /// Preorder walk over the subtree, iterative. The callback returns
    /// `false` to skip a node's children.
    pub fn visit(&self, from: NodeId, callback: &mut dyn FnMut(NodeId) -> bool) {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if callback(id) {
                let mut children = self.children(id);
                children.reverse();
                stack.extend(children);
            }
        }
    }
}
