//! Event-stream receiver that builds the AST arena.
use super::scalar;
use super::text::TextIndex;
use crate::ast::{AnchorToken, AstNode, NodeId, NodeKind, SourceInfo, YamlDocument};
use crate::problems::Problem;
use serde_json::Value;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

const MERGE_KEY: &str = "<<";

enum FrameKind {
    Seq {
        items: Vec<NodeId>,
    },
    Map {
        properties: Vec<NodeId>,
        pending_prop: Option<NodeId>,
        seen_keys: Vec<String>,
    },
}

struct Frame {
    node: NodeId,
    flow: bool,
    kind: FrameKind,
}

/// Where a finished node lands relative to the innermost open frame.
enum Slot {
    Root,
    SeqItem,
    MapKey,
    MapValue(NodeId),
}

pub(crate) struct AstBuilder<'a> {
    text: &'a str,
    index: &'a TextIndex,
    pub(crate) documents: Vec<YamlDocument>,
    current: YamlDocument,
    stack: Vec<Frame>,
    in_document: bool,
}

impl<'a> AstBuilder<'a> {
    pub(crate) fn new(text: &'a str, index: &'a TextIndex) -> AstBuilder<'a> {
        AstBuilder {
            text,
            index,
            documents: Vec::new(),
            current: YamlDocument::default(),
            stack: Vec::new(),
            in_document: false,
        }
    }

    /// Flush a document that was still open when the stream stopped
    /// (after a scan error).
    pub(crate) fn finish(&mut self) {
        if self.in_document {
            self.finish_document();
        }
    }

    fn finish_document(&mut self) {
        let doc = std::mem::take(&mut self.current);
        self.stack.clear();
        self.in_document = false;
        self.documents.push(doc);
    }

    fn byte_at(&self, marker: Marker) -> usize {
        self.index.byte_offset(marker.index())
    }

    fn rest_at(&self, offset: usize) -> &str {
        &self.text[offset.min(self.text.len())..]
    }

    fn in_flow(&self) -> bool {
        self.stack.iter().any(|frame| frame.flow)
    }

    fn normalized_tag(tag: Option<&Tag>) -> Option<String> {
        let tag = tag?;
        if tag.handle == "!!" {
            Some(format!("tag:yaml.org,2002:{}", tag.suffix))
        } else {
            Some(format!("{}{}", tag.handle, tag.suffix))
        }
    }

    fn register_anchor(&mut self, aid: usize, node: NodeId) {
        if aid == 0 {
            return;
        }
        let start = self.current.node(node).offset;
        if let Some((name, offset)) = scalar::anchor_token_before(self.text, start) {
            self.current.node_mut(node).source.anchor = Some(name.clone());
            self.current.anchor_tokens.push(AnchorToken {
                length: name.len() + 1,
                name: name.clone(),
                offset,
            });
            self.current.anchors.insert(name, node);
        }
    }

    fn slot(&self) -> Slot {
        match self.stack.last() {
            None => Slot::Root,
            Some(frame) => match &frame.kind {
                FrameKind::Seq { .. } => Slot::SeqItem,
                FrameKind::Map { pending_prop, .. } => match pending_prop {
                    None => Slot::MapKey,
                    Some(prop) => Slot::MapValue(*prop),
                },
            },
        }
    }

    /// Attach a completed node to the enclosing container, or make it
    /// the document root.
    fn emit(&mut self, finished: NodeId) {
        match self.slot() {
            Slot::Root => {
                self.current.root = Some(finished);
            }
            Slot::SeqItem => {
                let container = self.stack.last().expect("frame present").node;
                self.current.node_mut(finished).parent = Some(container);
                if let Some(Frame {
                    kind: FrameKind::Seq { items },
                    ..
                }) = self.stack.last_mut()
                {
                    items.push(finished);
                }
            }
            Slot::MapKey => {
                let container = self.stack.last().expect("frame present").node;
                let key = self.coerce_key(finished);
                let (offset, length) = {
                    let node = self.current.node(key);
                    (node.offset, node.length)
                };
                let key_text = match &self.current.node(key).kind {
                    NodeKind::String(s) => s.clone(),
                    _ => String::new(),
                };
                let duplicate = match self.stack.last() {
                    Some(Frame {
                        kind: FrameKind::Map { seen_keys, .. },
                        ..
                    }) => key_text != MERGE_KEY && seen_keys.contains(&key_text),
                    _ => false,
                };
                if duplicate {
                    self.current
                        .problems
                        .push(Problem::warning(offset, length, "Map keys must be unique"));
                }
                let prop = self.current.alloc(AstNode {
                    kind: NodeKind::Property { key, value: None },
                    offset,
                    length,
                    parent: Some(container),
                    source: SourceInfo::default(),
                });
                self.current.node_mut(key).parent = Some(prop);
                if let Some(Frame {
                    kind:
                        FrameKind::Map {
                            properties,
                            pending_prop,
                            seen_keys,
                        },
                    ..
                }) = self.stack.last_mut()
                {
                    properties.push(prop);
                    seen_keys.push(key_text);
                    *pending_prop = Some(prop);
                }
            }
            Slot::MapValue(prop) => {
                if let Some(Frame {
                    kind: FrameKind::Map { pending_prop, .. },
                    ..
                }) = self.stack.last_mut()
                {
                    *pending_prop = None;
                }
                let value_end = self.current.node(finished).end();
                self.current.node_mut(finished).parent = Some(prop);
                let prop_node = self.current.node_mut(prop);
                if let NodeKind::Property { value, .. } = &mut prop_node.kind {
                    *value = Some(finished);
                }
                if value_end > prop_node.offset {
                    prop_node.length = value_end - prop_node.offset;
                }
            }
        }
    }

    /// A value slot came up empty (`key:` with nothing after it).
    /// Sequences get a zero-length Null item; map properties stay
    /// without a value.
    fn emit_missing(&mut self, offset: usize) {
        match self.slot() {
            Slot::Root => {}
            Slot::SeqItem => {
                let node = self.current.alloc(AstNode {
                    kind: NodeKind::Null,
                    offset,
                    length: 0,
                    parent: None,
                    source: SourceInfo::default(),
                });
                self.emit(node);
            }
            Slot::MapKey => {
                let node = self.current.alloc(AstNode {
                    kind: NodeKind::String(String::new()),
                    offset,
                    length: 0,
                    parent: None,
                    source: SourceInfo::default(),
                });
                self.emit(node);
            }
            Slot::MapValue(_) => {
                if let Some(Frame {
                    kind: FrameKind::Map { pending_prop, .. },
                    ..
                }) = self.stack.last_mut()
                {
                    *pending_prop = None;
                }
            }
        }
    }

    fn coerce_key(&mut self, node: NodeId) -> NodeId {
        if matches!(self.current.node(node).kind, NodeKind::String(_)) {
            return node;
        }
        let rendered = match self.current.get_value(node) {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let (offset, length) = {
            let node = self.current.node(node);
            (node.offset, node.length)
        };
        self.current.alloc(AstNode {
            kind: NodeKind::String(rendered),
            offset,
            length,
            parent: None,
            source: SourceInfo::default(),
        })
    }

    fn on_scalar(
        &mut self,
        value: String,
        style: TScalarStyle,
        aid: usize,
        tag: Option<Tag>,
        marker: Marker,
    ) {
        let start = self.byte_at(marker);
        let absent = style == TScalarStyle::Plain
            && value == "~"
            && aid == 0
            && tag.is_none()
            && !self.rest_at(start).starts_with('~');
        if absent {
            self.emit_missing(start);
            return;
        }
        let tag = Self::normalized_tag(tag.as_ref());
        let kind = scalar::scalar_kind(&value, style, tag.as_deref());
        let length = scalar::scalar_source_length(self.text, start, style, self.in_flow());
        let node = self.current.alloc(AstNode {
            kind,
            offset: start,
            length,
            parent: None,
            source: SourceInfo {
                tag,
                ..SourceInfo::default()
            },
        });
        self.register_anchor(aid, node);
        self.emit(node);
    }

    fn on_alias(&mut self, marker: Marker) {
        let start = self.byte_at(marker);
        let (name, length) = match scalar::alias_token_at(self.text, start) {
            Some(token) => token,
            None => {
                self.emit_missing(start);
                return;
            }
        };
        if !self.current.anchors.contains_key(&name) {
            self.current.problems.push(Problem::syntax(
                start,
                length,
                format!("The alias '{}' references an undefined anchor", name),
            ));
        }
        self.current.used_aliases.push(name.clone());
        let node = self.current.alloc(AstNode {
            kind: NodeKind::String(format!("*{}", name)),
            offset: start,
            length,
            parent: None,
            source: SourceInfo {
                alias: Some(name),
                ..SourceInfo::default()
            },
        });
        self.emit(node);
    }

    fn on_collection_start(&mut self, seq: bool, aid: usize, tag: Option<Tag>, marker: Marker) {
        let start = self.byte_at(marker);
        let open = if seq { '[' } else { '{' };
        let flow = self.rest_at(start).starts_with(open);
        let kind = if seq {
            NodeKind::Array { items: Vec::new() }
        } else {
            NodeKind::Object {
                properties: Vec::new(),
            }
        };
        let node = self.current.alloc(AstNode {
            kind,
            offset: start,
            length: 0,
            parent: None,
            source: SourceInfo {
                flow,
                tag: Self::normalized_tag(tag.as_ref()),
                ..SourceInfo::default()
            },
        });
        self.register_anchor(aid, node);
        let kind = if seq {
            FrameKind::Seq { items: Vec::new() }
        } else {
            FrameKind::Map {
                properties: Vec::new(),
                pending_prop: None,
                seen_keys: Vec::new(),
            }
        };
        self.stack.push(Frame { node, flow, kind });
    }

    fn on_collection_end(&mut self, marker: Marker) {
        let frame = match self.stack.pop() {
            Some(frame) => frame,
            None => return,
        };
        let end_marker = self.byte_at(marker);
        let node = frame.node;
        let children = match frame.kind {
            FrameKind::Seq { items } => {
                if let NodeKind::Array { items: slot } = &mut self.current.node_mut(node).kind {
                    *slot = items.clone();
                }
                items
            }
            FrameKind::Map { properties, .. } => {
                if let NodeKind::Object { properties: slot } =
                    &mut self.current.node_mut(node).kind
                {
                    *slot = properties.clone();
                }
                properties
            }
        };
        let start = self.current.node(node).offset;
        let end = if frame.flow {
            // Include the closing bracket when the marker stops on it.
            let rest = self.rest_at(end_marker);
            if rest.starts_with(']') || rest.starts_with('}') {
                end_marker + 1
            } else {
                end_marker
            }
        } else {
            // Block collections extend to their last child; the raw end
            // marker often points at the next line's first token, which
            // would drag the range across the trailing newline.
            children
                .iter()
                .map(|child| self.current.node(*child).end())
                .max()
                .unwrap_or(end_marker)
        };
        let node_mut = self.current.node_mut(node);
        node_mut.length = end.saturating_sub(start);
        self.emit(node);
    }
}

impl MarkedEventReceiver for AstBuilder<'_> {
    fn on_event(&mut self, event: Event, marker: Marker) {
        match event {
            Event::DocumentStart => {
                self.current = YamlDocument::default();
                self.stack.clear();
                self.in_document = true;
            }
            Event::DocumentEnd => self.finish_document(),
            Event::Scalar(value, style, aid, tag) => self.on_scalar(value, style, aid, tag, marker),
            Event::Alias(_) => self.on_alias(marker),
            Event::SequenceStart(aid, tag) => self.on_collection_start(true, aid, tag, marker),
            Event::SequenceEnd => self.on_collection_end(marker),
            Event::MappingStart(aid, tag) => self.on_collection_start(false, aid, tag, marker),
            Event::MappingEnd => self.on_collection_end(marker),
            _ => {}
        }
    }
}
