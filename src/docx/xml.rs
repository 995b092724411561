use anyhow::{anyhow, Context};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

#[derive(Clone, Debug)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    PI {
        content: String,
    },
    DocType {
        text: String,
    },
}

pub fn parse_events(xml_bytes: &[u8]) -> anyhow::Result<Vec<XmlEvent>> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => events.push(XmlEvent::Start {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::End(e) => events.push(XmlEvent::End {
                name: bytes_to_string(e.name().as_ref()),
            }),
            Event::Empty(s) => events.push(XmlEvent::Empty {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::Text(t) => {
                let text = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => events.push(XmlEvent::CData {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::Comment(t) => events.push(XmlEvent::Comment {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::PI(t) => {
                let target = bytes_to_string(t.target());
                let content = bytes_to_string(t.content());
                events.push(XmlEvent::PI {
                    content: format!("{target}{content}"),
                });
            }
            Event::DocType(t) => events.push(XmlEvent::DocType {
                text: bytes_to_string(t.into_inner()),
            }),
        }
    }
    Ok(events)
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        // Values stay in their raw, already-escaped form so character references survive
        // a round trip untouched.
        attrs.push((
            bytes_to_string(a.key.as_ref()),
            bytes_to_string(a.value.as_ref()),
        ));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_events(events: &[XmlEvent]) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    fn write_start_like(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
        out.extend_from_slice(b"<");
        out.extend_from_slice(name.as_bytes());
        for (k, v) in attrs {
            out.extend_from_slice(b" ");
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b"=\"");
            out.extend_from_slice(v.as_bytes());
            out.extend_from_slice(b"\"");
        }
        if empty {
            out.extend_from_slice(b"/>");
        } else {
            out.extend_from_slice(b">");
        }
    }

    for ev in events {
        match ev {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let d =
                    BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
                let mut writer = quick_xml::Writer::new(Vec::new());
                writer.write_event(Event::Decl(d)).context("write decl")?;
                out.extend_from_slice(&writer.into_inner());
            }
            XmlEvent::Start { name, attrs } => write_start_like(&mut out, name, attrs, false),
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b">");
            }
            XmlEvent::Empty { name, attrs } => write_start_like(&mut out, name, attrs, true),
            XmlEvent::Text { text } => out.extend_from_slice(escape_text(text).as_bytes()),
            XmlEvent::CData { text } => {
                out.extend_from_slice(b"<![CDATA[");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"]]>");
            }
            XmlEvent::Comment { text } => {
                out.extend_from_slice(b"<!--");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"-->");
            }
            XmlEvent::PI { content } => {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(content.as_bytes());
                out.extend_from_slice(b"?>");
            }
            XmlEvent::DocType { text } => {
                out.extend_from_slice(b"<!DOCTYPE");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b">");
            }
        }
    }

    Ok(out)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes a value for storage as a raw attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    /// Declarations, comments, CDATA and the like; written back as-is.
    Verbatim(XmlEvent),
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed XML tree for one package part.
///
/// Nodes are never freed: detaching a node only unlinks it from its parent's child list, so
/// every `NodeId` handed out stays valid for the lifetime of the tree. Serialization walks from
/// the document node, so detached subtrees simply disappear from the output.
#[derive(Clone, Debug)]
pub struct XmlTree {
    pub name: String,
    nodes: Vec<Node>,
}

impl XmlTree {
    pub fn parse(name: &str, xml_bytes: &[u8]) -> anyhow::Result<Self> {
        let events = parse_events(xml_bytes).with_context(|| format!("parse xml: {name}"))?;
        Self::from_events(name, events)
    }

    pub fn from_events(name: &str, events: Vec<XmlEvent>) -> anyhow::Result<Self> {
        let mut tree = XmlTree {
            name: name.to_string(),
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        };
        let mut stack: Vec<(NodeId, String)> = vec![(tree.document(), String::new())];

        for ev in events {
            let parent = stack.last().map(|(id, _)| *id).unwrap_or(tree.document());
            match ev {
                XmlEvent::Start { name, attrs } => {
                    let id = tree.push_node(NodeKind::Element {
                        name: name.clone(),
                        attrs,
                    });
                    tree.append_child(parent, id);
                    stack.push((id, name));
                }
                XmlEvent::Empty { name, attrs } => {
                    let id = tree.push_node(NodeKind::Element { name, attrs });
                    tree.append_child(parent, id);
                }
                XmlEvent::End { name } => match stack.pop() {
                    Some((_, open)) if open == name => {}
                    Some((_, open)) => {
                        return Err(anyhow!(
                            "mismatched end tag in {}: expected </{open}>, found </{name}>",
                            tree.name
                        ))
                    }
                    None => return Err(anyhow!("unbalanced end tag in {}: </{name}>", tree.name)),
                },
                XmlEvent::Text { text } => {
                    let id = tree.push_node(NodeKind::Text(text));
                    tree.append_child(parent, id);
                }
                other => {
                    let id = tree.push_node(NodeKind::Verbatim(other));
                    tree.append_child(parent, id);
                }
            }
        }

        if stack.len() != 1 {
            let open = stack.last().map(|(_, n)| n.as_str()).unwrap_or("");
            return Err(anyhow!("unterminated element in {}: <{open}>", tree.name));
        }
        Ok(tree)
    }

    pub fn to_events(&self) -> Vec<XmlEvent> {
        let mut out = Vec::with_capacity(self.nodes.len() * 2);
        for &child in self.children(self.document()) {
            self.flatten_into(child, &mut out);
        }
        out
    }

    fn flatten_into(&self, id: NodeId, out: &mut Vec<XmlEvent>) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Document => {
                for &child in &node.children {
                    self.flatten_into(child, out);
                }
            }
            NodeKind::Element { name, attrs } => {
                if node.children.is_empty() {
                    out.push(XmlEvent::Empty {
                        name: name.clone(),
                        attrs: attrs.clone(),
                    });
                    return;
                }
                out.push(XmlEvent::Start {
                    name: name.clone(),
                    attrs: attrs.clone(),
                });
                for &child in &node.children {
                    self.flatten_into(child, out);
                }
                out.push(XmlEvent::End { name: name.clone() });
            }
            NodeKind::Text(text) => out.push(XmlEvent::Text { text: text.clone() }),
            NodeKind::Verbatim(ev) => out.push(ev.clone()),
        }
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        write_events(&self.to_events()).with_context(|| format!("serialize xml: {}", self.name))
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.document())
            .iter()
            .copied()
            .find(|&c| self.element_name(c).is_some())
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn new_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push_node(NodeKind::Element {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), escape_attr(v)))
                .collect(),
        })
    }

    pub fn new_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.element_name(id) == Some(name)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            let value = escape_attr(value);
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => *v = value,
                None => attrs.push((key.to_string(), value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            attrs.retain(|(k, _)| k != key);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child_elements(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c, name))
            .collect()
    }

    pub fn first_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.is_element(c, name))
    }

    /// Concatenated text of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack: Vec<NodeId> = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(t) = self.text(cur) {
                out.push_str(t);
            }
            stack.extend(self.children(cur).iter().rev().copied());
        }
        out
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> anyhow::Result<()> {
        let parent = self
            .parent(anchor)
            .with_context(|| format!("insert after detached node in {}", self.name))?;
        self.detach(node);
        let pos = self.position(parent, anchor)?;
        self.insert_child(parent, pos + 1, node);
        Ok(())
    }

    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) -> anyhow::Result<()> {
        let parent = self
            .parent(anchor)
            .with_context(|| format!("insert before detached node in {}", self.name))?;
        self.detach(node);
        let pos = self.position(parent, anchor)?;
        self.insert_child(parent, pos, node);
        Ok(())
    }

    fn position(&self, parent: NodeId, child: NodeId) -> anyhow::Result<usize> {
        self.children(parent)
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| anyhow!("node is not a child of its recorded parent in {}", self.name))
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Detaches every child of `id` except elements whose name is in `keep`.
    pub fn retain_children(&mut self, id: NodeId, keep: &[&str]) {
        let doomed: Vec<NodeId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|&c| !self.element_name(c).is_some_and(|n| keep.contains(&n)))
            .collect();
        for c in doomed {
            self.detach(c);
        }
    }

    /// Copies the subtree rooted at `id`; the copy starts out detached.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let copy = self.push_node(kind);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            let c = self.deep_clone(child);
            self.append_child(copy, c);
        }
        copy
    }

    /// Returns the child named `name`, creating it at the position `order` prescribes.
    ///
    /// `order` lists sibling element names in schema sequence; the new child goes right before
    /// the first existing sibling that must follow it.
    pub fn get_or_add_ordered(&mut self, parent: NodeId, name: &str, order: &[&str]) -> NodeId {
        if let Some(existing) = self.first_child(parent, name) {
            return existing;
        }
        let node = self.new_element(name, &[]);
        let rank = order.iter().position(|n| *n == name);
        let insert_at = rank.and_then(|rank| {
            self.children(parent).iter().position(|&c| {
                self.element_name(c)
                    .and_then(|n| order.iter().position(|o| *o == n))
                    .is_some_and(|r| r > rank)
            })
        });
        match insert_at {
            Some(idx) => self.insert_child(parent, idx, node),
            None => self.append_child(parent, node),
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_events, write_events, XmlTree};

    #[test]
    fn write_preserves_attr_entity_refs() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><root xmlns:o="urn:test" o:gfxdata="A&#xD;&#xA;B"/>"#;
        let events = parse_events(xml).expect("parse xml");
        let out = write_events(&events).expect("write xml");
        let s = String::from_utf8(out).expect("utf8");

        assert!(s.contains(r#"o:gfxdata="A&#xD;&#xA;B""#));
        assert!(!s.contains(r#"o:gfxdata="A&amp;#xD;"#));
    }

    #[test]
    fn tree_round_trips_untouched_markup() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><!-- c --><w:body><w:p><w:r><w:t xml:space="preserve">a &amp; b</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;
        let tree = XmlTree::parse("word/document.xml", xml.as_bytes()).expect("parse");
        let out = String::from_utf8(tree.to_bytes().expect("write")).expect("utf8");
        assert_eq!(out, xml);
    }

    #[test]
    fn splice_operations_keep_order() {
        let xml = b"<root><a/><c/></root>";
        let mut tree = XmlTree::parse("t.xml", xml).expect("parse");
        let root = tree.root_element().expect("root");
        let a = tree.first_child(root, "a").expect("a");
        let c = tree.first_child(root, "c").expect("c");
        let b = tree.new_element("b", &[("k", "x&y")]);
        tree.insert_after(a, b).expect("insert");
        let z = tree.new_element("z", &[]);
        tree.insert_before(a, z).expect("insert");
        tree.detach(c);
        let out = String::from_utf8(tree.to_bytes().expect("write")).expect("utf8");
        assert_eq!(out, r#"<root><z/><a/><b k="x&amp;y"/></root>"#);
    }

    #[test]
    fn ordered_insert_respects_schema_sequence() {
        let xml = b"<w:rPr><w:rFonts/><w:sz/></w:rPr>";
        let mut tree = XmlTree::parse("t.xml", xml).expect("parse");
        let rpr = tree.root_element().expect("root");
        let order = ["w:rStyle", "w:rFonts", "w:b", "w:color", "w:sz"];
        tree.get_or_add_ordered(rpr, "w:color", &order);
        tree.get_or_add_ordered(rpr, "w:b", &order);
        tree.get_or_add_ordered(rpr, "w:b", &order);
        let out = String::from_utf8(tree.to_bytes().expect("write")).expect("utf8");
        assert_eq!(out, "<w:rPr><w:rFonts/><w:b/><w:color/><w:sz/></w:rPr>");
    }

    #[test]
    fn deep_clone_is_detached_copy() {
        let xml = b"<t><r><c>1</c></r></t>";
        let mut tree = XmlTree::parse("t.xml", xml).expect("parse");
        let t = tree.root_element().expect("root");
        let r = tree.first_child(t, "r").expect("r");
        let copy = tree.deep_clone(r);
        assert!(tree.parent(copy).is_none());
        tree.append_child(t, copy);
        assert_eq!(tree.child_elements(t, "r").len(), 2);
        assert_eq!(tree.text_content(copy), "1");
    }

    #[test]
    fn rejects_mismatched_tags() {
        let err = XmlTree::parse("bad.xml", b"<a><b></a>");
        assert!(err.is_err());
    }
}
