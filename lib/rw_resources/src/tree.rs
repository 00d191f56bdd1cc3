//! Editable XML tree, with strings inlined and resource ids replaced by
//! symbolic names, convertible from and to an [`XmlDocument`].

use crate::chunk::OpaqueChunk;
use crate::errors::{ResourcesError, ResourcesResult};
use crate::ids::{IdentifierTable, ResRef};
use crate::strings::{StringPool, StringPoolIndex};
use crate::values::ResolvedValue;
use crate::xml::{
    XmlAttribute, XmlCdata, XmlDocument, XmlEndElement, XmlEvent, XmlNamespace, XmlNode,
    XmlStartElement, ATTRIBUTE_SIZE, ATTRIBUTE_START,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XmlTree {
    /// Encoding of the string pool built when encoding the tree.
    pub utf8: bool,
    pub nodes: Vec<Node>,
}

impl XmlTree {
    /// Root element, if the document has one.
    #[must_use]
    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Builds the binary document. Attribute names bound to a resource id
    /// come first in the string pool, in the order of the resource map, and
    /// attributes with a resource id are sorted by id.
    pub fn to_document(&self, ids: Option<&IdentifierTable>) -> ResourcesResult<XmlDocument> {
        let mut encoder = TreeEncoder::new(self.utf8);
        for node in &self.nodes {
            encoder.map_names(node, ids)?;
        }
        for node in &self.nodes {
            encoder.node(node, ids)?;
        }
        let map = (!encoder.map.is_empty()).then_some(encoder.map);
        XmlDocument::new(encoder.pool, map, encoder.body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Node {
    Element(Element),
    Text(Text),
    /// Unknown chunk kept verbatim.
    Opaque(OpaqueChunk),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub line: u32,
    pub comment: Option<String>,
    /// Namespaces whose scope is exactly this element.
    pub namespaces: Vec<NamespaceDecl>,
    /// Namespace URI.
    pub ns: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub end_line: u32,
    pub end_comment: Option<String>,
}

impl Element {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            line: 0,
            comment: None,
            namespaces: Vec::new(),
            ns: None,
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            end_line: 0,
            end_comment: None,
        }
    }

    #[must_use]
    pub fn attribute(&self, ns: Option<&str>, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.ns.as_deref() == ns && attr.name == name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: Option<String>,
    pub line: u32,
    pub comment: Option<String>,
    pub end_line: u32,
    pub end_comment: Option<String>,
}

impl NamespaceDecl {
    #[must_use]
    pub fn new(prefix: &str, uri: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            uri: Some(uri.to_string()),
            line: 0,
            comment: None,
            end_line: 0,
            end_comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub ns: Option<String>,
    pub name: String,
    /// Resource id of the attribute itself (`android:label` is
    /// `attr/label`), from the resource map.
    pub resource: Option<ResRef>,
    /// Original text of the value.
    pub raw: Option<String>,
    pub value: ResolvedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    pub line: u32,
    pub comment: Option<String>,
    pub text: String,
    pub value: ResolvedValue,
}

fn tree_error(msg: String) -> ResourcesError {
    log::error!("{msg}");
    ResourcesError::Format(msg)
}

/*
 * Decoding
 */

impl XmlDocument {
    /// Builds the editable tree, naming references through `ids`. Ids that
    /// no table knows stay numeric.
    pub fn to_tree(&self, ids: Option<&IdentifierTable>) -> ResourcesResult<XmlTree> {
        let mut builder = TreeBuilder::default();
        for event in &self.body {
            match event {
                XmlEvent::StartNamespace(ns) => {
                    builder.flush_closing()?;
                    builder.pending.push(NamespaceDecl {
                        prefix: self.opt_string(ns.prefix)?,
                        uri: self.opt_string(ns.uri)?,
                        line: ns.node.line,
                        comment: self.opt_string(ns.node.comment)?,
                        end_line: 0,
                        end_comment: None,
                    });
                }
                XmlEvent::EndNamespace(ns) => {
                    builder.end_namespace(ns.node.line, self.opt_string(ns.node.comment)?)?;
                }
                XmlEvent::StartElement(elt) => {
                    builder.flush_closing()?;
                    let mut element = self.element(elt, ids)?;
                    element.namespaces = std::mem::take(&mut builder.pending);
                    builder.open.push(element);
                }
                XmlEvent::EndElement(elt) => {
                    builder.flush_closing()?;
                    builder.no_pending_namespace(elt.node.line)?;
                    let mut element = builder.open.pop().ok_or_else(|| {
                        tree_error(format!("unexpected end element at line {}", elt.node.line))
                    })?;
                    element.end_line = elt.node.line;
                    element.end_comment = self.opt_string(elt.node.comment)?;
                    let unclosed = element.namespaces.len();
                    builder.closing = Some((element, unclosed));
                }
                XmlEvent::Cdata(cdata) => {
                    builder.flush_closing()?;
                    builder.no_pending_namespace(cdata.node.line)?;
                    let text = Text {
                        line: cdata.node.line,
                        comment: self.opt_string(cdata.node.comment)?,
                        text: self.string(cdata.data)?,
                        value: cdata.value.resolve(&self.string_pool, ids)?,
                    };
                    builder.push(Node::Text(text));
                }
                XmlEvent::Opaque(chunk) => {
                    builder.flush_closing()?;
                    builder.no_pending_namespace(0)?;
                    builder.push(Node::Opaque(chunk.clone()));
                }
            }
        }
        builder.flush_closing()?;
        builder.no_pending_namespace(0)?;
        if !builder.open.is_empty() {
            return Err(tree_error(format!(
                "{} elements left open",
                builder.open.len()
            )));
        }

        Ok(XmlTree {
            utf8: self.string_pool.is_utf8(),
            nodes: builder.nodes,
        })
    }

    fn opt_string(&self, idx: Option<StringPoolIndex>) -> ResourcesResult<Option<String>> {
        idx.map(|idx| self.string(idx)).transpose()
    }

    fn element(
        &self,
        elt: &XmlStartElement,
        ids: Option<&IdentifierTable>,
    ) -> ResourcesResult<Element> {
        let mut attributes = Vec::with_capacity(elt.attributes.len());
        for attr in &elt.attributes {
            let resource = self
                .attribute_resource_id(attr.name)
                .map(|id| ids.map_or(ResRef::Unresolved(id), |ids| ids.reference(id)));
            attributes.push(Attribute {
                ns: self.opt_string(attr.ns)?,
                name: self.string(attr.name)?,
                resource,
                raw: self.opt_string(attr.raw_value)?,
                value: attr.value.resolve(&self.string_pool, ids)?,
            });
        }
        Ok(Element {
            line: elt.node.line,
            comment: self.opt_string(elt.node.comment)?,
            namespaces: Vec::new(),
            ns: self.opt_string(elt.ns)?,
            name: self.string(elt.name)?,
            attributes,
            children: Vec::new(),
            end_line: 0,
            end_comment: None,
        })
    }
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<Node>,
    open: Vec<Element>,
    /// Namespaces started before the next element.
    pending: Vec<NamespaceDecl>,
    /// Element just ended, with the number of its namespaces not ended yet.
    closing: Option<(Element, usize)>,
}

impl TreeBuilder {
    fn push(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.nodes.push(node),
        }
    }

    fn flush_closing(&mut self) -> ResourcesResult<()> {
        if let Some((element, unclosed)) = self.closing.take() {
            if unclosed != 0 {
                return Err(tree_error(format!(
                    "namespace declared at line {} spans several elements",
                    element.line
                )));
            }
            self.push(Node::Element(element));
        }
        Ok(())
    }

    fn end_namespace(&mut self, line: u32, comment: Option<String>) -> ResourcesResult<()> {
        match &mut self.closing {
            Some((element, unclosed)) if *unclosed > 0 => {
                *unclosed -= 1;
                let decl = &mut element.namespaces[*unclosed];
                decl.end_line = line;
                decl.end_comment = comment;
                Ok(())
            }
            _ => Err(tree_error(format!(
                "namespace ending at line {line} does not scope a single element"
            ))),
        }
    }

    fn no_pending_namespace(&self, line: u32) -> ResourcesResult<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(tree_error(format!(
                "namespace started before line {line} does not scope an element"
            )))
        }
    }
}

/*
 * Encoding
 */

struct TreeEncoder {
    pool: StringPool,
    map: Vec<u32>,
    mapped: HashMap<(String, u32), StringPoolIndex>,
    unmapped: HashMap<String, StringPoolIndex>,
    body: Vec<XmlEvent>,
}

impl TreeEncoder {
    fn new(utf8: bool) -> Self {
        Self {
            pool: StringPool::new(utf8),
            map: Vec::new(),
            mapped: HashMap::new(),
            unmapped: HashMap::new(),
            body: Vec::new(),
        }
    }

    fn map_names(&mut self, node: &Node, ids: Option<&IdentifierTable>) -> ResourcesResult<()> {
        let Node::Element(element) = node else {
            return Ok(());
        };
        for (id, attr) in sorted_attributes(element, ids)? {
            if let Some(id) = id {
                let key = (attr.name.clone(), id);
                if !self.mapped.contains_key(&key) {
                    let idx = self.pool.push(&attr.name);
                    self.map.push(id);
                    self.mapped.insert(key, idx);
                }
            }
        }
        for child in &element.children {
            self.map_names(child, ids)?;
        }
        Ok(())
    }

    /// Index of an attribute name that has no resource id; it must not
    /// share an entry of the resource map region.
    fn unmapped_name(&mut self, name: &str) -> StringPoolIndex {
        if let Some(idx) = self.unmapped.get(name) {
            return *idx;
        }
        let idx = match self.pool.find(name) {
            Some(idx) if idx.index() >= self.map.len() => idx,
            _ => self.pool.push(name),
        };
        self.unmapped.insert(name.to_string(), idx);
        idx
    }

    fn opt_string(&mut self, s: Option<&String>) -> Option<StringPoolIndex> {
        s.map(|s| self.pool.get_or_push(s))
    }

    fn xml_node(&mut self, line: u32, comment: Option<&String>) -> XmlNode {
        XmlNode {
            line,
            comment: self.opt_string(comment),
        }
    }

    fn namespace(&mut self, decl: &NamespaceDecl, end: bool) -> XmlNamespace {
        let node = if end {
            self.xml_node(decl.end_line, decl.end_comment.as_ref())
        } else {
            self.xml_node(decl.line, decl.comment.as_ref())
        };
        XmlNamespace {
            node,
            prefix: self.opt_string(decl.prefix.as_ref()),
            uri: self.opt_string(decl.uri.as_ref()),
        }
    }

    fn node(&mut self, node: &Node, ids: Option<&IdentifierTable>) -> ResourcesResult<()> {
        match node {
            Node::Element(element) => self.element(element, ids),
            Node::Text(text) => {
                let node = self.xml_node(text.line, text.comment.as_ref());
                let data = self.pool.get_or_push(&text.text);
                let location = format!("text at line {}", text.line);
                let value = text.value.unresolve(&mut self.pool, ids, &location)?;
                self.body
                    .push(XmlEvent::Cdata(XmlCdata { node, data, value }));
                Ok(())
            }
            Node::Opaque(chunk) => {
                self.body.push(XmlEvent::Opaque(chunk.clone()));
                Ok(())
            }
        }
    }

    fn element(&mut self, element: &Element, ids: Option<&IdentifierTable>) -> ResourcesResult<()> {
        for decl in &element.namespaces {
            let ns = self.namespace(decl, false);
            self.body.push(XmlEvent::StartNamespace(ns));
        }

        let node = self.xml_node(element.line, element.comment.as_ref());
        let ns = self.opt_string(element.ns.as_ref());
        let name = self.pool.get_or_push(&element.name);
        let mut start = XmlStartElement {
            node,
            ns,
            name,
            attribute_start: ATTRIBUTE_START,
            attribute_size: ATTRIBUTE_SIZE,
            id_index: 0,
            class_index: 0,
            style_index: 0,
            attributes: Vec::with_capacity(element.attributes.len()),
        };
        for (n, (id, attr)) in sorted_attributes(element, ids)?.into_iter().enumerate() {
            let location = format!("element <{}> attribute {}", element.name, attr.name);
            let name = match id {
                Some(id) => self
                    .mapped
                    .get(&(attr.name.clone(), id))
                    .copied()
                    .ok_or_else(|| {
                        ResourcesError::Internal(format!("{location} is missing from the map"))
                    })?,
                None => self.unmapped_name(&attr.name),
            };
            let ns = self.opt_string(attr.ns.as_ref());
            let raw_value = self.opt_string(attr.raw.as_ref());
            let value = attr.value.unresolve(&mut self.pool, ids, &location)?;

            let index = u16::try_from(n + 1)
                .map_err(|_| ResourcesError::Internal(format!("{location}: too many attributes")))?;
            match (attr.ns.as_deref(), attr.name.as_str()) {
                (Some(ANDROID_NS), "id") => start.id_index = index,
                (None, "class") => start.class_index = index,
                (None, "style") => start.style_index = index,
                _ => (),
            }
            start.attributes.push(XmlAttribute {
                ns,
                name,
                raw_value,
                value,
            });
        }
        self.body.push(XmlEvent::StartElement(start));

        for child in &element.children {
            self.node(child, ids)?;
        }

        let node = self.xml_node(element.end_line, element.end_comment.as_ref());
        self.body
            .push(XmlEvent::EndElement(XmlEndElement { node, ns, name }));
        for decl in element.namespaces.iter().rev() {
            let ns = self.namespace(decl, true);
            self.body.push(XmlEvent::EndNamespace(ns));
        }
        Ok(())
    }
}

/// Attributes with their resource ids: those with an id first, by
/// increasing id, then the others in their original order.
fn sorted_attributes<'a>(
    element: &'a Element,
    ids: Option<&IdentifierTable>,
) -> ResourcesResult<Vec<(Option<u32>, &'a Attribute)>> {
    let mut attributes = element
        .attributes
        .iter()
        .map(|attr| {
            let location = format!("element <{}> attribute {}", element.name, attr.name);
            let id = attr
                .resource
                .as_ref()
                .map(|r| r.to_id(ids, &location))
                .transpose()?;
            Ok((id, attr))
        })
        .collect::<ResourcesResult<Vec<_>>>()?;
    attributes.sort_by_key(|(id, _)| (id.is_none(), *id));
    Ok(attributes)
}

/*
 * Text rendering
 */

type Scopes = Vec<(Option<String>, Option<String>)>;

impl fmt::Display for XmlTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        let mut scopes = Scopes::new();
        for node in &self.nodes {
            write_node(f, node, 0, &mut scopes)?;
        }
        Ok(())
    }
}

fn write_node(
    f: &mut fmt::Formatter,
    node: &Node,
    depth: usize,
    scopes: &mut Scopes,
) -> fmt::Result {
    let indent = "    ".repeat(depth);
    match node {
        Node::Element(element) => {
            if let Some(comment) = &element.comment {
                writeln!(f, "{indent}<!--{comment}-->")?;
            }
            let scope_len = scopes.len();
            for decl in &element.namespaces {
                scopes.push((decl.prefix.clone(), decl.uri.clone()));
            }

            let name = qualified_name(scopes, element.ns.as_deref(), &element.name);
            write!(f, "{indent}<{name}")?;
            for decl in &element.namespaces {
                match &decl.prefix {
                    Some(prefix) => write!(f, " xmlns:{prefix}=\"")?,
                    None => write!(f, " xmlns=\"")?,
                }
                write_escaped(f, decl.uri.as_deref().unwrap_or_default())?;
                write!(f, "\"")?;
            }
            for attr in &element.attributes {
                let attr_name = qualified_name(scopes, attr.ns.as_deref(), &attr.name);
                write!(f, " {attr_name}=\"")?;
                write_escaped(f, &attr.value.to_string())?;
                write!(f, "\"")?;
            }

            if element.children.is_empty() {
                writeln!(f, "/>")?;
            } else {
                writeln!(f, ">")?;
                for child in &element.children {
                    write_node(f, child, depth + 1, scopes)?;
                }
                writeln!(f, "{indent}</{name}>")?;
            }
            scopes.truncate(scope_len);
        }
        Node::Text(text) => {
            write!(f, "{indent}")?;
            write_escaped(f, &text.text)?;
            writeln!(f)?;
        }
        Node::Opaque(chunk) => writeln!(
            f,
            "{indent}<!-- chunk {:#06x} of {} bytes -->",
            chunk.typ,
            chunk.raw.len()
        )?,
    }
    Ok(())
}

/// Name prefixed with the innermost prefix bound to `ns`.
fn qualified_name(scopes: &Scopes, ns: Option<&str>, name: &str) -> String {
    let prefix = ns.and_then(|uri| {
        scopes
            .iter()
            .rev()
            .find(|(_, bound)| bound.as_deref() == Some(uri))
            .and_then(|(prefix, _)| prefix.as_deref())
    });
    match prefix {
        Some(prefix) => format!("{prefix}:{name}"),
        None => name.to_string(),
    }
}

fn write_escaped(f: &mut fmt::Formatter, s: &str) -> fmt::Result {
    for c in s.chars() {
        match c {
            '&' => write!(f, "&amp;")?,
            '<' => write!(f, "&lt;")?,
            '>' => write!(f, "&gt;")?,
            '"' => write!(f, "&quot;")?,
            c => write!(f, "{c}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Value;

    fn attribute(ns: Option<&str>, name: &str, value: ResolvedValue) -> Attribute {
        Attribute {
            ns: ns.map(ToString::to_string),
            name: name.to_string(),
            resource: None,
            raw: None,
            value,
        }
    }

    fn start_element(document: &XmlDocument, n: usize) -> &XmlStartElement {
        document
            .events()
            .iter()
            .filter_map(|event| match event {
                XmlEvent::StartElement(elt) => Some(elt),
                _ => None,
            })
            .nth(n)
            .unwrap()
    }

    #[test]
    fn namespace_redefinition() {
        let mut child = Element::new("child");
        child.namespaces.push(NamespaceDecl::new("a", "urn:u2"));
        child.attributes.push(attribute(
            Some("urn:u2"),
            "x",
            ResolvedValue::String("inner".to_string()),
        ));
        let mut root = Element::new("root");
        root.namespaces.push(NamespaceDecl::new("a", "urn:u"));
        root.attributes.push(attribute(
            Some("urn:u"),
            "x",
            ResolvedValue::String("outer".to_string()),
        ));
        root.children.push(Node::Element(child));
        let tree = XmlTree {
            utf8: true,
            nodes: vec![Node::Element(root)],
        };

        let document = tree.to_document(None).unwrap();
        let kinds: Vec<&str> = document
            .events()
            .iter()
            .map(|event| match event {
                XmlEvent::StartNamespace(_) => "ns",
                XmlEvent::EndNamespace(_) => "/ns",
                XmlEvent::StartElement(_) => "elt",
                XmlEvent::EndElement(_) => "/elt",
                XmlEvent::Cdata(_) => "text",
                XmlEvent::Opaque(_) => "opaque",
            })
            .collect();
        assert_eq!(
            kinds,
            ["ns", "elt", "ns", "elt", "/elt", "/ns", "/elt", "/ns"]
        );

        let decoded = document.to_tree(None).unwrap();
        assert_eq!(decoded, tree);
        let root = decoded.root().unwrap();
        let child = root.elements().next().unwrap();
        assert_eq!(child.attributes[0].ns.as_deref(), Some("urn:u2"));

        let text = decoded.to_string();
        assert!(text.contains("<root xmlns:a=\"urn:u\" a:x=\"outer\">"));
        assert!(text.contains("<child xmlns:a=\"urn:u2\" a:x=\"inner\"/>"));
    }

    #[test]
    fn unknown_reference_is_kept() {
        let ids = IdentifierTable::new();
        let mut root = Element::new("view");
        root.attributes.push(attribute(
            None,
            "target",
            ResolvedValue::Reference(ResRef::Unresolved(0x7F99_00AA)),
        ));
        let tree = XmlTree {
            utf8: false,
            nodes: vec![Node::Element(root)],
        };
        let document = tree.to_document(Some(&ids)).unwrap();
        assert_eq!(
            start_element(&document, 0).attributes[0].value,
            Value::Reference(0x7F99_00AA)
        );
        let decoded = document.to_tree(Some(&ids)).unwrap();
        assert_eq!(
            decoded.root().unwrap().attributes[0].value,
            ResolvedValue::Reference(ResRef::Unresolved(0x7F99_00AA))
        );
        assert!(decoded.to_string().contains("target=\"@0x7f9900aa\""));
    }

    #[test]
    fn unresolvable_name() {
        let mut root = Element::new("view");
        root.attributes.push(attribute(
            None,
            "text",
            ResolvedValue::Reference(ResRef::named("string", "missing")),
        ));
        let tree = XmlTree {
            utf8: true,
            nodes: vec![Node::Element(root)],
        };
        match tree.to_document(Some(&IdentifierTable::new())) {
            Err(ResourcesError::Resolution { location, name }) => {
                assert_eq!(location, "element <view> attribute text");
                assert_eq!(name, "string/missing");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resource_map_and_attribute_order() {
        let mut ids = IdentifierTable::new();
        ids.insert(0x0101_0000, "android", "attr", "theme");
        ids.insert(0x0101_00d0, "android", "attr", "id");

        let mut root = Element::new("view");
        root.attributes.push(attribute(None, "id", ResolvedValue::IntDec(1)));
        let mut android_id = attribute(Some(ANDROID_NS), "id", ResolvedValue::IntDec(2));
        android_id.resource = Some(ids.reference(0x0101_00d0));
        root.attributes.push(android_id);
        let mut theme = attribute(Some(ANDROID_NS), "theme", ResolvedValue::IntDec(3));
        theme.resource = Some(ResRef::Unresolved(0x0101_0000));
        root.attributes.push(theme);
        let tree = XmlTree {
            utf8: true,
            nodes: vec![Node::Element(root)],
        };

        let document = tree.to_document(Some(&ids)).unwrap();
        assert_eq!(document.resource_map(), Some(&[0x0101_0000, 0x0101_00d0][..]));
        let start = start_element(&document, 0);
        let names: Vec<String> = start
            .attributes
            .iter()
            .map(|attr| document.string(attr.name).unwrap())
            .collect();
        assert_eq!(names, ["theme", "id", "id"]);
        assert_eq!(start.attributes[0].value, Value::IntDec(3));
        // the plain "id" must not reuse the mapped entry
        assert!(start.attributes[2].name.index() >= 2);
        assert_eq!(document.attribute_resource_id(start.attributes[2].name), None);
        assert_eq!(start.id_index, 2);

        let decoded = document.to_tree(Some(&ids)).unwrap();
        let root = decoded.root().unwrap();
        let resource = root.attribute(Some(ANDROID_NS), "id").unwrap().resource.clone();
        assert!(matches!(resource, Some(ResRef::Named { ref name, .. }) if name == "id"));
        assert_eq!(resource, Some(ids.reference(0x0101_00d0)));
    }

    #[test]
    fn text_and_comments() {
        let mut root = Element::new("string");
        root.line = 3;
        root.comment = Some(" greeting ".to_string());
        root.end_line = 5;
        root.children.push(Node::Text(Text {
            line: 4,
            comment: None,
            text: "a < b".to_string(),
            value: ResolvedValue::Null,
        }));
        let tree = XmlTree {
            utf8: true,
            nodes: vec![Node::Element(root)],
        };
        let decoded = tree.to_document(None).unwrap().to_tree(None).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(
            decoded.to_string(),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <!-- greeting -->\n\
             <string>\n    a &lt; b\n</string>\n"
        );
    }

    #[test]
    fn namespace_spanning_siblings_is_rejected() {
        let mut pool = StringPool::new(true);
        let prefix = pool.push("a");
        let uri = pool.push("urn:a");
        let name = pool.push("e");
        let ns = XmlNamespace {
            node: XmlNode::default(),
            prefix: Some(prefix),
            uri: Some(uri),
        };
        let start = XmlEvent::StartElement(XmlStartElement {
            node: XmlNode::default(),
            ns: None,
            name,
            attribute_start: ATTRIBUTE_START,
            attribute_size: ATTRIBUTE_SIZE,
            id_index: 0,
            class_index: 0,
            style_index: 0,
            attributes: Vec::new(),
        });
        let end = XmlEvent::EndElement(XmlEndElement {
            node: XmlNode::default(),
            ns: None,
            name,
        });
        let document = XmlDocument::new(
            pool,
            None,
            vec![
                XmlEvent::StartNamespace(ns.clone()),
                start.clone(),
                end.clone(),
                start,
                end,
                XmlEvent::EndNamespace(ns),
            ],
        )
        .unwrap();
        assert!(document.to_tree(None).unwrap_err().is_format_error());
    }
}
