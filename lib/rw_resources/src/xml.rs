//! Binary XML document, as a flat sequence of chunk events.

use crate::chunk::OpaqueChunk;
use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{StringPool, StringPoolIndex};
use crate::values::Value;

/// Size of one attribute record in a start element chunk.
pub const ATTRIBUTE_SIZE: u16 = 0x14;
/// Offset of the attributes from the start element extension.
pub const ATTRIBUTE_START: u16 = 0x14;

#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub(crate) string_pool: StringPool,
    pub(crate) resource_map: Option<Vec<u32>>,
    pub(crate) body: Vec<XmlEvent>,
    pub(crate) preserved: Option<Vec<u8>>,
}

impl XmlDocument {
    /// Builds a document, checking that tags and namespaces are balanced.
    pub fn new(
        string_pool: StringPool,
        resource_map: Option<Vec<u32>>,
        body: Vec<XmlEvent>,
    ) -> ResourcesResult<Self> {
        let document = Self {
            string_pool,
            resource_map,
            body,
            preserved: None,
        };
        document.check_structure()?;
        Ok(document)
    }

    #[must_use]
    pub const fn string_pool(&self) -> &StringPool {
        &self.string_pool
    }

    /// Resource ids of the attribute names, indexed like the first strings
    /// of the pool.
    #[must_use]
    pub fn resource_map(&self) -> Option<&[u32]> {
        self.resource_map.as_deref()
    }

    #[must_use]
    pub fn events(&self) -> &[XmlEvent] {
        &self.body
    }

    /// Mutable access to the events; the document is then written in the
    /// canonical layout.
    pub fn events_mut(&mut self) -> &mut Vec<XmlEvent> {
        self.preserved = None;
        &mut self.body
    }

    /// Mutable access to the string pool; the document is then written in
    /// the canonical layout.
    pub fn string_pool_mut(&mut self) -> &mut StringPool {
        self.preserved = None;
        &mut self.string_pool
    }

    pub fn canonicalize(&mut self) {
        self.preserved = None;
        self.string_pool.preserved = None;
    }

    #[must_use]
    pub const fn is_preserved(&self) -> bool {
        self.preserved.is_some()
    }

    /// Resource id bound to an attribute name, if any.
    #[must_use]
    pub fn attribute_resource_id(&self, name: StringPoolIndex) -> Option<u32> {
        self.resource_map
            .as_ref()
            .and_then(|map| map.get(name.index()))
            .copied()
    }

    pub fn string(&self, idx: StringPoolIndex) -> ResourcesResult<String> {
        self.string_pool.string(idx)
    }

    /// Checks that every start element has a matching end element and that
    /// namespace scopes are properly nested.
    pub fn check_structure(&self) -> ResourcesResult<()> {
        let mut elements = Vec::new();
        let mut namespaces = Vec::new();
        for event in &self.body {
            match event {
                XmlEvent::StartNamespace(ns) => namespaces.push((ns.prefix, ns.uri)),
                XmlEvent::EndNamespace(ns) => match namespaces.pop() {
                    Some(open) if open == (ns.prefix, ns.uri) => (),
                    _ => {
                        return Err(structure_error(format!(
                            "unbalanced end of namespace at line {}",
                            ns.node.line
                        )))
                    }
                },
                XmlEvent::StartElement(elt) => elements.push((elt.ns, elt.name)),
                XmlEvent::EndElement(elt) => match elements.pop() {
                    Some(open) if open == (elt.ns, elt.name) => (),
                    _ => {
                        return Err(structure_error(format!(
                            "end element at line {} does not match its start",
                            elt.node.line
                        )))
                    }
                },
                XmlEvent::Cdata(_) | XmlEvent::Opaque(_) => (),
            }
        }
        if !elements.is_empty() || !namespaces.is_empty() {
            return Err(structure_error(format!(
                "{} elements and {} namespaces left open",
                elements.len(),
                namespaces.len()
            )));
        }
        Ok(())
    }
}

fn structure_error(msg: String) -> ResourcesError {
    log::error!("{msg}");
    ResourcesError::Format(msg)
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    StartNamespace(XmlNamespace),
    EndNamespace(XmlNamespace),
    StartElement(XmlStartElement),
    EndElement(XmlEndElement),
    Cdata(XmlCdata),
    /// Unknown chunk kept verbatim.
    Opaque(OpaqueChunk),
}

/// Line number and comment common to every node chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XmlNode {
    pub line: u32,
    pub comment: Option<StringPoolIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNamespace {
    pub node: XmlNode,
    pub prefix: Option<StringPoolIndex>,
    pub uri: Option<StringPoolIndex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlStartElement {
    pub node: XmlNode,
    pub ns: Option<StringPoolIndex>,
    pub name: StringPoolIndex,
    pub attribute_start: u16,
    pub attribute_size: u16,
    /// 1-based index of the `id` attribute, 0 for none.
    pub id_index: u16,
    pub class_index: u16,
    pub style_index: u16,
    pub attributes: Vec<XmlAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub ns: Option<StringPoolIndex>,
    pub name: StringPoolIndex,
    /// Original text of the value, when kept by the compiler.
    pub raw_value: Option<StringPoolIndex>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlEndElement {
    pub node: XmlNode,
    pub ns: Option<StringPoolIndex>,
    pub name: StringPoolIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlCdata {
    pub node: XmlNode,
    pub data: StringPoolIndex,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(pool: &mut StringPool, name: &str) -> (XmlEvent, XmlEvent) {
        let name = pool.get_or_push(name);
        (
            XmlEvent::StartElement(XmlStartElement {
                node: XmlNode::default(),
                ns: None,
                name,
                attribute_start: ATTRIBUTE_START,
                attribute_size: ATTRIBUTE_SIZE,
                id_index: 0,
                class_index: 0,
                style_index: 0,
                attributes: Vec::new(),
            }),
            XmlEvent::EndElement(XmlEndElement {
                node: XmlNode::default(),
                ns: None,
                name,
            }),
        )
    }

    #[test]
    fn balanced_elements() {
        let mut pool = StringPool::new(true);
        let (start_a, end_a) = element(&mut pool, "a");
        let (start_b, end_b) = element(&mut pool, "b");
        assert!(XmlDocument::new(
            pool.clone(),
            None,
            vec![start_a.clone(), start_b.clone(), end_b.clone(), end_a.clone()]
        )
        .is_ok());
        let err = XmlDocument::new(pool.clone(), None, vec![start_a.clone(), start_b, end_a, end_b])
            .unwrap_err();
        assert!(err.is_format_error());
        assert!(XmlDocument::new(pool, None, vec![start_a]).is_err());
    }

    #[test]
    fn balanced_namespaces() {
        let mut pool = StringPool::new(true);
        let ns = |prefix: &str, uri: &str, pool: &mut StringPool| XmlNamespace {
            node: XmlNode::default(),
            prefix: Some(pool.get_or_push(prefix)),
            uri: Some(pool.get_or_push(uri)),
        };
        let a = ns("a", "urn:a", &mut pool);
        let b = ns("b", "urn:b", &mut pool);
        let ok = vec![
            XmlEvent::StartNamespace(a.clone()),
            XmlEvent::StartNamespace(b.clone()),
            XmlEvent::EndNamespace(b.clone()),
            XmlEvent::EndNamespace(a.clone()),
        ];
        assert!(XmlDocument::new(pool.clone(), None, ok).is_ok());
        let crossed = vec![
            XmlEvent::StartNamespace(a.clone()),
            XmlEvent::StartNamespace(b.clone()),
            XmlEvent::EndNamespace(a),
            XmlEvent::EndNamespace(b),
        ];
        assert!(XmlDocument::new(pool, None, crossed).is_err());
    }

    #[test]
    fn resource_ids_of_attribute_names() {
        let mut pool = StringPool::new(false);
        let label = pool.push("label");
        let other = pool.push("other");
        let document = XmlDocument::new(pool, Some(vec![0x0101_0001]), Vec::new()).unwrap();
        assert_eq!(document.attribute_resource_id(label), Some(0x0101_0001));
        assert_eq!(document.attribute_resource_id(other), None);
    }
}
