//! Mutable XML document tree
//!
//! Parts are parsed into an owned tree only when something needs to touch
//! them. The tree keeps attribute values and text exactly as they were
//! escaped in the source, so an untouched subtree serializes back to the same
//! markup; only values written through the setters are re-escaped.

use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};

/// A node in the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// An element with attributes and children
    Element(XmlElement),
    /// Character data, as escaped in the source
    Text(String),
    /// Contents of a `<![CDATA[...]]>` section
    CData(String),
    /// Contents of a `<!--...-->` comment
    Comment(String),
    /// Contents of a `<?...?>` processing instruction
    ProcessingInstruction(String),
    /// Contents of the `<?xml ...?>` declaration
    Declaration(String),
    /// Contents of a `<!DOCTYPE ...>` declaration
    DocType(String),
}

/// An attribute as written in the source
#[derive(Debug, Clone, PartialEq)]
struct Attribute {
    key: String,
    /// Value as escaped in the source
    raw: String,
    quote: char,
}

/// An element node
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<XmlNode>,
    self_closing: bool,
}

impl XmlElement {
    /// Create an empty element; it serializes as `<name/>` until it has children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Qualified name, including any namespace prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Namespace prefix, if the name has one
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Qualified name for a sibling/child element sharing this element's prefix
    pub fn qualified(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    /// Unescaped value of the attribute with this exact name
    pub fn attr(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|attr| attr.key == name)
            .map(|attr| unescape_lossless(&attr.raw))
    }

    /// Unescaped value of the first prefixed attribute with this local name
    /// (e.g. `r:id` or `ns7:id` for `"id"`)
    pub fn prefixed_attr(&self, local: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|attr| attr.key.contains(':') && local_name(&attr.key) == local)
            .map(|attr| unescape_lossless(&attr.raw))
    }

    /// Attribute names in document order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|attr| attr.key.as_str())
    }

    /// Set an attribute, replacing it in place if present, appending otherwise
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let escaped = escape(value).into_owned();
        match self.attributes.iter_mut().find(|attr| attr.key == name) {
            Some(attr) => attr.raw = escaped,
            None => self.attributes.push(Attribute {
                key: name.to_string(),
                raw: escaped,
                quote: '"',
            }),
        }
    }

    /// Remove an attribute; returns whether it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|attr| attr.key != name);
        self.attributes.len() != before
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements, skipping text and other markup
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Element child at a position in `children()`
    pub fn element_at(&self, pos: usize) -> Option<&XmlElement> {
        self.children.get(pos).and_then(XmlNode::as_element)
    }

    /// Mutable element child at a position in `children()`
    pub fn element_at_mut(&mut self, pos: usize) -> Option<&mut XmlElement> {
        self.children.get_mut(pos).and_then(XmlNode::as_element_mut)
    }

    /// Position in `children()` of the first child element with this local name
    pub fn position_of(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| node.as_element().is_some_and(|el| el.local_name() == local))
    }

    /// First child element with this local name
    pub fn find_child(&self, local: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.local_name() == local)
    }

    /// First child element with this local name, mutably
    pub fn find_child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
            .find(|el| el.local_name() == local)
    }

    /// Whether any child element has this local name
    pub fn has_child(&self, local: &str) -> bool {
        self.find_child(local).is_some()
    }

    /// Concatenated, unescaped character data of the direct children
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(raw) => out.push_str(&unescape_lossless(raw)),
                XmlNode::CData(data) => out.push_str(data),
                _ => {}
            }
        }
        out
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children
                .push(XmlNode::Text(partial_escape(text).into_owned()));
        }
    }

    /// Insert a child node at a position in `children()`
    pub fn insert_child(&mut self, pos: usize, node: XmlNode) {
        self.children.insert(pos, node);
    }

    /// Append a child node
    pub fn push_child(&mut self, node: XmlNode) {
        self.children.push(node);
    }

    /// Remove every child element whose local name is in `locals`
    ///
    /// Returns the number removed. An element emptied this way serializes
    /// self-closing again.
    pub fn remove_children(&mut self, locals: &[&str]) -> usize {
        let before = self.children.len();
        self.children.retain(|node| match node {
            XmlNode::Element(el) => !locals.contains(&el.local_name()),
            _ => true,
        });
        let removed = before - self.children.len();
        if removed > 0 && self.children.is_empty() {
            self.self_closing = true;
        }
        removed
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.key);
            out.push('=');
            out.push(attr.quote);
            out.push_str(&attr.raw);
            out.push(attr.quote);
        }
        if self.children.is_empty() && self.self_closing {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write_to(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            XmlNode::Element(el) => el.write_to(out),
            XmlNode::Text(raw) => out.push_str(raw),
            XmlNode::CData(data) => {
                out.push_str("<![CDATA[");
                out.push_str(data);
                out.push_str("]]>");
            }
            XmlNode::Comment(data) => {
                out.push_str("<!--");
                out.push_str(data);
                out.push_str("-->");
            }
            XmlNode::ProcessingInstruction(data) | XmlNode::Declaration(data) => {
                out.push_str("<?");
                out.push_str(data);
                out.push_str("?>");
            }
            XmlNode::DocType(data) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(data.trim_start());
                out.push('>');
            }
        }
    }
}

/// A parsed part
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    part: String,
    bom: bool,
    prolog: Vec<XmlNode>,
    root: XmlElement,
    epilog: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse a part's bytes
    ///
    /// Fails with [`XlsxError::MalformedPart`] on any well-formedness
    /// violation: mismatched or unclosed tags, bad attributes or entities,
    /// non-UTF-8 input, or a document without a root element.
    pub fn parse(part: &str, bytes: &[u8]) -> XlsxResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| XlsxError::malformed(part, format!("not UTF-8: {}", e)))?;
        let (bom, text) = match text.strip_prefix('\u{feff}') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut nodes: Vec<XmlNode> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                XlsxError::malformed(
                    part,
                    format!("{} (at byte {})", e, reader.buffer_position()),
                )
            })?;

            let node = match event {
                Event::Start(e) => {
                    stack.push(element_from_start(part, &e, false)?);
                    continue;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| XlsxError::malformed(part, "unexpected closing tag"))?;
                    XmlNode::Element(el)
                }
                Event::Empty(e) => XmlNode::Element(element_from_start(part, &e, true)?),
                Event::Text(t) => {
                    t.unescape()
                        .map_err(|e| XlsxError::malformed(part, e.to_string()))?;
                    XmlNode::Text(utf8(part, &t)?)
                }
                Event::CData(c) => XmlNode::CData(utf8(part, &c)?),
                Event::Comment(c) => XmlNode::Comment(utf8(part, &c)?),
                Event::PI(p) => XmlNode::ProcessingInstruction(utf8(part, &p)?),
                Event::Decl(d) => XmlNode::Declaration(utf8(part, &d)?),
                Event::DocType(d) => XmlNode::DocType(utf8(part, &d)?),
                Event::Eof => break,
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.last() {
            return Err(XlsxError::malformed(
                part,
                format!("unclosed element <{}>", open.name),
            ));
        }

        let root_pos = nodes
            .iter()
            .position(|node| matches!(node, XmlNode::Element(_)))
            .ok_or_else(|| XlsxError::malformed(part, "no root element"))?;
        let epilog = nodes.split_off(root_pos + 1);
        let root = match nodes.pop() {
            Some(XmlNode::Element(el)) => el,
            _ => return Err(XlsxError::malformed(part, "no root element")),
        };

        Ok(Self {
            part: part.to_string(),
            bom,
            prolog: nodes,
            root,
            epilog,
        })
    }

    /// Member path this document was parsed from
    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.root
    }

    /// Serialize the tree back to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }
        for node in &self.prolog {
            node.write_to(&mut out);
        }
        self.root.write_to(&mut out);
        for node in &self.epilog {
            node.write_to(&mut out);
        }
        out.into_bytes()
    }
}

fn element_from_start(part: &str, e: &BytesStart<'_>, self_closing: bool) -> XlsxResult<XmlElement> {
    let name = utf8(part, e.name().as_ref())?;
    let mut attributes = Vec::new();
    let tag: &[u8] = e;
    let mut quotes = quote_chars(tag, e.name().as_ref().len());

    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            XlsxError::malformed(part, format!("bad attribute on <{}>: {}", name, err))
        })?;
        attr.unescape_value().map_err(|err| {
            XlsxError::malformed(part, format!("bad attribute value on <{}>: {}", name, err))
        })?;
        attributes.push(Attribute {
            key: utf8(part, attr.key.as_ref())?,
            raw: utf8(part, &attr.value)?,
            quote: quotes.next().unwrap_or('"'),
        });
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        self_closing,
    })
}

fn utf8(part: &str, bytes: &[u8]) -> XlsxResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| XlsxError::malformed(part, format!("not UTF-8: {}", e)))
}

fn unescape_lossless(raw: &str) -> String {
    // Values were validated at parse time; freshly set values are escaped by us.
    unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Quote characters of the attributes in a start tag, in order
///
/// `tag` is the tag content after `<`, starting with the element name. Only
/// called on tags the reader has already accepted, so every value is quoted
/// and can't contain its own quote character.
fn quote_chars(tag: &[u8], name_len: usize) -> impl Iterator<Item = char> + '_ {
    let mut pos = name_len;
    std::iter::from_fn(move || {
        let eq = pos + tag.get(pos..)?.iter().position(|&b| b == b'=')?;
        let start = eq + 1 + tag.get(eq + 1..)?.iter().position(|&b| b == b'"' || b == b'\'')?;
        let quote = tag[start];
        let end = start + 1 + tag.get(start + 1..)?.iter().position(|&b| b == quote)?;
        pos = end + 1;
        Some(quote as char)
    })
}

/// Name without namespace prefix
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}
