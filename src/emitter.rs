//! Output stage of marshalling.
//!
//! The serde serializer produces compact XML with whatever prefixes the
//! bound types spelled out. The emitter parses that text back into a small
//! element tree and writes the final document: declaration, indentation,
//! namespace prefixes chosen by a [`NamespacePrefixMapper`], the
//! `xsi:schemaLocation` hint and escaping through a [`CharacterEscapeHandler`].

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use crate::error::{Direction, Result, XmlError};
use crate::escape::{CDATA_END_MARKER, CDATA_MARKER, CharacterEscapeHandler};
use crate::namespace::{
    NamespacePrefixMapper, NamespaceScopes, NamespaceUsage, XML_NAMESPACE, XSI_NAMESPACE,
    assign_prefixes, declared_prefix,
};
use crate::writer::SchemaLocation;

pub(crate) const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Settings for one emit pass, borrowed from the writer
pub(crate) struct EmitOptions<'a> {
    pub formatted_output: bool,
    pub indent_width: usize,
    pub escape_handler: &'a dyn CharacterEscapeHandler,
    pub prefix_mapper: Option<&'a dyn NamespacePrefixMapper>,
    pub schema_location: Option<&'a SchemaLocation>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Element(Element),
    Text(String),
    CData(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::structural(Direction::Output, e.to_string(), e))?;
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::structural(Direction::Output, e.to_string(), e))?;
            attributes.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                value.into_owned(),
            ));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Vec::new(),
        })
    }

    /// Element content is laid out on its own lines only when it holds no
    /// character data
    fn has_element_content(&self) -> bool {
        !self.children.is_empty()
            && self
                .children
                .iter()
                .all(|child| matches!(child, Node::Element(_)))
    }
}

/// Re-emit a serialized document according to `options`
pub(crate) fn emit(serialized: &str, options: &EmitOptions<'_>) -> Result<String> {
    let mut root = parse_tree(serialized)?;

    if options.prefix_mapper.is_some() || options.schema_location.is_some() {
        qualify_names(&mut root, options)?;
    }

    let mut out = String::with_capacity(serialized.len() + serialized.len() / 2);
    out.push_str(XML_DECLARATION);
    if options.formatted_output {
        out.push('\n');
    }
    write_element(&root, 0, options, &mut out);
    if options.formatted_output {
        out.push('\n');
    }

    trace!(bytes = out.len(), formatted = options.formatted_output, "Emitted document");
    Ok(out)
}

fn parse_tree(serialized: &str) -> Result<Element> {
    let mut reader = Reader::from_str(serialized);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            XmlError::structural(
                Direction::Output,
                format!(
                    "serializer produced malformed XML at position {}",
                    reader.error_position()
                ),
                e,
            )
        })?;

        match event {
            Event::Start(e) => stack.push(Element::from_start(&e)?),
            Event::Empty(e) => {
                let element = Element::from_start(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| XmlError::structural(Direction::Output, e.to_string(), e))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    parent.children.push(Node::CData(text));
                }
            }
            Event::Eof => break,
            // Declarations, comments and processing instructions are not
            // produced by the serializer
            _ => {}
        }
    }

    root.ok_or_else(|| {
        XmlError::structural_message(Direction::Output, "the serializer produced no root element")
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => *root = Some(element),
    }
}

/// Falls back to the prefixes already present in the serialized document
struct KeepSuggestions;

impl NamespacePrefixMapper for KeepSuggestions {
    fn preferred_prefix(
        &self,
        _namespace_uri: &str,
        _suggestion: &str,
        _require_prefix: bool,
    ) -> Option<String> {
        None
    }
}

/// Rewrite every name with the assigned prefixes, declaring all namespaces on
/// the root element
fn qualify_names(root: &mut Element, options: &EmitOptions<'_>) -> Result<()> {
    let mut usages = Vec::new();
    let mut has_unqualified = false;
    let mut scopes = NamespaceScopes::default();
    collect_usages(root, &mut scopes, &mut usages, &mut has_unqualified)?;

    if options.schema_location.is_some() {
        add_usage(&mut usages, XSI_NAMESPACE, "xsi", true);
    }

    let mapper = options.prefix_mapper.unwrap_or(&KeepSuggestions);
    let assigned = assign_prefixes(mapper, &usages, !has_unqualified)?;
    trace!(namespaces = assigned.len(), "Assigned namespace prefixes");

    let mut scopes = NamespaceScopes::default();
    rename(root, &mut scopes, &assigned)?;

    let mut declarations: Vec<(String, String)> = assigned
        .iter()
        .map(|(uri, prefix)| {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            (key, uri.clone())
        })
        .collect();

    if let Some(location) = options.schema_location {
        let xsi = prefix_for(&assigned, XSI_NAMESPACE).unwrap_or("xsi");
        root.attributes.retain(|(key, _)| {
            key.strip_prefix(xsi).and_then(|k| k.strip_prefix(':')) != Some("schemaLocation")
        });
        root.attributes.push((
            format!("{}:schemaLocation", xsi),
            format!("{} {}", location.namespace(), location.url()),
        ));
    }

    declarations.append(&mut root.attributes);
    root.attributes = declarations;
    Ok(())
}

fn collect_usages(
    element: &Element,
    scopes: &mut NamespaceScopes,
    usages: &mut Vec<NamespaceUsage>,
    has_unqualified: &mut bool,
) -> Result<()> {
    scopes.push(&element.attributes);

    let name = scopes.resolve_element(&element.name).map_err(unbound)?;
    match &name.namespace {
        Some(uri) => add_usage(usages, uri, &name.prefix, false),
        None => *has_unqualified = true,
    }

    for (key, _) in &element.attributes {
        if declared_prefix(key).is_some() {
            continue;
        }
        let attr = scopes.resolve_attribute(key).map_err(unbound)?;
        if let Some(uri) = attr.namespace.as_deref().filter(|uri| *uri != XML_NAMESPACE) {
            add_usage(usages, uri, &attr.prefix, true);
        }
    }

    for child in &element.children {
        if let Node::Element(child) = child {
            collect_usages(child, scopes, usages, has_unqualified)?;
        }
    }

    scopes.pop();
    Ok(())
}

fn add_usage(usages: &mut Vec<NamespaceUsage>, uri: &str, suggestion: &str, on_attribute: bool) {
    match usages.iter_mut().find(|usage| usage.uri == uri) {
        Some(usage) => usage.on_attribute |= on_attribute,
        None => usages.push(NamespaceUsage {
            uri: uri.to_string(),
            suggestion: suggestion.to_string(),
            on_attribute,
        }),
    }
}

fn rename(
    element: &mut Element,
    scopes: &mut NamespaceScopes,
    assigned: &[(String, String)],
) -> Result<()> {
    scopes.push(&element.attributes);

    let name = scopes.resolve_element(&element.name).map_err(unbound)?;
    element.name = qualified(name.namespace.as_deref(), &name.prefix, &name.local, assigned);

    let mut attributes = Vec::with_capacity(element.attributes.len());
    for (key, value) in element.attributes.drain(..) {
        if declared_prefix(&key).is_some() {
            continue;
        }
        let attr = scopes.resolve_attribute(&key).map_err(unbound)?;
        let key = qualified(attr.namespace.as_deref(), &attr.prefix, &attr.local, assigned);
        attributes.push((key, value));
    }
    element.attributes = attributes;

    for child in &mut element.children {
        if let Node::Element(child) = child {
            rename(child, scopes, assigned)?;
        }
    }

    scopes.pop();
    Ok(())
}

fn qualified(
    namespace: Option<&str>,
    original_prefix: &str,
    local: &str,
    assigned: &[(String, String)],
) -> String {
    let prefix = match namespace {
        Some(XML_NAMESPACE) => original_prefix,
        Some(uri) => prefix_for(assigned, uri).unwrap_or(original_prefix),
        None => "",
    };
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

fn prefix_for<'a>(assigned: &'a [(String, String)], uri: &str) -> Option<&'a str> {
    assigned
        .iter()
        .find(|(u, _)| u == uri)
        .map(|(_, prefix)| prefix.as_str())
}

fn unbound(details: String) -> XmlError {
    XmlError::structural_message(Direction::Output, details)
}

fn write_element(element: &Element, depth: usize, options: &EmitOptions<'_>, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        options.escape_handler.escape(value, true, out);
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let block = options.formatted_output && element.has_element_content();
    for child in &element.children {
        if block {
            newline(depth + 1, options.indent_width, out);
        }
        match child {
            Node::Element(child) => write_element(child, depth + 1, options, out),
            Node::Text(text) => options.escape_handler.escape(text, false, out),
            Node::CData(text) => {
                out.push_str(CDATA_MARKER);
                out.push_str(text);
                out.push_str(CDATA_END_MARKER);
            }
        }
    }
    if block {
        newline(depth, options.indent_width, out);
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn newline(depth: usize, indent_width: usize, out: &mut String) {
    out.push('\n');
    out.extend(std::iter::repeat_n(' ', depth * indent_width));
}
