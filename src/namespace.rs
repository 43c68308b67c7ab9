//! Namespace prefix control for marshalled output.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, XmlError};

/// Namespace bound to the reserved `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of `xsi:schemaLocation`
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Cached regex for XML NCName validation (ASCII subset)
static NCNAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_ncname_regex() -> &'static Regex {
    NCNAME_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9._\-]*$").expect("Failed to compile NCName regex")
    })
}

/// Non-colonized XML name
pub(crate) fn is_ncname(name: &str) -> bool {
    get_ncname_regex().is_match(name)
}

/// Chooses the prefix written for each namespace URI during marshalling.
pub trait NamespacePrefixMapper: Send + Sync {
    /// Prefix to use for `namespace_uri`, or `None` to keep `suggestion`.
    ///
    /// `suggestion` is the prefix the serialized document used (empty for the
    /// default namespace). Returning an empty string asks for the default
    /// namespace; it is ignored when `require_prefix` is set.
    fn preferred_prefix(
        &self,
        namespace_uri: &str,
        suggestion: &str,
        require_prefix: bool,
    ) -> Option<String>;
}

/// Fixed URI to prefix table
#[derive(Debug, Clone, Default)]
pub struct StaticPrefixMapper {
    prefixes: HashMap<String, String>,
}

impl StaticPrefixMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(
        mut self,
        namespace_uri: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        self.insert(namespace_uri, prefix);
        self
    }

    pub fn insert(&mut self, namespace_uri: impl Into<String>, prefix: impl Into<String>) {
        self.prefixes.insert(namespace_uri.into(), prefix.into());
    }
}

impl NamespacePrefixMapper for StaticPrefixMapper {
    fn preferred_prefix(
        &self,
        namespace_uri: &str,
        _suggestion: &str,
        _require_prefix: bool,
    ) -> Option<String> {
        self.prefixes.get(namespace_uri).cloned()
    }
}

/// How one namespace URI is used in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NamespaceUsage {
    pub uri: String,
    pub suggestion: String,
    pub on_attribute: bool,
}

/// Assign a distinct prefix to every used namespace, in usage order.
///
/// An empty prefix means the default namespace, which is only handed out
/// when `default_available` holds and never to a namespace used by an
/// attribute.
pub(crate) fn assign_prefixes(
    mapper: &dyn NamespacePrefixMapper,
    usages: &[NamespaceUsage],
    default_available: bool,
) -> Result<Vec<(String, String)>> {
    let mut assigned: Vec<(String, String)> = Vec::with_capacity(usages.len());
    let mut default_taken = !default_available;
    let mut counter = 0usize;

    for usage in usages {
        let require_prefix = usage.on_attribute || default_taken;
        let preferred = match mapper.preferred_prefix(&usage.uri, &usage.suggestion, require_prefix)
        {
            Some(prefix) => {
                if !prefix.is_empty() && !is_valid_prefix(&prefix) {
                    return Err(XmlError::configuration(format!(
                        "Invalid namespace prefix '{}' for {}",
                        prefix, usage.uri
                    )));
                }
                prefix
            }
            None => usage.suggestion.clone(),
        };

        let prefix = if preferred.is_empty() && !require_prefix {
            default_taken = true;
            preferred
        } else if preferred.is_empty() || assigned.iter().any(|(_, p)| *p == preferred) {
            generate_prefix(&assigned, &mut counter)
        } else {
            preferred
        };
        assigned.push((usage.uri.clone(), prefix));
    }

    Ok(assigned)
}

fn is_valid_prefix(prefix: &str) -> bool {
    is_ncname(prefix) && !prefix.to_ascii_lowercase().starts_with("xml")
}

fn generate_prefix(assigned: &[(String, String)], counter: &mut usize) -> String {
    loop {
        *counter += 1;
        let candidate = format!("ns{}", counter);
        if !assigned.iter().any(|(_, p)| *p == candidate) {
            return candidate;
        }
    }
}

/// A name resolved against the in-scope namespace declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedName {
    pub namespace: Option<String>,
    pub prefix: String,
    pub local: String,
}

/// Stack of namespace declarations, one frame per open element
#[derive(Debug, Default)]
pub(crate) struct NamespaceScopes {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceScopes {
    /// Enter an element, recording the `xmlns` declarations among `attributes`
    pub fn push(&mut self, attributes: &[(String, String)]) {
        let frame = attributes
            .iter()
            .filter_map(|(key, value)| declared_prefix(key).map(|p| (p.to_string(), value.clone())))
            .collect();
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    pub fn resolve_element(&self, qname: &str) -> std::result::Result<ResolvedName, String> {
        let (prefix, local) = split_qname(qname);
        let namespace = self.lookup(prefix).map(str::to_string);
        if namespace.is_none() && !prefix.is_empty() {
            return Err(format!("Unbound namespace prefix '{}' on element {}", prefix, qname));
        }
        Ok(ResolvedName {
            namespace,
            prefix: prefix.to_string(),
            local: local.to_string(),
        })
    }

    /// Unprefixed attributes are in no namespace, whatever the default is
    pub fn resolve_attribute(&self, qname: &str) -> std::result::Result<ResolvedName, String> {
        let (prefix, local) = split_qname(qname);
        if prefix.is_empty() {
            return Ok(ResolvedName {
                namespace: None,
                prefix: String::new(),
                local: local.to_string(),
            });
        }
        self.resolve_element(qname)
    }
}

/// Prefix declared by an `xmlns` / `xmlns:p` attribute key ("" for the default)
pub(crate) fn declared_prefix(key: &str) -> Option<&str> {
    if key == "xmlns" {
        Some("")
    } else {
        key.strip_prefix("xmlns:")
    }
}

fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname),
    }
}
