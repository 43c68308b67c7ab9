//! Schema composition: accumulate XSD sources and compile them into one validator.
//!
//! libxml2 compiles a single schema document, so several sources are joined
//! through a generated wrapper schema written to a temporary directory:
//! no-namespace sources are `xs:include`d, namespaced sources `xs:import`ed,
//! and sources sharing a target namespace are first gathered in a
//! per-namespace wrapper so that each namespace is imported only once.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use tracing::{debug, trace};

use crate::error::{Result, XmlError};
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};
use crate::validation::{Severity, ValidationEvent, ValidationEventCollector};

const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Handle to the content of one schema document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// Schema file on disk; its own relative includes resolve against it
    File(PathBuf),
    /// Schema content already in memory. A `system_id` (absolute path or
    /// URI) is the base its relative includes and imports resolve against.
    Memory {
        system_id: Option<String>,
        content: Vec<u8>,
    },
}

impl SchemaSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SchemaSource::File(path.into())
    }

    pub fn memory(content: impl Into<Vec<u8>>) -> Self {
        SchemaSource::Memory {
            system_id: None,
            content: content.into(),
        }
    }

    /// In-memory content whose relative references resolve against `system_id`
    pub fn memory_with_system_id(
        system_id: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        SchemaSource::Memory {
            system_id: Some(system_id.into()),
            content: content.into(),
        }
    }

    /// Drain `reader` into an in-memory source
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .map_err(|e| XmlError::input_access("<schema stream>", e))?;
        Ok(Self::memory(content))
    }

    /// Human-readable location used in diagnostics and logs
    pub fn location(&self) -> String {
        match self {
            SchemaSource::File(path) => path.display().to_string(),
            SchemaSource::Memory {
                system_id: Some(id),
                ..
            } => id.clone(),
            SchemaSource::Memory { .. } => "<memory>".to_string(),
        }
    }
}

/// A compiled validator covering every source that was registered when it was built
#[derive(Debug, Clone)]
pub struct ComposedSchema {
    schema: XmlSchemaPtr,
    source_count: usize,
}

impl ComposedSchema {
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// Validate `document`, pushing every nonconformance onto `events`
    pub fn validate(&self, document: &[u8], events: &mut ValidationEventCollector) -> Result<()> {
        let result = LibXml2Wrapper::new().validate_memory(&self.schema, document, events)?;
        trace!(?result, events = events.len(), "document validated");
        Ok(())
    }
}

/// Observable state of the composed-schema cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCacheState {
    /// No sources registered, validation disabled
    Absent,
    /// Sources changed since the last successful build
    Stale,
    /// Cached schema matches the current sources
    Built,
}

#[derive(Debug)]
enum CacheEntry {
    Absent,
    Stale,
    Built(ComposedSchema),
}

/// Ordered set of schema sources plus the lazily rebuilt composed schema
#[derive(Debug)]
pub struct SchemaComposer {
    sources: Vec<SchemaSource>,
    cache: CacheEntry,
}

impl Default for SchemaComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaComposer {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: CacheEntry::Absent,
        }
    }

    pub fn add_source(&mut self, source: SchemaSource) {
        trace!(location = %source.location(), "schema source added");
        self.sources.push(source);
        self.cache = CacheEntry::Stale;
    }

    pub fn add_sources<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = SchemaSource>,
    {
        for source in sources {
            self.add_source(source);
        }
    }

    /// Remove every source; validation stays disabled until a source is added
    pub fn clear(&mut self) {
        trace!(sources = self.sources.len(), "schema sources cleared");
        self.sources.clear();
        self.cache = CacheEntry::Absent;
    }

    pub fn sources(&self) -> &[SchemaSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn state(&self) -> SchemaCacheState {
        match self.cache {
            CacheEntry::Absent => SchemaCacheState::Absent,
            CacheEntry::Stale => SchemaCacheState::Stale,
            CacheEntry::Built(_) => SchemaCacheState::Built,
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.cache, CacheEntry::Stale)
    }

    /// The schema to validate against, rebuilding it first if stale.
    ///
    /// Returns `None` when no sources are registered. A failed build leaves
    /// the cache stale, so the same failure is reported on every call until
    /// the source set changes.
    pub fn current(&mut self) -> Result<Option<ComposedSchema>> {
        match &self.cache {
            CacheEntry::Absent => Ok(None),
            CacheEntry::Built(schema) => Ok(Some(schema.clone())),
            CacheEntry::Stale => {
                let schema = self.compose()?;
                self.cache = CacheEntry::Built(schema.clone());
                Ok(Some(schema))
            }
        }
    }

    /// Compile all current sources into one validator.
    ///
    /// Does not touch the cache. Fails with `SchemaComposition` carrying every
    /// error-level diagnostic, newline-joined in emission order.
    pub fn compose(&self) -> Result<ComposedSchema> {
        if self.sources.is_empty() {
            return Err(XmlError::SchemaComposition {
                details: "No schema sources have been added".to_string(),
            });
        }

        debug!(sources = self.sources.len(), "composing validating schema");

        let mut diagnostics = ValidationEventCollector::new();
        let mut scanned = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            scanned.push(scan_source(source, &mut diagnostics));
        }
        if diagnostics.has_events() {
            return Err(composition_failure(diagnostics));
        }

        let wrapper = LibXml2Wrapper::new();
        let result = match self.sources.as_slice() {
            [SchemaSource::File(path)] => wrapper.parse_schema_from_file(path, &mut diagnostics),
            [SchemaSource::Memory { system_id, content }] => {
                let content = with_base(content, system_id.as_deref())?;
                wrapper.parse_schema_from_memory(&content, &mut diagnostics)
            }
            _ => {
                let workspace = tempfile::Builder::new()
                    .prefix("xml-binder-schemas")
                    .tempdir()
                    .map_err(|e| XmlError::SchemaComposition {
                        details: format!("Unable to prepare schema workspace: {}", e),
                    })?;
                let root = write_wrapper_schemas(workspace.path(), &self.sources, &scanned)?;
                wrapper.parse_schema_from_file(&root, &mut diagnostics)
            }
        };

        diagnostics.retain_at_least(Severity::Error);
        match result {
            Ok(schema) if !diagnostics.has_events() => Ok(ComposedSchema {
                schema,
                source_count: self.sources.len(),
            }),
            Ok(_) => Err(composition_failure(diagnostics)),
            Err(err) => {
                if !diagnostics.has_events() {
                    diagnostics.handle_event(ValidationEvent::new(
                        Severity::Error,
                        format!("The schema sources could not be compiled: {}", err),
                    ));
                }
                Err(composition_failure(diagnostics))
            }
        }
    }
}

fn composition_failure(diagnostics: ValidationEventCollector) -> XmlError {
    let details = diagnostics.joined_messages();
    debug!(%details, "schema composition failed");
    XmlError::SchemaComposition { details }
}

/// Target namespace of a source, or `None` for a no-namespace schema.
///
/// Reads the whole document so that well-formedness problems are reported
/// with the source they belong to.
fn scan_source(
    source: &SchemaSource,
    diagnostics: &mut ValidationEventCollector,
) -> Option<String> {
    let owned;
    let content: &[u8] = match source {
        SchemaSource::Memory { content, .. } => content,
        SchemaSource::File(path) => match std::fs::read(path) {
            Ok(bytes) => {
                owned = bytes;
                &owned
            }
            Err(e) => {
                diagnostics.handle_event(ValidationEvent::new(
                    Severity::FatalError,
                    format!("Unable to read schema source {}: {}", source.location(), e),
                ));
                return None;
            }
        },
    };

    let mut reader = Reader::from_reader(content);
    let mut buf = Vec::new();
    let mut target_namespace = None;
    let mut seen_root = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if !seen_root => {
                seen_root = true;
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"targetNamespace" {
                        target_namespace = attr
                            .unescape_value()
                            .ok()
                            .map(|v| v.into_owned())
                            .filter(|v| !v.is_empty());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                diagnostics.handle_event(ValidationEvent::new(
                    Severity::FatalError,
                    format!(
                        "Schema source {} is not well-formed at position {}: {}",
                        source.location(),
                        reader.error_position(),
                        e
                    ),
                ));
                return None;
            }
        }
        buf.clear();
    }
    target_namespace
}

/// Write the wrapper schema (and per-namespace wrappers) into `workspace`,
/// returning the path of the root wrapper.
fn write_wrapper_schemas(
    workspace: &Path,
    sources: &[SchemaSource],
    namespaces: &[Option<String>],
) -> Result<PathBuf> {
    let mut locations = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let location = match source {
            SchemaSource::File(path) => {
                std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
            }
            SchemaSource::Memory { system_id, content } => {
                let path = workspace.join(format!("source-{}.xsd", index));
                write_schema_file(&path, &with_base(content, system_id.as_deref())?)?;
                path
            }
        };
        locations.push(location);
    }

    // Group by target namespace, keeping first-seen order
    let mut groups: Vec<(Option<&str>, Vec<&Path>)> = Vec::new();
    for (namespace, location) in namespaces.iter().zip(&locations) {
        let namespace = namespace.as_deref();
        match groups.iter_mut().find(|(ns, _)| *ns == namespace) {
            Some((_, members)) => members.push(location.as_path()),
            None => groups.push((namespace, vec![location.as_path()])),
        }
    }

    let mut root = schema_header(None);
    for (group_index, (namespace, members)) in groups.iter().enumerate() {
        match namespace {
            None => {
                for member in members {
                    push_include(&mut root, member);
                }
            }
            Some(ns) if members.len() == 1 => push_import(&mut root, ns, members[0]),
            Some(ns) => {
                let mut group = schema_header(Some(*ns));
                for member in members {
                    push_include(&mut group, member);
                }
                group.push_str("</xs:schema>\n");
                let group_path = workspace.join(format!("namespace-{}.xsd", group_index));
                write_schema_file(&group_path, group.as_bytes())?;
                push_import(&mut root, ns, &group_path);
            }
        }
    }
    root.push_str("</xs:schema>\n");

    let root_path = workspace.join("composed.xsd");
    write_schema_file(&root_path, root.as_bytes())?;
    trace!(path = %root_path.display(), groups = groups.len(), "wrapper schema written");
    Ok(root_path)
}

/// `content` with `xml:base` set on its root element, so that libxml2
/// resolves relative `schemaLocation`s against `base` rather than the
/// location the content is compiled from. An existing `xml:base` wins.
fn with_base<'a>(content: &'a [u8], base: Option<&str>) -> Result<Cow<'a, [u8]>> {
    let Some(base) = base else {
        return Ok(Cow::Borrowed(content));
    };

    let mut reader = Reader::from_reader(content);
    let mut buf = Vec::new();
    loop {
        let tag = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => e,
            Ok(Event::Eof) => return Ok(Cow::Borrowed(content)),
            Ok(_) => {
                buf.clear();
                continue;
            }
            Err(e) => {
                return Err(XmlError::SchemaComposition {
                    details: format!("Schema source {} is not well-formed: {}", base, e),
                });
            }
        };
        if tag
            .attributes()
            .flatten()
            .any(|attr| attr.key.as_ref() == b"xml:base")
        {
            return Ok(Cow::Borrowed(content));
        }

        // No '<' can appear inside the tag, so the last "<name" before the
        // reader position opens the root element
        let end = (reader.buffer_position() as usize).min(content.len());
        let mut open = Vec::with_capacity(tag.name().as_ref().len() + 1);
        open.push(b'<');
        open.extend_from_slice(tag.name().as_ref());
        let Some(name_end) = content[..end]
            .windows(open.len())
            .rposition(|window| window == open.as_slice())
            .map(|start| start + open.len())
        else {
            return Err(XmlError::SchemaComposition {
                details: format!("Unable to locate the root element of schema source {}", base),
            });
        };

        let attribute = format!(" xml:base=\"{}\"", escape(base));
        let mut based = Vec::with_capacity(content.len() + attribute.len());
        based.extend_from_slice(&content[..name_end]);
        based.extend_from_slice(attribute.as_bytes());
        based.extend_from_slice(&content[name_end..]);
        return Ok(Cow::Owned(based));
    }
}

fn schema_header(target_namespace: Option<&str>) -> String {
    let mut header = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xs:schema xmlns:xs=\"{}\"",
        XSD_NAMESPACE
    );
    if let Some(ns) = target_namespace {
        let _ = write!(header, " targetNamespace=\"{}\"", escape(ns));
    }
    header.push_str(">\n");
    header
}

fn push_include(schema: &mut String, location: &Path) {
    let _ = writeln!(
        schema,
        "  <xs:include schemaLocation=\"{}\"/>",
        escape(&*location.to_string_lossy())
    );
}

fn push_import(schema: &mut String, namespace: &str, location: &Path) {
    let _ = writeln!(
        schema,
        "  <xs:import namespace=\"{}\" schemaLocation=\"{}\"/>",
        escape(namespace),
        escape(&*location.to_string_lossy())
    );
}

fn write_schema_file(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content).map_err(|e| XmlError::SchemaComposition {
        details: format!("Unable to write {}: {}", path.display(), e),
    })
}
