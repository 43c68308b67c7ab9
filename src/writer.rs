//! Validating writer: bound document in, XML text out.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::binding::{XmlBinding, XmlRootElement};
use crate::config::ProcessorConfig;
use crate::emitter::{EmitOptions, emit};
use crate::error::{Direction, Result, XmlError};
use crate::escape::{CDataEscapeHandler, CharacterEscapeHandler, MinimumEscapeHandler};
use crate::namespace::NamespacePrefixMapper;
use crate::schema_composer::{SchemaCacheState, SchemaComposer, SchemaSource};
use crate::validation::ValidationEventCollector;

pub const DEFAULT_INDENT_WIDTH: usize = 4;
pub const MAX_INDENT_WIDTH: usize = 16;

/// A namespace and the URL of the schema describing it, written as the
/// root element's `xsi:schemaLocation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocation {
    namespace: String,
    url: String,
}

impl SchemaLocation {
    /// # Errors
    ///
    /// Both parts must be non-empty and free of whitespace, since the
    /// attribute value is a whitespace-separated pair.
    pub fn new(namespace: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let url = url.into();
        for (what, value) in [("namespace", &namespace), ("URL", &url)] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(XmlError::configuration(format!(
                    "Invalid schema location {} '{}'",
                    what, value
                )));
            }
        }
        Ok(Self { namespace, url })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Writes documents of one bound root type, optionally validating the
/// produced XML against the registered schemas.
///
/// Output settings may be changed between writes. Like [`crate::XmlReader`],
/// an instance belongs to one thread at a time.
pub struct XmlWriter<T> {
    binding: XmlBinding<T>,
    schemas: SchemaComposer,
    formatted_output: bool,
    indent_width: usize,
    cdata_sections: bool,
    escape_handler: Box<dyn CharacterEscapeHandler>,
    prefix_mapper: Option<Box<dyn NamespacePrefixMapper>>,
    schema_location: Option<SchemaLocation>,
}

impl<T: XmlRootElement + Serialize> XmlWriter<T> {
    pub fn new() -> Result<Self> {
        Ok(Self::with_binding(XmlBinding::new()?))
    }
}

impl<T: Serialize> XmlWriter<T> {
    pub fn with_binding(binding: XmlBinding<T>) -> Self {
        Self {
            binding,
            schemas: SchemaComposer::new(),
            formatted_output: false,
            indent_width: DEFAULT_INDENT_WIDTH,
            cdata_sections: false,
            escape_handler: Box::new(MinimumEscapeHandler),
            prefix_mapper: None,
            schema_location: None,
        }
    }

    pub fn binding(&self) -> &XmlBinding<T> {
        &self.binding
    }

    pub fn set_formatted_output(&mut self, formatted: bool) {
        self.formatted_output = formatted;
    }

    pub fn formatted_output(&self) -> bool {
        self.formatted_output
    }

    /// Spaces per nesting level when formatted output is on
    pub fn set_indent_width(&mut self, width: usize) -> Result<()> {
        check_indent_width(width)?;
        self.indent_width = width;
        Ok(())
    }

    pub fn indent_width(&self) -> usize {
        self.indent_width
    }

    /// Install `mapper` to choose namespace prefixes. Prefixes it returns are
    /// checked on each write.
    pub fn set_namespace_prefix_mapper(&mut self, mapper: impl NamespacePrefixMapper + 'static) {
        self.prefix_mapper = Some(Box::new(mapper));
    }

    pub fn clear_namespace_prefix_mapper(&mut self) {
        self.prefix_mapper = None;
    }

    /// Set the schema location hint, replacing any previous one
    pub fn set_schema_location(
        &mut self,
        namespace: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<()> {
        self.schema_location = Some(SchemaLocation::new(namespace, url)?);
        Ok(())
    }

    pub fn clear_schema_location(&mut self) {
        self.schema_location = None;
    }

    pub fn schema_location(&self) -> Option<&SchemaLocation> {
        self.schema_location.as_ref()
    }

    /// Pass text already wrapped in CDATA markers through unescaped
    pub fn set_use_cdata_sections(&mut self, enabled: bool) {
        self.cdata_sections = enabled;
        self.escape_handler = if enabled {
            Box::new(CDataEscapeHandler::new())
        } else {
            Box::new(MinimumEscapeHandler)
        };
    }

    pub fn uses_cdata_sections(&self) -> bool {
        self.cdata_sections
    }

    /// Replace the character escaping strategy outright
    pub fn set_escape_handler(&mut self, handler: impl CharacterEscapeHandler + 'static) {
        self.escape_handler = Box::new(handler);
    }

    pub fn add_schema(&mut self, source: SchemaSource) {
        self.schemas.add_source(source);
    }

    pub fn add_schemas<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = SchemaSource>,
    {
        self.schemas.add_sources(sources);
    }

    pub fn add_schema_file(&mut self, path: impl Into<PathBuf>) {
        self.schemas.add_source(SchemaSource::file(path));
    }

    pub fn add_schema_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        self.schemas.add_source(SchemaSource::from_reader(reader)?);
        Ok(())
    }

    pub fn clear_schemas(&mut self) {
        self.schemas.clear();
    }

    pub fn schema_state(&self) -> SchemaCacheState {
        self.schemas.state()
    }

    /// Apply the configured schemas and output settings.
    ///
    /// Every setting is checked before any is applied, so a rejected config
    /// leaves the writer unchanged.
    pub fn apply_config(&mut self, config: &ProcessorConfig) -> Result<()> {
        let writer = &config.writer;
        check_indent_width(writer.indent_width)?;
        let schema_location = writer
            .schema_location
            .as_ref()
            .map(|location| SchemaLocation::new(location.namespace.clone(), location.url.clone()))
            .transpose()?;

        self.indent_width = writer.indent_width;
        self.schema_location = schema_location;
        self.set_formatted_output(writer.formatted_output);
        self.set_use_cdata_sections(writer.cdata_sections);

        self.schemas.clear();
        self.schemas
            .add_sources(config.schemas.files.iter().cloned().map(SchemaSource::File));
        Ok(())
    }

    /// Marshal `value` into a complete XML document.
    ///
    /// With schemas registered, the produced document must conform to the
    /// composed schema or the write fails with `XmlError::Validation`.
    pub fn write_string(&mut self, value: &T) -> Result<String> {
        let started = Instant::now();
        let schema = self.schemas.current()?;

        let serialized = self.binding.to_text(value)?;
        let options = EmitOptions {
            formatted_output: self.formatted_output,
            indent_width: self.indent_width,
            escape_handler: self.escape_handler.as_ref(),
            prefix_mapper: self.prefix_mapper.as_deref(),
            schema_location: self.schema_location.as_ref(),
        };
        let document = emit(&serialized, &options)?;

        if let Some(schema) = schema {
            let mut events = ValidationEventCollector::new();
            schema.validate(document.as_bytes(), &mut events)?;
            if events.has_events() {
                debug!(
                    events = events.len(),
                    root = self.binding.element_name(),
                    "output failed validation"
                );
                return Err(XmlError::validation(Direction::Output, events));
            }
        }

        debug!(
            root = self.binding.element_name(),
            bytes = document.len(),
            duration = ?started.elapsed(),
            "document written"
        );
        Ok(document)
    }

    /// Write to an open sink. The sink is flushed but not closed.
    pub fn write_to<W: Write>(&mut self, value: &T, mut output: W) -> Result<()> {
        let document = self.write_string(value)?;
        output
            .write_all(document.as_bytes())
            .and_then(|_| output.flush())
            .map_err(|e| XmlError::output_access("<output stream>", e))
    }

    /// Write to `path`, creating or truncating it. The file is opened before
    /// marshalling so an unwritable destination is reported first.
    pub fn write_file(&mut self, value: &T, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let file = File::create(path).map_err(|e| XmlError::output_access(location.clone(), e))?;

        let document = self.write_string(value)?;
        let mut output = BufWriter::new(file);
        output
            .write_all(document.as_bytes())
            .and_then(|_| output.flush())
            .map_err(|e| XmlError::output_access(location, e))
    }
}

impl<T> fmt::Debug for XmlWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlWriter")
            .field("binding", &self.binding)
            .field("schemas", &self.schemas)
            .field("formatted_output", &self.formatted_output)
            .field("indent_width", &self.indent_width)
            .field("cdata_sections", &self.cdata_sections)
            .field("prefix_mapper", &self.prefix_mapper.is_some())
            .field("schema_location", &self.schema_location)
            .finish()
    }
}

fn check_indent_width(width: usize) -> Result<()> {
    if !(1..=MAX_INDENT_WIDTH).contains(&width) {
        return Err(XmlError::configuration(format!(
            "Indent width must be between 1 and {}, got {}",
            MAX_INDENT_WIDTH, width
        )));
    }
    Ok(())
}
