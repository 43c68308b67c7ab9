//! Validating reader: XML text in, bound document out.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::binding::{XmlBinding, XmlRootElement};
use crate::config::ProcessorConfig;
use crate::error::{Direction, Result, XmlError};
use crate::schema_composer::{SchemaCacheState, SchemaComposer, SchemaSource};
use crate::validation::ValidationEventCollector;

/// Reads documents of one bound root type, optionally validating them
/// against the registered schemas.
///
/// The binding is fixed at construction. Schemas can be added or cleared at
/// any time; the composed schema is rebuilt on the next read after a change.
/// An instance is not meant to be shared between threads while reading; use
/// one reader per thread instead.
#[derive(Debug)]
pub struct XmlReader<T> {
    binding: XmlBinding<T>,
    schemas: SchemaComposer,
}

impl<T: XmlRootElement + DeserializeOwned> XmlReader<T> {
    pub fn new() -> Result<Self> {
        Ok(Self::with_binding(XmlBinding::new()?))
    }
}

impl<T: DeserializeOwned> XmlReader<T> {
    pub fn with_binding(binding: XmlBinding<T>) -> Self {
        Self {
            binding,
            schemas: SchemaComposer::new(),
        }
    }

    pub fn binding(&self) -> &XmlBinding<T> {
        &self.binding
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

    /// Register a schema from an open stream, which is drained immediately
    pub fn add_schema_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        self.schemas.add_source(SchemaSource::from_reader(reader)?);
        Ok(())
    }

    /// Drop every schema, disabling validation
    pub fn clear_schemas(&mut self) {
        self.schemas.clear();
    }

    pub fn schema_state(&self) -> SchemaCacheState {
        self.schemas.state()
    }

    /// Replace the registered schemas with the configured ones
    pub fn apply_config(&mut self, config: &ProcessorConfig) {
        self.schemas.clear();
        self.schemas
            .add_sources(config.schemas.files.iter().cloned().map(SchemaSource::File));
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).map_err(|e| XmlError::input_access(path.display().to_string(), e))?;
        self.read_bytes(&bytes)
    }

    /// Read a document from an open stream. The stream is not closed.
    pub fn read_from<R: Read>(&mut self, mut input: R) -> Result<T> {
        let mut bytes = Vec::new();
        input
            .read_to_end(&mut bytes)
            .map_err(|e| XmlError::input_access("<input stream>", e))?;
        self.read_bytes(&bytes)
    }

    pub fn read_bytes(&mut self, bytes: &[u8]) -> Result<T> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| XmlError::structural(Direction::Input, "input is not valid UTF-8", e))?;
        self.read_str(text)
    }

    /// Convert `text` to a `T`.
    ///
    /// With schemas registered, the document must also conform to the
    /// composed schema; every nonconformance is reported in one
    /// `XmlError::Validation`.
    pub fn read_str(&mut self, text: &str) -> Result<T> {
        let started = Instant::now();
        let schema = self.schemas.current()?;

        let value = self.binding.to_object(text)?;

        if let Some(schema) = schema {
            let mut events = ValidationEventCollector::new();
            schema.validate(text.as_bytes(), &mut events)?;
            if events.has_events() {
                debug!(
                    events = events.len(),
                    root = self.binding.element_name(),
                    "input failed validation"
                );
                return Err(XmlError::validation(Direction::Input, events));
            }
        }

        debug!(
            root = self.binding.element_name(),
            duration = ?started.elapsed(),
            "document read"
        );
        Ok(value)
    }
}
