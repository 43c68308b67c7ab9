//! # xml-binder Library
//!
//! Reads XML documents into serde-bound Rust types and writes them back,
//! optionally validating both directions against one or more XSD schemas
//! compiled with libxml2.
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use xml_binder::{SchemaSource, XmlReader, XmlRootElement};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Person {
//!     name: String,
//! }
//!
//! impl XmlRootElement for Person {
//!     const ELEMENT_NAME: &'static str = "person";
//! }
//!
//! # fn main() -> xml_binder::Result<()> {
//! let mut reader = XmlReader::<Person>::new()?;
//! reader.add_schema(SchemaSource::file("person.xsd"));
//! let person = reader.read_file("person.xml")?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod binding;
pub mod config;
mod emitter;
pub mod error;
pub mod escape;
pub mod libxml2;
pub mod namespace;
pub mod reader;
pub mod schema_composer;
pub mod validation;
pub mod writer;

pub use binding::{XmlBinding, XmlRootElement};
pub use config::{ConfigError, ConfigManager, ProcessorConfig};
pub use error::{Direction, LibXml2Error, Result, XmlError};
pub use escape::{CDATA_MARKER, CDataEscapeHandler, CharacterEscapeHandler, MinimumEscapeHandler};
pub use namespace::{NamespacePrefixMapper, StaticPrefixMapper};
pub use reader::XmlReader;
pub use schema_composer::{ComposedSchema, SchemaCacheState, SchemaComposer, SchemaSource};
pub use validation::{Severity, ValidationEvent, ValidationEventCollector};
pub use writer::{SchemaLocation, XmlWriter};
