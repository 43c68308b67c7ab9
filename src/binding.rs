//! Structural binding between XML text and serde types.
//!
//! A bindable root is any `Serialize`/`Deserialize` type; [`XmlRootElement`]
//! names the element it maps to. Field mapping follows quick-xml's serde
//! conventions (`@name` for attributes, `$text` for character content).
//!
//! A value reads back equal to what was written as long as the type follows
//! these field rules:
//!
//! - `Option` fields carry `#[serde(default, skip_serializing_if =
//!   "Option::is_none")]`. A `None` written without them becomes an empty
//!   element, which reads back as `Some` of an empty value.
//! - Sequence fields carry `#[serde(default)]`. An empty sequence writes no
//!   elements at all and would otherwise fail to read as a missing field.
//! - Leading and trailing whitespace of text content is not kept; the
//!   deserializer trims it.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Memo {
//!     #[serde(rename = "@id")]
//!     id: String,
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     note: Option<String>,
//!     #[serde(default)]
//!     tag: Vec<String>,
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Direction, Result, XmlError};
use crate::namespace::is_ncname;

/// Declares the root element a type is read from and written as
pub trait XmlRootElement {
    const ELEMENT_NAME: &'static str;
    const NAMESPACE: Option<&'static str> = None;
}

/// The binding of one root type to its XML element, fixed at construction
pub struct XmlBinding<T> {
    element_name: String,
    namespace: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: XmlRootElement> XmlBinding<T> {
    /// Bind `T` using its [`XmlRootElement`] declaration
    pub fn new() -> Result<Self> {
        Self::with_root(T::ELEMENT_NAME, T::NAMESPACE.map(str::to_string))
    }
}

impl<T> XmlBinding<T> {
    /// Bind `T` to an explicitly named root element
    ///
    /// # Errors
    ///
    /// Returns `XmlError::Setup` if the name is not a valid NCName or the
    /// namespace is empty.
    pub fn with_root(element_name: impl Into<String>, namespace: Option<String>) -> Result<Self> {
        let element_name = element_name.into();
        if !is_ncname(&element_name) {
            return Err(XmlError::Setup {
                details: format!("'{}' is not a valid root element name", element_name),
            });
        }
        if namespace.as_deref().is_some_and(|ns| ns.trim().is_empty()) {
            return Err(XmlError::Setup {
                details: format!("Root element '{}' has an empty namespace", element_name),
            });
        }

        Ok(Self {
            element_name,
            namespace,
            _marker: PhantomData,
        })
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Map XML text onto a `T`
    pub fn to_object(&self, text: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let root = root_element_name(text)?;
        if root != self.element_name {
            return Err(XmlError::structural_message(
                Direction::Input,
                format!(
                    "unexpected element (expected <{}>, found <{}>)",
                    self.element_name, root
                ),
            ));
        }

        quick_xml::de::from_str(text)
            .map_err(|e| XmlError::structural(Direction::Input, e.to_string(), e))
    }

    /// Serialize `value` as a document rooted at the bound element, without
    /// an XML declaration
    pub fn to_text(&self, value: &T) -> Result<String>
    where
        T: Serialize,
    {
        let text = quick_xml::se::to_string_with_root(&self.element_name, value)
            .map_err(|e| XmlError::structural(Direction::Output, e.to_string(), e))?;

        match &self.namespace {
            Some(ns) => declare_default_namespace(text, &self.element_name, ns),
            None => Ok(text),
        }
    }
}

impl<T> Clone for XmlBinding<T> {
    fn clone(&self) -> Self {
        Self {
            element_name: self.element_name.clone(),
            namespace: self.namespace.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for XmlBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlBinding")
            .field("element_name", &self.element_name)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Local name of the document's root element
fn root_element_name(text: &str) -> Result<String> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(XmlError::structural_message(
                    Direction::Input,
                    "the document has no root element",
                ));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(XmlError::structural(
                    Direction::Input,
                    format!("malformed XML at position {}", reader.error_position()),
                    e,
                ));
            }
        }
    }
}

/// Declare `namespace` as the default namespace on the root start tag unless
/// the serialized root already declares one
fn declare_default_namespace(text: String, root: &str, namespace: &str) -> Result<String> {
    let mut reader = Reader::from_str(&text);
    let declared = loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                break e
                    .attributes()
                    .flatten()
                    .any(|attr| attr.key.as_ref() == b"xmlns");
            }
            Ok(Event::Eof) => break false,
            Ok(_) => {}
            Err(e) => return Err(XmlError::structural(Direction::Output, e.to_string(), e)),
        }
    };
    if declared {
        return Ok(text);
    }

    let open = format!("<{}", root);
    let rest = text.strip_prefix(open.as_str()).ok_or_else(|| {
        XmlError::structural_message(
            Direction::Output,
            format!("serialized document does not start with <{}>", root),
        )
    })?;
    Ok(format!("{} xmlns=\"{}\"{}", open, escape(namespace), rest))
}
