//! LibXML2 FFI Wrapper Module
//!
//! This module provides a safe wrapper around the libxml2 FFI calls used for
//! XML Schema (XSD) support: compiling schemas while capturing their
//! diagnostics, and validating in-memory documents against a compiled schema.
//!
//! The Rust ecosystem has no mature XSD validator (roxmltree, quick-xml,
//! yaserde and xml-rs all stop at parsing or binding), so schema work goes
//! straight to libxml2 while structural binding stays in quick-xml.
//!
//! ## Thread Safety Strategy
//!
//! According to the libxml2 documentation (http://xmlsoft.org/threads.html):
//!
//! - **Schema parsing** is NOT thread-safe and is serialised here by
//!   [`SCHEMA_PARSE_LOCK`].
//! - **Validation** is thread-safe for different documents; each call creates
//!   its own validation context.
//! - **Compiled schemas** are read-only after parsing and are shared through
//!   an `Arc`.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::ptr;
use std::sync::{Arc, Mutex, Once, PoisonError};

use libc::{c_char, c_int, c_void};

use crate::error::{LibXml2Error, LibXml2Result};
use crate::validation::{Severity, ValidationEvent, ValidationEventCollector};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they run
/// exactly once behind a `std::sync::Once`.
static LIBXML2_INIT: Once = Once::new();

/// Serialises schema compilation across the whole process
static SCHEMA_PARSE_LOCK: Mutex<()> = Mutex::new(());

// xmlParserOption flags
const XML_PARSE_NOERROR: c_int = 1 << 5;
const XML_PARSE_NOWARNING: c_int = 1 << 6;
const XML_PARSE_NONET: c_int = 1 << 11;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Schema parsing functions
    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *mut XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation functions
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;

    // Document parsing
    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

/// Callback for libxml2 to report schema and validation errors (structured).
/// `user_data` is the `ValidationEventCollector` of the running call.
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }

    let collector = unsafe { &mut *(user_data as *mut ValidationEventCollector) };
    let (level, msg_ptr) = unsafe { ((*error).level, (*error).message) };
    if msg_ptr.is_null() {
        return;
    }

    let message = unsafe { CStr::from_ptr(msg_ptr) }
        .to_string_lossy()
        .trim()
        .to_string();
    collector.handle_event(ValidationEvent::new(Severity::from_level(level), message));
}

/// Thread-safe wrapper for libxml2 schema pointer with proper resource management
///
/// - The schema is freed exactly once, when the last clone is dropped
/// - The schema can be shared across threads (libxml2 schemas are read-only after parsing)
#[derive(Debug)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: libxml2 documentation states that xmlSchema structures are thread-safe for reading
// See: http://xmlsoft.org/threads.html
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// Create a new XmlSchemaPtr from a raw pointer
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - The pointer is null or points to a properly initialized xmlSchema
    /// - The pointer was allocated by libxml2 and should be freed with xmlSchemaFree
    /// - No other code will free this pointer
    pub(crate) unsafe fn from_raw(ptr: *mut XmlSchema) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed);
        }

        Ok(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    /// Raw pointer for FFI calls, valid while this XmlSchemaPtr exists
    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }

    /// Check if the schema pointer is valid (non-null)
    pub fn is_valid(&self) -> bool {
        !self.inner.ptr.is_null()
    }
}

impl Clone for XmlSchemaPtr {
    fn clone(&self) -> Self {
        XmlSchemaPtr {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Validation succeeded (return code 0)
    Valid,
    /// Validation failed; details were reported as events (return code > 0)
    Invalid { error_count: i32 },
    /// Internal error occurred (return code < 0)
    InternalError { code: i32 },
}

impl ValidationResult {
    /// Create ValidationResult from a libxml2 return code
    pub fn from_code(code: c_int) -> Self {
        match code {
            0 => ValidationResult::Valid,
            n if n > 0 => ValidationResult::Invalid { error_count: n },
            n => ValidationResult::InternalError { code: n },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationResult::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationResult::InternalError { .. })
    }
}

/// Safe access to the libxml2 schema functionality
///
/// Diagnostics are never printed; they are delivered into the
/// `ValidationEventCollector` passed to each call.
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Create a new wrapper, initialising libxml2 on first use
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile the schema document at `path`.
    ///
    /// Relative `xs:include`/`xs:import` locations inside it resolve against
    /// the file's own location. Every diagnostic libxml2 emits is pushed onto
    /// `diagnostics`, including warnings.
    ///
    /// # Errors
    ///
    /// Returns `LibXml2Error::SchemaParseFailed` if no schema could be built.
    pub fn parse_schema_from_file(
        &self,
        path: &Path,
        diagnostics: &mut ValidationEventCollector,
    ) -> LibXml2Result<XmlSchemaPtr> {
        let path_str = path.to_str().ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let c_path = CString::new(path_str).map_err(|_| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })?;

        let _guard = SCHEMA_PARSE_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        unsafe {
            let parser_ctxt = xmlSchemaNewParserCtxt(c_path.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            Self::parse_with_context(parser_ctxt, diagnostics)
        }
    }

    /// Compile a schema held in memory
    ///
    /// # Errors
    ///
    /// Returns `LibXml2Error::SchemaParseFailed` if the schema cannot be parsed.
    /// Returns `LibXml2Error::MemoryAllocation` if memory allocation fails.
    pub fn parse_schema_from_memory(
        &self,
        schema_data: &[u8],
        diagnostics: &mut ValidationEventCollector,
    ) -> LibXml2Result<XmlSchemaPtr> {
        let size = c_int::try_from(schema_data.len()).map_err(|_| LibXml2Error::InputTooLarge {
            size: schema_data.len(),
        })?;

        let _guard = SCHEMA_PARSE_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        unsafe {
            let parser_ctxt =
                xmlSchemaNewMemParserCtxt(schema_data.as_ptr() as *const c_char, size);
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            Self::parse_with_context(parser_ctxt, diagnostics)
        }
    }

    /// # Safety
    ///
    /// `parser_ctxt` must be a live parser context; it is freed here. The
    /// caller must hold `SCHEMA_PARSE_LOCK`.
    unsafe fn parse_with_context(
        parser_ctxt: *mut XmlSchemaParserCtxt,
        diagnostics: &mut ValidationEventCollector,
    ) -> LibXml2Result<XmlSchemaPtr> {
        unsafe {
            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                diagnostics as *mut ValidationEventCollector as *mut c_void,
            );

            let schema_ptr = xmlSchemaParse(parser_ctxt);

            // Always free the parser context
            xmlSchemaFreeParserCtxt(parser_ctxt);

            XmlSchemaPtr::from_raw(schema_ptr)
        }
    }

    /// Validate an in-memory XML document against a schema
    ///
    /// This method is thread-safe: the schema is only read and each call uses
    /// its own validation context. A document libxml2 cannot parse is reported
    /// as a single fatal event.
    ///
    /// # Errors
    ///
    /// Returns `LibXml2Error::ValidationContextCreationFailed` if the validation
    /// context cannot be created.
    /// Returns `LibXml2Error::ValidationFailed` on a libxml2 internal error.
    pub fn validate_memory(
        &self,
        schema: &XmlSchemaPtr,
        document: &[u8],
        events: &mut ValidationEventCollector,
    ) -> LibXml2Result<ValidationResult> {
        let size = c_int::try_from(document.len()).map_err(|_| LibXml2Error::InputTooLarge {
            size: document.len(),
        })?;

        unsafe {
            let doc = xmlReadMemory(
                document.as_ptr() as *const c_char,
                size,
                ptr::null(),
                ptr::null(),
                XML_PARSE_NONET | XML_PARSE_NOERROR | XML_PARSE_NOWARNING,
            );
            if doc.is_null() {
                events.handle_event(ValidationEvent::new(
                    Severity::FatalError,
                    "The document is not well-formed XML and cannot be validated",
                ));
                return Ok(ValidationResult::Invalid { error_count: 1 });
            }

            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                xmlFreeDoc(doc);
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                events as *mut ValidationEventCollector as *mut c_void,
            );

            let result_code = xmlSchemaValidateDoc(valid_ctxt, doc);

            xmlSchemaFreeValidCtxt(valid_ctxt);
            xmlFreeDoc(doc);

            match ValidationResult::from_code(result_code) {
                ValidationResult::InternalError { code } => {
                    Err(LibXml2Error::ValidationFailed { code })
                }
                result => Ok(result),
            }
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
