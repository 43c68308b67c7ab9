//! Character escaping strategies used when writing text and attribute values.

use quick_xml::escape::{escape, partial_escape};

/// Opening marker of a CDATA section
pub const CDATA_MARKER: &str = "<![CDATA[";

/// Closing marker of a CDATA section
pub const CDATA_END_MARKER: &str = "]]>";

/// Escapes one span of character data into `out`.
///
/// Installed into the writer's output stage; implementations must hold no
/// per-call state since a single instance serves every write.
pub trait CharacterEscapeHandler: Send + Sync {
    fn escape(&self, text: &str, is_attribute: bool, out: &mut String);
}

/// Baseline escaping: `&`, `<` and `>` in text, plus both quote characters
/// in attribute values
#[derive(Debug, Default, Clone, Copy)]
pub struct MinimumEscapeHandler;

impl CharacterEscapeHandler for MinimumEscapeHandler {
    fn escape(&self, text: &str, is_attribute: bool, out: &mut String) {
        if is_attribute {
            out.push_str(&escape(text));
        } else {
            out.push_str(&partial_escape(text));
        }
    }
}

/// Escapes as its delegate does, except for spans that start with
/// [`CDATA_MARKER`], which are written verbatim.
///
/// Values wrapped by [`crate::adapters::cdata`] reach the output stage as
/// plain text; without this handler the markers themselves would be escaped.
#[derive(Debug, Default, Clone, Copy)]
pub struct CDataEscapeHandler<D = MinimumEscapeHandler> {
    delegate: D,
}

impl CDataEscapeHandler<MinimumEscapeHandler> {
    pub fn new() -> Self {
        Self {
            delegate: MinimumEscapeHandler,
        }
    }
}

impl<D: CharacterEscapeHandler> CDataEscapeHandler<D> {
    pub fn with_delegate(delegate: D) -> Self {
        Self { delegate }
    }
}

impl<D: CharacterEscapeHandler> CharacterEscapeHandler for CDataEscapeHandler<D> {
    fn escape(&self, text: &str, is_attribute: bool, out: &mut String) {
        if text.starts_with(CDATA_MARKER) {
            out.push_str(text);
            return;
        }
        self.delegate.escape(text, is_attribute, out);
    }
}
