//! Wraps text fields in a CDATA section.
//!
//! The wrapped value only survives as a real CDATA section when the writer
//! has CDATA sections enabled; otherwise the markers are escaped like any
//! other text. Reading needs no unwrapping since the parser already strips
//! the markers.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Article {
//!     #[serde(with = "xml_binder::adapters::cdata")]
//!     body: String,
//! }
//! ```

use serde::{Deserialize, Deserializer, Serializer};

use crate::escape::{CDATA_END_MARKER, CDATA_MARKER};

const SPLIT_END_MARKER: &str = "]]]]><![CDATA[>";

/// `value` enclosed in CDATA markers.
///
/// A CDATA section cannot contain its own end marker, so each `]]>` in
/// `value` closes the section after `]]` and reopens it before `>`. The
/// parser joins adjacent sections back into the original text.
pub fn wrap(value: &str) -> String {
    let mut wrapped =
        String::with_capacity(CDATA_MARKER.len() + value.len() + CDATA_END_MARKER.len());
    wrapped.push_str(CDATA_MARKER);
    wrapped.push_str(&value.replace(CDATA_END_MARKER, SPLIT_END_MARKER));
    wrapped.push_str(CDATA_END_MARKER);
    wrapped
}

pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<str> + ?Sized,
    S: Serializer,
{
    serializer.serialize_str(&wrap(value.as_ref()))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer)
}

pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(text) => serializer.serialize_some(&wrap(text)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("<b>bold</b>"), "<![CDATA[<b>bold</b>]]>");
        assert_eq!(wrap(""), "<![CDATA[]]>");
    }

    #[test]
    fn test_wrap_splits_end_marker() {
        assert_eq!(wrap("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
        assert_eq!(wrap("]]>]]>"), "<![CDATA[]]]]><![CDATA[>]]]]><![CDATA[>]]>");
    }

    #[test]
    fn test_serialize_through_json() {
        #[derive(serde::Serialize)]
        struct Holder {
            #[serde(with = "super")]
            text: String,
        }

        let json = serde_json::to_string(&Holder {
            text: "a < b".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"text":"<![CDATA[a < b]]>"}"#);
    }
}
