use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use xml_binder::XmlRootElement;
use xml_binder::adapters::{cdata, local_date};

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.fixtures_dir.join("schemas")
    }

    pub fn xml_dir(&self) -> PathBuf {
        self.fixtures_dir.join("xml")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.fixtures_dir.join("configs")
    }

    pub fn schema(&self, name: &str) -> PathBuf {
        self.schemas_dir().join(name)
    }

    pub fn xml(&self, name: &str) -> PathBuf {
        self.xml_dir().join(name)
    }

    pub fn person_schema(&self) -> PathBuf {
        self.schema("person.xsd")
    }

    pub fn article_schema(&self) -> PathBuf {
        self.schema("article.xsd")
    }

    pub fn library_schema(&self) -> PathBuf {
        self.schema("library.xsd")
    }

    pub fn memo_schema(&self) -> PathBuf {
        self.schema("memo.xsd")
    }

    pub fn broken_schema(&self) -> PathBuf {
        self.schema("broken.xsd")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(with = "local_date")]
    pub birth: NaiveDate,
}

impl XmlRootElement for Person {
    const ELEMENT_NAME: &'static str = "person";
}

/// A person without the birth date the person schema requires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialPerson {
    pub name: String,
}

impl XmlRootElement for PartialPerson {
    const ELEMENT_NAME: &'static str = "person";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(with = "cdata")]
    pub body: String,
}

impl XmlRootElement for Article {
    const ELEMENT_NAME: &'static str = "article";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
}

impl XmlRootElement for Book {
    const ELEMENT_NAME: &'static str = "book";
    const NAMESPACE: Option<&'static str> = Some("urn:example:library");
}

/// Element with an attribute, for exercising attribute escaping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(rename = "@id")]
    pub id: String,
    pub text: String,
}

impl XmlRootElement for Label {
    const ELEMENT_NAME: &'static str = "label";
}

/// Optional and repeated fields declared so that absent values round-trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    #[serde(rename = "@id")]
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub tag: Vec<String>,
}

impl XmlRootElement for Memo {
    const ELEMENT_NAME: &'static str = "memo";
}

pub fn ada() -> Person {
    Person {
        name: "Ada".to_string(),
        birth: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
    }
}

pub fn article() -> Article {
    Article {
        title: "1 < 2".to_string(),
        body: "<b>bold</b>".to_string(),
    }
}

/// Create a temporary directory holding `files` (name, content)
pub fn temp_dir_with(files: &[(&str, &str)]) -> std::io::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    for (name, content) in files {
        create_test_file(&temp_dir.path().join(name), content)?;
    }
    Ok(temp_dir)
}

pub fn create_test_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

/// Schema content constants for testing
pub const POINT_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="point">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="x" type="xs:int"/>
                <xs:element name="y" type="xs:int"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

pub const PERSON_XML: &str = "<person><name>Ada</name><birth>1815-12-10</birth></person>";
