mod common;

use std::fs::File;
use std::io::Cursor;

use common::test_helpers::*;
use xml_binder::{
    ConfigManager, Direction, SchemaCacheState, SchemaSource, XmlBinding, XmlError, XmlReader,
};

#[test]
fn test_read_person_without_schema() {
    let mut reader = XmlReader::<Person>::new().unwrap();

    let person = reader.read_str(PERSON_XML).unwrap();

    assert_eq!(person, ada());
    assert_eq!(reader.schema_state(), SchemaCacheState::Absent);
}

#[test]
fn test_all_input_shapes_agree() {
    let fixtures = TestFixtures::new();
    let path = fixtures.xml("person.xml");
    let mut reader = XmlReader::<Person>::new().unwrap();
    reader.add_schema_file(fixtures.person_schema());

    let from_file = reader.read_file(&path).unwrap();
    let from_stream = reader.read_from(File::open(&path).unwrap()).unwrap();
    let from_bytes = reader.read_bytes(&std::fs::read(&path).unwrap()).unwrap();
    let from_cursor = reader.read_from(Cursor::new(PERSON_XML)).unwrap();

    assert_eq!(from_file, ada());
    assert_eq!(from_stream, ada());
    assert_eq!(from_bytes, ada());
    assert_eq!(from_cursor, ada());
}

#[test]
fn test_nonconforming_input_fails_validation() {
    let fixtures = TestFixtures::new();
    let mut reader = XmlReader::<Person>::new().unwrap();
    reader.add_schema_file(fixtures.person_schema());

    // The binding ignores the unknown element, the schema does not
    let err = reader
        .read_file(fixtures.xml("person-extra-element.xml"))
        .unwrap_err();

    match err {
        XmlError::Validation {
            direction,
            details,
            events,
        } => {
            assert_eq!(direction, Direction::Input);
            assert!(!events.is_empty());
            assert!(details.contains("title"), "unexpected details: {details}");
            assert_eq!(details, details.trim_end());
        }
        other => panic!("Expected Validation error, got {:?}", other),
    }
}

#[test]
fn test_structural_failure_wins_over_validation() {
    let fixtures = TestFixtures::new();
    let mut reader = XmlReader::<Person>::new().unwrap();
    reader.add_schema_file(fixtures.person_schema());

    let err = reader
        .read_file(fixtures.xml("person-missing-birth.xml"))
        .unwrap_err();

    assert!(
        matches!(err, XmlError::StructuralConversion { direction: Direction::Input, .. }),
        "got {:?}",
        err
    );
}

#[test]
fn test_partial_type_reads_missing_element_but_schema_rejects() {
    let fixtures = TestFixtures::new();
    let mut reader = XmlReader::<PartialPerson>::new().unwrap();

    let person = reader
        .read_file(fixtures.xml("person-missing-birth.xml"))
        .unwrap();
    assert_eq!(person.name, "Ada");

    reader.add_schema_file(fixtures.person_schema());
    let err = reader
        .read_file(fixtures.xml("person-missing-birth.xml"))
        .unwrap_err();

    match err {
        XmlError::Validation { details, .. } => assert!(details.contains("birth")),
        other => panic!("Expected Validation error, got {:?}", other),
    }
}

#[test]
fn test_wrong_root_element() {
    let mut reader = XmlReader::<Person>::new().unwrap();

    let err = reader
        .read_str("<article><title>t</title><body>b</body></article>")
        .unwrap_err();

    assert!(err.to_string().contains("unexpected element"));
}

#[test]
fn test_malformed_input() {
    let mut reader = XmlReader::<Person>::new().unwrap();

    let err = reader
        .read_str("<person><name>Ada</name><birth>1815-12-10</person>")
        .unwrap_err();

    assert!(matches!(err, XmlError::StructuralConversion { .. }));
    assert!(!err.is_access_error());
}

#[test]
fn test_missing_input_file() {
    let mut reader = XmlReader::<Person>::new().unwrap();
    let err = reader.read_file("/nonexistent/person.xml").unwrap_err();

    match err {
        XmlError::InputAccess { location, .. } => assert!(location.contains("person.xml")),
        other => panic!("Expected InputAccess error, got {:?}", other),
    }
}

#[test]
fn test_clearing_schemas_disables_validation() {
    let fixtures = TestFixtures::new();
    let mut reader = XmlReader::<Person>::new().unwrap();
    reader.add_schema_file(fixtures.person_schema());
    assert!(
        reader
            .read_file(fixtures.xml("person-extra-element.xml"))
            .is_err()
    );

    reader.clear_schemas();
    assert_eq!(reader.schema_state(), SchemaCacheState::Absent);

    let person = reader
        .read_file(fixtures.xml("person-extra-element.xml"))
        .unwrap();
    assert_eq!(person, ada());
}

#[test]
fn test_added_schema_takes_effect_on_next_read() {
    let fixtures = TestFixtures::new();
    let mut reader = XmlReader::<Person>::new().unwrap();
    reader.add_schema_file(fixtures.article_schema());

    // article.xsd declares no <person>, so the composed schema rejects it
    assert!(matches!(
        reader.read_str(PERSON_XML),
        Err(XmlError::Validation { .. })
    ));
    assert_eq!(reader.schema_state(), SchemaCacheState::Built);

    reader.add_schema_file(fixtures.person_schema());
    assert_eq!(reader.schema_state(), SchemaCacheState::Stale);

    assert_eq!(reader.read_str(PERSON_XML).unwrap(), ada());
    assert_eq!(reader.schema_state(), SchemaCacheState::Built);
}

#[test]
fn test_broken_schema_surfaces_on_every_read() {
    let fixtures = TestFixtures::new();
    let mut reader = XmlReader::<Person>::new().unwrap();
    reader.add_schema_file(fixtures.person_schema());
    reader.add_schema_file(fixtures.broken_schema());

    let first = reader.read_str(PERSON_XML).unwrap_err();
    let second = reader.read_str(PERSON_XML).unwrap_err();

    match (&first, &second) {
        (
            XmlError::SchemaComposition { details: a },
            XmlError::SchemaComposition { details: b },
        ) => {
            assert!(!a.is_empty());
            assert_eq!(a, b);
        }
        other => panic!("Expected SchemaComposition errors, got {:?}", other),
    }
    assert_eq!(reader.schema_state(), SchemaCacheState::Stale);
}

#[test]
fn test_schema_from_stream() {
    let fixtures = TestFixtures::new();
    let mut reader = XmlReader::<Person>::new().unwrap();
    reader
        .add_schema_reader(File::open(fixtures.person_schema()).unwrap())
        .unwrap();
    reader.add_schema(SchemaSource::memory(POINT_XSD));

    assert_eq!(reader.read_str(PERSON_XML).unwrap(), ada());
}

#[test]
fn test_explicit_binding() {
    let binding = XmlBinding::<PartialPerson>::with_root("person", None).unwrap();
    let mut reader = XmlReader::with_binding(binding);

    let person = reader.read_str(PERSON_XML).unwrap();
    assert_eq!(person.name, "Ada");
}

#[test]
fn test_apply_config() {
    let fixtures = TestFixtures::new();
    let config =
        ConfigManager::load_from_file(&fixtures.configs_dir().join("binder.toml")).unwrap();
    let mut reader = XmlReader::<Person>::new().unwrap();

    reader.apply_config(&config);
    assert_eq!(reader.schema_state(), SchemaCacheState::Stale);

    assert_eq!(reader.read_file(fixtures.xml("person.xml")).unwrap(), ada());
    assert!(
        reader
            .read_file(fixtures.xml("person-extra-element.xml"))
            .is_err()
    );
}
