use divan::Bencher;
use serde::{Deserialize, Serialize};
use xml_binder::{SchemaComposer, SchemaSource, XmlReader, XmlRootElement, XmlWriter};

fn main() {
    divan::main();
}

const ITEM_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="order">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="customer" type="xs:string"/>
                <xs:element name="item" maxOccurs="unbounded">
                    <xs:complexType>
                        <xs:sequence>
                            <xs:element name="sku" type="xs:string"/>
                            <xs:element name="quantity" type="xs:int"/>
                        </xs:sequence>
                    </xs:complexType>
                </xs:element>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

const NOTE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="note" type="xs:string"/>
</xs:schema>"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    customer: String,
    item: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Item {
    sku: String,
    quantity: i32,
}

impl XmlRootElement for Order {
    const ELEMENT_NAME: &'static str = "order";
}

fn order(items: usize) -> Order {
    Order {
        customer: "Ada & Co".to_string(),
        item: (0..items)
            .map(|i| Item {
                sku: format!("SKU-{}", i),
                quantity: i as i32,
            })
            .collect(),
    }
}

#[divan::bench]
fn compose_single_source() {
    let mut composer = SchemaComposer::new();
    composer.add_source(SchemaSource::memory(ITEM_XSD));
    divan::black_box(composer.compose().expect("Failed to compose schema"));
}

#[divan::bench]
fn compose_two_sources() {
    let mut composer = SchemaComposer::new();
    composer.add_source(SchemaSource::memory(ITEM_XSD));
    composer.add_source(SchemaSource::memory(NOTE_XSD));
    divan::black_box(composer.compose().expect("Failed to compose schema"));
}

#[divan::bench(args = [1, 100, 1000])]
fn write_validated(bencher: Bencher, items: usize) {
    let mut writer = XmlWriter::<Order>::new().unwrap();
    writer.add_schema(SchemaSource::memory(ITEM_XSD));
    writer.set_formatted_output(true);
    let value = order(items);

    bencher.bench_local(move || writer.write_string(&value).expect("Write failed"));
}

#[divan::bench(args = [1, 100, 1000])]
fn read_validated(bencher: Bencher, items: usize) {
    let mut writer = XmlWriter::<Order>::new().unwrap();
    let text = writer.write_string(&order(items)).unwrap();

    let mut reader = XmlReader::<Order>::new().unwrap();
    reader.add_schema(SchemaSource::memory(ITEM_XSD));

    bencher.bench_local(move || reader.read_str(&text).expect("Read failed"));
}

#[divan::bench(args = [1, 100, 1000])]
fn read_unvalidated(bencher: Bencher, items: usize) {
    let mut writer = XmlWriter::<Order>::new().unwrap();
    let text = writer.write_string(&order(items)).unwrap();
    let mut reader = XmlReader::<Order>::new().unwrap();

    bencher.bench_local(move || reader.read_str(&text).expect("Read failed"));
}
