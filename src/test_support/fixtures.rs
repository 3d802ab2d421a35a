//! Pre-built sections for common test scenarios.

use crate::core::row::{FieldValue, ObjectField};
use crate::core::section::{Section, SectionType};
use crate::core::table_definition::TableDefinitionCollection;

/// A product section with a few properties, a component and a source line
/// on every row.
pub fn sample_product_section(schema: &TableDefinitionCollection) -> Section {
    let mut section = Section::new(Some("MyProduct".to_string()), SectionType::Product, 1252);

    let property = schema.get("Property").expect("Property table");
    for (line, (name, value)) in [
        ("ProductName", "My Product"),
        ("Manufacturer", "Example & Sons <Ltd>"),
        ("ARPNOMODIFY", ""),
    ]
    .into_iter()
    .enumerate()
    {
        let row = section.tables_mut().ensure(&property).create_row();
        row.set(0, FieldValue::string(name)).unwrap();
        row.set(1, FieldValue::string(value)).unwrap();
        row.set_source_line(Some(format!("product.wxs({})", line + 3)));
    }

    let component = schema.get("Component").expect("Component table");
    let row = section.tables_mut().ensure(&component).create_row();
    row.set(0, FieldValue::string("MainExecutable")).unwrap();
    row.set(1, FieldValue::string("{5C1C1C26-7B8F-4DB5-9E1E-2AE0D2B1E2A1}"))
        .unwrap();
    row.set(2, FieldValue::string("INSTALLDIR")).unwrap();
    row.set(3, FieldValue::Number(256)).unwrap();

    section
}

/// A section holding one `Property` row per name. Fragments get no id.
pub fn property_section(
    schema: &TableDefinitionCollection,
    section_type: SectionType,
    names: &[&str],
) -> Section {
    let id = section_type
        .requires_id()
        .then(|| format!("{}Section", section_type));
    let mut section = Section::new(id, section_type, 0);

    let property = schema.get("Property").expect("Property table");
    for name in names {
        let row = section.tables_mut().ensure(&property).create_row();
        row.set(0, FieldValue::string(*name)).unwrap();
        row.set(1, FieldValue::string("1")).unwrap();
    }
    section
}

/// A fragment with one `Binary` row per `(name, reference)`; row `n` is
/// authored at `binaries.wxs(n + 1)`.
pub fn binary_section(schema: &TableDefinitionCollection, binaries: &[(&str, &str)]) -> Section {
    let mut section = Section::new(None, SectionType::Fragment, 0);

    let binary = schema.get("Binary").expect("Binary table");
    for (line, (name, reference)) in binaries.iter().enumerate() {
        let row = section.tables_mut().ensure(&binary).create_row();
        row.set(0, FieldValue::string(*name)).unwrap();
        row.set(1, FieldValue::Object(ObjectField::new(*reference)))
            .unwrap();
        row.set_source_line(Some(format!("binaries.wxs({})", line + 1)));
    }
    section
}
