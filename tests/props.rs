//! Property tests for the engine's algebraic guarantees.

use batchmap::{
    analyze::{AnalyzeOptions, ColumnSet, Row, analyze},
    mapping::{MappingRule, MappingSpec},
    registry::{FieldType, SchemaField, TargetSchema},
    runner::run,
    validate::validate,
};
use encoding_rs::UTF_8;
use proptest::prelude::*;

fn header_names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-z]{3,10}", 1..5)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
}

fn cell() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,12}"
}

fn csv_text(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut text = headers.join(",");
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

fn string_schema(fields: &[&str]) -> TargetSchema {
    TargetSchema {
        target_id: "props".to_string(),
        fields: fields
            .iter()
            .map(|name| SchemaField {
                name: (*name).to_string(),
                required: false,
                field_type: FieldType::String,
                description: None,
            })
            .collect(),
    }
}

proptest! {
    /// Prepending a UTF-8 BOM never changes the analyzed structure.
    #[test]
    fn bom_invariance(
        headers in header_names(),
        cells in proptest::collection::vec(cell(), 1..4),
    ) {
        let row: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(idx, _)| cells.get(idx % cells.len()).cloned().unwrap_or_default())
            .collect();
        let text = csv_text(&headers, &[row]);
        let mut with_bom = "\u{feff}".to_string();
        with_bom.push_str(&text);

        let (plain_columns, plain_rows) =
            analyze(std::io::Cursor::new(text.into_bytes()), UTF_8, &AnalyzeOptions::default())
                .expect("analyze plain");
        let (bom_columns, bom_rows) =
            analyze(std::io::Cursor::new(with_bom.into_bytes()), UTF_8, &AnalyzeOptions::default())
                .expect("analyze bom");

        prop_assert_eq!(plain_columns.names(), bom_columns.names());
        let plain: Vec<_> = plain_rows.map(|r| r.expect("row")).collect();
        let bom: Vec<_> = bom_rows.map(|r| r.expect("row")).collect();
        prop_assert_eq!(plain, bom);
    }

    /// apply is a pure function: identical inputs, identical outputs.
    #[test]
    fn apply_is_idempotent(
        address in cell(),
        postcode in proptest::option::of(cell()),
    ) {
        let columns = ColumnSet::from_headers(["address", "postcode"]).expect("columns");
        let schema = string_schema(&["full_address"]);
        let mut spec = MappingSpec::default();
        spec.fields.insert(
            "full_address".to_string(),
            MappingRule::Concat {
                columns: vec!["address".to_string(), "postcode".to_string()],
                separator: ", ".to_string(),
            },
        );
        let validated = validate(&spec, &columns, &schema).expect("valid spec");

        let row = Row::new(0, vec![Some(address), postcode]);
        prop_assert_eq!(validated.apply(&row), validated.apply(&row));
    }

    /// Concatenation over an absent column leaves no separator artifact.
    #[test]
    fn concat_never_leaves_trailing_separators(address in "[a-zA-Z0-9 ]{1,12}") {
        let columns = ColumnSet::from_headers(["address", "postcode"]).expect("columns");
        let schema = string_schema(&["full_address"]);
        let mut spec = MappingSpec::default();
        spec.fields.insert(
            "full_address".to_string(),
            MappingRule::Concat {
                columns: vec!["address".to_string(), "postcode".to_string()],
                separator: ", ".to_string(),
            },
        );
        let validated = validate(&spec, &columns, &schema).expect("valid spec");

        let row = Row::new(0, vec![Some(address.clone()), None]);
        let record = validated.apply(&row).expect("record");
        prop_assert_eq!(
            record.get("full_address").map(ToString::to_string),
            Some(address)
        );
    }

    /// The batch result always matches the source row count and order.
    #[test]
    fn batch_length_and_order_match_the_source(
        names in proptest::collection::vec("[a-z]{1,10}", 0..20),
    ) {
        let headers = vec!["name".to_string()];
        let rows: Vec<Vec<String>> = names.iter().map(|n| vec![n.clone()]).collect();
        let text = csv_text(&headers, &rows);

        let (columns, stream) =
            analyze(std::io::Cursor::new(text.into_bytes()), UTF_8, &AnalyzeOptions::default())
                .expect("analyze");
        let schema = string_schema(&["name"]);
        let mut spec = MappingSpec::default();
        spec.fields.insert(
            "name".to_string(),
            MappingRule::Direct { column: "name".to_string() },
        );

        let result = run(&spec, &columns, stream, &schema).expect("run");
        prop_assert_eq!(result.len(), names.len());
        for (idx, record) in result.records().enumerate() {
            prop_assert_eq!(record.row_index, idx);
        }
    }
}
