use bronze_model::{ColumnSpec, ExpectedKind, Frame, SqlType, TableRef, TargetTable, Value, ValueKind};
use bronze_validate::{drop_extra_columns, validate_schema};

fn episodes_target() -> TargetTable {
    TargetTable::new(
        TableRef::new("bronze", "episodes"),
        vec![
            ColumnSpec::new("episode_key", SqlType::BigInt).primary_key(),
            ColumnSpec::new("version_season", SqlType::Text),
            ColumnSpec::new("episode", SqlType::Integer),
            ColumnSpec::new("viewers", SqlType::DoublePrecision),
            ColumnSpec::new("episode_date", SqlType::Date),
            ColumnSpec::new("episode_title", SqlType::Text),
        ],
    )
}

#[test]
fn missing_non_key_column_invalidates_the_result() {
    let frame = Frame::from_rows(
        "episodes",
        ["version_season", "episode", "viewers", "episode_date"],
        vec![vec![
            Value::from("US01"),
            Value::from(1),
            Value::from(15),
            Value::from("2000-05-31"),
        ]],
    );
    let result = validate_schema(&frame, &episodes_target());
    assert!(!result.is_valid);
    assert_eq!(
        result.missing_columns.iter().collect::<Vec<_>>(),
        vec!["episode_title"]
    );
    assert!(result.type_mismatches.is_empty());
    assert_eq!(result.resolved_schema.len(), 6);
}

#[test]
fn type_mismatch_is_reported_per_column() {
    let frame = Frame::from_rows(
        "episodes",
        ["version_season", "episode", "viewers", "episode_date", "episode_title"],
        vec![vec![
            Value::from("US01"),
            Value::from("one"),
            Value::from(15.2),
            Value::Null,
            Value::from("The Marooning"),
        ]],
    );
    let result = validate_schema(&frame, &episodes_target());
    assert!(!result.is_valid);
    let mismatch = &result.type_mismatches["episode"];
    assert_eq!(mismatch.expected, ExpectedKind::IntegerLike);
    assert_eq!(mismatch.actual, ValueKind::String);
    assert!(result.to_string().contains("episode (expected integer-like"));
}

#[test]
fn extra_columns_alone_keep_the_result_valid_and_are_dropped() {
    let mut frame = Frame::from_rows(
        "episodes",
        [
            "version_season",
            "episode",
            "viewers",
            "episode_date",
            "episode_title",
            "imdb_rating",
        ],
        vec![vec![
            Value::from("US01"),
            Value::from(1),
            Value::from(15),
            Value::from("2000-05-31"),
            Value::from("The Marooning"),
            Value::from(7.9),
        ]],
    );
    let result = validate_schema(&frame, &episodes_target());
    assert!(result.is_valid);
    assert!(result.has_drift());
    assert_eq!(drop_extra_columns(&mut frame, &result), 1);
    assert!(!frame.has_column("imdb_rating"));
}
