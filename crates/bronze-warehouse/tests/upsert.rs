use bronze_model::{ColumnSpec, Frame, SqlType, TableRef, TargetTable, Value};
use bronze_warehouse::{
    MemoryWarehouse, UpsertBatch, Warehouse, inspect_target, render_upsert_sql, upsert_frame,
};

fn castaways_table() -> TableRef {
    TableRef::new("bronze", "castaways")
}

fn castaway_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("id", SqlType::BigInt).primary_key(),
        ColumnSpec::new("version_season", SqlType::Text),
        ColumnSpec::new("castaway_id", SqlType::Text),
        ColumnSpec::new("castaway", SqlType::Text),
        ColumnSpec::new("age", SqlType::Integer),
    ]
}

fn warehouse() -> MemoryWarehouse {
    let mut warehouse = MemoryWarehouse::new();
    warehouse.create_table(
        castaways_table(),
        castaway_columns(),
        &["version_season", "castaway_id"],
    );
    warehouse
}

fn target(warehouse: &mut MemoryWarehouse) -> TargetTable {
    inspect_target(warehouse, &castaways_table(), None)
        .expect("table exists")
        .with_unique_columns(["version_season", "castaway_id"])
}

fn keys() -> Vec<String> {
    vec!["version_season".to_string(), "castaway_id".to_string()]
}

fn castaways_frame() -> Frame {
    Frame::from_rows(
        "castaways",
        ["version_season", "castaway_id", "castaway", "age"],
        vec![
            vec!["US01".into(), "US0001".into(), "Sonja".into(), 63.0.into()],
            vec!["US01".into(), "US0002".into(), "B.B.".into(), 64.into()],
            vec!["US01".into(), "US0003".into(), "Stacey".into(), Value::Null],
        ],
    )
}

#[test]
fn renders_insert_with_conflict_update_and_returning() {
    let columns = vec![
        ColumnSpec::new("version_season", SqlType::Text),
        ColumnSpec::new("castaway_id", SqlType::Text),
        ColumnSpec::new("age", SqlType::Integer),
    ];
    let sql = render_upsert_sql(&castaways_table(), &columns, &keys(), 2);
    insta::assert_snapshot!(sql, @r#"
    INSERT INTO "bronze"."castaways" ("version_season", "castaway_id", "age")
    VALUES ($1::text, $2::text, $3::text::integer), ($4::text, $5::text, $6::text::integer)
    ON CONFLICT ("version_season", "castaway_id") DO UPDATE SET "age" = EXCLUDED."age"
    RETURNING "version_season"::text, "castaway_id"::text, (xmax = 0) AS inserted
    "#);
}

#[test]
fn renders_do_nothing_when_every_column_is_a_key() {
    let columns = vec![
        ColumnSpec::new("version_season", SqlType::Text),
        ColumnSpec::new("castaway_id", SqlType::Text),
    ];
    let sql = render_upsert_sql(&castaways_table(), &columns, &keys(), 1);
    assert!(sql.contains("ON CONFLICT (\"version_season\", \"castaway_id\") DO NOTHING"));
}

#[test]
fn renders_append_only_without_conflict_columns() {
    let columns = vec![ColumnSpec::new("castaway", SqlType::Text)];
    let sql = render_upsert_sql(&castaways_table(), &columns, &[], 1);
    assert!(!sql.contains("ON CONFLICT"));
    assert!(sql.ends_with("RETURNING (xmax = 0) AS inserted"));
}

#[test]
fn pages_respect_the_parameter_limit() {
    let batch = UpsertBatch {
        table: castaways_table(),
        columns: castaway_columns(),
        conflict_columns: keys(),
        rows: vec![vec![Value::Null; 5]; 7],
    };
    let pages = batch.pages(10);
    assert_eq!(pages.len(), 4);
    assert!(pages.iter().all(|page| page.rows.len() * 5 <= 10));
    assert_eq!(pages.iter().map(|page| page.rows.len()).sum::<usize>(), 7);
}

#[test]
fn second_identical_load_updates_every_row() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    let frame = castaways_frame();

    let first = upsert_frame(&mut warehouse, &target, &frame, &keys()).expect("first load");
    assert_eq!(first.inserted_count(), 3);
    assert_eq!(first.updated_count(), 0);

    let second = upsert_frame(&mut warehouse, &target, &frame, &keys()).expect("second load");
    assert_eq!(second.inserted_count(), 0);
    assert_eq!(second.updated_count(), 3);
    assert_eq!(warehouse.row_count(&castaways_table()), 3);
    assert_eq!(
        second.updated_keys[0],
        vec![Value::from("US01"), Value::from("US0001")]
    );
}

#[test]
fn duplicate_keys_in_one_batch_collapse_to_a_single_update() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    let stored = Frame::from_rows(
        "castaways",
        ["version_season", "castaway_id", "castaway"],
        vec![vec!["US01".into(), "US0001".into(), "Sonja".into()]],
    );
    upsert_frame(&mut warehouse, &target, &stored, &keys()).expect("seed");

    let incoming = Frame::from_rows(
        "castaways",
        ["version_season", "castaway_id", "castaway"],
        vec![
            vec!["US01".into(), "US0001".into(), "Sonja C.".into()],
            vec!["US01".into(), "US0001".into(), "Sonja".into()],
        ],
    );
    let outcome = upsert_frame(&mut warehouse, &target, &incoming, &keys()).expect("upsert");
    assert_eq!(outcome.inserted_count(), 0);
    assert_eq!(outcome.updated_count(), 1);
    let rows = warehouse.rows(&castaways_table());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["castaway"], Value::from("Sonja"));
}

#[test]
fn values_are_stored_with_their_column_types() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    upsert_frame(&mut warehouse, &target, &castaways_frame(), &keys()).expect("load");
    let rows = warehouse.rows(&castaways_table());
    assert_eq!(rows[0]["age"], Value::Int(63));
    assert_eq!(rows[2]["age"], Value::Null);
}

#[test]
fn rows_with_null_keys_never_conflict() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    let frame = Frame::from_rows(
        "castaways",
        ["version_season", "castaway_id", "castaway"],
        vec![vec!["US01".into(), Value::Null, "Unknown".into()]],
    );
    upsert_frame(&mut warehouse, &target, &frame, &keys()).expect("first");
    let outcome = upsert_frame(&mut warehouse, &target, &frame, &keys()).expect("second");
    assert_eq!(outcome.inserted_count(), 1);
    assert_eq!(warehouse.row_count(&castaways_table()), 2);
}

#[test]
fn conflict_columns_must_match_a_constraint() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    let err = upsert_frame(
        &mut warehouse,
        &target,
        &castaways_frame(),
        &["castaway_id".to_string()],
    )
    .expect_err("no matching constraint");
    assert!(err.to_string().contains("ON CONFLICT"));
    assert_eq!(warehouse.row_count(&castaways_table()), 0);
}

#[test]
fn uncastable_values_reject_the_whole_statement() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    let frame = Frame::from_rows(
        "castaways",
        ["version_season", "castaway_id", "age"],
        vec![
            vec!["US01".into(), "US0001".into(), 30.into()],
            vec!["US01".into(), "US0002".into(), "thirty".into()],
        ],
    );
    assert!(upsert_frame(&mut warehouse, &target, &frame, &keys()).is_err());
    assert_eq!(warehouse.row_count(&castaways_table()), 0);
}

#[test]
fn rollback_restores_the_state_at_begin() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    warehouse.begin().expect("begin");
    upsert_frame(&mut warehouse, &target, &castaways_frame(), &keys()).expect("load");
    assert_eq!(warehouse.row_count(&castaways_table()), 3);
    warehouse.rollback().expect("rollback");
    assert_eq!(warehouse.row_count(&castaways_table()), 0);
    assert!(!warehouse.in_transaction());
}

#[test]
fn missing_tables_are_reported() {
    let mut warehouse = MemoryWarehouse::new();
    let missing = TableRef::new("bronze", "journeys");
    assert!(inspect_target(&mut warehouse, &missing, None).is_err());
    assert!(
        warehouse
            .fetch_rows(&missing, &["castaway_id".to_string()])
            .expect("fetch")
            .is_none()
    );
}

#[test]
fn fetch_rows_skips_unknown_columns() {
    let mut warehouse = warehouse();
    let target = target(&mut warehouse);
    upsert_frame(&mut warehouse, &target, &castaways_frame(), &keys()).expect("load");
    let frame = warehouse
        .fetch_rows(
            &castaways_table(),
            &["castaway_id".to_string(), "not_there".to_string()],
        )
        .expect("fetch")
        .expect("table exists");
    assert_eq!(frame.columns(), ["castaway_id"]);
    assert_eq!(frame.height(), 3);
}
