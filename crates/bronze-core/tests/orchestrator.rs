use bronze_core::{LoadOrchestrator, RUN_ID_COLUMN};
use bronze_model::{
    ColumnSpec, ErrorKind, Frame, IssueType, LoadConfig, LoadError, SqlType, STUB_SOURCE_DATASET,
    TableRef, Value,
};
use bronze_validate::ValidationStatus;
use bronze_warehouse::{MemoryWarehouse, RunRecord, RunStatus};

fn table(name: &str) -> TableRef {
    TableRef::new("bronze", name)
}

fn warehouse() -> MemoryWarehouse {
    let mut warehouse = MemoryWarehouse::new();
    warehouse.create_table(
        table("castaway_details"),
        vec![
            ColumnSpec::new("id", SqlType::BigInt).primary_key(),
            ColumnSpec::new("castaway_id", SqlType::Text),
            ColumnSpec::new("full_name", SqlType::Text),
            ColumnSpec::new("gender", SqlType::Text),
            ColumnSpec::new("source_dataset", SqlType::Text),
            ColumnSpec::new(RUN_ID_COLUMN, SqlType::Text),
            ColumnSpec::new("ingested_at", SqlType::Timestamp),
        ],
        &["castaway_id"],
    );
    warehouse.create_table(
        table("challenge_description"),
        vec![
            ColumnSpec::new("version_season", SqlType::Text),
            ColumnSpec::new("challenge_id", SqlType::Integer),
            ColumnSpec::new("episode", SqlType::Integer),
            ColumnSpec::new("challenge_type", SqlType::Text),
            ColumnSpec::new("source_dataset", SqlType::Text),
            ColumnSpec::new(RUN_ID_COLUMN, SqlType::Text),
            ColumnSpec::new("ingested_at", SqlType::Timestamp),
        ],
        &["version_season", "challenge_id"],
    );
    warehouse.create_table(
        table("challenge_results"),
        vec![
            ColumnSpec::new("version_season", SqlType::Text),
            ColumnSpec::new("challenge_id", SqlType::Integer),
            ColumnSpec::new("castaway_id", SqlType::Text),
            ColumnSpec::new("sog_id", SqlType::Integer),
            ColumnSpec::new("episode", SqlType::Integer),
            ColumnSpec::new("source_dataset", SqlType::Text),
        ],
        &["version_season", "challenge_id", "castaway_id", "sog_id"],
    );
    warehouse
}

fn orchestrator() -> LoadOrchestrator<MemoryWarehouse> {
    LoadOrchestrator::new(warehouse(), LoadConfig::survivor_defaults(), "run-0001")
}

fn castaway_details() -> Frame {
    Frame::from_rows(
        "castaway_details",
        ["Castaway_ID", "Full Name", "gender"],
        vec![
            vec!["US0001".into(), "Sonja Christopher".into(), "Female".into()],
            vec!["US0002".into(), "B.B. Andersen".into(), "Male".into()],
            vec!["US0003".into(), "Stacey Stillman".into(), "Female".into()],
        ],
    )
}

#[test]
fn missing_columns_fail_before_any_write() {
    let mut orchestrator = orchestrator();
    let frame = Frame::from_rows(
        "castaway_details",
        ["castaway_id", "full_name"],
        vec![vec!["US0001".into(), "Sonja Christopher".into()]],
    );

    let err = orchestrator.load_dataset(frame).expect_err("gender is required");

    let LoadError::SchemaMismatch { diff, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(!diff.is_valid);
    assert_eq!(
        diff.missing_columns.iter().collect::<Vec<_>>(),
        [&"gender".to_string()]
    );
    assert_eq!(orchestrator.warehouse().statements_executed(), 0);
    assert_eq!(orchestrator.warehouse().row_count(&table("castaway_details")), 0);
    assert!(!orchestrator.warehouse().in_transaction());

    let summary = &orchestrator.summaries()[0];
    assert_eq!(summary.status, ValidationStatus::Failed);
    assert_eq!(summary.error_kind, Some(ErrorKind::SchemaMismatch));
}

#[test]
fn reloading_unchanged_data_only_updates() {
    let mut orchestrator = orchestrator();
    let first = orchestrator.load_dataset(castaway_details()).expect("first load");
    assert_eq!(first.inserted_count(), 3);
    assert_eq!(first.updated_count(), 0);
    let report = orchestrator.finish().expect("run finishes");
    assert!(report.succeeded());

    orchestrator.new_run("run-0002");
    let second = orchestrator.load_dataset(castaway_details()).expect("second load");
    assert_eq!(second.inserted_count(), 0);
    assert_eq!(second.updated_count(), 3);

    let stored = orchestrator.warehouse().rows(&table("castaway_details"));
    assert_eq!(stored.len(), 3);
    assert!(stored
        .iter()
        .all(|row| row.get(RUN_ID_COLUMN) == Some(&Value::text("run-0002"))));
    assert!(stored
        .iter()
        .all(|row| row.get("source_dataset") == Some(&Value::text("castaway_details"))));
}

#[test]
fn integrity_failures_roll_back_and_later_datasets_still_load() {
    let mut orchestrator = orchestrator();
    let duplicated = Frame::from_rows(
        "castaway_details",
        ["castaway_id", "full_name", "gender"],
        vec![
            vec!["US0001".into(), "Sonja Christopher".into(), "Female".into()],
            vec!["US0001".into(), "Sonja C.".into(), "Female".into()],
        ],
    );

    let err = orchestrator.load_dataset(duplicated).expect_err("duplicate key");
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    assert_eq!(orchestrator.warehouse().row_count(&table("castaway_details")), 0);

    let descriptions = Frame::from_rows(
        "challenge_description",
        ["version_season", "challenge_id", "episode", "challenge_type"],
        vec![vec!["US01".into(), 1.into(), 1.into(), "Immunity".into()]],
    );
    orchestrator.load_dataset(descriptions).expect("independent dataset loads");

    let report = orchestrator.finish().expect("run finishes");
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.failed_count(), 1);
    assert!(report.outcome("challenge_description").is_some_and(|outcome| outcome.passed()));
}

#[test]
fn placeholder_parent_events_reach_the_parent_summary() {
    let mut orchestrator = orchestrator();
    let descriptions = Frame::from_rows(
        "challenge_description",
        ["version_season", "challenge_id", "episode", "challenge_type"],
        vec![vec!["US01".into(), 1.into(), 1.into(), "Immunity".into()]],
    );
    orchestrator.load_dataset(descriptions).expect("descriptions load");

    let results = Frame::from_rows(
        "challenge_results",
        ["version_season", "challenge_id", "castaway_id", "sog_id", "episode"],
        vec![
            vec!["US01".into(), 1.into(), "US0001".into(), 1.into(), 1.into()],
            vec!["US01".into(), 2.into(), "US0002".into(), 2.into(), 2.into()],
        ],
    );
    let outcome = orchestrator.load_dataset(results).expect("results load");
    assert_eq!(outcome.inserted_count(), 2);

    let parents = orchestrator.warehouse().rows(&table("challenge_description"));
    assert_eq!(parents.len(), 2);
    assert_eq!(parents[1].get("source_dataset"), Some(&Value::text(STUB_SOURCE_DATASET)));
    assert_eq!(parents[1].get("episode"), Some(&Value::Int(2)));

    let report = orchestrator.finish().expect("run finishes");
    let parent = report.outcome("challenge_description").expect("parent summary");
    assert_eq!(parent.events, 1);
    let child = report.outcome("challenge_results").expect("child summary");
    assert_eq!(child.events, 1);
    let parent_summary = report
        .summaries
        .iter()
        .find(|summary| summary.dataset == "challenge_description")
        .expect("parent summary");
    assert_eq!(parent_summary.issues[0].issue_type, IssueType::DescriptionStubCreated);
}

#[test]
fn finishing_clears_run_state_and_records_the_run() {
    let report_dir = tempfile::tempdir().expect("temp dir");
    let mut orchestrator = orchestrator().with_report_dir(report_dir.path());
    orchestrator.start(&RunRecord::new("run-0001")).expect("run registered");

    let castaways = Frame::from_rows(
        "castaway_scores",
        ["version_season", "castaway_id"],
        vec![
            vec!["US01".into(), "US0001".into()],
            vec!["US01".into(), "US0001".into()],
        ],
    );
    // No castaway_scores table exists; the load fails after remediation.
    orchestrator.load_dataset(castaways).expect_err("table missing");
    orchestrator.load_dataset(castaway_details()).expect("details load");
    assert!(!orchestrator.run().cache.is_empty());

    let report = orchestrator.finish().expect("run finishes");

    assert!(orchestrator.run().ledger.is_empty());
    assert!(orchestrator.run().cache.is_empty());
    assert_eq!(report.summary_paths.len(), 2);
    assert!(report.summary_paths.iter().all(|path| path.exists()));
    let written = std::fs::read_to_string(&report.summary_paths[1]).expect("summary readable");
    let json: serde_json::Value = serde_json::from_str(&written).expect("summary is json");
    assert_eq!(json["dataset"], "castaway_details");
    assert_eq!(json["status"], "passed");

    let runs = orchestrator.warehouse().runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, Some(RunStatus::Partial));
}

#[test]
fn rejected_writes_leave_no_reference_keys_behind() {
    let mut orchestrator = orchestrator();
    orchestrator.warehouse_mut().create_table(
        table("castaway_scores"),
        vec![
            ColumnSpec::new("version_season", SqlType::Text),
            ColumnSpec::new("castaway_id", SqlType::Text),
            ColumnSpec::new("source_dataset", SqlType::Text),
        ],
        &["version_season", "castaway_id"],
    );
    orchestrator.load_dataset(castaway_details()).expect("details load");

    orchestrator
        .warehouse_mut()
        .reject_upserts_into(table("castaway_details"));
    let reload = Frame::from_rows(
        "castaway_details",
        ["castaway_id", "full_name", "gender"],
        vec![
            vec!["US0001".into(), "Sonja Christopher".into(), "Female".into()],
            vec!["US0004".into(), "Gretchen Cordy".into(), "Female".into()],
        ],
    );
    let err = orchestrator.load_dataset(reload).expect_err("upsert rejected");
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert_eq!(orchestrator.warehouse().row_count(&table("castaway_details")), 3);
    let snapshot = orchestrator
        .run()
        .cache
        .get("castaway_details")
        .expect("committed snapshot kept");
    assert_eq!(snapshot.len(), 3);

    let scores = Frame::from_rows(
        "castaway_scores",
        ["version_season", "castaway_id"],
        vec![vec!["US01".into(), "US0004".into()]],
    );
    let err = orchestrator.load_dataset(scores).expect_err("US0004 was never stored");
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    assert_eq!(orchestrator.warehouse().row_count(&table("castaway_scores")), 0);
}

#[test]
fn a_parent_that_never_committed_is_not_a_reference() {
    let mut orchestrator = orchestrator();
    orchestrator
        .warehouse_mut()
        .reject_upserts_into(table("castaway_details"));
    orchestrator
        .load_dataset(castaway_details())
        .expect_err("upsert rejected");

    assert_eq!(orchestrator.warehouse().row_count(&table("castaway_details")), 0);
    assert!(!orchestrator.run().cache.contains("castaway_details"));
}

#[test]
fn placeholder_parents_of_a_failed_child_are_forgotten() {
    let mut orchestrator = orchestrator();
    let descriptions = Frame::from_rows(
        "challenge_description",
        ["version_season", "challenge_id", "episode", "challenge_type"],
        vec![vec!["US01".into(), 1.into(), 1.into(), "Immunity".into()]],
    );
    orchestrator.load_dataset(descriptions).expect("descriptions load");

    orchestrator
        .warehouse_mut()
        .reject_upserts_into(table("challenge_results"));
    let results = Frame::from_rows(
        "challenge_results",
        ["version_season", "challenge_id", "castaway_id", "sog_id", "episode"],
        vec![vec!["US01".into(), 2.into(), "US0002".into(), 2.into(), 2.into()]],
    );
    let err = orchestrator.load_dataset(results).expect_err("child upsert rejected");
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);

    assert_eq!(orchestrator.warehouse().row_count(&table("challenge_description")), 1);
    let parent_keys = orchestrator
        .run()
        .cache
        .get("challenge_description")
        .expect("parent snapshot");
    assert_eq!(parent_keys.len(), 1);
    assert_eq!(
        orchestrator.run().ledger.count("challenge_description", IssueType::DescriptionStubCreated),
        0
    );

    let report = orchestrator.finish().expect("run finishes");
    let parent = report.outcome("challenge_description").expect("parent summary");
    assert_eq!(parent.events, 0);
    assert!(!report.outcome("challenge_results").expect("child summary").passed());
}
