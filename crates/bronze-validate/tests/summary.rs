use bronze_model::{
    IntegrityReport, IssueType, LoadError, RemediationEvent, RowCheckResult, UpsertOutcome, Value,
    Frame,
};
use bronze_validate::{ValidationStatus, ValidationSummary, write_summary};
use tempfile::TempDir;

fn frame() -> Frame {
    Frame::from_rows(
        "vote_history",
        ["version_season", "castaway_id"],
        vec![
            vec![Value::from("US01"), Value::Null],
            vec![Value::from("US01"), Value::from("US0001")],
        ],
    )
}

#[test]
fn summary_collects_null_counts_and_events() {
    let mut summary = ValidationSummary::new("vote_history").with_run_id("run-1");
    summary.observe_frame(&frame());
    summary.record_integrity(&IntegrityReport {
        row_checks: vec![RowCheckResult {
            rule: "missing_count(version_season) = 0".to_string(),
            passed: true,
            expected: 0,
            observed: Some(0),
            message: None,
        }],
        ..IntegrityReport::default()
    });
    summary.record_upsert(&UpsertOutcome {
        inserted_keys: vec![vec![Value::from("US01")]],
        updated_keys: Vec::new(),
    });
    summary.attach_events(vec![RemediationEvent::new(
        "vote_history",
        IssueType::NullIdentityRetained,
        "1 row kept with a null castaway_id",
    )]);

    assert!(summary.passed());
    assert_eq!(summary.row_count, 2);
    assert_eq!(summary.missing_values["castaway_id"], 1);
    assert_eq!(summary.total_checks, 1);
    assert_eq!(summary.issues.len(), 1);
}

#[test]
fn recorded_errors_carry_their_kind() {
    let mut summary = ValidationSummary::new("journeys");
    summary.record_error(&LoadError::UnresolvedIdentity {
        dataset: "journeys".to_string(),
        column: "castaway_id".to_string(),
        count: 2,
        sample: Vec::new(),
    });
    assert_eq!(summary.status, ValidationStatus::Failed);
    let json = serde_json::to_value(&summary).expect("serialize");
    assert_eq!(json["error_kind"], "unresolved_identity");
    assert_eq!(json["status"], "failed");
}

#[test]
fn summaries_are_written_as_json_files() {
    let dir = TempDir::new().expect("temp dir");
    let mut summary = ValidationSummary::new("castaways");
    summary.observe_frame(&frame());
    let path = write_summary(&dir.path().join("run"), &summary).expect("write");
    let text = std::fs::read_to_string(&path).expect("read back");
    let json: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(json["dataset"], "castaways");
    assert!(
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("validation_castaways_"))
    );
}
