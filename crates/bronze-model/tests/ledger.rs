use bronze_model::{
    EVENT_SAMPLE_LIMIT, Frame, IssueLedger, IssueType, ReferenceCache, ReferenceSnapshot,
    RemediationEvent, Value,
};

#[test]
fn drain_is_per_dataset_and_exactly_once() {
    let mut ledger = IssueLedger::new();
    ledger.record(RemediationEvent::new("journeys", IssueType::DeduplicatedRows, "a"));
    ledger.record(RemediationEvent::new("vote_history", IssueType::ChallengeIdKnownFix, "b"));
    ledger.record(RemediationEvent::new("journeys", IssueType::CastawayIdBackfilled, "c"));

    let drained = ledger.drain_dataset("journeys");
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].message, "a");
    assert_eq!(drained[1].message, "c");
    assert!(ledger.drain_dataset("journeys").is_empty());
    assert_eq!(ledger.len(), 1);

    ledger.clear();
    assert!(ledger.is_empty());
}

#[test]
fn discarding_keeps_earlier_events_and_the_kept_dataset() {
    let mut ledger = IssueLedger::new();
    ledger.record(RemediationEvent::new("challenge_description", IssueType::DeduplicatedRows, "a"));
    let mark = ledger.len();
    ledger.record(RemediationEvent::new("challenge_description", IssueType::DescriptionStubCreated, "b"));
    ledger.record(RemediationEvent::new("challenge_results", IssueType::DescriptionStubCreated, "c"));

    assert_eq!(ledger.discard_since(mark, "challenge_results"), 1);
    let messages: Vec<&str> = ledger.events().iter().map(|event| event.message.as_str()).collect();
    assert_eq!(messages, ["a", "c"]);
    assert_eq!(ledger.discard_since(10, "challenge_results"), 0);
}

#[test]
fn event_snapshots_are_bounded() {
    let rows = vec![std::collections::BTreeMap::new(); EVENT_SAMPLE_LIMIT + 25];
    let event = RemediationEvent::new("castaways", IssueType::RowsDroppedMissingReference, "x")
        .with_before(rows)
        .with_affected(EVENT_SAMPLE_LIMIT + 25);
    assert_eq!(event.before_rows.len(), EVENT_SAMPLE_LIMIT);
    assert_eq!(event.counts.rows_affected, EVENT_SAMPLE_LIMIT + 25);
}

#[test]
fn event_serializes_issue_type_in_snake_case() {
    let event = RemediationEvent::new("vote_history", IssueType::ChallengeIdStageRemediation, "m")
        .with_detail("old_value", 999)
        .with_detail("new_value", 7);
    let json = serde_json::to_value(&event).expect("serialize event");
    assert_eq!(json["issue_type"], "challenge_id_stage_remediation");
    assert_eq!(json["details"]["old_value"], 999);
}

#[test]
fn reference_snapshot_deduplicates_and_skips_null_tuples() {
    let frame = Frame::from_rows(
        "challenge_results",
        ["version_season", "sog_id", "challenge_id", "castaway_id"],
        vec![
            vec![Value::from("US01"), Value::from(3), Value::from(7), Value::from("US0001")],
            vec![Value::from("US01"), Value::from(3), Value::from(7), Value::from("US0002")],
            vec![Value::from("US01"), Value::Null, Value::from(8), Value::from("US0003")],
        ],
    );
    let columns: Vec<String> = ["version_season", "sog_id", "challenge_id", "missing"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let snapshot = ReferenceSnapshot::from_frame(&frame, &columns).expect("snapshot");
    assert_eq!(snapshot.columns().len(), 3);
    assert_eq!(snapshot.len(), 2);

    let key_columns = vec!["version_season".to_string(), "sog_id".to_string()];
    let tuples = snapshot.tuple_set(&key_columns).expect("columns held");
    assert_eq!(tuples.len(), 1);
    assert!(snapshot.tuple_set(&["castaway_id".to_string()]).is_none());

    let mut cache = ReferenceCache::new();
    cache.register(snapshot);
    assert!(cache.contains("challenge_results"));
    cache.clear();
    assert!(cache.is_empty());
}
