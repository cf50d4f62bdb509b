use bronze_model::{
    ColumnSpec, Frame, IssueLedger, IssueType, LoadConfig, LoadError, ReferenceCache,
    ReferenceSnapshot, Result, SqlType, STUB_SOURCE_DATASET, TableRef, Value,
};
use bronze_remediate::{
    FunctionRule, RemediationContext, RuleRegistry, default_registry, remediate, remediate_with,
};
use bronze_warehouse::MemoryWarehouse;
use serde_json::json;

struct Harness {
    config: LoadConfig,
    warehouse: MemoryWarehouse,
    cache: ReferenceCache,
    ledger: IssueLedger,
}

impl Harness {
    fn new() -> Self {
        Self {
            config: LoadConfig::survivor_defaults(),
            warehouse: MemoryWarehouse::new(),
            cache: ReferenceCache::new(),
            ledger: IssueLedger::new(),
        }
    }

    /// Registers `frame` as if it had been validated earlier in the run.
    fn reference(&mut self, frame: &Frame) {
        let columns = self.config.reference_columns_for(frame.name()).to_vec();
        let snapshot = ReferenceSnapshot::from_frame(frame, &columns).expect("reference columns present");
        self.cache.register(snapshot);
    }

    fn run(&mut self, frame: Frame) -> Result<Frame> {
        let dataset = frame.name().to_string();
        let mut ctx = RemediationContext::new(
            &dataset,
            "run-0001",
            &self.config,
            &mut self.warehouse,
            &mut self.cache,
            &mut self.ledger,
        );
        remediate(frame, &mut ctx)
    }

    fn events<'a>(&'a self, dataset: &'a str, issue_type: IssueType) -> Vec<&'a bronze_model::RemediationEvent> {
        self.ledger
            .for_dataset(dataset)
            .filter(|event| event.issue_type == issue_type)
            .collect()
    }
}

fn column<'a>(frame: &'a Frame, name: &'a str) -> Vec<&'a Value> {
    frame.column_values(name).collect()
}

fn castaway_details(ids: &[&str]) -> Frame {
    Frame::from_rows(
        "castaway_details",
        ["castaway_id"],
        ids.iter().map(|id| vec![Value::text(*id)]),
    )
}

#[test]
fn unknown_challenge_is_inferred_from_stage_of_game() {
    let mut harness = Harness::new();
    harness.reference(&Frame::from_rows(
        "challenge_description",
        ["version_season", "challenge_id"],
        vec![
            vec!["US01".into(), 5.into()],
            vec!["US01".into(), 7.into()],
        ],
    ));
    harness.reference(&Frame::from_rows(
        "challenge_results",
        ["version_season", "sog_id", "challenge_id"],
        vec![
            vec!["US01".into(), 2.into(), 5.into()],
            vec!["US01".into(), 3.into(), 7.into()],
        ],
    ));
    let votes = Frame::from_rows(
        "vote_history",
        ["version_season", "episode", "vote_event", "castaway_id", "order", "challenge_id", "sog_id"],
        vec![
            vec!["US01".into(), 2.into(), Value::Null, "US0003".into(), 1.into(), 5.into(), 2.into()],
            vec!["US01".into(), 3.into(), Value::Null, "US0004".into(), 1.into(), 999.into(), 3.into()],
        ],
    );

    let frame = harness.run(votes).expect("vote history remediates");

    assert!(frame.has_column("vote_history_order"));
    assert_eq!(column(&frame, "challenge_id"), [&Value::Int(5), &Value::Int(7)]);
    let events = harness.events("vote_history", IssueType::ChallengeIdStageRemediation);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].detail("old_value"), Some(&json!(999)));
    assert_eq!(events[0].detail("new_value"), Some(&json!(7)));
    assert_eq!(events[0].counts.rows_affected, 1);
    assert!(harness.events("vote_history", IssueType::ChallengeIdUnresolved).is_empty());
}

#[test]
fn known_fixups_apply_before_stage_inference() {
    let mut harness = Harness::new();
    harness.reference(&Frame::from_rows(
        "challenge_description",
        ["version_season", "challenge_id"],
        vec![vec!["US37".into(), 25.into()]],
    ));
    let votes = Frame::from_rows(
        "vote_history",
        ["version_season", "episode", "castaway_id", "challenge_id", "sog_id"],
        vec![
            vec!["US37".into(), 12.into(), "US0590".into(), "26".into(), 14.into()],
            vec!["US37".into(), 12.into(), "US0591".into(), 26.into(), 14.into()],
        ],
    );

    let frame = harness.run(votes).expect("vote history remediates");

    assert_eq!(column(&frame, "challenge_id"), [&Value::Int(25), &Value::Int(25)]);
    let fixes = harness.events("vote_history", IssueType::ChallengeIdKnownFix);
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].counts.rows_affected, 2);
    assert!(harness.events("vote_history", IssueType::ChallengeIdStageRemediation).is_empty());
}

#[test]
fn unresolvable_challenges_are_reported_and_kept() {
    let mut harness = Harness::new();
    harness.reference(&Frame::from_rows(
        "challenge_description",
        ["version_season", "challenge_id"],
        vec![vec!["US02".into(), 1.into()]],
    ));
    let votes = Frame::from_rows(
        "vote_history",
        ["version_season", "castaway_id", "challenge_id", "sog_id"],
        vec![vec!["US02".into(), "US0020".into(), 42.into(), 9.into()]],
    );

    let frame = harness.run(votes).expect("vote history remediates");

    assert_eq!(column(&frame, "challenge_id"), [&Value::Int(42)]);
    assert_eq!(harness.events("vote_history", IssueType::ChallengeIdUnresolved).len(), 1);
}

#[test]
fn null_voters_are_retained_and_audited() {
    let mut harness = Harness::new();
    let votes = Frame::from_rows(
        "vote_history",
        ["version_season", "episode", "castaway_id"],
        vec![
            vec!["US03".into(), 1.into(), " NaN ".into()],
            vec!["US03".into(), 1.into(), "US0040".into()],
        ],
    );

    let frame = harness.run(votes).expect("null identities are retained");

    assert_eq!(frame.height(), 2);
    assert_eq!(frame.null_count("castaway_id"), 1);
    assert_eq!(harness.events("vote_history", IssueType::NullIdentityRetained).len(), 1);
}

fn journey_references(harness: &mut Harness) {
    harness.reference(&Frame::from_rows(
        "castaways",
        ["version_season", "castaway_id", "castaway"],
        vec![
            vec!["US45".into(), "US0680".into(), "Kaleb Gebrewold".into()],
            vec!["US45".into(), "US0681".into(), "Kendra McQuarrie".into()],
            vec!["US45".into(), "US0682".into(), "Dee Valladares".into()],
        ],
    ));
}

#[test]
fn journeys_backfill_ids_by_name() {
    let mut harness = Harness::new();
    journey_references(&mut harness);
    let journeys = Frame::from_rows(
        "journeys",
        ["version_season", "episode", "sog_id", "castaway_id", "castaway", "lost_vote"],
        vec![
            vec!["US45".into(), 2.into(), 3.into(), Value::Null, "dee valladares ".into(), "No".into()],
            vec!["US45".into(), 4.into(), 6.into(), Value::Null, "Kalebb Gebrewold".into(), "TRUE".into()],
            vec!["US45".into(), 5.into(), 7.into(), "US0681".into(), "Kendra".into(), Value::Null],
        ],
    );

    let frame = harness.run(journeys).expect("every journey resolves");

    assert_eq!(
        column(&frame, "castaway_id"),
        [&Value::text("US0682"), &Value::text("US0680"), &Value::text("US0681")]
    );
    assert_eq!(
        column(&frame, "lost_vote"),
        [&Value::Bool(false), &Value::Bool(true), &Value::Null]
    );
    let direct = harness.events("journeys", IssueType::CastawayIdBackfilled);
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].detail("rows_updated"), Some(&json!(1)));
    assert_eq!(direct[0].detail("available_reference_rows"), Some(&json!(3)));

    let fuzzy = harness.events("journeys", IssueType::CastawayIdFuzzyBackfill);
    assert_eq!(fuzzy.len(), 1);
    assert_eq!(fuzzy[0].detail("castaway_id"), Some(&json!("US0680")));
    assert_eq!(fuzzy[0].detail("source_name"), Some(&json!("Kalebb Gebrewold")));
    let score = fuzzy[0]
        .detail("score")
        .and_then(serde_json::Value::as_f64)
        .expect("score recorded");
    assert!(score > 0.9 && score < 1.0, "score {score}");
    assert_eq!(fuzzy[0].reference_rows.len(), 1);
}

#[test]
fn journeys_fail_when_an_identity_stays_unresolved() {
    let mut harness = Harness::new();
    journey_references(&mut harness);
    let journeys = Frame::from_rows(
        "journeys",
        ["version_season", "episode", "sog_id", "castaway_id", "castaway"],
        vec![vec!["US45".into(), 2.into(), 3.into(), Value::Null, "Zzyzx Unknown".into()]],
    );

    let err = harness.run(journeys).expect_err("unresolved identity");

    match err {
        LoadError::UnresolvedIdentity {
            dataset,
            column,
            count,
            ..
        } => {
            assert_eq!(dataset, "journeys");
            assert_eq!(column, "castaway_id");
            assert_eq!(count, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn castaways_unknown_to_details_are_dropped() {
    let mut harness = Harness::new();
    harness.reference(&castaway_details(&["US0001", "US0002"]));
    let castaways = Frame::from_rows(
        "castaways",
        ["Version_Season", "castaway_id", "order"],
        vec![
            vec!["US01".into(), "US0001".into(), 1.into()],
            vec!["US01".into(), " US0002".into(), 2.into()],
            vec!["US01".into(), "US9999".into(), 3.into()],
        ],
    );

    let frame = harness.run(castaways).expect("castaways remediate");

    assert!(frame.has_column("version_season"));
    assert!(frame.has_column("castaways_order"));
    assert_eq!(
        column(&frame, "castaway_id"),
        [&Value::text("US0001"), &Value::text("US0002")]
    );
    let dropped = harness.events("castaways", IssueType::RowsDroppedMissingReference);
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].counts.rows_before, Some(3));
    assert_eq!(dropped[0].counts.rows_after, Some(2));
}

#[test]
fn advantage_rows_split_per_holder_and_target() {
    let mut harness = Harness::new();
    let movement = Frame::from_rows(
        "advantage_movement",
        [
            "version_season",
            "advantage_id",
            "sequence_id",
            "castaway_id",
            "castaway",
            "played_for_id",
            "played_for",
            "success",
        ],
        vec![
            vec![
                "US41".into(),
                "USIN4101".into(),
                1.into(),
                "US0601, US0602".into(),
                "Erika, Xander".into(),
                "US0601".into(),
                "Erika".into(),
                "Yes".into(),
            ],
            vec![
                "US41".into(),
                "USIN4102".into(),
                1.into(),
                "US0603".into(),
                "Shan".into(),
                "US0604,US0605".into(),
                "Ricard, Naseer".into(),
                "Not needed".into(),
            ],
        ],
    );

    let frame = harness.run(movement).expect("advantage movement remediates");

    assert_eq!(frame.height(), 4);
    assert_eq!(
        column(&frame, "castaway_id"),
        [
            &Value::text("US0601"),
            &Value::text("US0602"),
            &Value::text("US0603"),
            &Value::text("US0603"),
        ]
    );
    assert_eq!(
        column(&frame, "castaway"),
        [
            &Value::text("Erika"),
            &Value::text("Xander"),
            &Value::text("Shan"),
            &Value::text("Shan"),
        ]
    );
    assert_eq!(
        column(&frame, "played_for_id"),
        [
            &Value::text("US0601"),
            &Value::text("US0601"),
            &Value::text("US0604"),
            &Value::text("US0605"),
        ]
    );
    assert_eq!(
        column(&frame, "co_castaway_ids"),
        [
            &Value::text("US0602"),
            &Value::text("US0601"),
            &Value::text("US0605"),
            &Value::text("US0604"),
        ]
    );
    assert_eq!(
        column(&frame, "joint_play"),
        [&Value::Bool(true), &Value::Bool(true), &Value::Bool(false), &Value::Bool(false)]
    );
    assert_eq!(
        column(&frame, "multi_target_play"),
        [&Value::Bool(false), &Value::Bool(false), &Value::Bool(true), &Value::Bool(true)]
    );
    assert_eq!(
        column(&frame, "success"),
        [
            &Value::text("yes"),
            &Value::text("yes"),
            &Value::text("not needed"),
            &Value::text("not needed"),
        ]
    );
    let holders = harness.events("advantage_movement", IssueType::MultiHolderSplit);
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].detail("rows_created"), Some(&json!(2)));
    assert_eq!(harness.events("advantage_movement", IssueType::MultiTargetSplit).len(), 1);
    assert_eq!(
        column(&frame, "source_dataset"),
        vec![&Value::text("advantage_movement"); 4]
    );
}

#[test]
fn unknown_advantage_targets_are_nulled() {
    let mut harness = Harness::new();
    harness.reference(&castaway_details(&["US0603", "US0604"]));
    let movement = Frame::from_rows(
        "advantage_movement",
        ["version_season", "advantage_id", "sequence_id", "castaway_id", "played_for_id"],
        vec![
            vec!["US41".into(), "USIN4102".into(), 1.into(), "US0603".into(), "US0604".into()],
            vec!["US41".into(), "USIN4102".into(), 2.into(), "US0603".into(), "US0999".into()],
        ],
    );

    let frame = harness.run(movement).expect("advantage movement remediates");

    assert_eq!(frame.height(), 2);
    assert_eq!(
        column(&frame, "played_for_id"),
        [&Value::text("US0604"), &Value::Null]
    );
    assert_eq!(
        harness.events("advantage_movement", IssueType::InvalidTargetDropped).len(),
        1
    );
}

#[test]
fn castaway_scores_are_deduplicated_on_the_configured_subset() {
    let mut harness = Harness::new();
    let scores = Frame::from_rows(
        "castaway_scores",
        ["version_season", "castaway_id", "score"],
        vec![
            vec!["US10".into(), "US0150".into(), 1.5.into()],
            vec!["US10".into(), "US0150 ".into(), 2.5.into()],
            vec!["US10".into(), "US0151".into(), 3.0.into()],
        ],
    );

    let frame = harness.run(scores).expect("scores remediate");

    assert_eq!(frame.height(), 2);
    assert_eq!(column(&frame, "score"), [&Value::Float(1.5), &Value::Float(3.0)]);
    let events = harness.events("castaway_scores", IssueType::DeduplicatedRows);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].detail("rows_removed"), Some(&json!(1)));
}

#[test]
fn challenge_summary_duplicates_are_reported_not_removed() {
    let mut harness = Harness::new();
    let row = || -> Vec<Value> {
        vec!["US05".into(), 3.into(), "Tribal".into(), "Pagong".into(), "US0070".into(), "Winner".into()]
    };
    let summary = Frame::from_rows(
        "challenge_summary",
        ["version_season", "challenge_id", "outcome_type", "tribe", "castaway_id", "category"],
        vec![row(), row()],
    );

    let frame = harness.run(summary).expect("summary remediates");

    assert_eq!(frame.height(), 2);
    let events = harness.events("challenge_summary", IssueType::DuplicateRowsDetected);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].detail("rows"), Some(&json!(2)));
}

fn description_table() -> TableRef {
    TableRef::new("bronze", "challenge_description")
}

#[test]
fn missing_challenge_descriptions_get_placeholder_rows() {
    let mut harness = Harness::new();
    harness.warehouse.create_table(
        description_table(),
        vec![
            ColumnSpec::new("version_season", SqlType::Text),
            ColumnSpec::new("challenge_id", SqlType::Integer),
            ColumnSpec::new("version", SqlType::Text),
            ColumnSpec::new("season", SqlType::Integer),
            ColumnSpec::new("episode", SqlType::Integer),
            ColumnSpec::new("challenge_type", SqlType::Text),
            ColumnSpec::new("ingest_run_id", SqlType::Text),
            ColumnSpec::new("source_dataset", SqlType::Text),
            ColumnSpec::new("ingested_at", SqlType::Timestamp),
        ],
        &["version_season", "challenge_id"],
    );
    harness
        .warehouse
        .seed_rows(
            &description_table(),
            vec![vec![
                ("version_season", Value::text("US01")),
                ("challenge_id", Value::Int(1)),
                ("ingest_run_id", Value::text("run-0000")),
            ]],
        )
        .expect("table exists");
    let results = Frame::from_rows(
        "challenge_results",
        ["version_season", "version", "season", "episode", "challenge_id", "sog_id", "castaway_id"],
        vec![
            vec!["US01".into(), "US".into(), 1.into(), 1.into(), 1.into(), 1.into(), "US0001".into()],
            vec!["US01".into(), "US".into(), 1.into(), 4.into(), 9.into(), 4.into(), "US0002".into()],
            vec!["US01".into(), "US".into(), 1.into(), 4.into(), 9.into(), 4.into(), "US0003".into()],
        ],
    );

    let frame = harness.run(results).expect("results remediate");

    assert_eq!(frame.height(), 3);
    let stored = harness.warehouse.rows(&description_table());
    assert_eq!(stored.len(), 2);
    let stub = &stored[1];
    assert_eq!(stub.get("challenge_id"), Some(&Value::Int(9)));
    assert_eq!(stub.get("episode"), Some(&Value::Int(4)));
    assert_eq!(stub.get("source_dataset"), Some(&Value::text(STUB_SOURCE_DATASET)));
    assert_eq!(stub.get("ingest_run_id"), Some(&Value::text("run-0000")));
    assert_eq!(
        harness.events("challenge_results", IssueType::DescriptionStubCreated).len(),
        1
    );
    let parent = harness.events("challenge_description", IssueType::DescriptionStubCreated);
    assert_eq!(parent.len(), 1);
    assert_eq!(parent[0].detail("rows_added"), Some(&json!(1)));
}

#[test]
fn stub_synthesis_is_skipped_without_a_parent_table() {
    let mut harness = Harness::new();
    let results = Frame::from_rows(
        "challenge_results",
        ["version_season", "challenge_id", "castaway_id"],
        vec![vec!["US01".into(), 9.into(), "US0002".into()]],
    );

    let frame = harness.run(results).expect("missing parent table is not fatal");

    assert_eq!(frame.height(), 1);
    assert!(harness.ledger.is_empty());
}

fn flag_everything(mut frame: Frame, _ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    frame.add_column("flagged", &Value::Bool(true));
    Ok(frame)
}

#[test]
fn custom_registry_rules_run_inside_the_pipeline() {
    let mut registry = RuleRegistry::default();
    registry.register(Box::new(FunctionRule::new("episodes", "Flag rows", flag_everything)));
    assert!(registry.contains("episodes"));
    assert_eq!(registry.len(), 1);

    let mut harness = Harness::new();
    let episodes = Frame::from_rows(
        "episodes",
        ["version_season", "episode"],
        vec![vec!["US01".into(), 1.into()]],
    );
    let mut ctx = RemediationContext::new(
        "episodes",
        "run-0001",
        &harness.config,
        &mut harness.warehouse,
        &mut harness.cache,
        &mut harness.ledger,
    );
    let frame = remediate_with(&registry, episodes, &mut ctx).expect("custom rule applies");

    assert_eq!(column(&frame, "flagged"), [&Value::Bool(true)]);
    assert_eq!(column(&frame, "source_dataset"), [&Value::text("episodes")]);
}

#[test]
fn unregistered_datasets_pass_through() {
    let registry = default_registry();
    assert!(!registry.contains("season_summary"));
    assert_eq!(registry.get("season_summary").dataset(), "*");
    assert!(registry.datasets().any(|dataset| dataset == "challenge_results"));
}
