use bronze_cli::logging::default_directives;
use bronze_cli::summary::{dataset_table, issue_table, summary_table};
use bronze_core::RunReport;
use bronze_model::{IssueType, LoadConfig, LoadError, RemediationEvent};
use bronze_validate::{UpsertCounts, ValidationSummary};
use bronze_warehouse::RunStatus;
use tracing::level_filters::LevelFilter;

fn loaded(dataset: &str, rows: usize, inserted: usize, updated: usize) -> ValidationSummary {
    let mut summary = ValidationSummary::new(dataset).with_run_id("run-0001");
    summary.table = Some(format!("bronze.{dataset}"));
    summary.row_count = rows;
    summary.upsert = Some(UpsertCounts { inserted, updated });
    summary
}

fn sample_report() -> RunReport {
    let mut castaways = loaded("castaways", 4, 1, 3);
    castaways.attach_events(vec![
        RemediationEvent::new("castaways", IssueType::RowsDroppedMissingReference, "dropped 1 row")
            .with_affected(1),
    ]);
    let mut journeys = ValidationSummary::new("journeys").with_run_id("run-0001");
    journeys.record_error(&LoadError::UnresolvedIdentity {
        dataset: "journeys".to_string(),
        column: "castaway_id".to_string(),
        count: 2,
        sample: Vec::new(),
    });
    RunReport::new(
        "run-0001",
        vec![loaded("castaway_details", 3, 3, 0), castaways, journeys],
    )
}

#[test]
fn summary_lists_each_dataset_and_totals() {
    let report = sample_report();
    assert_eq!(report.status, RunStatus::Partial);

    let rendered = summary_table(&report).to_string();

    for expected in [
        "castaway_details",
        "bronze.castaways",
        "journeys",
        "FAILED",
        "unresolved_identity",
        "TOTAL",
        "3 dataset(s)",
        "1 failed",
    ] {
        assert!(rendered.contains(expected), "missing {expected:?} in\n{rendered}");
    }
}

#[test]
fn issue_table_is_omitted_without_events() {
    let report = RunReport::new("run-0002", vec![loaded("castaway_details", 3, 0, 3)]);
    assert!(report.succeeded());
    assert!(issue_table(&report).is_none());

    let rendered = issue_table(&sample_report())
        .expect("events present")
        .to_string();
    assert!(rendered.contains("rows_dropped_missing_reference"));
    assert!(rendered.contains("dropped 1 row"));
}

#[test]
fn dataset_listing_follows_configuration_order() {
    let rendered = dataset_table(&LoadConfig::survivor_defaults()).to_string();
    let details = rendered.find("castaway_details").expect("castaway_details listed");
    let journeys = rendered.find("journeys").expect("journeys listed");
    assert!(details < journeys);
    assert!(rendered.contains("RetainNull"));
}

#[test]
fn workspace_crates_share_the_requested_level() {
    insta::assert_snapshot!(
        default_directives(LevelFilter::INFO),
        @"warn,bronze=info,bronze_cli=info,bronze_core=info,bronze_ingest=info,bronze_remediate=info,bronze_validate=info,bronze_warehouse=info"
    );
}
