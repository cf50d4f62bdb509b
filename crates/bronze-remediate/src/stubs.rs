//! Placeholder parent rows for child references that have no parent yet.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tracing::{info, warn};

use bronze_ingest::coerce_frame;
use bronze_model::{
    EVENT_SAMPLE_LIMIT, Frame, IssueType, LoadError, RemediationEvent, Result, Row,
    STUB_SOURCE_DATASET, TableRef, Value, WarehouseError,
};
use bronze_warehouse::{inspect_target, upsert_frame};

use crate::context::RemediationContext;

const PARENT: &str = "challenge_description";
const SUMMARY: &str = "challenge_summary";
const KEY_COLUMNS: [&str; 2] = ["version_season", "challenge_id"];
const BACKFILL_COLUMNS: [&str; 4] = ["version", "season", "episode", "challenge_type"];

fn first_non_null<'r>(rows: impl IntoIterator<Item = &'r Row>, column: &str) -> Option<Value> {
    rows.into_iter()
        .map(|row| row.get(column))
        .find(|value| !value.is_null())
        .cloned()
}

/// Upserts a `challenge_description` row for every `(version_season,
/// challenge_id)` pair of `child` the parent does not hold yet.
///
/// Descriptive fields come from `challenge_summary` when stored there,
/// otherwise from the first child row carrying them; everything else stays
/// null. Stub rows reuse the latest stored `ingest_run_id` of their season.
/// The parent's cached snapshot and ledger gain the stub rows immediately;
/// both belong to the child's transaction and are restored by the caller
/// if it rolls back. Returns the number of stub rows written.
pub fn ensure_challenge_descriptions(child: &Frame, ctx: &mut RemediationContext<'_>) -> Result<usize> {
    let keys: Vec<String> = KEY_COLUMNS.iter().map(|column| (*column).to_string()).collect();
    if child.is_empty() || !child.has_columns(&keys) {
        return Ok(0);
    }
    let mut missing: BTreeMap<(String, String), Vec<&Row>> = BTreeMap::new();
    for row in child.rows() {
        if let Some(key) = row.key(&keys) {
            missing
                .entry((key[0].clone(), key[1].clone()))
                .or_default()
                .push(row);
        }
    }
    let existing = ctx.reference_keys(PARENT, &keys)?.unwrap_or_default();
    missing.retain(|(season, challenge), _| !existing.contains(&vec![season.clone(), challenge.clone()]));
    if missing.is_empty() {
        return Ok(0);
    }

    let table = ctx.config.table_ref(PARENT);
    let target = match inspect_target(&mut *ctx.warehouse, &table, ctx.config.dataset(PARENT)) {
        Ok(target) => target,
        Err(WarehouseError::TableNotFound { .. }) => {
            warn!(
                dataset = %ctx.dataset,
                table = %table,
                pairs = missing.len(),
                "parent table missing; stub rows not created"
            );
            return Ok(0);
        }
        Err(source) => return Err(LoadError::warehouse(ctx.dataset, source)),
    };

    let latest_runs = latest_run_ids(ctx, &table)?;
    let summary = summary_rows(ctx)?;
    let ingested_at = Value::Timestamp(Utc::now().naive_utc());

    let mut stubs = Frame::new(PARENT);
    for ((season, challenge), rows) in &missing {
        let mut cells: BTreeMap<String, Value> = BTreeMap::new();
        cells.insert("version_season".to_string(), Value::text(season.as_str()));
        cells.insert(
            "challenge_id".to_string(),
            first_non_null(rows.iter().copied(), "challenge_id").unwrap_or_default(),
        );
        let summary_row = summary.as_ref().and_then(|frame| {
            frame.rows().iter().find(|row| {
                row.key(&keys)
                    .is_some_and(|key| key[0] == *season && key[1] == *challenge)
            })
        });
        for column in BACKFILL_COLUMNS {
            let value = summary_row
                .map(|row| row.get(column))
                .filter(|value| !value.is_null())
                .cloned()
                .or_else(|| first_non_null(rows.iter().copied(), column))
                .unwrap_or_default();
            cells.insert(column.to_string(), value);
        }
        let run_id = latest_runs
            .get(season)
            .cloned()
            .unwrap_or_else(|| ctx.run_id.to_string());
        cells.insert("ingest_run_id".to_string(), Value::text(run_id));
        cells.insert("source_dataset".to_string(), Value::text(STUB_SOURCE_DATASET));
        cells.insert("ingested_at".to_string(), ingested_at.clone());
        stubs.push_cells(cells);
    }
    let unknown: Vec<String> = stubs
        .columns()
        .iter()
        .filter(|column| !target.has_column(column))
        .cloned()
        .collect();
    for column in &unknown {
        stubs.drop_column(column);
    }
    coerce_frame(&mut stubs, &target, &keys, ctx.ledger);

    let conflict = if target.unique_columns.is_empty() {
        keys.clone()
    } else {
        target.unique_columns.clone()
    };
    let outcome = upsert_frame(&mut *ctx.warehouse, &target, &stubs, &conflict).map_err(|source| {
        LoadError::PersistenceFailure {
            dataset: ctx.dataset.to_string(),
            table: table.to_string(),
            source,
        }
    })?;
    info!(
        dataset = %ctx.dataset,
        table = %table,
        stubs = stubs.height(),
        inserted = outcome.inserted_count(),
        "synthesized missing parent rows"
    );

    let pairs: Vec<Vec<String>> = missing
        .keys()
        .map(|(season, challenge)| vec![season.clone(), challenge.clone()])
        .collect();
    let snapshots = stubs.snapshots(stubs.rows(), EVENT_SAMPLE_LIMIT);
    for dataset in [ctx.dataset, PARENT] {
        ctx.ledger.record(
            RemediationEvent::new(
                dataset,
                IssueType::DescriptionStubCreated,
                format!(
                    "created {} placeholder {PARENT} row(s) referenced by {}",
                    stubs.height(),
                    ctx.dataset
                ),
            )
            .with_affected(stubs.height())
            .with_after(snapshots.clone())
            .with_detail("rows_added", stubs.height())
            .with_detail("missing_pairs", pairs.clone())
            .with_detail("target_table", table.to_string()),
        );
    }

    if let Some(snapshot) = ctx.cache.get_mut(PARENT) {
        let columns = snapshot.columns().to_vec();
        for row in stubs.rows() {
            snapshot.push(row.values(&columns));
        }
    }
    Ok(stubs.height())
}

/// Latest stored `ingest_run_id` per `version_season`.
fn latest_run_ids(
    ctx: &mut RemediationContext<'_>,
    table: &TableRef,
) -> Result<HashMap<String, String>> {
    let columns = vec!["version_season".to_string(), "ingest_run_id".to_string()];
    let stored = ctx
        .warehouse
        .fetch_rows(table, &columns)
        .map_err(|source| LoadError::warehouse(ctx.dataset, source))?;
    let mut latest: HashMap<String, String> = HashMap::new();
    let Some(frame) = stored.filter(|frame| frame.has_columns(&columns)) else {
        return Ok(latest);
    };
    for row in frame.rows() {
        let Some([season, run_id]) = row.key(&columns).and_then(|key| <[String; 2]>::try_from(key).ok())
        else {
            continue;
        };
        let entry = latest.entry(season).or_default();
        if run_id > *entry {
            *entry = run_id;
        }
    }
    Ok(latest)
}

fn summary_rows(ctx: &mut RemediationContext<'_>) -> Result<Option<Frame>> {
    let columns: Vec<String> = KEY_COLUMNS
        .iter()
        .chain(BACKFILL_COLUMNS.iter())
        .map(|column| (*column).to_string())
        .collect();
    let table = ctx.config.table_ref(SUMMARY);
    let stored = ctx
        .warehouse
        .fetch_rows(&table, &columns)
        .map_err(|source| LoadError::warehouse(ctx.dataset, source))?;
    Ok(stored.filter(|frame| frame.has_column("version_season") && frame.has_column("challenge_id")))
}
