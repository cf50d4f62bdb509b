//! Identifier corrections: configured fixups and stage-of-game inference.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{info, warn};

use bronze_model::{
    FixupRule, Frame, IssueLedger, IssueType, RemediationEvent, RowSnapshot, SAMPLE_LIMIT, Value,
};

use crate::ops::row_snapshot;

/// Keeps the replacement's representation in line with the value it replaces.
fn replacement(original: &Value, text: &str) -> Value {
    match original {
        Value::Int(_) | Value::Float(_) => text
            .trim()
            .parse::<i64>()
            .map_or_else(|_| Value::text(text), Value::Int),
        _ => Value::text(text),
    }
}

/// Applies configured `(scope, from) -> to` corrections.
///
/// Rows changed by the same rule are audited together in one
/// `challenge_id_known_fix` event listing every changed row.
pub fn apply_known_fixups<'a>(
    frame: &mut Frame,
    rules: impl IntoIterator<Item = &'a FixupRule>,
    ledger: &mut IssueLedger,
) -> usize {
    let mut total = 0;
    for rule in rules {
        if !frame.has_column(&rule.column) || !frame.has_column(&rule.scope_column) {
            continue;
        }
        let columns = frame.columns().to_vec();
        let mut originals = Vec::new();
        let mut results = Vec::new();
        for row in frame.rows_mut() {
            let in_scope = row.get(&rule.scope_column).key_text().as_deref() == Some(rule.scope.as_str());
            let matches = row.get(&rule.column).key_text().as_deref() == Some(rule.from.as_str());
            if !(in_scope && matches) {
                continue;
            }
            originals.push(row_snapshot(row, &columns));
            let corrected = replacement(row.get(&rule.column), &rule.to);
            row.set(&rule.column, corrected);
            results.push(row_snapshot(row, &columns));
        }
        if originals.is_empty() {
            continue;
        }
        let changed = originals.len();
        total += changed;
        info!(
            dataset = %frame.name(),
            column = %rule.column,
            scope = %rule.scope,
            from = %rule.from,
            to = %rule.to,
            rows = changed,
            "applied known fixup"
        );
        ledger.record(
            RemediationEvent::new(
                frame.name(),
                IssueType::ChallengeIdKnownFix,
                format!(
                    "{} {} -> {} in {} ({changed} row(s))",
                    rule.column, rule.from, rule.to, rule.scope
                ),
            )
            .with_affected(changed)
            .with_before(originals)
            .with_after(results)
            .with_detail("column", rule.column.as_str())
            .with_detail(rule.scope_column.as_str(), rule.scope.as_str())
            .with_detail("old_value", rule.from.as_str())
            .with_detail("new_value", rule.to.as_str()),
        );
    }
    total
}

/// Columns used by stage-of-game inference.
#[derive(Debug, Clone, Copy)]
pub struct StageColumns<'a> {
    pub scope: &'a str,
    pub stage: &'a str,
    pub target: &'a str,
}

/// Outcome of [`remediate_by_stage`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StageRemediation {
    pub corrected: usize,
    pub unresolved: usize,
}

/// `(scope, stage, old, new)`; one audit event per group.
type StageGroup = (String, String, String, String);

/// Replaces identifiers missing from `valid` with the only identifier the
/// same scope used at the same stage.
///
/// `valid` holds `(scope, target)` pairs and `stages` maps `(scope, stage)`
/// to the targets observed there. Rows with zero or several candidates are
/// left untouched and reported in one `challenge_id_unresolved` event.
pub fn remediate_by_stage(
    frame: &mut Frame,
    columns: StageColumns<'_>,
    valid: &HashSet<Vec<String>>,
    stages: &HashMap<(String, String), Vec<String>>,
    ledger: &mut IssueLedger,
) -> StageRemediation {
    let mut outcome = StageRemediation::default();
    if !frame.has_column(columns.target) || !frame.has_column(columns.scope) {
        return outcome;
    }
    let frame_columns = frame.columns().to_vec();
    let mut groups: BTreeMap<StageGroup, (Vec<RowSnapshot>, Vec<RowSnapshot>)> = BTreeMap::new();
    let mut unresolved: Vec<RowSnapshot> = Vec::new();
    let mut unresolved_pairs: Vec<Vec<String>> = Vec::new();

    for row in frame.rows_mut() {
        let (Some(scope), Some(target)) = (
            row.get(columns.scope).key_text(),
            row.get(columns.target).key_text(),
        ) else {
            continue;
        };
        if valid.contains(&vec![scope.clone(), target.clone()]) {
            continue;
        }
        let stage = row.get(columns.stage).key_text();
        let candidate = stage.as_ref().and_then(|stage| {
            stages
                .get(&(scope.clone(), stage.clone()))
                .filter(|candidates| candidates.len() == 1)
                .and_then(|candidates| candidates.first())
        });
        match (stage, candidate) {
            (Some(stage), Some(candidate)) if *candidate != target => {
                let before = row_snapshot(row, &frame_columns);
                let corrected = replacement(row.get(columns.target), candidate);
                row.set(columns.target, corrected);
                let after = row_snapshot(row, &frame_columns);
                let entry = groups
                    .entry((scope, stage, target, candidate.clone()))
                    .or_default();
                entry.0.push(before);
                entry.1.push(after);
                outcome.corrected += 1;
            }
            _ => {
                outcome.unresolved += 1;
                if unresolved.len() < SAMPLE_LIMIT {
                    unresolved.push(row_snapshot(row, &frame_columns));
                }
                let pair = vec![scope, target];
                if !unresolved_pairs.contains(&pair) {
                    unresolved_pairs.push(pair);
                }
            }
        }
    }

    let dataset = frame.name().to_string();
    for ((scope, stage, old, new), (before, after)) in groups {
        info!(
            dataset = %dataset,
            scope = %scope,
            stage = %stage,
            old = %old,
            new = %new,
            rows = before.len(),
            "inferred identifier from stage"
        );
        ledger.record(
            RemediationEvent::new(
                dataset.as_str(),
                IssueType::ChallengeIdStageRemediation,
                format!(
                    "{} {old} -> {new} for {scope} at {} {stage}",
                    columns.target, columns.stage
                ),
            )
            .with_affected(before.len())
            .with_before(before)
            .with_after(after)
            .with_detail("column", columns.target)
            .with_detail(columns.scope, scope)
            .with_detail(columns.stage, stage)
            .with_detail("old_value", json_identifier(&old))
            .with_detail("new_value", json_identifier(&new)),
        );
    }

    if outcome.unresolved > 0 {
        warn!(
            dataset = %dataset,
            column = columns.target,
            rows = outcome.unresolved,
            "identifiers missing from reference could not be inferred"
        );
        unresolved_pairs.truncate(SAMPLE_LIMIT);
        ledger.record(
            RemediationEvent::new(
                dataset.as_str(),
                IssueType::ChallengeIdUnresolved,
                format!(
                    "{} row(s) reference a {} missing from the reference",
                    outcome.unresolved, columns.target
                ),
            )
            .with_affected(outcome.unresolved)
            .with_before(unresolved)
            .with_detail("column", columns.target)
            .with_detail("pairs", unresolved_pairs),
        );
    }
    outcome
}

/// Integer identifiers are reported as JSON numbers.
fn json_identifier(text: &str) -> serde_json::Value {
    text.parse::<i64>()
        .map_or_else(|_| serde_json::Value::from(text), serde_json::Value::from)
}

/// Groups `(scope, stage) -> target` observations, keeping distinct
/// targets in first-seen order.
pub fn stage_candidates(
    reference: &Frame,
    columns: StageColumns<'_>,
) -> HashMap<(String, String), Vec<String>> {
    let mut stages: HashMap<(String, String), Vec<String>> = HashMap::new();
    for row in reference.rows() {
        let (Some(scope), Some(stage), Some(target)) = (
            row.get(columns.scope).key_text(),
            row.get(columns.stage).key_text(),
            row.get(columns.target).key_text(),
        ) else {
            continue;
        };
        let targets = stages.entry((scope, stage)).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    stages
}
