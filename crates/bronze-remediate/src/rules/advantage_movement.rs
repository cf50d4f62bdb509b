use tracing::{debug, info};

use bronze_ingest::coerce_boolean_value;
use bronze_model::{Frame, IdentityPolicy, IssueType, RemediationEvent, Result, Value};

use crate::context::RemediationContext;
use crate::explode::{Split, SplitSpec, split_multi_valued};
use crate::identity::{IdentityRule, enforce_known_identities};
use crate::ops::clean_identifier_column;

use super::reference_ids;

const HOLDERS: SplitSpec<'static> = SplitSpec {
    id_column: "castaway_id",
    name_column: Some("castaway"),
    flag_column: "joint_play",
    co_column: "co_castaway_ids",
    merge_existing: false,
};

const TARGETS: SplitSpec<'static> = SplitSpec {
    id_column: "played_for_id",
    name_column: Some("played_for"),
    flag_column: "multi_target_play",
    co_column: "co_castaway_ids",
    merge_existing: true,
};

pub(super) fn remediate_advantage_movement(mut frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    default_flag(&mut frame, HOLDERS.flag_column);
    default_flag(&mut frame, TARGETS.flag_column);
    frame.add_column(HOLDERS.co_column, &Value::Null);

    let holders = split_multi_valued(&mut frame, HOLDERS);
    record_split(ctx, &HOLDERS, holders, IssueType::MultiHolderSplit);
    clean_identifier_column(&mut frame, HOLDERS.id_column);

    let targets = split_multi_valued(&mut frame, TARGETS);
    record_split(ctx, &TARGETS, targets, IssueType::MultiTargetSplit);
    clean_identifier_column(&mut frame, TARGETS.id_column);

    if frame.has_column(TARGETS.id_column) {
        match reference_ids(ctx, "castaway_details", "castaway_id")? {
            Some(known) => {
                let rule = IdentityRule {
                    column: TARGETS.id_column,
                    reference_dataset: "castaway_details",
                    policy: ctx.config.identity_policy(ctx.dataset, IdentityPolicy::RetainNull),
                };
                enforce_known_identities(&mut frame, rule, &known, ctx.ledger)?;
            }
            None => debug!(dataset = %ctx.dataset, "castaway_details unavailable; targets not checked"),
        }
    }

    frame.map_column("success", normalize_success);
    Ok(frame)
}

/// Adds `column` as `false`, or reads existing values as booleans with
/// unreadable values becoming `false`.
fn default_flag(frame: &mut Frame, column: &str) {
    if !frame.add_column(column, &Value::Bool(false)) {
        frame.map_column(column, |value| Value::Bool(coerce_boolean_value(value).unwrap_or(false)));
    }
}

fn record_split(ctx: &mut RemediationContext<'_>, spec: &SplitSpec<'_>, split: Split, issue_type: IssueType) {
    if split.rows_split == 0 {
        return;
    }
    let created = split.rows_created();
    info!(
        dataset = %ctx.dataset,
        column = spec.id_column,
        rows_split = split.rows_split,
        rows_created = created,
        "split multi-valued rows"
    );
    ctx.record(
        RemediationEvent::new(
            ctx.dataset,
            issue_type,
            format!(
                "split {} row(s) listing several {} values into {created}",
                split.rows_split, spec.id_column
            ),
        )
        .with_affected(split.rows_split)
        .with_before(split.originals)
        .with_after(split.results)
        .with_detail("column", spec.id_column)
        .with_detail("rows_split", split.rows_split)
        .with_detail("rows_created", created),
    );
}

/// Canonical spelling of an advantage play outcome.
///
/// Yes and no variants collapse to `yes`/`no`, any "not needed" phrasing to
/// `not needed`; other text is lower-cased and blanks become null.
pub fn normalize_success(value: &Value) -> Value {
    let Some(text) = value.key_text() else {
        return Value::Null;
    };
    let lowered = text.to_lowercase();
    match lowered.as_str() {
        "" | "na" | "n/a" | "none" | "nan" => Value::Null,
        "yes" | "y" | "true" | "t" | "1" | "success" | "successful" => Value::text("yes"),
        "no" | "n" | "false" | "f" | "0" | "fail" | "failed" | "unsuccessful" => Value::text("no"),
        other if other.contains("not") && other.contains("need") => Value::text("not needed"),
        other => Value::text(other),
    }
}
