use tracing::debug;

use bronze_model::{Frame, IdentityPolicy, Result, Value};

use crate::context::RemediationContext;
use crate::fixups::{StageColumns, apply_known_fixups, remediate_by_stage, stage_candidates};
use crate::identity::enforce_null_identities;
use crate::ops::{clean_identifier_column, rename_order_column};

use super::strings;

const STAGE_COLUMNS: StageColumns<'static> = StageColumns {
    scope: "version_season",
    stage: "sog_id",
    target: "challenge_id",
};

pub(super) fn remediate_vote_history(mut frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    let config = ctx.config;
    let dataset = ctx.dataset;
    rename_order_column(&mut frame, "vote_history_order");
    clean_identifier_column(&mut frame, "castaway_id");

    let policy = config.identity_policy(dataset, IdentityPolicy::RetainNull);
    enforce_null_identities(
        &mut frame,
        "castaway_id",
        policy,
        config.coercion_context_for(dataset),
        ctx.ledger,
    )?;

    apply_known_fixups(&mut frame, config.fixups_for(dataset), ctx.ledger);
    remediate_challenge_ids(&mut frame, ctx)?;
    frame.map_column("challenge_id", integer_identifier);
    Ok(frame)
}

/// Replaces challenge ids unknown to `challenge_description` with the one
/// `challenge_results` records for the same season and stage of game.
fn remediate_challenge_ids(frame: &mut Frame, ctx: &mut RemediationContext<'_>) -> Result<()> {
    if !frame.has_column(STAGE_COLUMNS.target) {
        return Ok(());
    }
    let pair = strings(&[STAGE_COLUMNS.scope, STAGE_COLUMNS.target]);
    let Some(valid) = ctx
        .reference_keys("challenge_description", &pair)?
        .filter(|keys| !keys.is_empty())
    else {
        debug!(dataset = %ctx.dataset, "challenge_description unavailable; challenge ids not checked");
        return Ok(());
    };
    let stage_columns = strings(&[STAGE_COLUMNS.scope, STAGE_COLUMNS.stage, STAGE_COLUMNS.target]);
    let stages = ctx
        .reference_rows("challenge_results", &stage_columns)?
        .map(|reference| stage_candidates(&reference, STAGE_COLUMNS))
        .unwrap_or_default();
    remediate_by_stage(frame, STAGE_COLUMNS, &valid, &stages, ctx.ledger);
    Ok(())
}

fn integer_identifier(value: &Value) -> Value {
    value.as_i64().map_or_else(|| value.clone(), Value::Int)
}
