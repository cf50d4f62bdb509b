use tracing::{debug, info, warn};

use bronze_ingest::coerce_boolean_value;
use bronze_model::{Frame, IdentityPolicy, IssueType, RemediationEvent, Result, RowSnapshot};

use crate::context::RemediationContext;
use crate::identity::enforce_null_identities;
use crate::ops::{clean_identifier_column, row_snapshot, trim_text_column};
use crate::resolver::IdentityResolver;

use super::strings;

pub(super) fn remediate_journeys(mut frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    clean_identifier_column(&mut frame, "castaway_id");
    let needs_backfill = frame.has_column("castaway_id")
        && frame.null_count("castaway_id") > 0
        && frame.has_column("version_season")
        && frame.has_column("castaway");
    if needs_backfill {
        backfill_castaway_ids(&mut frame, ctx)?;
    }
    trim_text_column(&mut frame, "castaway");
    frame.map_column("lost_vote", |value| coerce_boolean_value(value).into());

    let config = ctx.config;
    let policy = config.identity_policy(ctx.dataset, IdentityPolicy::Require);
    enforce_null_identities(
        &mut frame,
        "castaway_id",
        policy,
        config.fk_context_for(ctx.dataset),
        ctx.ledger,
    )?;
    Ok(frame)
}

/// Fills null castaway ids from the season's castaway names.
///
/// Direct matches are audited in one batch; every fuzzy match gets its own
/// event carrying the score.
fn backfill_castaway_ids(frame: &mut Frame, ctx: &mut RemediationContext<'_>) -> Result<()> {
    let columns = strings(&["castaway_id", "castaway", "version_season"]);
    let Some(reference) = ctx.reference_rows("castaways", &columns)? else {
        debug!(dataset = %ctx.dataset, "castaways reference unavailable; ids not backfilled");
        return Ok(());
    };
    let resolver = IdentityResolver::from_frame(&reference, "castaway_id", "castaway", "version_season");
    if resolver.is_empty() {
        return Ok(());
    }

    let frame_columns = frame.columns().to_vec();
    let mut before: Vec<RowSnapshot> = Vec::new();
    let mut after: Vec<RowSnapshot> = Vec::new();
    let mut references: Vec<RowSnapshot> = Vec::new();
    let mut fuzzy: Vec<RemediationEvent> = Vec::new();
    let mut unmatched = 0usize;
    for row in frame.rows_mut() {
        if !row.is_null("castaway_id") {
            continue;
        }
        let (Some(scope), Some(name)) = (row.get("version_season").key_text(), row.get("castaway").key_text())
        else {
            unmatched += 1;
            continue;
        };
        let Some(resolution) = resolver.resolve(&scope, &name) else {
            unmatched += 1;
            continue;
        };
        let original = row_snapshot(row, &frame_columns);
        row.set("castaway_id", resolution.castaway_id.as_str());
        let updated = row_snapshot(row, &frame_columns);
        let reference_row = resolver.reference_row(&resolution.castaway_id).cloned();

        if resolution.method.is_fuzzy() {
            warn!(
                dataset = %ctx.dataset,
                version_season = %scope,
                source_name = %name,
                matched_name = %resolution.matched_name,
                castaway_id = %resolution.castaway_id,
                score = resolution.score,
                "castaway id backfilled by fuzzy match"
            );
            fuzzy.push(
                RemediationEvent::new(
                    ctx.dataset,
                    IssueType::CastawayIdFuzzyBackfill,
                    format!(
                        "{name} matched {} ({}) in {scope} with score {:.2}",
                        resolution.matched_name, resolution.castaway_id, resolution.score
                    ),
                )
                .with_affected(1)
                .with_before(vec![original])
                .with_after(vec![updated])
                .with_reference(reference_row.into_iter().collect())
                .with_detail("version_season", scope)
                .with_detail("source_name", name)
                .with_detail("matched_name", resolution.matched_name)
                .with_detail("castaway_id", resolution.castaway_id)
                .with_detail("score", resolution.score),
            );
        } else {
            before.push(original);
            after.push(updated);
            if let Some(reference_row) = reference_row
                && !references.contains(&reference_row)
            {
                references.push(reference_row);
            }
        }
    }

    if !before.is_empty() {
        let updated = before.len();
        info!(dataset = %ctx.dataset, rows = updated, "castaway ids backfilled by name");
        ctx.record(
            RemediationEvent::new(
                ctx.dataset,
                IssueType::CastawayIdBackfilled,
                format!("backfilled {updated} castaway id(s) from castaway names"),
            )
            .with_affected(updated)
            .with_before(before)
            .with_after(after)
            .with_reference(references)
            .with_detail("rows_updated", updated)
            .with_detail("available_reference_rows", resolver.len()),
        );
    }
    for event in fuzzy {
        ctx.record(event);
    }
    if unmatched > 0 {
        debug!(dataset = %ctx.dataset, rows = unmatched, "castaway names without a match");
    }
    Ok(())
}
