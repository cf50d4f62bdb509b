use bronze_model::{Frame, Result};

use crate::context::RemediationContext;
use crate::ops::detect_duplicates;
use crate::stubs::ensure_challenge_descriptions;

use super::strings;

const SUMMARY_KEY: [&str; 6] = [
    "version_season",
    "challenge_id",
    "outcome_type",
    "tribe",
    "castaway_id",
    "category",
];

pub(super) fn remediate_challenge_results(frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    ensure_challenge_descriptions(&frame, ctx)?;
    Ok(frame)
}

/// Summary rows may legitimately repeat, so duplicates are only reported.
pub(super) fn remediate_challenge_summary(frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    detect_duplicates(&frame, &strings(&SUMMARY_KEY), ctx.ledger);
    Ok(frame)
}
