use tracing::debug;

use bronze_model::{Frame, IdentityPolicy, Result};

use crate::context::RemediationContext;
use crate::identity::{IdentityRule, enforce_known_identities};
use crate::ops::{clean_identifier_column, rename_order_column};

use super::reference_ids;

pub(super) fn remediate_castaways(mut frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    rename_order_column(&mut frame, "castaways_order");
    clean_identifier_column(&mut frame, "castaway_id");

    let Some(known) = reference_ids(ctx, "castaway_details", "castaway_id")? else {
        debug!(dataset = %ctx.dataset, "castaway_details unavailable; identities not checked");
        return Ok(frame);
    };
    let rule = IdentityRule {
        column: "castaway_id",
        reference_dataset: "castaway_details",
        policy: ctx.config.identity_policy(ctx.dataset, IdentityPolicy::Drop),
    };
    enforce_known_identities(&mut frame, rule, &known, ctx.ledger)?;
    Ok(frame)
}
