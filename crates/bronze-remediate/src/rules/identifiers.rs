//! Datasets that only need identifier and name hygiene.

use bronze_model::{Frame, Result};

use crate::context::RemediationContext;
use crate::ops::{clean_identifier_column, rename_order_column, trim_text_column};

pub(super) fn remediate_boot_mapping(mut frame: Frame, _ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    rename_order_column(&mut frame, "boot_mapping_order");
    Ok(frame)
}

pub(super) fn remediate_boot_order(mut frame: Frame, _ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    rename_order_column(&mut frame, "boot_order_position");
    clean_identifier_column(&mut frame, "castaway_id");
    trim_text_column(&mut frame, "castaway");
    Ok(frame)
}

pub(super) fn remediate_auction(mut frame: Frame, _ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    clean_identifier_column(&mut frame, "castaway_id");
    trim_text_column(&mut frame, "castaway");
    Ok(frame)
}

pub(super) fn remediate_castaway_scores(mut frame: Frame, _ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    clean_identifier_column(&mut frame, "castaway_id");
    Ok(frame)
}
