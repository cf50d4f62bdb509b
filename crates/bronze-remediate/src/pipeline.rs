//! Per-dataset remediation pipeline.

use tracing::{debug, info_span};

use bronze_ingest::normalize_columns;
use bronze_model::{Frame, Result};

use crate::context::RemediationContext;
use crate::ops::{deduplicate, fill_source_dataset};
use crate::rule::{RuleRegistry, default_registry};

/// Remediates `frame` with the built-in rules.
pub fn remediate(frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
    remediate_with(default_registry(), frame, ctx)
}

/// Normalizes column names, applies the dataset rule, fills
/// `source_dataset` and removes duplicates over the configured subset.
pub fn remediate_with(
    registry: &RuleRegistry,
    mut frame: Frame,
    ctx: &mut RemediationContext<'_>,
) -> Result<Frame> {
    let span = info_span!("remediate", dataset = %ctx.dataset);
    let _guard = span.enter();

    normalize_columns(&mut frame);
    let rule = registry.get(ctx.dataset);
    debug!(rule = rule.description(), rows = frame.height(), "applying remediation rule");
    let mut frame = rule.apply(frame, ctx)?;
    fill_source_dataset(&mut frame);

    if let Some(subset) = ctx.config.dataset(ctx.dataset).and_then(|config| config.dedupe_subset()) {
        deduplicate(&mut frame, subset, ctx.ledger);
    }
    Ok(frame)
}
