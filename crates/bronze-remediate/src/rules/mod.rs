//! Built-in survivoR remediation rules, one module per dataset family.

mod advantage_movement;
mod castaways;
mod challenges;
mod identifiers;
mod journeys;
mod vote_history;

use std::collections::HashSet;

use bronze_model::Result;

use crate::context::RemediationContext;
use crate::rule::RuleFn;

pub use advantage_movement::normalize_success;

/// `(dataset, description, rule)` for every built-in rule.
pub(crate) const BUILT_IN: [(&str, &str, RuleFn); 11] = [
    (
        "castaways",
        "Rename order, clean ids, drop castaways unknown to castaway_details",
        castaways::remediate_castaways,
    ),
    (
        "boot_mapping",
        "Rename order column",
        identifiers::remediate_boot_mapping,
    ),
    (
        "boot_order",
        "Rename order column, clean ids and names",
        identifiers::remediate_boot_order,
    ),
    (
        "auction_details",
        "Clean ids and names",
        identifiers::remediate_auction,
    ),
    (
        "survivor_auction",
        "Clean ids and names",
        identifiers::remediate_auction,
    ),
    (
        "castaway_scores",
        "Clean ids",
        identifiers::remediate_castaway_scores,
    ),
    (
        "vote_history",
        "Known challenge fixups, stage-of-game challenge inference",
        vote_history::remediate_vote_history,
    ),
    (
        "journeys",
        "Backfill castaway ids by name, require every identity",
        journeys::remediate_journeys,
    ),
    (
        "advantage_movement",
        "Split joint holders and multiple targets, drop invalid targets",
        advantage_movement::remediate_advantage_movement,
    ),
    (
        "challenge_results",
        "Synthesize missing challenge descriptions",
        challenges::remediate_challenge_results,
    ),
    (
        "challenge_summary",
        "Report duplicate summary rows",
        challenges::remediate_challenge_summary,
    ),
];

pub(crate) fn strings(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|column| (*column).to_string()).collect()
}

/// Non-null values of a single reference column, `None` when the
/// reference is unavailable or empty.
pub(crate) fn reference_ids(
    ctx: &mut RemediationContext<'_>,
    dataset: &str,
    column: &str,
) -> Result<Option<HashSet<String>>> {
    let columns = strings(&[column]);
    Ok(ctx
        .reference_keys(dataset, &columns)?
        .map(|keys| keys.into_iter().filter_map(|mut key| key.pop()).collect::<HashSet<_>>())
        .filter(|ids| !ids.is_empty()))
}
