//! Audited remediation of raw survivoR datasets.
//!
//! Every dataset passes through [`remediate`]: column names are normalized,
//! the dataset's [`RemediationRule`] corrects known upstream defects and
//! configured duplicates are removed. Each correction is recorded as a
//! [`RemediationEvent`](bronze_model::RemediationEvent) in the run ledger.

pub mod context;
pub mod explode;
pub mod fixups;
pub mod identity;
pub mod ops;
pub mod pipeline;
pub mod resolver;
pub mod rule;
mod rules;
pub mod stubs;

pub use context::RemediationContext;
pub use explode::{Split, SplitSpec, split_multi_valued};
pub use fixups::{StageColumns, StageRemediation, apply_known_fixups, remediate_by_stage, stage_candidates};
pub use identity::{IdentityRule, enforce_known_identities, enforce_null_identities};
pub use ops::{clean_identifier, deduplicate, detect_duplicates, fill_source_dataset};
pub use pipeline::{remediate, remediate_with};
pub use resolver::{FUZZY_CUTOFF, IdentityResolver, MatchMethod, Resolution, normalize_name};
pub use rule::{FunctionRule, PassThrough, RemediationRule, RuleRegistry, default_registry};
pub use rules::normalize_success;
pub use stubs::ensure_challenge_descriptions;
