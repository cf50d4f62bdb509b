//! Remediation rule trait and registry.
//!
//! Each dataset with known upstream defects has one [`RemediationRule`]
//! registered under its exact dataset name. Datasets without a rule fall
//! back to [`PassThrough`], so only the shared steps of the pipeline apply
//! to them.
//!
//! # Example
//!
//! ```ignore
//! use bronze_remediate::default_registry;
//!
//! let rule = default_registry().get("vote_history");
//! let frame = rule.apply(frame, &mut context)?;
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use bronze_model::{Frame, Result};

use crate::context::RemediationContext;
use crate::rules;

/// Dataset-specific correction logic.
///
/// A rule takes ownership of the frame and returns the corrected frame.
/// Every row it changes or removes beyond trivial normalization is
/// reported through the context's ledger; only fatal conditions are
/// returned as errors.
pub trait RemediationRule: Send + Sync {
    /// Dataset name this rule is registered under.
    fn dataset(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "Remediation rule"
    }

    fn apply(&self, frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame>;
}

/// Rules keyed by dataset name, with a fallback for unregistered datasets.
pub struct RuleRegistry {
    rules: HashMap<&'static str, Box<dyn RemediationRule>>,
    fallback: Box<dyn RemediationRule>,
}

impl RuleRegistry {
    pub fn new(fallback: Box<dyn RemediationRule>) -> Self {
        Self {
            rules: HashMap::new(),
            fallback,
        }
    }

    /// Registers `rule`, replacing any rule for the same dataset.
    pub fn register(&mut self, rule: Box<dyn RemediationRule>) {
        self.rules.insert(rule.dataset(), rule);
    }

    /// Rule for `dataset` (exact match), else the fallback.
    pub fn get(&self, dataset: &str) -> &dyn RemediationRule {
        self.rules
            .get(dataset)
            .map_or(self.fallback.as_ref(), |rule| rule.as_ref())
    }

    pub fn contains(&self, dataset: &str) -> bool {
        self.rules.contains_key(dataset)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn datasets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.keys().copied()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new(Box::new(PassThrough))
    }
}

/// Rule for datasets without known defects.
pub struct PassThrough;

impl RemediationRule for PassThrough {
    fn dataset(&self) -> &'static str {
        "*"
    }

    fn description(&self) -> &'static str {
        "No dataset-specific remediation"
    }

    fn apply(&self, frame: Frame, _ctx: &mut RemediationContext<'_>) -> Result<Frame> {
        Ok(frame)
    }
}

pub type RuleFn = fn(Frame, &mut RemediationContext<'_>) -> Result<Frame>;

/// Adapts a plain function to [`RemediationRule`].
pub struct FunctionRule {
    dataset: &'static str,
    description: &'static str,
    apply_fn: RuleFn,
}

impl FunctionRule {
    pub fn new(dataset: &'static str, description: &'static str, apply_fn: RuleFn) -> Self {
        Self {
            dataset,
            description,
            apply_fn,
        }
    }
}

impl RemediationRule for FunctionRule {
    fn dataset(&self) -> &'static str {
        self.dataset
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn apply(&self, frame: Frame, ctx: &mut RemediationContext<'_>) -> Result<Frame> {
        (self.apply_fn)(frame, ctx)
    }
}

static DEFAULT_REGISTRY: OnceLock<RuleRegistry> = OnceLock::new();

/// Registry holding every built-in survivoR rule.
pub fn default_registry() -> &'static RuleRegistry {
    DEFAULT_REGISTRY.get_or_init(build_default_registry)
}

fn build_default_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::default();
    for (dataset, description, apply_fn) in rules::BUILT_IN {
        registry.register(Box::new(FunctionRule::new(dataset, description, apply_fn)));
    }
    registry
}
