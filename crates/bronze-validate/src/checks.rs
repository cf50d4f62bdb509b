//! Declarative row checks such as `missing_count(castaway_id) = 0`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use bronze_model::{Frame, RowCheckResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMetric {
    /// Null cells in the column.
    MissingCount,
    /// Rows repeating an earlier value of the column (nulls compare equal).
    DuplicateCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCheck {
    pub metric: RowMetric,
    pub column: String,
    pub expected: usize,
}

static CHECK_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(missing_count|duplicate_count)\(([^)]+)\)\s*=\s*(\d+)$").ok()
});

impl RowCheck {
    pub fn parse(rule: &str) -> Option<Self> {
        let captures = CHECK_PATTERN.as_ref()?.captures(rule.trim())?;
        let metric = match &captures[1] {
            "missing_count" => RowMetric::MissingCount,
            _ => RowMetric::DuplicateCount,
        };
        Some(Self {
            metric,
            column: captures[2].trim().to_string(),
            expected: captures[3].parse().ok()?,
        })
    }

    pub fn observe(&self, frame: &Frame) -> usize {
        match self.metric {
            RowMetric::MissingCount => frame.null_count(&self.column),
            RowMetric::DuplicateCount => {
                let mut seen = HashSet::new();
                frame
                    .column_values(&self.column)
                    .filter(|value| !seen.insert(value.key_text()))
                    .count()
            }
        }
    }
}

/// Evaluates every rule in order.
///
/// Unparseable rules and rules naming an absent column fail with a message
/// instead of an observed count.
pub fn evaluate_row_checks<S: AsRef<str>>(frame: &Frame, rules: &[S]) -> Vec<RowCheckResult> {
    rules
        .iter()
        .map(|rule| {
            let rule = rule.as_ref();
            let Some(check) = RowCheck::parse(rule) else {
                return RowCheckResult {
                    rule: rule.to_string(),
                    passed: false,
                    expected: 0,
                    observed: None,
                    message: Some("unsupported rule syntax".to_string()),
                };
            };
            if !frame.has_column(&check.column) {
                return RowCheckResult {
                    rule: rule.to_string(),
                    passed: false,
                    expected: check.expected,
                    observed: None,
                    message: Some(format!("column {} not present", check.column)),
                };
            }
            let observed = check.observe(frame);
            RowCheckResult {
                rule: rule.to_string(),
                passed: observed == check.expected,
                expected: check.expected,
                observed: Some(observed),
                message: None,
            }
        })
        .collect()
}
