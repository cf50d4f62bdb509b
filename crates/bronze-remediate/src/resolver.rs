//! Castaway identity resolution by display name within a season.
//!
//! Resolution tries, in order: the exact lower-cased name, the
//! accent-folded alphanumeric name, a unique first name, a unique folded
//! first name, and finally the closest folded name of the season with a
//! similarity of at least [`FUZZY_CUTOFF`]. Ties in the last step go to
//! the lexicographically largest folded candidate, matching the ordering of
//! a descending `(score, name)` sort, so a given reference set and name
//! always resolve the same way.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use rapidfuzz::distance::indel;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use bronze_model::{Frame, RowSnapshot};

/// Minimum normalized similarity accepted by the fuzzy step.
pub const FUZZY_CUTOFF: f64 = 0.7;

/// Folds accents, lower-cases and keeps only `[a-z0-9]`.
pub fn normalize_name(text: &str) -> String {
    text.nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    ExactName,
    NormalizedName,
    FirstName,
    NormalizedFirstName,
    Fuzzy,
}

impl MatchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::NormalizedName => "normalized_name",
            Self::FirstName => "first_name",
            Self::NormalizedFirstName => "normalized_first_name",
            Self::Fuzzy => "fuzzy",
        }
    }

    pub fn is_fuzzy(self) -> bool {
        self == Self::Fuzzy
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub castaway_id: String,
    /// Reference name for direct matches, folded name for fuzzy matches.
    pub matched_name: String,
    pub method: MatchMethod,
    pub score: f64,
}

type ScopedKey = (String, String);

/// Name lookups over a `(castaway_id, castaway, version_season)` reference.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    exact: HashMap<ScopedKey, (String, String)>,
    normalized: HashMap<ScopedKey, (String, String)>,
    first_names: HashMap<ScopedKey, BTreeSet<String>>,
    normalized_first_names: HashMap<ScopedKey, BTreeSet<String>>,
    by_scope: HashMap<String, BTreeMap<String, String>>,
    names: HashMap<String, String>,
    records: HashMap<String, RowSnapshot>,
}

impl IdentityResolver {
    /// Indexes `reference`; rows missing an id, name or scope are skipped.
    pub fn from_frame(reference: &Frame, id_column: &str, name_column: &str, scope_column: &str) -> Self {
        let mut resolver = Self::default();
        let columns = vec![
            id_column.to_string(),
            name_column.to_string(),
            scope_column.to_string(),
        ];
        for row in reference.rows() {
            let (Some(id), Some(name), Some(scope)) = (
                row.get(id_column).key_text(),
                row.get(name_column).key_text(),
                row.get(scope_column).key_text(),
            ) else {
                continue;
            };
            if id.is_empty() || name.is_empty() || scope.is_empty() {
                continue;
            }
            let lower = name.to_lowercase();
            let folded = normalize_name(&name);
            let entry = (id.clone(), name.clone());
            resolver
                .exact
                .insert((scope.clone(), lower.clone()), entry.clone());
            resolver
                .normalized
                .insert((scope.clone(), folded.clone()), entry);
            resolver
                .by_scope
                .entry(scope.clone())
                .or_default()
                .insert(folded, id.clone());
            if let Some(first) = lower.split_whitespace().next() {
                resolver
                    .first_names
                    .entry((scope.clone(), first.to_string()))
                    .or_default()
                    .insert(id.clone());
                resolver
                    .normalized_first_names
                    .entry((scope.clone(), normalize_name(first)))
                    .or_default()
                    .insert(id.clone());
            }
            resolver.names.insert(id.clone(), name);
            resolver
                .records
                .insert(id, Frame::snapshot_columns(row, &columns));
        }
        resolver
    }

    /// Number of distinct reference identities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reference row the identity was indexed from.
    pub fn reference_row(&self, castaway_id: &str) -> Option<&RowSnapshot> {
        self.records.get(castaway_id)
    }

    pub fn resolve(&self, scope: &str, name: &str) -> Option<Resolution> {
        let scope = scope.trim();
        let name = name.trim();
        if scope.is_empty() || name.is_empty() {
            return None;
        }
        let lower = name.to_lowercase();
        let folded = normalize_name(name);
        let direct = |method, (id, matched): &(String, String)| Resolution {
            castaway_id: id.clone(),
            matched_name: matched.clone(),
            method,
            score: 1.0,
        };

        if let Some(entry) = self.exact.get(&(scope.to_string(), lower.clone())) {
            return Some(direct(MatchMethod::ExactName, entry));
        }
        if let Some(entry) = self.normalized.get(&(scope.to_string(), folded.clone())) {
            return Some(direct(MatchMethod::NormalizedName, entry));
        }
        if let Some(first) = lower.split_whitespace().next() {
            if let Some(id) = self.unique_candidate(&self.first_names, scope, first) {
                return Some(self.first_name_match(MatchMethod::FirstName, id));
            }
            let folded_first = normalize_name(first);
            if let Some(id) = self.unique_candidate(&self.normalized_first_names, scope, &folded_first) {
                return Some(self.first_name_match(MatchMethod::NormalizedFirstName, id));
            }
        }
        self.closest(scope, &folded)
    }

    fn unique_candidate<'s>(
        &self,
        lookup: &'s HashMap<ScopedKey, BTreeSet<String>>,
        scope: &str,
        key: &str,
    ) -> Option<&'s String> {
        let candidates = lookup.get(&(scope.to_string(), key.to_string()))?;
        if candidates.len() == 1 {
            candidates.iter().next()
        } else {
            None
        }
    }

    fn first_name_match(&self, method: MatchMethod, id: &str) -> Resolution {
        Resolution {
            castaway_id: id.to_string(),
            matched_name: self.names.get(id).cloned().unwrap_or_default(),
            method,
            score: 1.0,
        }
    }

    fn closest(&self, scope: &str, folded: &str) -> Option<Resolution> {
        if folded.is_empty() {
            return None;
        }
        let candidates = self.by_scope.get(scope)?;
        let mut best: Option<(&String, &String, f64)> = None;
        for (candidate, id) in candidates {
            let score = indel::normalized_similarity(folded.chars(), candidate.chars());
            if score < FUZZY_CUTOFF {
                continue;
            }
            // Candidates ascend, so `>=` hands ties to the largest name.
            if best.is_none_or(|(_, _, current)| score >= current) {
                best = Some((candidate, id, score));
            }
        }
        best.map(|(candidate, id, score)| Resolution {
            castaway_id: id.clone(),
            matched_name: candidate.clone(),
            method: MatchMethod::Fuzzy,
            score,
        })
    }
}
