//! Load configuration: dataset catalog, integrity rules and fixup tables.
//!
//! The configuration is read-only input to a run. It can be loaded from a
//! TOML file or taken from [`LoadConfig::survivor_defaults`], which carries
//! the built-in survivoR catalog.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::table::TableRef;

/// `source_dataset` marker written on synthesized parent rows.
pub const STUB_SOURCE_DATASET: &str = "challenge_results_stub";

/// What to do with rows whose identity cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Remove the row and audit the removal.
    Drop,
    /// Keep the row with a null identity and audit it.
    RetainNull,
    /// Fail the dataset with `UnresolvedIdentity`.
    Require,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    /// Target table (bare or schema-qualified); defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub unique_columns: Vec<String>,
    #[serde(default)]
    pub nullable_unique_columns: Vec<String>,
    /// Deduplication subset; an empty list means the unique columns.
    #[serde(default)]
    pub dedupe_columns: Option<Vec<String>>,
    #[serde(default)]
    pub identity_policy: Option<IdentityPolicy>,
    /// Row checks such as `missing_count(castaway_id) = 0`.
    #[serde(default)]
    pub checks: Vec<String>,
}

impl DatasetConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            unique_columns: Vec::new(),
            nullable_unique_columns: Vec::new(),
            dedupe_columns: None,
            identity_policy: None,
            checks: Vec::new(),
        }
    }

    #[must_use]
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique_columns = to_strings(columns);
        self
    }

    #[must_use]
    pub fn nullable(mut self, columns: &[&str]) -> Self {
        self.nullable_unique_columns = to_strings(columns);
        self
    }

    #[must_use]
    pub fn dedupe(mut self, columns: &[&str]) -> Self {
        self.dedupe_columns = Some(to_strings(columns));
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: IdentityPolicy) -> Self {
        self.identity_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn checks<S: AsRef<str>>(mut self, checks: &[S]) -> Self {
        self.checks = to_strings(checks);
        self
    }

    /// Resolved deduplication subset, if deduplication is configured.
    pub fn dedupe_subset(&self) -> Option<&[String]> {
        match self.dedupe_columns.as_deref() {
            Some([]) => Some(&self.unique_columns),
            Some(columns) => Some(columns),
            None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRule {
    pub columns: Vec<String>,
    pub reference_dataset: String,
    pub reference_columns: Vec<String>,
    #[serde(default)]
    pub allow_null: bool,
}

impl ForeignKeyRule {
    pub fn new(columns: &[&str], reference_dataset: &str, reference_columns: &[&str]) -> Self {
        Self {
            columns: to_strings(columns),
            reference_dataset: reference_dataset.to_string(),
            reference_columns: to_strings(reference_columns),
            allow_null: false,
        }
    }

    #[must_use]
    pub fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }
}

/// Known correction: within `scope`, `column = from` becomes `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixupRule {
    pub dataset: String,
    pub column: String,
    pub scope_column: String,
    pub scope: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Table recording one row per ingestion run; `None` disables it.
    #[serde(default)]
    pub run_table: Option<String>,
    /// Datasets in load order.
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub reference_columns: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, Vec<ForeignKeyRule>>,
    #[serde(default)]
    pub fixups: Vec<FixupRule>,
    /// Columns copied into `value_coercion` samples.
    #[serde(default)]
    pub coercion_context: BTreeMap<String, Vec<String>>,
    /// Columns copied into foreign-key samples.
    #[serde(default)]
    pub fk_context: BTreeMap<String, Vec<String>>,
}

fn default_schema() -> String {
    "bronze".to_string()
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            run_table: None,
            datasets: Vec::new(),
            reference_columns: BTreeMap::new(),
            foreign_keys: BTreeMap::new(),
            fixups: Vec::new(),
            coercion_context: BTreeMap::new(),
            fk_context: BTreeMap::new(),
        }
    }
}

impl LoadConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks internal consistency: unique dataset names, nullable columns
    /// within the unique set, and well-formed foreign-key rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for dataset in &self.datasets {
            if !names.insert(dataset.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "dataset {} is listed more than once",
                    dataset.name
                )));
            }
            if let Some(column) = dataset
                .nullable_unique_columns
                .iter()
                .find(|column| !dataset.unique_columns.contains(column))
            {
                return Err(ConfigError::Invalid(format!(
                    "{}: nullable column {column} is not part of the unique columns",
                    dataset.name
                )));
            }
        }
        for (dataset, rules) in &self.foreign_keys {
            for rule in rules {
                if rule.columns.is_empty() || rule.columns.len() != rule.reference_columns.len() {
                    return Err(ConfigError::Invalid(format!(
                        "{dataset}: foreign key to {} must pair each column with a reference column",
                        rule.reference_dataset
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|dataset| dataset.name == name)
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.iter().map(|dataset| dataset.name.as_str())
    }

    pub fn table_ref(&self, dataset: &str) -> TableRef {
        let table = self
            .dataset(dataset)
            .and_then(|config| config.table.as_deref())
            .unwrap_or(dataset);
        TableRef::parse(table, &self.schema)
    }

    pub fn run_table_ref(&self) -> Option<TableRef> {
        self.run_table
            .as_deref()
            .map(|table| TableRef::parse(table, &self.schema))
    }

    pub fn foreign_keys_for(&self, dataset: &str) -> &[ForeignKeyRule] {
        self.foreign_keys.get(dataset).map_or(&[], Vec::as_slice)
    }

    pub fn reference_columns_for(&self, dataset: &str) -> &[String] {
        self.reference_columns.get(dataset).map_or(&[], Vec::as_slice)
    }

    pub fn fixups_for<'a>(&'a self, dataset: &'a str) -> impl Iterator<Item = &'a FixupRule> + 'a {
        self.fixups.iter().filter(move |rule| rule.dataset == dataset)
    }

    pub fn coercion_context_for(&self, dataset: &str) -> &[String] {
        self.coercion_context.get(dataset).map_or(&[], Vec::as_slice)
    }

    pub fn fk_context_for(&self, dataset: &str) -> &[String] {
        self.fk_context.get(dataset).map_or(&[], Vec::as_slice)
    }

    /// Configured identity policy, else `default`.
    pub fn identity_policy(&self, dataset: &str, default: IdentityPolicy) -> IdentityPolicy {
        self.dataset(dataset)
            .and_then(|config| config.identity_policy)
            .unwrap_or(default)
    }

    /// Built-in survivoR catalog.
    pub fn survivor_defaults() -> Self {
        let datasets = vec![
            DatasetConfig::new("castaway_details")
                .unique(&["castaway_id"])
                .checks(&base_checks("castaway_id")),
            DatasetConfig::new("season_summary")
                .unique(&["version_season"])
                .checks(&base_checks("version_season")),
            DatasetConfig::new("castaways")
                .unique(&["version_season", "castaway_id", "castaways_order"])
                .nullable(&["castaways_order"])
                .policy(IdentityPolicy::Drop),
            DatasetConfig::new("episodes")
                .unique(&["version_season", "episode"])
                .checks(&[
                    "missing_count(version_season) = 0",
                    "missing_count(episode) = 0",
                ]),
            DatasetConfig::new("advantage_details")
                .unique(&["version_season", "advantage_id"])
                .checks(&[
                    "missing_count(advantage_id) = 0",
                    "missing_count(version_season) = 0",
                ]),
            DatasetConfig::new("challenge_description")
                .unique(&["version_season", "challenge_id"])
                .checks(&[
                    "missing_count(challenge_id) = 0",
                    "missing_count(version_season) = 0",
                ]),
            DatasetConfig::new("challenge_results")
                .unique(&["version_season", "challenge_id", "castaway_id", "sog_id"])
                .nullable(&["sog_id"]),
            DatasetConfig::new("challenge_summary").checks(&[
                "missing_count(version_season) = 0",
                "missing_count(challenge_id) = 0",
            ]),
            DatasetConfig::new("vote_history")
                .unique(&[
                    "version_season",
                    "episode",
                    "vote_event",
                    "vote_history_order",
                    "castaway_id",
                ])
                .nullable(&["vote_event", "castaway_id"])
                .policy(IdentityPolicy::RetainNull)
                .checks(&["missing_count(version_season) = 0"]),
            DatasetConfig::new("boot_mapping")
                .unique(&["version_season", "boot_mapping_order", "castaway_id"])
                .nullable(&["castaway_id"]),
            DatasetConfig::new("boot_order")
                .unique(&["version_season", "boot_order_position", "castaway_id"])
                .nullable(&["castaway_id"]),
            DatasetConfig::new("tribe_mapping")
                .unique(&["version_season", "episode", "day", "castaway_id", "tribe"])
                .checks(&[
                    "missing_count(version_season) = 0",
                    "missing_count(tribe) = 0",
                ]),
            DatasetConfig::new("jury_votes").unique(&["version_season", "castaway_id", "vote"]),
            DatasetConfig::new("advantage_movement")
                .unique(&[
                    "version_season",
                    "castaway_id",
                    "advantage_id",
                    "sequence_id",
                    "played_for_id",
                ])
                .nullable(&["castaway_id", "played_for_id"])
                .dedupe(&[
                    "version_season",
                    "castaway_id",
                    "advantage_id",
                    "sequence_id",
                    "played_for_id",
                ])
                .policy(IdentityPolicy::RetainNull)
                .checks(&[
                    "missing_count(version_season) = 0",
                    "missing_count(advantage_id) = 0",
                    "missing_count(sequence_id) = 0",
                ]),
            DatasetConfig::new("confessionals")
                .unique(&["version_season", "episode", "castaway_id"]),
            DatasetConfig::new("auction_details")
                .unique(&["version_season", "auction_num", "item", "castaway_id"])
                .nullable(&["castaway_id"])
                .dedupe(&[])
                .checks(&[
                    "missing_count(version_season) = 0",
                    "missing_count(auction_num) = 0",
                    "missing_count(item) = 0",
                ]),
            DatasetConfig::new("survivor_auction").unique(&["version_season", "castaway_id"]),
            DatasetConfig::new("castaway_scores")
                .unique(&["version_season", "castaway_id"])
                .dedupe(&["version_season", "castaway_id"]),
            DatasetConfig::new("journeys")
                .unique(&["version_season", "episode", "sog_id", "castaway_id"])
                .dedupe(&["version_season", "episode", "sog_id", "castaway_id"])
                .policy(IdentityPolicy::Require)
                .checks(&[
                    "missing_count(version_season) = 0",
                    "missing_count(sog_id) = 0",
                ]),
        ];

        let reference_columns = [
            ("castaway_details", vec!["castaway_id"]),
            ("season_summary", vec!["version_season"]),
            ("castaways", vec!["version_season", "castaway_id", "castaway"]),
            ("challenge_description", vec!["version_season", "challenge_id"]),
            (
                "challenge_results",
                vec!["version_season", "sog_id", "challenge_id"],
            ),
        ]
        .into_iter()
        .map(|(dataset, columns)| (dataset.to_string(), to_strings(&columns)))
        .collect();

        let castaway_fk = |column: &str| {
            ForeignKeyRule::new(&[column], "castaway_details", &["castaway_id"])
        };
        let season_fk = ForeignKeyRule::new(&["version_season"], "season_summary", &["version_season"]);
        let mut foreign_keys = BTreeMap::new();
        foreign_keys.insert(
            "vote_history".to_string(),
            vec![
                castaway_fk("castaway_id").allow_null(),
                castaway_fk("vote_id").allow_null(),
                castaway_fk("voted_out_id").allow_null(),
                ForeignKeyRule::new(
                    &["version_season", "challenge_id"],
                    "challenge_description",
                    &["version_season", "challenge_id"],
                )
                .allow_null(),
            ],
        );
        foreign_keys.insert(
            "journeys".to_string(),
            vec![castaway_fk("castaway_id"), season_fk.clone()],
        );
        foreign_keys.insert(
            "castaway_scores".to_string(),
            vec![castaway_fk("castaway_id"), season_fk],
        );

        let fixups = [("US37", "26", "25"), ("AU11", "13", "12")]
            .into_iter()
            .map(|(scope, from, to)| FixupRule {
                dataset: "vote_history".to_string(),
                column: "challenge_id".to_string(),
                scope_column: "version_season".to_string(),
                scope: scope.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect();

        let coercion_context = [
            (
                "auction_details",
                vec!["version_season", "auction_num", "item", "castaway_id"],
            ),
            (
                "advantage_movement",
                vec!["version_season", "advantage_id", "sequence_id", "castaway_id"],
            ),
            (
                "journeys",
                vec!["version_season", "episode", "sog_id", "castaway_id"],
            ),
            (
                "tribe_mapping",
                vec!["version_season", "episode", "day", "castaway_id", "tribe"],
            ),
            (
                "vote_history",
                vec!["version_season", "episode", "vote_event", "castaway_id"],
            ),
        ]
        .into_iter()
        .map(|(dataset, columns)| (dataset.to_string(), to_strings(&columns)))
        .collect();

        let fk_context = [
            (
                "vote_history",
                vec![
                    "episode",
                    "sog_id",
                    "castaway_id",
                    "vote_id",
                    "voted_out_id",
                    "tribe_status",
                    "immunity",
                    "vote_event",
                ],
            ),
            (
                "journeys",
                vec!["episode", "sog_id", "castaway_id", "lost_vote", "reward_details"],
            ),
        ]
        .into_iter()
        .map(|(dataset, columns)| (dataset.to_string(), to_strings(&columns)))
        .collect();

        Self {
            schema: default_schema(),
            run_table: Some("ingestion_runs".to_string()),
            datasets,
            reference_columns,
            foreign_keys,
            fixups,
            coercion_context,
            fk_context,
        }
    }
}

fn base_checks(column: &str) -> [String; 2] {
    [
        format!("missing_count({column}) = 0"),
        format!("duplicate_count({column}) = 0"),
    ]
}

fn to_strings<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values.iter().map(|value| value.as_ref().to_string()).collect()
}
