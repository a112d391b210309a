//! Job configuration, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use sbox_core::TableKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cover::{DirectSearchBounds, Strategy, TieBreak};
use crate::milp::SolveLimits;

/// Failures while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid configuration.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Value {
        /// Offending field.
        field: &'static str,
        /// Explanation.
        reason: String,
    },
}

/// Tie-break rule names as written in configs; the seed is a separate key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreakRule {
    /// See [`TieBreak::First`].
    #[default]
    First,
    /// See [`TieBreak::Last`].
    Last,
    /// See [`TieBreak::Middle`].
    Middle,
    /// See [`TieBreak::Random`].
    Random,
}

impl From<TieBreak> for TieBreakRule {
    fn from(rule: TieBreak) -> Self {
        match rule {
            TieBreak::First => TieBreakRule::First,
            TieBreak::Last => TieBreakRule::Last,
            TieBreak::Middle => TieBreakRule::Middle,
            TieBreak::Random { .. } => TieBreakRule::Random,
        }
    }
}

/// Settings of one generation job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    /// Property table to describe.
    pub table: TableKind,
    /// Cover selection strategy.
    pub strategy: Strategy,
    /// Number of facets summed per augmented candidate; below 2 disables it.
    pub augment_arity: usize,
    /// Greedy tie-break rule.
    pub tie_break: TieBreakRule,
    /// Seed for the random tie-break rule.
    pub seed: u64,
    /// Facet enumeration budget in seconds.
    pub hull_timeout_secs: f64,
    /// Per-solve integer program budget in seconds.
    pub solver_timeout_secs: f64,
    /// Branch and bound node budget per exact cover solve.
    pub node_limit: usize,
    /// Branch and bound node budget per direct search round. A round that
    /// reaches it keeps its best inequality.
    pub round_node_limit: usize,
    /// Maximum collection rounds of search and reduce.
    pub search_rounds: usize,
    /// Direct search bounds; `None` uses [`DirectSearchBounds::heuristic`].
    pub bounds: Option<DirectSearchBounds>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            table: TableKind::Difference,
            strategy: Strategy::Exact,
            augment_arity: 2,
            tie_break: TieBreakRule::First,
            seed: 0,
            hull_timeout_secs: 60.0,
            solver_timeout_secs: 600.0,
            node_limit: 2_000_000,
            round_node_limit: 20_000,
            search_rounds: 256,
            bounds: None,
        }
    }
}

impl JobConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: JobConfig = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Rejects values no job can run with.
    pub fn check(&self) -> Result<(), ConfigError> {
        for (field, secs) in [
            ("hull_timeout_secs", self.hull_timeout_secs),
            ("solver_timeout_secs", self.solver_timeout_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::Value {
                    field,
                    reason: format!("{secs} is not a non-negative number of seconds"),
                });
            }
        }
        if let Some(bounds) = &self.bounds {
            if bounds.coefficient < 0 || bounds.constant < 0 {
                return Err(ConfigError::Value {
                    field: "bounds",
                    reason: "bounds must be non-negative".into(),
                });
            }
        }
        Ok(())
    }

    /// Tie-break rule with the configured seed applied.
    pub fn tie_break(&self) -> TieBreak {
        match self.tie_break {
            TieBreakRule::First => TieBreak::First,
            TieBreakRule::Last => TieBreak::Last,
            TieBreakRule::Middle => TieBreak::Middle,
            TieBreakRule::Random => TieBreak::Random { seed: self.seed },
        }
    }

    /// Facet enumeration budget.
    pub fn hull_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.hull_timeout_secs)
    }

    /// Solver limits for the exact cover program.
    pub fn solve_limits(&self) -> SolveLimits {
        SolveLimits {
            time_limit: Some(Duration::from_secs_f64(self.solver_timeout_secs)),
            node_limit: Some(self.node_limit),
            keep_incumbent: false,
        }
    }

    /// Solver limits for one direct search round; the best inequality found
    /// is kept when a limit is reached.
    pub fn round_limits(&self) -> SolveLimits {
        SolveLimits {
            time_limit: Some(Duration::from_secs_f64(self.solver_timeout_secs)),
            node_limit: Some(self.round_node_limit),
            keep_incumbent: true,
        }
    }

    /// Configured direct search bounds, or the heuristic for `input_bits`.
    pub fn search_bounds(&self, input_bits: u32) -> DirectSearchBounds {
        self.bounds
            .unwrap_or_else(|| DirectSearchBounds::heuristic(input_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(JobConfig::from_toml("").unwrap(), JobConfig::default());
    }

    #[test]
    fn parses_every_key() {
        let config = JobConfig::from_toml(
            r#"
            table = "linear"
            strategy = "search-reduce"
            augment_arity = 3
            tie_break = "random"
            seed = 9
            hull_timeout_secs = 1.5
            solver_timeout_secs = 20.0
            node_limit = 100
            round_node_limit = 50
            search_rounds = 4

            [bounds]
            coefficient = 2
            constant = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.table, TableKind::Linear);
        assert_eq!(config.strategy, Strategy::SearchReduce);
        assert_eq!(config.tie_break(), TieBreak::Random { seed: 9 });
        assert_eq!(config.hull_timeout(), Duration::from_millis(1500));
        assert_eq!(config.solve_limits().node_limit, Some(100));
        assert!(!config.solve_limits().keep_incumbent);
        assert_eq!(config.round_limits().node_limit, Some(50));
        assert!(config.round_limits().keep_incumbent);
        assert_eq!(
            config.search_bounds(4),
            DirectSearchBounds {
                coefficient: 2,
                constant: 3
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            JobConfig::from_toml("hull_timeout_secs = -1.0"),
            Err(ConfigError::Value { field: "hull_timeout_secs", .. })
        ));
        assert!(matches!(
            JobConfig::from_toml("strategy = \"annealing\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            JobConfig::from_toml("colour = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
