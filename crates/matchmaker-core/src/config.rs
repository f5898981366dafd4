//! Engine configuration: index-building knobs and per-signal scoring weights.
//!
//! Values come from an optional JSON file and are then overridden by
//! `MATCHMAKER_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{MatchError, MatchResult};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub index: IndexConfig,
    pub weights: ScoringWeights,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Base of the logarithm used for language size buckets.
    pub log_base: f64,
    /// Build the repo-repo and user-user co-occurrence matrices.
    pub cooccurrence: bool,
    /// Lists longer than this are left out of pair counting; `None` counts all.
    pub cooccurrence_list_cap: Option<usize>,
    /// Size of the popularity fallback pool.
    pub popular_pool: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            log_base: 10.0,
            cooccurrence: true,
            cooccurrence_list_cap: None,
            popular_pool: 50,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Base of the popularity damping logarithm.
    pub log_base: f64,
    pub parent_bonus: f64,
    pub grandparent_bonus: f64,
    pub parent_author: f64,
    pub uncle_author: f64,
    pub author: f64,
    pub favorite_author_multiplier: f64,
    pub same_name: f64,
    pub prefix_step: f64,
    pub language_bonus: f64,
    pub outlier_penalty: f64,
    pub outlier_sigmas: f64,
    /// Outlier rejection needs strictly more watched repos than this.
    pub outlier_min_watched: usize,
    pub user_neighbors: usize,
    pub repo_neighbors: usize,
    pub neighbor_repos: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            log_base: 10.0,
            parent_bonus: 2.0,
            grandparent_bonus: 3.0,
            parent_author: 0.5,
            uncle_author: 1.0,
            author: 1.5,
            favorite_author_multiplier: 2.0,
            same_name: 1.0,
            prefix_step: 0.25,
            language_bonus: 0.25,
            outlier_penalty: 10.0,
            outlier_sigmas: 2.5,
            outlier_min_watched: 7,
            user_neighbors: 10,
            repo_neighbors: 5,
            neighbor_repos: 5,
        }
    }
}

impl EngineConfig {
    /// Load from `path` when given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> MatchResult<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                serde_json::from_str(&raw)
                    .map_err(|e| MatchError::Config(format!("{}: {e}", p.display())))?
            }
            None => EngineConfig::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> MatchResult<()> {
        if let Some(base) = env_value::<f64>("MATCHMAKER_LOG_BASE")? {
            self.index.log_base = base;
            self.weights.log_base = base;
        }
        if let Ok(val) = std::env::var("MATCHMAKER_COOCCURRENCE") {
            let v = val.trim().to_lowercase();
            self.index.cooccurrence = !matches!(v.as_str(), "0" | "false" | "no" | "off");
        }
        if let Some(cap) = env_value::<usize>("MATCHMAKER_LIST_CAP")? {
            self.index.cooccurrence_list_cap = Some(cap);
        }
        Ok(())
    }

    pub fn validate(&self) -> MatchResult<()> {
        for base in [self.index.log_base, self.weights.log_base] {
            if !(base > 1.0) || !base.is_finite() {
                return Err(MatchError::Config(format!(
                    "log base must be finite and greater than 1, got {base}"
                )));
            }
        }
        if self.index.popular_pool == 0 {
            return Err(MatchError::Config("popular_pool must be positive".into()));
        }
        Ok(())
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> MatchResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| MatchError::Config(format!("{key}: cannot parse {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"weights": {"author": 4.0}}"#).unwrap();
        assert_eq!(config.weights.author, 4.0);
        assert_eq!(config.weights.parent_bonus, 2.0);
        assert_eq!(config.index.popular_pool, 50);
        assert_eq!(config.index.cooccurrence_list_cap, None);
    }

    #[test]
    fn rejects_degenerate_log_base() {
        let mut config = EngineConfig::default();
        config.index.log_base = 1.0;
        assert!(matches!(config.validate(), Err(MatchError::Config(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"index": {"popular_pool": 7}}"#).unwrap();
        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.index.popular_pool, 7);
    }
}
