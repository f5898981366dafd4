//! Post-scoring passes: cleanup, temporal outliers, ranking, diversity, pruning,
//! and the final top-N selection with popularity backfill.

use std::collections::{HashMap, HashSet};

use crate::config::ScoringWeights;
use crate::indexer::pipeline::IndexSet;
use crate::models::{RepoId, NO_REPO};
use crate::query::guards::{
    MAX_PER_AUTHOR, MAX_PER_NAME, SPREAD_PRUNE_MIN_CANDIDATES, SPREAD_PRUNE_SIGMAS,
};

pub type Scores = HashMap<RepoId, f64>;

/// Drop already-watched repositories and the sentinel id.
pub fn remove_watched(scores: &mut Scores, watched: &[RepoId]) {
    for repo in watched.iter().chain(std::iter::once(&NO_REPO)) {
        scores.remove(repo);
    }
}

/// Mean and population standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Penalize candidates created far outside the era of the user's watch list.
///
/// Applies only when more than `outlier_min_watched` watched repositories
/// have a known creation day. Returns the number of penalized candidates.
pub fn penalize_outliers(
    index: &IndexSet,
    watched: &[RepoId],
    scores: &mut Scores,
    weights: &ScoringWeights,
) -> usize {
    let dates: Vec<f64> = watched
        .iter()
        .filter_map(|&r| index.info(r).and_then(|i| i.created))
        .map(|d| d as f64)
        .collect();
    if dates.len() <= weights.outlier_min_watched {
        return 0;
    }
    let (mean, std_dev) = mean_std(&dates);
    let threshold = std_dev * weights.outlier_sigmas;

    let mut penalized = 0;
    for (&repo, score) in scores.iter_mut() {
        let created = match index.info(repo).and_then(|i| i.created) {
            Some(c) => c as f64,
            None => continue,
        };
        if (created - mean).abs() > threshold {
            *score -= weights.outlier_penalty;
            penalized += 1;
        }
    }
    penalized
}

/// Score descending, repository id ascending on ties.
pub fn rank(scores: Scores) -> Vec<(RepoId, f64)> {
    let mut ranked: Vec<(RepoId, f64)> = scores.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

/// Per-author and per-name counters over the repositories admitted so far.
pub struct DiversityCap<'a> {
    index: &'a IndexSet,
    authors: HashMap<&'a str, usize>,
    names: HashMap<&'a str, usize>,
}

impl<'a> DiversityCap<'a> {
    pub fn new(index: &'a IndexSet) -> Self {
        Self {
            index,
            authors: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Count `repo` and return true unless its author already has
    /// `MAX_PER_AUTHOR` entries or its name `MAX_PER_NAME`. Undescribed
    /// repositories are always admitted.
    pub fn admit(&mut self, repo: RepoId) -> bool {
        let Some(info) = self.index.info(repo) else {
            return true;
        };
        let author = info.author.as_str();
        let name = info.name.as_str();
        if self.authors.get(author).copied().unwrap_or(0) >= MAX_PER_AUTHOR
            || self.names.get(name).copied().unwrap_or(0) >= MAX_PER_NAME
        {
            return false;
        }
        *self.authors.entry(author).or_insert(0) += 1;
        *self.names.entry(name).or_insert(0) += 1;
        true
    }
}

/// Walk the ranking and keep at most `MAX_PER_AUTHOR` candidates per author
/// and `MAX_PER_NAME` per project name.
pub fn diversity_cap(index: &IndexSet, ranked: Vec<(RepoId, f64)>) -> Vec<(RepoId, f64)> {
    let mut cap = DiversityCap::new(index);
    ranked.into_iter().filter(|&(repo, _)| cap.admit(repo)).collect()
}

/// For very large candidate sets keep only scores above `mean + 2.5 sigma`,
/// unless that would leave nothing.
pub fn prune_spread(ranked: Vec<(RepoId, f64)>) -> Vec<(RepoId, f64)> {
    if ranked.len() <= SPREAD_PRUNE_MIN_CANDIDATES {
        return ranked;
    }
    let values: Vec<f64> = ranked.iter().map(|&(_, s)| s).collect();
    let (mean, std_dev) = mean_std(&values);
    let cutoff = mean + std_dev * SPREAD_PRUNE_SIGMAS;
    if ranked.iter().any(|&(_, s)| s > cutoff) {
        ranked.into_iter().filter(|&(_, s)| s > cutoff).collect()
    } else {
        ranked
    }
}

/// First `n` ranked ids, then `fallback` entries not yet chosen or excluded.
///
/// Both passes share one diversity cap and never yield the sentinel id.
pub fn select_with_backfill(
    index: &IndexSet,
    ranked: &[(RepoId, f64)],
    fallback: &[RepoId],
    excluded: &[RepoId],
    n: usize,
) -> Vec<RepoId> {
    let mut cap = DiversityCap::new(index);
    let mut seen: HashSet<RepoId> = excluded.iter().copied().collect();
    seen.insert(NO_REPO);
    let mut chosen = Vec::with_capacity(n);
    let candidates = ranked.iter().map(|&(r, _)| r).chain(fallback.iter().copied());
    for repo in candidates {
        if chosen.len() >= n {
            break;
        }
        if !seen.contains(&repo) && cap.admit(repo) {
            seen.insert(repo);
            chosen.push(repo);
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::models::{RepoRecord, WatchRecord};

    fn described(records: &[(RepoId, &str, &str, Option<i64>)]) -> IndexSet {
        let repos: Vec<RepoRecord> = records
            .iter()
            .map(|&(id, author, name, created)| RepoRecord {
                id,
                author: author.into(),
                name: name.into(),
                created,
                parent: NO_REPO,
            })
            .collect();
        let watches: Vec<WatchRecord> = repos
            .iter()
            .map(|r| WatchRecord { user: 1, repo: r.id })
            .collect();
        IndexSet::from_records(&watches, &repos, &[], vec![], &IndexConfig::default()).unwrap()
    }

    #[test]
    fn cleanup_removes_watched_and_sentinel() {
        let mut scores: Scores = [(0, 1.0), (5, 2.0), (6, 3.0)].into_iter().collect();
        remove_watched(&mut scores, &[6]);
        assert_eq!(scores.len(), 1);
        assert!(scores.contains_key(&5));
    }

    #[test]
    fn ranking_breaks_ties_by_id() {
        let scores: Scores = [(9, 1.0), (3, 1.0), (4, 2.0)].into_iter().collect();
        let ids: Vec<RepoId> = rank(scores).into_iter().map(|(r, _)| r).collect();
        assert_eq!(ids, vec![4, 3, 9]);
    }

    #[test]
    fn diversity_caps_author_and_name() {
        let mut records = Vec::new();
        for id in 1..=6 {
            records.push((id, "prolific", "thing", None));
        }
        for id in 10..=16 {
            records.push((id, if id % 2 == 0 { "x" } else { "y" }, "dup", None));
        }
        let index = described(&records);
        let ranked: Vec<(RepoId, f64)> =
            records.iter().map(|&(id, ..)| (id, 100.0 - id as f64)).collect();
        let kept = diversity_cap(&index, ranked);

        let mut per_author: HashMap<String, usize> = HashMap::new();
        let mut per_name: HashMap<String, usize> = HashMap::new();
        for (repo, _) in &kept {
            let info = index.info(*repo).unwrap();
            *per_author.entry(info.author.clone()).or_default() += 1;
            *per_name.entry(info.name.clone()).or_default() += 1;
        }
        assert_eq!(per_author["prolific"], 3);
        assert!(per_author.values().all(|&c| c <= MAX_PER_AUTHOR));
        assert!(per_name.values().all(|&c| c <= MAX_PER_NAME));
        // Highest-ranked survivors are kept first.
        assert_eq!(&kept[..3], &[(1, 99.0), (2, 98.0), (3, 97.0)]);
    }

    #[test]
    fn outliers_penalized_only_with_enough_history() {
        let mut records: Vec<(RepoId, &str, &str, Option<i64>)> = (1..=8)
            .map(|id| (id, "a", "w", Some(730_000 + id as i64)))
            .collect();
        records.push((50, "b", "old", Some(1)));
        records.push((51, "c", "near", Some(730_004)));
        let index = described(&records);
        let watched: Vec<RepoId> = (1..=8).collect();
        let weights = ScoringWeights::default();

        let mut scores: Scores = [(50, 1.0), (51, 1.0), (99, 1.0)].into_iter().collect();
        assert_eq!(penalize_outliers(&index, &watched, &mut scores, &weights), 1);
        assert_eq!(scores[&50], 1.0 - weights.outlier_penalty);
        assert_eq!(scores[&51], 1.0);
        assert_eq!(scores[&99], 1.0);

        let mut scores: Scores = [(50, 1.0)].into_iter().collect();
        assert_eq!(penalize_outliers(&index, &watched[..7], &mut scores, &weights), 0);
    }

    #[test]
    fn spread_pruning_keeps_outstanding_scores() {
        let mut ranked: Vec<(RepoId, f64)> = vec![(1, 1000.0)];
        ranked.extend((2..=3500).map(|id| (id, 1.0)));
        let pruned = prune_spread(ranked);
        assert_eq!(pruned, vec![(1, 1000.0)]);

        let small = vec![(1, 5.0), (2, 1.0)];
        assert_eq!(prune_spread(small.clone()), small);
    }

    #[test]
    fn backfill_skips_chosen_and_excluded() {
        let index = IndexSet::default();
        let ranked = vec![(7, 3.0), (8, 2.0)];
        let picked = select_with_backfill(&index, &ranked, &[8, 1, 0, 2, 3], &[1], 4);
        assert_eq!(picked, vec![7, 8, 2, 3]);
        let picked = select_with_backfill(&index, &ranked, &[], &[], 10);
        assert_eq!(picked, vec![7, 8]);
    }

    #[test]
    fn selection_drops_sentinel_from_ranked_list() {
        let ranked = vec![(0, 9.0), (5, 1.0)];
        let picked = select_with_backfill(&IndexSet::default(), &ranked, &[0, 6], &[], 10);
        assert_eq!(picked, vec![5, 6]);
    }

    #[test]
    fn backfill_respects_author_cap() {
        let records: Vec<(RepoId, &str, &str, Option<i64>)> = (1..=6)
            .map(|id| (id, "alice", "lib", None))
            .chain([(7, "bob", "tool", None)])
            .collect();
        let index = described(&records);
        let ranked = vec![(1, 5.0), (2, 4.0)];
        let picked = select_with_backfill(&index, &ranked, &[3, 4, 5, 6, 7], &[], 10);
        assert_eq!(picked, vec![1, 2, 3, 7]);
    }
}
