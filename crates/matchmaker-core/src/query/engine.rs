//! Per-user scoring over the frozen index set.
//!
//! `Engine::score` accumulates a weighted score per candidate repository from
//! lineage, authorship, naming, language and co-occurrence signals, filters
//! the result and returns up to ten repository ids. Users are independent, so
//! `score_all` fans out over a rayon pool.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ScoringWeights;
use crate::errors::MatchResult;
use crate::indexer::language::nearby_buckets;
use crate::indexer::names::name_prefixes;
use crate::indexer::pipeline::IndexSet;
use crate::indexer::popularity::locality_ranking;
use crate::models::{RepoId, UserId, RECOMMENDATIONS_PER_USER};
use crate::query::filters::{self, Scores};
use crate::query::guards::{clamp_workers, LOCALITY_RADIUS};
use crate::query::neighbors::NeighborSource;
use crate::query::weights::{cooccurrence_weight, damp};

pub struct Engine<'a> {
    index: &'a IndexSet,
    neighbors: &'a dyn NeighborSource,
    weights: ScoringWeights,
}

impl<'a> Engine<'a> {
    pub fn new(index: &'a IndexSet, neighbors: &'a dyn NeighborSource, weights: ScoringWeights) -> Self {
        Self {
            index,
            neighbors,
            weights,
        }
    }

    /// Up to ten recommendations for `user`, never including watched repos or id 0.
    pub fn score(&self, user: UserId) -> Vec<RepoId> {
        let watched = self.index.watched(user);
        if watched.is_empty() {
            return self.cold_start(user);
        }

        let ranked = self.ranked_candidates(user);
        let ranked = filters::prune_spread(filters::diversity_cap(self.index, ranked));
        filters::select_with_backfill(
            self.index,
            &ranked,
            self.index.top_repos(),
            watched,
            RECOMMENDATIONS_PER_USER,
        )
    }

    /// Every candidate with its final score, best first, before the diversity cap.
    pub fn ranked_candidates(&self, user: UserId) -> Vec<(RepoId, f64)> {
        let watched = self.index.watched(user);
        let mut scores = Scores::new();
        if watched.is_empty() {
            return Vec::new();
        }

        let favorite = self.favorite_author(watched);
        self.collaborative(user, watched, &mut scores);
        for &repo in watched {
            self.lineage(repo, &mut scores);
            self.authorship(repo, favorite, &mut scores);
            self.naming(repo, &mut scores);
            self.language(repo, &mut scores);
        }

        filters::remove_watched(&mut scores, watched);
        let penalized = filters::penalize_outliers(self.index, watched, &mut scores, &self.weights);
        debug!(
            user,
            watched = watched.len(),
            candidates = scores.len(),
            penalized,
            "user scored"
        );
        filters::rank(scores)
    }

    /// No history: repositories popular among numerically nearby users, then
    /// the global popularity pool.
    fn cold_start(&self, user: UserId) -> Vec<RepoId> {
        let local: Vec<(RepoId, f64)> = locality_ranking(
            self.index.watchers_of_repo(),
            user,
            LOCALITY_RADIUS,
            RECOMMENDATIONS_PER_USER,
        )
        .into_iter()
        .map(|repo| (repo, 0.0))
        .collect();
        filters::select_with_backfill(
            self.index,
            &local,
            self.index.top_repos(),
            &[],
            RECOMMENDATIONS_PER_USER,
        )
    }

    /// The most frequent author among watched repositories, if it strictly
    /// beats the runner-up.
    fn favorite_author(&self, watched: &[RepoId]) -> Option<&'a str> {
        let mut tally: HashMap<&'a str, usize> = HashMap::new();
        for &repo in watched {
            if let Some(info) = self.index.info(repo) {
                *tally.entry(info.author.as_str()).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<(&str, usize)> = tally.into_iter().collect();
        counts.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        match counts.as_slice() {
            [] => None,
            [(top, _)] => Some(*top),
            [(top, first), (_, second), ..] => (first > second).then_some(*top),
        }
    }

    fn bump(&self, scores: &mut Scores, repo: RepoId, amount: f64) {
        *scores.entry(repo).or_insert(0.0) += amount;
    }

    fn damped(&self, repo: RepoId) -> f64 {
        damp(self.index.popularity(repo), self.weights.log_base)
    }

    /// Add a damped `scale` to every repository in `repos`.
    fn bump_all(&self, scores: &mut Scores, repos: &[RepoId], scale: f64) {
        for &r in repos {
            self.bump(scores, r, scale * self.damped(r));
        }
    }

    /// `bonus` scaled up to the damped popularity of the ancestor's most
    /// watched fork, so an ancestor always beats any single fork of it.
    fn ancestor_bonus(&self, ancestor: RepoId, bonus: f64) -> f64 {
        let widest = self
            .index
            .forks(ancestor)
            .iter()
            .map(|&f| self.index.popularity(f))
            .max()
            .unwrap_or(0);
        bonus * damp(widest, self.weights.log_base).max(1.0)
    }

    fn lineage(&self, repo: RepoId, scores: &mut Scores) {
        let w = &self.weights;
        self.bump_all(scores, self.index.forks(repo), 1.0);

        if let Some(parent) = self.index.parent(repo) {
            self.bump(scores, parent, self.ancestor_bonus(parent, w.parent_bonus));
            self.bump_all(scores, self.index.forks(parent), 1.0);
            if let Some(info) = self.index.info(parent) {
                self.bump_all(scores, self.index.by_author(&info.author), w.parent_author);
            }
        }

        if let Some(grandparent) = self.index.grandparent(repo) {
            self.bump(
                scores,
                grandparent,
                self.ancestor_bonus(grandparent, w.grandparent_bonus),
            );
            let uncles = self.index.forks(grandparent);
            self.bump_all(scores, uncles, 1.0);
            let authors: BTreeSet<&str> = uncles
                .iter()
                .filter_map(|&u| self.index.info(u))
                .map(|info| info.author.as_str())
                .collect();
            for author in authors {
                self.bump_all(scores, self.index.by_author(author), w.uncle_author);
            }
        }
    }

    fn authorship(&self, repo: RepoId, favorite: Option<&str>, scores: &mut Scores) {
        let Some(info) = self.index.info(repo) else {
            return;
        };
        let mut scale = self.weights.author;
        if favorite == Some(info.author.as_str()) {
            scale *= self.weights.favorite_author_multiplier;
        }
        self.bump_all(scores, self.index.by_author(&info.author), scale);
    }

    fn naming(&self, repo: RepoId, scores: &mut Scores) {
        let Some(info) = self.index.info(repo) else {
            return;
        };
        self.bump_all(scores, self.index.by_name(&info.name), self.weights.same_name);
        for (len, prefix) in name_prefixes(&info.name) {
            let scale = self.weights.prefix_step * len as f64;
            self.bump_all(scores, self.index.by_prefix(&prefix), scale);
        }
    }

    fn language(&self, repo: RepoId, scores: &mut Scores) {
        for (lang, bucket) in self.index.languages(repo) {
            for &(_, other) in nearby_buckets(self.index.by_language(lang), *bucket) {
                if other != repo {
                    self.bump(scores, other, self.weights.language_bonus);
                }
            }
        }
    }

    fn collaborative(&self, user: UserId, watched: &[RepoId], scores: &mut Scores) {
        let w = &self.weights;
        let base = w.log_base;

        let neighbors = self
            .neighbors
            .user_neighbors(user, w.user_neighbors)
            .unwrap_or_else(|e| {
                warn!(user, "user neighbor lookup failed: {e}");
                Vec::new()
            });
        let mut shared: HashMap<RepoId, u32> = HashMap::new();
        for (neighbor, weight) in neighbors {
            for &repo in self.index.watched(neighbor) {
                if watched.binary_search(&repo).is_err() {
                    *shared.entry(repo).or_insert(0) += weight;
                }
            }
        }
        let mut pool: Vec<(RepoId, u32)> = shared.into_iter().collect();
        pool.sort_unstable_by(|a, b| {
            self.index
                .idf_avg(b.0)
                .total_cmp(&self.index.idf_avg(a.0))
                .then(a.0.cmp(&b.0))
        });
        for (repo, weight) in pool.into_iter().take(w.neighbor_repos) {
            let amount = cooccurrence_weight(weight, self.index.popularity(repo), base);
            self.bump(scores, repo, amount);
        }

        for &repo in watched {
            let related = self
                .neighbors
                .repo_neighbors(repo, w.repo_neighbors)
                .unwrap_or_else(|e| {
                    warn!(repo, "repo neighbor lookup failed: {e}");
                    Vec::new()
                });
            for (other, weight) in related {
                let amount = cooccurrence_weight(weight, self.index.popularity(other), base);
                self.bump(scores, other, amount);
            }
        }
    }

    /// Score `users` in parallel; results come back ordered by user id.
    ///
    /// `workers` builds a dedicated pool; when that fails, scoring runs
    /// sequentially.
    pub fn score_all(&self, users: &[UserId], workers: Option<usize>) -> Vec<(UserId, Vec<RepoId>)> {
        let started = Instant::now();
        let mut users: Vec<UserId> = users.to_vec();
        users.sort_unstable();
        users.dedup();

        let run = || -> Vec<(UserId, Vec<RepoId>)> {
            users.par_iter().map(|&u| (u, self.score(u))).collect()
        };
        let results = match workers {
            Some(n) => match rayon::ThreadPoolBuilder::new()
                .num_threads(clamp_workers(n))
                .build()
            {
                Ok(pool) => pool.install(run),
                Err(e) => {
                    warn!("worker pool unavailable, scoring sequentially: {e}");
                    users.iter().map(|&u| (u, self.score(u))).collect()
                }
            },
            None => run(),
        };
        info!(
            users = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch scored"
        );
        results
    }
}

/// `user:repo1,repo2,...` per line.
pub fn format_results(results: &[(UserId, Vec<RepoId>)]) -> String {
    results
        .iter()
        .map(|(user, repos)| {
            let joined: Vec<String> = repos.iter().map(|r| r.to_string()).collect();
            format!("{user}:{}", joined.join(","))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_results(path: &Path, results: &[(UserId, Vec<RepoId>)]) -> MatchResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let body = format_results(results);
    writer.write_all(body.as_bytes())?;
    if !body.is_empty() {
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
