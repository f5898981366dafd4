//! Index building: record streams in, frozen `IndexSet` out.
//!
//! `IndexBuilder::build` first tries the persisted snapshot in the data
//! directory. Any snapshot failure falls through to a full parse of the four
//! record streams, after which the fresh index set is persisted again.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::errors::{MatchError, MatchResult};
use crate::indexer::cooccurrence::CoMatrix;
use crate::indexer::language::build_language_buckets;
use crate::indexer::names::name_prefixes;
use crate::indexer::parser::{
    parse_lang, parse_optional, parse_repos, parse_test, parse_watching, LANG_FILE, REPOS_FILE,
    TEST_FILE, WATCH_FILE,
};
use crate::indexer::popularity::build_popularity;
use crate::indexer::tfidf::{compute_tfidf, TfIdf};
use crate::models::{
    IndexSummary, LangRecord, RepoId, RepoInfo, RepoRecord, UserId, WatchRecord, NO_REPO,
};
use crate::store::snapshot::{self, SNAPSHOT_FILE};

// ---------------------------------------------------------------------------
// IndexSet
// ---------------------------------------------------------------------------

/// Every derived index, built once and read-only afterwards.
///
/// Lookups of unknown keys resolve to empty slices or `None`; a repository
/// missing from one index is a normal condition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSet {
    watchers_of_repo: BTreeMap<RepoId, Vec<UserId>>,
    repos_of_user: BTreeMap<UserId, Vec<RepoId>>,
    repo_info: BTreeMap<RepoId, RepoInfo>,
    forks_of_repo: BTreeMap<RepoId, Vec<RepoId>>,
    parent_of_repo: BTreeMap<RepoId, RepoId>,
    grandparent_of_repo: BTreeMap<RepoId, RepoId>,
    repos_by_author: BTreeMap<String, Vec<RepoId>>,
    repos_by_name: BTreeMap<String, Vec<RepoId>>,
    repos_by_prefix: BTreeMap<String, Vec<RepoId>>,
    repos_by_language: BTreeMap<String, Vec<(u32, RepoId)>>,
    languages_of_repo: BTreeMap<RepoId, Vec<(String, u32)>>,
    repo_matrix: CoMatrix,
    user_matrix: CoMatrix,
    tfidf: TfIdf,
    top_repos: Vec<RepoId>,
    test_users: Vec<UserId>,
}

impl IndexSet {
    /// Derive every index from already-parsed records.
    pub fn from_records(
        watches: &[WatchRecord],
        repos: &[RepoRecord],
        langs: &[LangRecord],
        test_users: Vec<UserId>,
        config: &IndexConfig,
    ) -> MatchResult<Self> {
        let mut set = IndexSet::default();
        set.index_watching(watches, config);
        set.index_repos(repos)?;
        set.index_lang(langs, config);
        set.tfidf = compute_tfidf(&set.watchers_of_repo, &set.repos_of_user);
        set.top_repos = build_popularity(&set.watchers_of_repo, config.popular_pool);
        set.test_users = test_users;
        set.test_users.sort_unstable();
        set.test_users.dedup();
        Ok(set)
    }

    fn index_watching(&mut self, watches: &[WatchRecord], config: &IndexConfig) {
        for w in watches {
            self.watchers_of_repo.entry(w.repo).or_default().push(w.user);
            self.repos_of_user.entry(w.user).or_default().push(w.repo);
        }
        for list in self
            .watchers_of_repo
            .values_mut()
            .chain(self.repos_of_user.values_mut())
        {
            list.sort_unstable();
            list.dedup();
        }

        if config.cooccurrence {
            let cap = config.cooccurrence_list_cap.unwrap_or(usize::MAX);
            self.repo_matrix = CoMatrix::from_lists(self.repos_of_user.par_iter().map(|(_, v)| v), cap);
            self.user_matrix =
                CoMatrix::from_lists(self.watchers_of_repo.par_iter().map(|(_, v)| v), cap);
            debug!(
                repo_pairs = self.repo_matrix.pair_count(),
                user_pairs = self.user_matrix.pair_count(),
                "co-occurrence matrices built"
            );
        }
    }

    fn index_repos(&mut self, repos: &[RepoRecord]) -> MatchResult<()> {
        for record in repos {
            if self
                .repo_info
                .insert(record.id, RepoInfo::from(record))
                .is_some()
            {
                return Err(MatchError::Index(format!(
                    "repository {} is described twice",
                    record.id
                )));
            }
            if record.parent != NO_REPO {
                self.parent_of_repo.insert(record.id, record.parent);
                self.forks_of_repo.entry(record.parent).or_default().push(record.id);
            }
            self.repos_by_author
                .entry(record.author.clone())
                .or_default()
                .push(record.id);
            self.repos_by_name
                .entry(record.name.clone())
                .or_default()
                .push(record.id);
            for (_, prefix) in name_prefixes(&record.name) {
                self.repos_by_prefix.entry(prefix).or_default().push(record.id);
            }
        }

        check_acyclic(&self.parent_of_repo)?;

        // Second pass: grandparents need the full parent map.
        for (&child, &parent) in &self.parent_of_repo {
            if let Some(&grandparent) = self.parent_of_repo.get(&parent) {
                self.grandparent_of_repo.insert(child, grandparent);
            }
        }

        for list in self
            .forks_of_repo
            .values_mut()
            .chain(self.repos_by_author.values_mut())
            .chain(self.repos_by_name.values_mut())
            .chain(self.repos_by_prefix.values_mut())
        {
            list.sort_unstable();
        }
        Ok(())
    }

    fn index_lang(&mut self, langs: &[LangRecord], config: &IndexConfig) {
        let buckets = build_language_buckets(langs, config.log_base);
        self.repos_by_language = buckets.by_language;
        self.languages_of_repo = buckets.by_repo;
    }

    // -- lookups -------------------------------------------------------------

    pub fn watchers(&self, repo: RepoId) -> &[UserId] {
        self.watchers_of_repo.get(&repo).map_or(&[], Vec::as_slice)
    }

    pub fn watched(&self, user: UserId) -> &[RepoId] {
        self.repos_of_user.get(&user).map_or(&[], Vec::as_slice)
    }

    /// Number of watchers of `repo`.
    pub fn popularity(&self, repo: RepoId) -> usize {
        self.watchers(repo).len()
    }

    pub fn info(&self, repo: RepoId) -> Option<&RepoInfo> {
        self.repo_info.get(&repo)
    }

    pub fn forks(&self, repo: RepoId) -> &[RepoId] {
        self.forks_of_repo.get(&repo).map_or(&[], Vec::as_slice)
    }

    pub fn parent(&self, repo: RepoId) -> Option<RepoId> {
        self.parent_of_repo.get(&repo).copied()
    }

    pub fn grandparent(&self, repo: RepoId) -> Option<RepoId> {
        self.grandparent_of_repo.get(&repo).copied()
    }

    pub fn by_author(&self, author: &str) -> &[RepoId] {
        self.repos_by_author.get(author).map_or(&[], Vec::as_slice)
    }

    pub fn by_name(&self, name: &str) -> &[RepoId] {
        self.repos_by_name.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn by_prefix(&self, prefix: &str) -> &[RepoId] {
        self.repos_by_prefix.get(prefix).map_or(&[], Vec::as_slice)
    }

    /// `(bucket, repo)` pairs for `language`, bucket ascending.
    pub fn by_language(&self, language: &str) -> &[(u32, RepoId)] {
        self.repos_by_language.get(language).map_or(&[], Vec::as_slice)
    }

    pub fn languages(&self, repo: RepoId) -> &[(String, u32)] {
        self.languages_of_repo.get(&repo).map_or(&[], Vec::as_slice)
    }

    /// All known language names, ascending.
    pub fn language_names(&self) -> impl Iterator<Item = &str> {
        self.repos_by_language.keys().map(String::as_str)
    }

    pub fn languages_by_repo(&self) -> impl Iterator<Item = (RepoId, &[(String, u32)])> {
        self.languages_of_repo
            .iter()
            .map(|(&repo, langs)| (repo, langs.as_slice()))
    }

    pub fn repo_matrix(&self) -> &CoMatrix {
        &self.repo_matrix
    }

    pub fn user_matrix(&self) -> &CoMatrix {
        &self.user_matrix
    }

    pub fn idf(&self, repo: RepoId) -> Option<f64> {
        self.tfidf.idf.get(&repo).copied()
    }

    pub fn idf_avg(&self, repo: RepoId) -> f64 {
        self.tfidf.idf_avg.get(&repo).copied().unwrap_or(0.0)
    }

    /// tf-idf weights aligned with `watchers(repo)`.
    pub fn edge_weights(&self, repo: RepoId) -> &[f64] {
        self.tfidf.edge_weights.get(&repo).map_or(&[], Vec::as_slice)
    }

    pub fn top_repos(&self) -> &[RepoId] {
        &self.top_repos
    }

    pub fn test_users(&self) -> &[UserId] {
        &self.test_users
    }

    pub fn watchers_of_repo(&self) -> &BTreeMap<RepoId, Vec<UserId>> {
        &self.watchers_of_repo
    }

    pub fn summary(&self) -> IndexSummary {
        let grandchildren = self.grandparent_of_repo.len();
        IndexSummary {
            users: self.repos_of_user.len(),
            repos_watched: self.watchers_of_repo.len(),
            repos_described: self.repo_info.len(),
            watch_edges: self.repos_of_user.values().map(Vec::len).sum(),
            forked_repos: self.forks_of_repo.len(),
            grandchildren,
            authors: self.repos_by_author.len(),
            project_names: self.repos_by_name.len(),
            name_prefixes: self.repos_by_prefix.len(),
            languages: self.repos_by_language.len(),
            test_users: self.test_users.len(),
            repo_matrix_entries: self.repo_matrix.pair_count(),
            user_matrix_entries: self.user_matrix.pair_count(),
            top_repos: self.top_repos.len(),
        }
    }
}

/// Reject fork cycles; lineage must be a forest.
fn check_acyclic(parents: &BTreeMap<RepoId, RepoId>) -> MatchResult<()> {
    let mut settled: BTreeSet<RepoId> = BTreeSet::new();
    for &start in parents.keys() {
        let mut path: Vec<RepoId> = Vec::new();
        let mut current = start;
        while let Some(&parent) = parents.get(&current) {
            if settled.contains(&current) {
                break;
            }
            if path.contains(&current) {
                return Err(MatchError::Index(format!(
                    "fork cycle through repository {current}"
                )));
            }
            path.push(current);
            current = parent;
        }
        settled.extend(path);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// IndexBuilder
// ---------------------------------------------------------------------------

pub struct IndexBuilder {
    data_dir: PathBuf,
    config: IndexConfig,
    use_snapshot: bool,
}

impl IndexBuilder {
    pub fn new(data_dir: impl Into<PathBuf>, config: IndexConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
            use_snapshot: true,
        }
    }

    /// Disable both snapshot restore and snapshot persistence.
    pub fn without_snapshot(mut self) -> Self {
        self.use_snapshot = false;
        self
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn build(&self) -> MatchResult<IndexSet> {
        let started = Instant::now();
        if !self.use_snapshot {
            return self.parse_and_index(started);
        }

        let fingerprint = snapshot::source_fingerprint(&self.data_dir, &self.config)?;
        let path = self.snapshot_path();
        if path.exists() {
            match snapshot::load(&path, &fingerprint) {
                Ok(set) => {
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "restored index set from {}",
                        path.display()
                    );
                    return Ok(set);
                }
                Err(e) if e.is_recoverable() => {
                    info!("snapshot {} not reused: {e}", path.display())
                }
                Err(e) => warn!("ignoring unreadable snapshot {}: {e}", path.display()),
            }
        }

        let set = self.parse_and_index(started)?;
        if let Err(e) = snapshot::store(&path, &fingerprint, &set) {
            warn!("failed to persist snapshot {}: {e}", path.display());
        }
        Ok(set)
    }

    fn parse_and_index(&self, started: Instant) -> MatchResult<IndexSet> {
        let dir: &Path = &self.data_dir;
        let watches = parse_watching(&dir.join(WATCH_FILE))?;
        let repos = parse_optional(&dir.join(REPOS_FILE), parse_repos)?;
        let langs = parse_optional(&dir.join(LANG_FILE), parse_lang)?;
        let tests = parse_optional(&dir.join(TEST_FILE), parse_test)?;
        debug!(
            watches = watches.len(),
            repos = repos.len(),
            langs = langs.len(),
            tests = tests.len(),
            "record streams parsed"
        );

        let set = IndexSet::from_records(&watches, &repos, &langs, tests, &self.config)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            users = set.repos_of_user.len(),
            repos = set.watchers_of_repo.len(),
            "index set built from {}",
            dir.display()
        );
        Ok(set)
    }
}
