//! Language composition: log-scaled size buckets and the two bucket indices.

use std::collections::BTreeMap;

use crate::models::{LangRecord, RepoId};

/// `floor(log_base(kloc + 1))`, a coarse magnitude class for a language's size.
pub fn size_bucket(kloc: u64, log_base: f64) -> u32 {
    // ln(x)/ln(b) lands just under exact powers of b (1000 -> 2.9999999999999996)
    let value = (((kloc as f64) + 1.0).log(log_base) + 1e-9).floor();
    if value.is_finite() && value > 0.0 {
        value as u32
    } else {
        0
    }
}

/// Language -> `(bucket, repo)` sorted ascending, plus repo -> `(language, bucket)`.
#[derive(Debug, Default)]
pub struct LanguageBuckets {
    pub by_language: BTreeMap<String, Vec<(u32, RepoId)>>,
    pub by_repo: BTreeMap<RepoId, Vec<(String, u32)>>,
}

pub fn build_language_buckets(records: &[LangRecord], log_base: f64) -> LanguageBuckets {
    let mut buckets = LanguageBuckets::default();
    for record in records {
        let entry = buckets.by_repo.entry(record.repo).or_default();
        for (lang, kloc) in &record.languages {
            let bucket = size_bucket(*kloc, log_base);
            entry.push((lang.clone(), bucket));
            buckets
                .by_language
                .entry(lang.clone())
                .or_default()
                .push((bucket, record.repo));
        }
    }
    for list in buckets.by_language.values_mut() {
        list.sort_unstable();
        list.dedup();
    }
    for langs in buckets.by_repo.values_mut() {
        langs.sort();
        langs.dedup_by(|a, b| a.0 == b.0);
    }
    buckets
}

/// The slice of a bucket-sorted list whose buckets lie within one of `bucket`.
pub fn nearby_buckets(list: &[(u32, RepoId)], bucket: u32) -> &[(u32, RepoId)] {
    let low = bucket.saturating_sub(1);
    let high = bucket.saturating_add(1);
    let start = list.partition_point(|&(b, _)| b < low);
    let end = list.partition_point(|&(b, _)| b <= high);
    &list[start..end]
}

/// One coordinate per language in `languages`, valued by that language's bucket.
pub fn language_vector(langs: &[(String, u32)], languages: &[String]) -> Vec<f64> {
    languages
        .iter()
        .map(|lang| {
            langs
                .iter()
                .find(|(l, _)| l == lang)
                .map_or(0.0, |&(_, bucket)| f64::from(bucket))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_monotonic() {
        let mut previous = 0;
        for kloc in [0u64, 1, 5, 9, 10, 99, 100, 5_000, 1_000_000] {
            let bucket = size_bucket(kloc, 10.0);
            assert!(bucket >= previous, "bucket dropped at {kloc}");
            previous = bucket;
        }
        assert_eq!(size_bucket(0, 10.0), 0);
        assert_eq!(size_bucket(9, 10.0), 1);
        assert_eq!(size_bucket(999, 10.0), 3);
    }

    #[test]
    fn buckets_sorted_per_language() {
        let records = vec![
            LangRecord {
                repo: 1,
                languages: vec![("ruby".into(), 5000)],
            },
            LangRecord {
                repo: 2,
                languages: vec![("ruby".into(), 2), ("c".into(), 40)],
            },
        ];
        let buckets = build_language_buckets(&records, 10.0);
        assert_eq!(buckets.by_language["ruby"], vec![(0, 2), (3, 1)]);
        assert_eq!(
            buckets.by_repo[&2],
            vec![("c".to_string(), 1), ("ruby".to_string(), 0)]
        );
    }

    #[test]
    fn nearby_covers_adjacent_buckets_only() {
        let list = vec![(0, 1), (1, 2), (2, 3), (3, 4), (5, 5)];
        let ids: Vec<RepoId> = nearby_buckets(&list, 2).iter().map(|&(_, r)| r).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        let ids: Vec<RepoId> = nearby_buckets(&list, 0).iter().map(|&(_, r)| r).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn vector_has_zero_for_missing_languages() {
        let langs = vec![("c".to_string(), 2)];
        let order = vec!["c".to_string(), "go".to_string()];
        assert_eq!(language_vector(&langs, &order), vec![2.0, 0.0]);
    }
}
