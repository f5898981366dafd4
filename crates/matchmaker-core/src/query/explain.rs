//! Human-readable view of one result line: the user's watch list next to the
//! recommended repositories, each with author, name and creation date.

use chrono::NaiveDate;

use crate::errors::{MatchError, MatchResult};
use crate::indexer::pipeline::IndexSet;
use crate::models::{RepoId, UserId};

const FIELD_WIDTH: usize = 20;

/// Parse `user:r1,r2,...`. A leading `+` or `-` (diff output) is ignored.
pub fn parse_result_line(line: &str) -> MatchResult<(UserId, Vec<RepoId>)> {
    let line = line.trim();
    let line = line.strip_prefix(['+', '-']).unwrap_or(line);
    let (user, repos) = line
        .split_once(':')
        .ok_or_else(|| MatchError::Input(format!("expected user:repo,..., got {line:?}")))?;
    let user = user
        .trim()
        .parse::<UserId>()
        .map_err(|_| MatchError::Input(format!("user is not an integer id: {user:?}")))?;
    let repos = repos
        .split(',')
        .filter(|r| !r.trim().is_empty())
        .map(|r| {
            r.trim()
                .parse::<RepoId>()
                .map_err(|_| MatchError::Input(format!("repo is not an integer id: {r:?}")))
        })
        .collect::<MatchResult<Vec<_>>>()?;
    Ok((user, repos))
}

/// Ordinal day (0001-01-01 is day 1) back to `YYYY-MM-DD`.
fn format_day(day: i64) -> Option<String> {
    let day = i32::try_from(day).ok()?;
    NaiveDate::from_num_days_from_ce_opt(day).map(|d| d.format("%Y-%m-%d").to_string())
}

fn clip(s: &str) -> String {
    s.chars().take(FIELD_WIDTH).collect()
}

/// One row: id, then author, name and creation date when the repo is described.
pub fn describe(index: &IndexSet, repo: RepoId) -> String {
    match index.info(repo) {
        Some(info) => {
            let created = info.created.and_then(format_day).unwrap_or_default();
            format!(
                "{repo:>6} {:>18} - {:>20} - {:>10}",
                clip(&info.author),
                clip(&info.name),
                created
            )
        }
        None => format!("{repo:>6}"),
    }
}

/// Watched repositories of `user`, a blank line, then `recommended`; both sorted.
pub fn explain(index: &IndexSet, user: UserId, recommended: &[RepoId]) -> String {
    let mut additions = recommended.to_vec();
    additions.sort_unstable();

    let mut lines = vec!["original watchlist".to_string()];
    lines.extend(index.watched(user).iter().map(|&r| describe(index, r)));
    lines.push(String::new());
    lines.push("new additions".to_string());
    lines.extend(additions.iter().map(|&r| describe(index, r)));
    lines.join("\n")
}
