//! Line parsers for the four record streams.
//!
//! Every parser is strict: a malformed line aborts with `MatchError::Parse`
//! carrying the file and 1-based line number. Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::errors::{MatchError, MatchResult};
use crate::models::{LangRecord, RepoRecord, UserId, WatchRecord, NO_REPO};

pub const WATCH_FILE: &str = "data.txt";
pub const REPOS_FILE: &str = "repos.txt";
pub const LANG_FILE: &str = "lang.txt";
pub const TEST_FILE: &str = "test.txt";

/// Feed every non-blank line of `path` to `f`, tagging failures with the line number.
fn for_each_line<F>(path: &Path, mut f: F) -> MatchResult<()>
where
    F: FnMut(&str) -> Result<(), String>,
{
    let reader = BufReader::new(File::open(path)?);
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() {
            continue;
        }
        f(trimmed).map_err(|message| MatchError::parse(path, idx + 1, message))?;
    }
    Ok(())
}

fn parse_id(field: &str, what: &str) -> Result<u32, String> {
    field
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("{what} is not an integer id: {field:?}"))
}

// ---------------------------------------------------------------------------
// Single-line parsers
// ---------------------------------------------------------------------------

/// `user:repo`
pub fn parse_watch_line(line: &str) -> Result<WatchRecord, String> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() != 2 {
        return Err(format!("expected user:repo, got {} fields", fields.len()));
    }
    Ok(WatchRecord {
        user: parse_id(fields[0], "user")?,
        repo: parse_id(fields[1], "repo")?,
    })
}

/// `id:author/name,created[,parent]` or `id,author/name,description[:parent]`.
pub fn parse_repo_line(line: &str) -> Result<RepoRecord, String> {
    let normalized = line.replace(':', ",");
    let fields: Vec<&str> = normalized.split(',').collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(format!(
            "expected id,author/name,created[,parent], got {} fields",
            fields.len()
        ));
    }
    let id = parse_id(fields[0], "repo")?;
    let (author, name) = fields[1]
        .split_once('/')
        .ok_or_else(|| format!("repository name without author: {:?}", fields[1]))?;
    let parent = match fields.get(3) {
        Some(raw) if !raw.trim().is_empty() => parse_id(raw, "parent")?,
        _ => NO_REPO,
    };
    if parent == id {
        return Err(format!("repository {id} is its own parent"));
    }
    Ok(RepoRecord {
        id,
        author: author.to_string(),
        name: name.to_string(),
        created: ordinal_day(fields[2]),
        parent,
    })
}

/// `repo:lang;kloc,lang;kloc,...`
pub fn parse_lang_line(line: &str) -> Result<LangRecord, String> {
    let (repo, rest) = line
        .split_once(':')
        .ok_or_else(|| "expected repo:lang;kloc,...".to_string())?;
    let repo = parse_id(repo, "repo")?;
    let mut languages = Vec::new();
    for item in rest.split(',').filter(|s| !s.trim().is_empty()) {
        let parts: Vec<&str> = item.split(';').collect();
        if parts.len() != 2 {
            return Err(format!("expected lang;kloc, got {item:?}"));
        }
        let kloc = parts[1]
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("size is not an integer: {:?}", parts[1]))?;
        languages.push((parts[0].trim().to_lowercase(), kloc));
    }
    Ok(LangRecord { repo, languages })
}

/// `YYYY-MM-DD` as days since the common era (0001-01-01 is day 1).
pub fn ordinal_day(raw: &str) -> Option<i64> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| i64::from(d.num_days_from_ce()))
}

// ---------------------------------------------------------------------------
// Stream parsers
// ---------------------------------------------------------------------------

pub fn parse_watching(path: &Path) -> MatchResult<Vec<WatchRecord>> {
    let mut out = Vec::new();
    for_each_line(path, |line| {
        out.push(parse_watch_line(line)?);
        Ok(())
    })?;
    Ok(out)
}

pub fn parse_repos(path: &Path) -> MatchResult<Vec<RepoRecord>> {
    let mut out = Vec::new();
    for_each_line(path, |line| {
        out.push(parse_repo_line(line)?);
        Ok(())
    })?;
    Ok(out)
}

pub fn parse_lang(path: &Path) -> MatchResult<Vec<LangRecord>> {
    let mut out = Vec::new();
    for_each_line(path, |line| {
        out.push(parse_lang_line(line)?);
        Ok(())
    })?;
    Ok(out)
}

/// Evaluation subjects, sorted ascending and de-duplicated.
pub fn parse_test(path: &Path) -> MatchResult<Vec<UserId>> {
    let mut out = Vec::new();
    for_each_line(path, |line| {
        out.push(parse_id(line, "user")?);
        Ok(())
    })?;
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// Parse a stream if its file exists, otherwise yield an empty set.
pub fn parse_optional<T>(
    path: &Path,
    parse: impl Fn(&Path) -> MatchResult<Vec<T>>,
) -> MatchResult<Vec<T>> {
    if path.exists() {
        parse(path)
    } else {
        tracing::warn!("{} not found, treating stream as empty", path.display());
        Ok(Vec::new())
    }
}
