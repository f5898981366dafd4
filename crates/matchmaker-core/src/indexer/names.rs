//! Project-name tokenization for the "similarly named project" index.

use regex::Regex;
use std::sync::LazyLock;

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-._]+").unwrap());

const STOP_TOKENS: &[&str] = &["the", "and", "for", "with", "from", "into", "app"];

/// Lower-cased words longer than two characters, stop tokens removed.
pub fn name_tokens(name: &str) -> Vec<String> {
    let lowered = name.to_lowercase();
    SEPARATOR_RE
        .split(&lowered)
        .filter(|w| w.chars().count() > 2 && !STOP_TOKENS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Every leading run of tokens joined by `-`, excluding the full name.
///
/// `"rails-admin-theme"` yields `[(1, "rails"), (2, "rails-admin")]`; the
/// first element of each pair is the prefix length in tokens.
pub fn name_prefixes(name: &str) -> Vec<(usize, String)> {
    let tokens = name_tokens(name);
    (1..tokens.len())
        .map(|len| (len, tokens[..len].join("-")))
        .collect()
}
