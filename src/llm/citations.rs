//! Card citations in model output

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Matches `[nid:<digits>]`
fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[nid:(\d+)\]").expect("citation pattern is valid"))
}

/// Card ids cited in `text`, in order of first appearance
///
/// Ids that overflow an i64 are ignored.
pub fn cited_ids(text: &str) -> Vec<i64> {
    let mut seen = HashSet::new();
    citation_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}
