// src/utils.rs
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::Job;

static SALARY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\$?\s*(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(k\b)?").ok()
});

/// Collapse all whitespace runs into single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters, safe on multi-byte text
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Keep the first job seen for every lower-cased (title, company) pair
pub fn dedup_jobs(jobs: Vec<Job>) -> Vec<Job> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert(job.dedup_key()))
        .collect()
}

/// Highest annual amount mentioned in a salary string
///
/// Understands `$120,000`, `120k`, `$55/hr` style figures. Bare numbers below
/// 1000 without a `k` suffix or hourly marker are ignored.
pub fn parse_salary_max(text: &str) -> Option<u64> {
    let re = SALARY_RE.as_ref()?;

    let lower = text.to_lowercase();
    let hourly = ["/hr", "/hour", "per hour", "an hour", "hourly"]
        .iter()
        .any(|marker| lower.contains(marker));

    re.captures_iter(text)
        .filter_map(|caps| {
            let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
            let amount = if caps.get(2).is_some() {
                number * 1000.0
            } else if hourly && number < 1000.0 {
                number * 2080.0
            } else if number >= 1000.0 {
                number
            } else {
                return None;
            };
            Some(amount.round() as u64)
        })
        .max()
}
