//! Case-insensitive glob matching used for data-exclusion keys and bot
//! user-agent patterns.

use regex::Regex;
use tracing::warn;

/// Convert glob pattern to regex
fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");

    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '.' | '(' | ')' | '+' | '|' | '^' | '$' | '@' | '%' | '[' | ']' | '{' | '}'
            | '\\' | '/' => {
                // Escape special regex characters
                regex.push('\\');
                regex.push(ch);
            }
            _ => regex.push(ch),
        }
    }

    regex.push('$');
    regex
}

/// A set of compiled glob patterns matched case-insensitively against plain
/// strings (data keys, user agents).
#[derive(Debug, Default)]
pub struct PatternSet {
    patterns: Vec<(String, Regex)>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a glob pattern to the set. Patterns that fail to compile are
    /// dropped with a warning rather than poisoning the whole set.
    pub fn add(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        match Regex::new(&format!("(?i){}", glob_to_regex(&pattern))) {
            Ok(regex) => self.patterns.push((pattern, regex)),
            Err(err) => warn!("Ignoring invalid pattern '{}': {}", pattern, err),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when any pattern in the set matches the whole input.
    pub fn matches(&self, input: &str) -> bool {
        self.patterns.iter().any(|(_, regex)| regex.is_match(input))
    }

    /// The raw glob patterns currently in the set.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(raw, _)| raw.as_str())
    }
}
