use regex::{Regex, RegexBuilder};
use tracing::warn;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::types::GroupMember;

/// Fold text into the form stored in member search strings.
///
/// Decomposes to NFD, drops combining marks and lowercases, so `"Élodie"`
/// becomes `"elodie"`.
pub fn normalize_for_search(text: &str) -> String {
    text.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compiled free-text member filter.
///
/// Each whitespace-separated token becomes one literal pattern; a member
/// matches when every pattern occurs somewhere in its search string.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    raw: String,
    patterns: Vec<TokenMatcher>,
}

/// One filter token. Tokens too large for the regex size limit are matched
/// with a plain substring search instead.
#[derive(Debug, Clone)]
enum TokenMatcher {
    Regex(Regex),
    Literal(String),
}

impl TokenMatcher {
    fn compile(normalized: String) -> Self {
        match RegexBuilder::new(&regex::escape(&normalized))
            .case_insensitive(true)
            .build()
        {
            Ok(pattern) => Self::Regex(pattern),
            Err(err) => {
                warn!(
                    error = %err,
                    token_len = normalized.len(),
                    "search token too large for regex; matching literally"
                );
                Self::Literal(normalized)
            }
        }
    }

    fn is_match(&self, search_string: &str) -> bool {
        match self {
            Self::Regex(pattern) => pattern.is_match(search_string),
            // Both sides are already folded to lowercase.
            Self::Literal(token) => search_string.contains(token.as_str()),
        }
    }
}

impl SearchFilter {
    /// Compile a filter from user input. Blank input yields a match-all filter.
    pub fn parse(text: &str) -> Self {
        let patterns = text
            .split_whitespace()
            .map(normalize_for_search)
            .filter(|normalized| !normalized.is_empty())
            .map(TokenMatcher::compile)
            .collect();

        Self {
            raw: text.to_owned(),
            patterns,
        }
    }

    /// Original input the filter was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the filter accepts every member.
    pub fn is_match_all(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Test one precomputed search string against all patterns.
    pub fn matches(&self, search_string: &str) -> bool {
        self.patterns
            .iter()
            .all(|pattern| pattern.is_match(search_string))
    }
}

/// Order-preserving subset of `members` accepted by `filter`.
pub fn filter_members(members: &[GroupMember], filter: &SearchFilter) -> Vec<GroupMember> {
    if filter.is_match_all() {
        return members.to_vec();
    }
    members
        .iter()
        .filter(|member| filter.matches(&member.search_string))
        .cloned()
        .collect()
}
