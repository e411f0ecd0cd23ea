//! Only/exclude URL filters.

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// A compiled URL filter.
///
/// `/pattern/flags` is a regular expression (`i` case-insensitive, `m` dot
/// matches newline, `x` extended). Anything else, including a delimited
/// pattern that does not compile, is a case-insensitive substring match on
/// the raw text.
#[derive(Debug, Clone)]
pub enum UrlFilter {
    Regex(Regex),
    Substring(String),
}

impl UrlFilter {
    pub fn parse(pattern: &str) -> Self {
        if let Some((body, flags)) = split_delimited(pattern) {
            match build_regex(body, flags) {
                Ok(re) => return Self::Regex(re),
                Err(e) => warn!(
                    "Invalid filter pattern {}: {}; matching it as plain text",
                    pattern, e
                ),
            }
        }
        Self::Substring(pattern.to_lowercase())
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(url),
            Self::Substring(needle) => url.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Split `/body/flags` into its parts. Flags may only be `i`, `m`, `x`.
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let rest = pattern.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);
    if flags.chars().all(|c| matches!(c, 'i' | 'm' | 'x')) {
        Some((body, flags))
    } else {
        None
    }
}

fn build_regex(body: &str, flags: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(body)
        .case_insensitive(flags.contains('i'))
        .dot_matches_new_line(flags.contains('m'))
        .ignore_whitespace(flags.contains('x'))
        .build()
}
