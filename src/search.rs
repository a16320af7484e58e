//! Search-string matching for the note list.
//!
//! Two modes: `gstyle`, where the string is split into `tag:` filters,
//! quoted phrases and bare words that must all match, and `regexp`, where
//! the whole string is one regular expression.

use regex::{Regex, RegexBuilder};

use crate::config::{Config, SearchMode};
use crate::note::Note;
use crate::tags::note_has_tag_prefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub case_sensitive: bool,
    pub search_tags: bool,
}

impl SearchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.search_mode,
            case_sensitive: config.case_sensitive,
            search_tags: config.search_tags,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { mode: SearchMode::Gstyle, case_sensitive: false, search_tags: true }
    }
}

/// Parsed gstyle query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GstyleQuery {
    pub tags: Vec<String>,
    pub terms: Vec<String>,
}

pub fn parse_gstyle(search: &str) -> GstyleQuery {
    let mut query = GstyleQuery::default();
    let mut rest = search.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('"') {
            let end = after.find('"').unwrap_or(after.len());
            let phrase = &after[..end];
            if !phrase.is_empty() {
                query.terms.push(phrase.to_string());
            }
            rest = after.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let word = &rest[..end];
            match word.strip_prefix("tag:") {
                Some(tag) if !tag.is_empty() => query.tags.push(tag.to_string()),
                Some(_) => {}
                None => query.terms.push(word.to_string()),
            }
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }
    query
}

/// Compiled matcher for one search string.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// No search string, or an invalid regexp: everything matches.
    All,
    Gstyle { query: GstyleQuery, options: SearchOptions },
    Regexp { regex: Regex, search_tags: bool, case_sensitive: bool },
}

impl Matcher {
    pub fn build(search: Option<&str>, options: SearchOptions) -> Self {
        let Some(search) = search.filter(|s| !s.trim().is_empty()) else {
            return Matcher::All;
        };
        match options.mode {
            SearchMode::Gstyle => {
                let query = parse_gstyle(search);
                if query.tags.is_empty() && query.terms.is_empty() {
                    Matcher::All
                } else {
                    Matcher::Gstyle { query, options }
                }
            }
            SearchMode::Regexp => {
                match RegexBuilder::new(search)
                    .case_insensitive(!options.case_sensitive)
                    .build()
                {
                    Ok(regex) => Matcher::Regexp {
                        regex,
                        search_tags: options.search_tags,
                        case_sensitive: options.case_sensitive,
                    },
                    Err(err) => {
                        tracing::debug!(%err, "invalid search regexp; matching all notes");
                        Matcher::All
                    }
                }
            }
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Gstyle { query, options } => {
                query.tags.iter().all(|t| note_has_tag_prefix(note, t))
                    && query.terms.iter().all(|term| {
                        contains(&note.content, term, options.case_sensitive)
                            || (options.search_tags
                                && note
                                    .tags
                                    .iter()
                                    .any(|t| contains(t, term, options.case_sensitive)))
                    })
            }
            Matcher::Regexp { regex, search_tags, .. } => {
                regex.is_match(&note.content)
                    || (*search_tags && note.tags.iter().any(|t| regex.is_match(t)))
            }
        }
    }

    /// Regex source matching whatever this search looks for in note text,
    /// empty when nothing is searched.
    pub fn pattern(&self) -> String {
        match self {
            Matcher::All => String::new(),
            Matcher::Gstyle { query, options } => {
                if query.terms.is_empty() {
                    return String::new();
                }
                let alternation = query
                    .terms
                    .iter()
                    .map(|t| regex::escape(t))
                    .collect::<Vec<_>>()
                    .join("|");
                if options.case_sensitive {
                    alternation
                } else {
                    format!("(?i){alternation}")
                }
            }
            Matcher::Regexp { regex, case_sensitive: true, .. } => regex.as_str().to_string(),
            Matcher::Regexp { regex, .. } => format!("(?i){}", regex.as_str()),
        }
    }
}

fn contains(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}
