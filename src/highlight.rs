//! Case-insensitive literal highlighting of a query inside result text.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// A run of text that either matched the query or did not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub text: String,
    pub matched: bool,
}

impl Fragment {
    fn plain(text: &str) -> Fragment {
        Fragment {
            text: text.to_string(),
            matched: false,
        }
    }

    fn hit(text: &str) -> Fragment {
        Fragment {
            text: text.to_string(),
            matched: true,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched
    }
}

fn literal_matcher(query: &str) -> Option<Regex> {
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Splits `text` into fragments, marking every occurrence of `query`.
///
/// The query is always a literal: metacharacters are escaped before matching.
/// Matches keep the casing found in `text`, and adjacent matches stay separate
/// fragments.
pub fn highlight(text: &str, query: &str) -> Vec<Fragment> {
    if text.is_empty() {
        return Vec::new();
    }
    if query.is_empty() {
        return vec![Fragment::plain(text)];
    }
    let Some(matcher) = literal_matcher(query) else {
        return vec![Fragment::plain(text)];
    };

    let mut fragments = Vec::new();
    let mut last = 0;
    for m in matcher.find_iter(text) {
        if m.start() > last {
            fragments.push(Fragment::plain(&text[last..m.start()]));
        }
        fragments.push(Fragment::hit(m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        fragments.push(Fragment::plain(&text[last..]));
    }
    fragments
}

/// String form of [`highlight`]: wraps each match in `open`/`close`.
/// Returns `text` unchanged when either `text` or `query` is empty.
pub fn mark(text: &str, query: &str, open: &str, close: &str) -> String {
    highlight(text, query)
        .into_iter()
        .map(|f| {
            if f.matched {
                format!("{open}{}{close}", f.text)
            } else {
                f.text
            }
        })
        .collect()
}
