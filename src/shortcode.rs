//! Expands `[text_search ...]` placement directives in host page content.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::widget::WidgetOptions;

static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[text_search(?P<attrs>(?:\s[^\]]*)?)\]").expect("static directive pattern")
});

static ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<key>[A-Za-z_][\w-]*)\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"']+))"#)
        .expect("static attribute pattern")
});

/// Reads directive attributes onto widget options; unknown keys are ignored.
pub fn parse_options(attrs: &str) -> WidgetOptions {
    let mut options = WidgetOptions::default();
    for caps in ATTR.captures_iter(attrs) {
        let value = ["dq", "sq", "bare"]
            .iter()
            .find_map(|name| caps.name(name))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if caps["key"].eq_ignore_ascii_case("placeholder") {
            options.placeholder = value.to_string();
        }
    }
    options
}

/// Replaces every directive in `content` with the output of `embed`, one call per
/// occurrence. Text outside directives is left as is.
pub fn expand<F, E>(content: &str, mut embed: F) -> Result<String, E>
where
    F: FnMut(WidgetOptions) -> Result<String, E>,
{
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for caps in DIRECTIVE.captures_iter(content) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        out.push_str(&content[last..whole.start]);
        out.push_str(&embed(options_from(&caps))?);
        last = whole.end;
    }
    out.push_str(&content[last..]);
    Ok(out)
}

fn options_from(caps: &Captures<'_>) -> WidgetOptions {
    parse_options(caps.name("attrs").map(|m| m.as_str()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::DEFAULT_PLACEHOLDER;
    use std::convert::Infallible;

    fn expand_to_placeholders(content: &str) -> String {
        expand(content, |options| {
            Ok::<_, Infallible>(format!("<W:{}>", options.placeholder))
        })
        .unwrap()
    }

    #[test]
    fn test_default_placeholder() {
        assert_eq!(parse_options("").placeholder, DEFAULT_PLACEHOLDER);
        assert_eq!(
            expand_to_placeholders("before [text_search] after"),
            format!("before <W:{DEFAULT_PLACEHOLDER}> after")
        );
    }

    #[test]
    fn test_quoted_and_bare_attributes() {
        assert_eq!(parse_options(r#" placeholder="Find a receipt""#).placeholder, "Find a receipt");
        assert_eq!(parse_options(" placeholder='Single quoted'").placeholder, "Single quoted");
        assert_eq!(parse_options(" placeholder=bare").placeholder, "bare");
        assert_eq!(parse_options(r#" PLACEHOLDER="caps""#).placeholder, "caps");
    }

    #[test]
    fn test_unknown_attributes_ignored() {
        let options = parse_options(r#" color="red" placeholder="ok" size=3"#);
        assert_eq!(options.placeholder, "ok");
    }

    #[test]
    fn test_each_occurrence_gets_its_own_widget() {
        let mut calls = 0;
        let out = expand("[text_search][text_search placeholder=\"two\"]", |options| {
            calls += 1;
            Ok::<_, Infallible>(format!("#{calls}:{}", options.placeholder))
        })
        .unwrap();
        assert_eq!(out, format!("#1:{DEFAULT_PLACEHOLDER}#2:two"));
    }

    #[test]
    fn test_other_shortcodes_untouched() {
        let content = "[text_searcher] [gallery] [text_search_x]";
        assert_eq!(expand_to_placeholders(content), content);
    }

    #[test]
    fn test_error_stops_expansion() {
        let result = expand("[text_search]", |_| Err("boom"));
        assert_eq!(result, Err("boom"));
    }
}
