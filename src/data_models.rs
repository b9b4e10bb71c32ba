use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static tag pattern"));

/// A sanitized, non-empty query. Owned by a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn parse(raw: &str) -> Result<SearchQuery, SearchError> {
        let query = sanitize_text(raw);
        if query.is_empty() {
            return Err(SearchError::Validation("empty query".to_string()));
        }
        Ok(SearchQuery(query))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips markup tags and control characters, then collapses whitespace.
pub fn sanitize_text(raw: &str) -> String {
    let stripped = TAGS.replace_all(raw, " ");
    stripped
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|s| !s.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub filename: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
}

impl SearchResult {
    pub fn new(filename: impl Into<String>, text_content: impl Into<String>) -> SearchResult {
        SearchResult {
            filename: filename.into(),
            text_content: text_content.into(),
            image_url: None,
            extracted_at: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> SearchResult {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_extracted_at(mut self, at: DateTime<Utc>) -> SearchResult {
        self.extracted_at = Some(at);
        self
    }
}

/// Normalized search outcome. Result order is whatever the backend sent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub count: u64,
}

/// Raw body of `GET /api/search` on the search service.
#[derive(Deserialize, Debug)]
pub(crate) struct BackendBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<SearchResult>>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl BackendBody {
    pub(crate) fn into_response(self) -> Result<SearchResponse, SearchError> {
        if let Some(message) = self.error {
            return Err(SearchError::Domain(message));
        }
        Ok(SearchResponse {
            results: self.results.unwrap_or_default(),
            count: self.count.unwrap_or(0),
        })
    }
}

/// Lenient decoding for `extracted_at`: the service has emitted RFC 3339,
/// naive ISO-8601 and HTTP-date strings over time.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }
        for format in NAIVE_FORMATS {
            if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(at.and_utc());
            }
        }
        DateTime::parse_from_rfc2822(raw)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) => serializer.serialize_some(&at.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp {s:?}"))),
        }
    }
}
