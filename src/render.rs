use askama::Template;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

use crate::data_models::SearchResponse;
use crate::error::SearchError;
use crate::highlight::{Fragment, highlight};

pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// What an instance's results region shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ResultsView {
    Loading,
    NoResults { query: String },
    Results(ResultsPage),
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsPage {
    pub query: String,
    pub count: u64,
    pub cards: Vec<ResultCard>,
}

impl ResultsPage {
    pub fn stats_line(&self) -> String {
        let noun = if self.count == 1 { "result" } else { "results" };
        format!("Found {} {noun} for \"{}\"", self.count, self.query)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultCard {
    pub index: usize,
    pub filename: String,
    pub extracted_on: Option<String>,
    pub text: Vec<Fragment>,
    pub image_url: Option<String>,
}

impl ResultCard {
    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }
}

impl ResultsView {
    pub fn card(&self, index: usize) -> Option<&ResultCard> {
        match self {
            ResultsView::Results(page) => page.cards.get(index),
            _ => None,
        }
    }

    /// Markup for the results region of instance `instance_id`. Every string from
    /// the backend is escaped; highlight spans are the only markup added to text.
    pub fn to_html(&self, instance_id: &str) -> Result<String, askama::Error> {
        match self {
            ResultsView::Loading => LoadingTemplate.render(),
            ResultsView::NoResults { query } => NoResultsTemplate { query }.render(),
            ResultsView::Results(page) => ResultsTemplate { page, instance_id }.render(),
            ResultsView::Error { message } => ErrorTemplate { message }.render(),
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<div class="loading">Searching through extracted text...</div>"#,
    ext = "html"
)]
struct LoadingTemplate;

#[derive(Template)]
#[template(
    source = r#"<div class="no-results">No results found for "{{ query }}"<br><small>Try different keywords or check spelling</small></div>"#,
    ext = "html"
)]
struct NoResultsTemplate<'a> {
    query: &'a str,
}

#[derive(Template)]
#[template(source = r#"<div class="error">Error: {{ message }}</div>"#, ext = "html")]
struct ErrorTemplate<'a> {
    message: &'a str,
}

#[derive(Template)]
#[template(path = "results.html")]
struct ResultsTemplate<'a> {
    page: &'a ResultsPage,
    instance_id: &'a str,
}

/// Turns normalized responses and errors into [`ResultsView`]s.
#[derive(Debug, Clone)]
pub struct Renderer {
    date_format: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new(DEFAULT_DATE_FORMAT)
    }
}

impl Renderer {
    pub fn new(date_format: impl Into<String>) -> Renderer {
        Renderer {
            date_format: date_format.into(),
        }
    }

    pub fn render(&self, response: &SearchResponse, query: &str) -> ResultsView {
        if response.results.is_empty() {
            return ResultsView::NoResults {
                query: query.to_string(),
            };
        }

        let cards = response
            .results
            .iter()
            .enumerate()
            .map(|(index, result)| ResultCard {
                index,
                filename: result.filename.clone(),
                extracted_on: result.extracted_at.map(|at| self.format_date(at)),
                text: highlight(&result.text_content, query),
                image_url: result
                    .image_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string),
            })
            .collect();

        ResultsView::Results(ResultsPage {
            query: query.to_string(),
            count: response.count,
            cards,
        })
    }

    pub fn render_error(&self, error: &SearchError) -> ResultsView {
        ResultsView::Error {
            message: error.user_message(),
        }
    }

    pub fn render_outcome(
        &self,
        outcome: &Result<SearchResponse, SearchError>,
        query: &str,
    ) -> ResultsView {
        match outcome {
            Ok(response) => self.render(response, query),
            Err(e) => self.render_error(e),
        }
    }

    fn format_date(&self, at: DateTime<Utc>) -> String {
        let mut out = String::new();
        if write!(out, "{}", at.format(&self.date_format)).is_err() {
            out = at.date_naive().to_string();
        }
        out
    }
}
