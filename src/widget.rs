use askama::Template;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::data_models::sanitize_text;
use crate::error::WidgetError;
use crate::pipeline::SearchPipeline;
use crate::render::{Renderer, ResultsView};
use crate::security::AntiForgeryToken;

pub const DEFAULT_PLACEHOLDER: &str = "Enter text to search...";
pub const ID_PREFIX: &str = "text_search_";
/// Where widget scripts post their searches.
pub const AJAX_PATH: &str = "/admin-ajax";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOptions {
    pub placeholder: String,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        WidgetOptions {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Identifies one issued request of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    query: String,
}

impl Ticket {
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    /// A newer request was issued after this one; its view was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    Background,
    CloseControl,
    CancelKey,
}

/// State of one mounted widget. Nothing in here is shared between instances.
#[derive(Debug)]
pub struct WidgetInstance {
    id: String,
    input_value: String,
    busy: bool,
    issued: u64,
    latest: Option<Ticket>,
    region: Option<ResultsView>,
    // open overlays, the one being viewed last
    open_overlays: Vec<usize>,
}

impl WidgetInstance {
    pub fn new(id: impl Into<String>) -> WidgetInstance {
        WidgetInstance {
            id: id.into(),
            input_value: String::new(),
            busy: false,
            issued: 0,
            latest: None,
            region: None,
            open_overlays: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input_value = value.into();
    }

    pub fn input_value(&self) -> &str {
        &self.input_value
    }

    /// Advisory only: a second submit while busy is still accepted.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn latest_query(&self) -> Option<&str> {
        self.latest.as_ref().map(Ticket::query)
    }

    pub fn region(&self) -> Option<&ResultsView> {
        self.region.as_ref()
    }

    pub fn region_html(&self) -> Result<String, askama::Error> {
        match &self.region {
            Some(view) => view.to_html(&self.id),
            None => Ok(String::new()),
        }
    }

    /// Records a new request as the latest one and shows the loading state.
    pub fn begin(&mut self, query: &str) -> Ticket {
        self.issued += 1;
        let ticket = Ticket {
            generation: self.issued,
            query: query.trim().to_string(),
        };
        self.latest = Some(ticket.clone());
        self.busy = true;
        self.replace_region(ResultsView::Loading);
        ticket
    }

    /// Applies `view` only if `ticket` is still the latest request.
    pub fn complete(&mut self, ticket: &Ticket, view: ResultsView) -> Delivery {
        if self.latest.as_ref() != Some(ticket) {
            log::debug!(
                "{}: dropping response for superseded request #{}",
                self.id,
                ticket.generation
            );
            return Delivery::Discarded;
        }
        self.busy = false;
        self.replace_region(view);
        Delivery::Applied
    }

    pub fn open_overlay(&mut self, index: usize) -> Result<(), WidgetError> {
        let has_image = self
            .region
            .as_ref()
            .and_then(|view| view.card(index))
            .is_some_and(|card| card.has_image());
        if !has_image {
            return Err(WidgetError::NoSuchOverlay { index });
        }
        self.open_overlays.retain(|&open| open != index);
        self.open_overlays.push(index);
        Ok(())
    }

    /// Closes the overlay being viewed, if any.
    pub fn close_overlay(&mut self, trigger: CloseTrigger) -> Option<usize> {
        let closed = self.open_overlays.pop();
        if let Some(index) = closed {
            log::debug!("{}: closed overlay {index} via {trigger:?}", self.id);
        }
        closed
    }

    pub fn viewing_overlay(&self) -> Option<usize> {
        self.open_overlays.last().copied()
    }

    pub fn is_overlay_open(&self, index: usize) -> bool {
        self.open_overlays.contains(&index)
    }

    /// Host scrolling stays suppressed while any overlay of this instance is open.
    pub fn scroll_locked(&self) -> bool {
        !self.open_overlays.is_empty()
    }

    fn replace_region(&mut self, view: ResultsView) {
        self.open_overlays.clear();
        self.region = Some(view);
    }
}

#[derive(Template)]
#[template(path = "widget.html")]
struct WidgetTemplate<'a> {
    id: &'a str,
    placeholder: &'a str,
    nonce: &'a str,
    endpoint: &'a str,
}

fn widget_markup(id: &str, placeholder: &str, token: &AntiForgeryToken) -> Result<String, askama::Error> {
    WidgetTemplate {
        id,
        placeholder,
        nonce: token.as_str(),
        endpoint: AJAX_PATH,
    }
    .render()
}

pub fn new_instance_id() -> String {
    format!("{ID_PREFIX}{}", nanoid::nanoid!(12))
}

/// A mounted, in-process widget: its state plus the collaborators it drives.
#[derive(Clone)]
pub struct WidgetHandle {
    id: Arc<str>,
    placeholder: Arc<str>,
    token: AntiForgeryToken,
    state: Arc<Mutex<WidgetInstance>>,
    pipeline: Arc<SearchPipeline>,
    renderer: Arc<Renderer>,
}

impl WidgetHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub async fn lock(&self) -> MutexGuard<'_, WidgetInstance> {
        self.state.lock().await
    }

    pub async fn set_input(&self, value: impl Into<String>) {
        self.state.lock().await.set_input(value);
    }

    /// Submits the current input. The lock is released while the request is out,
    /// so overlapping submits from the same instance are allowed; whichever was
    /// issued last is the one that gets rendered.
    pub async fn submit(&self) -> Delivery {
        let ticket = {
            let mut state = self.state.lock().await;
            let query = state.input_value().to_string();
            state.begin(&query)
        };

        let outcome = self
            .pipeline
            .search(ticket.query(), self.token.as_str())
            .await;
        let view = self
            .renderer
            .render_outcome(&outcome, &sanitize_text(ticket.query()));

        self.state.lock().await.complete(&ticket, view)
    }

    pub async fn search(&self, query: impl Into<String>) -> Delivery {
        self.set_input(query).await;
        self.submit().await
    }

    pub fn markup(&self) -> Result<String, askama::Error> {
        widget_markup(&self.id, &self.placeholder, &self.token)
    }
}

/// Markup for a widget whose state lives in the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    pub id: String,
    pub markup: String,
}

/// Creates widget instances with ids unique among live instances.
pub struct WidgetManager {
    instances: DashMap<String, WidgetHandle>,
    pipeline: Arc<SearchPipeline>,
    renderer: Arc<Renderer>,
}

impl WidgetManager {
    pub fn new(pipeline: Arc<SearchPipeline>, renderer: Arc<Renderer>) -> WidgetManager {
        WidgetManager {
            instances: DashMap::new(),
            pipeline,
            renderer,
        }
    }

    pub fn mount(&self, options: WidgetOptions, token: AntiForgeryToken) -> WidgetHandle {
        loop {
            let id = new_instance_id();
            if let Entry::Vacant(slot) = self.instances.entry(id.clone()) {
                let handle = WidgetHandle {
                    id: Arc::from(id.as_str()),
                    placeholder: Arc::from(options.placeholder.as_str()),
                    token,
                    state: Arc::new(Mutex::new(WidgetInstance::new(id.as_str()))),
                    pipeline: self.pipeline.clone(),
                    renderer: self.renderer.clone(),
                };
                slot.insert(handle.clone());
                log::debug!("mounted widget {id}");
                return handle;
            }
        }
    }

    pub fn embed(
        &self,
        options: &WidgetOptions,
        token: &AntiForgeryToken,
    ) -> Result<Embedding, askama::Error> {
        let id = loop {
            let id = new_instance_id();
            if !self.instances.contains_key(&id) {
                break id;
            }
        };
        let markup = widget_markup(&id, &options.placeholder, token)?;
        Ok(Embedding { id, markup })
    }

    pub fn get(&self, id: &str) -> Option<WidgetHandle> {
        self.instances.get(id).map(|entry| entry.value().clone())
    }

    pub fn unmount(&self, id: &str) -> bool {
        let removed = self.instances.remove(id).is_some();
        if removed {
            log::debug!("unmounted widget {id}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
