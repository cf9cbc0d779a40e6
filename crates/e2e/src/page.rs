//! The browser page the harness drives
//!
//! [`Page`] is the DOM surface: selector-addressed actions plus
//! side-effect-free probes. Observations for the poller are built on top
//! of the probes.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;
use crate::poll::{Observation, Observed};

/// What to read from the elements matched by a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    /// Rendered text of the first match
    #[default]
    Text,
    /// Form value of the first match
    Value,
    Exists,
    Visible,
    Enabled,
    /// Number of matches; never `Missing`
    Count,
    /// Rendered text of every match
    Texts,
}

/// A single browsing session
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a path relative to the console base URL
    async fn visit(&self, path: &str) -> E2eResult<()>;

    async fn click(&self, selector: &str) -> E2eResult<()>;

    /// Type text key by key, appending to the current value
    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()>;

    /// Replace the value in one go
    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    async fn clear(&self, selector: &str) -> E2eResult<()>;

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()>;

    async fn submit(&self, form_selector: &str) -> E2eResult<()>;

    /// Select the option at `index` and dispatch `change`
    async fn select_option(&self, selector: &str, index: usize) -> E2eResult<()>;

    /// Read elements without touching them
    async fn read(&self, selector: &str, probe: Probe) -> E2eResult<Observed>;

    async fn cookie(&self, name: &str) -> E2eResult<Option<String>>;

    /// URLs of requests the harness cancelled since the previous call
    async fn take_aborted_requests(&self) -> E2eResult<Vec<String>>;
}

impl<'a> Observation<'a> {
    /// Observe `selector` through `probe`
    pub fn probe(page: &'a dyn Page, selector: impl Into<String>, probe: Probe) -> Self {
        let selector = selector.into();
        let description = format!("{} of {}", probe_label(probe), selector);
        Observation::new(description, move || {
            let selector = selector.clone();
            async move { page.read(&selector, probe).await }.boxed()
        })
    }

    pub fn text(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self::probe(page, selector, Probe::Text)
    }

    pub fn value(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self::probe(page, selector, Probe::Value)
    }

    pub fn exists(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self::probe(page, selector, Probe::Exists)
    }

    pub fn visible(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self::probe(page, selector, Probe::Visible)
    }

    pub fn enabled(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self::probe(page, selector, Probe::Enabled)
    }

    pub fn count(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self::probe(page, selector, Probe::Count)
    }

    pub fn texts(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self::probe(page, selector, Probe::Texts)
    }
}

fn probe_label(probe: Probe) -> &'static str {
    match probe {
        Probe::Text => "text",
        Probe::Value => "value",
        Probe::Exists => "presence",
        Probe::Visible => "visibility",
        Probe::Enabled => "enabled state",
        Probe::Count => "count",
        Probe::Texts => "texts",
    }
}
