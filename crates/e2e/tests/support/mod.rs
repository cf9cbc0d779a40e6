//! In-memory console used by the integration tests
//!
//! Elements are addressed by their exact selector string. Actions run
//! handlers registered per event (`click:<selector>`, `submit:<selector>`,
//! ...) which may change the DOM right away or after a delay on the tokio
//! clock, so paused-time tests can model slow backends.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::Instant;

use console_e2e::api::CLUSTERS_ENDPOINT;
use console_e2e::poll::Poller;
use console_e2e::{Console, E2eError, E2eResult, Observed, Page, Probe, RunConfig};

#[derive(Debug, Clone)]
pub struct Element {
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub enabled: bool,
    pub count: u64,
    /// Texts of every match, when there is more than one
    pub items: Vec<String>,
}

impl Default for Element {
    fn default() -> Self {
        Self {
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            count: 1,
            items: vec![],
        }
    }
}

type Change = Box<dyn FnOnce(&mut Dom) + Send>;
type Handler = Box<dyn FnMut(&mut Dom) + Send>;

#[derive(Default)]
pub struct Dom {
    elements: HashMap<String, Element>,
    scheduled: Vec<(Instant, Change)>,
    aborted: Vec<String>,
    cookies: HashMap<String, String>,
}

impl Dom {
    /// Insert or update a visible element with `text`
    pub fn show(&mut self, selector: &str, text: &str) -> &mut Element {
        let element = self.element(selector);
        element.text = text.to_string();
        element.visible = true;
        element
    }

    pub fn element(&mut self, selector: &str) -> &mut Element {
        self.elements.entry(selector.to_string()).or_default()
    }

    pub fn get(&self, selector: &str) -> Option<&Element> {
        self.elements.get(selector)
    }

    pub fn remove(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    /// Apply `change` once `delay` has passed
    pub fn after(&mut self, delay: Duration, change: impl FnOnce(&mut Dom) + Send + 'static) {
        self.scheduled.push((Instant::now() + delay, Box::new(change)));
    }

    /// Record a request the browser cancelled on its own
    pub fn abort(&mut self, url: &str) {
        self.aborted.push(url.to_string());
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    fn settle(&mut self) {
        loop {
            let now = Instant::now();
            let (due, pending): (Vec<_>, Vec<_>) =
                std::mem::take(&mut self.scheduled).into_iter().partition(|(at, _)| *at <= now);
            self.scheduled = pending;
            if due.is_empty() {
                return;
            }
            for (_, change) in due {
                change(self);
            }
        }
    }

    fn require(&self, action: &str, selector: &str) -> E2eResult<()> {
        match self.get(selector) {
            Some(element) if element.visible => Ok(()),
            _ => Err(E2eError::StepFailed {
                step: format!("{} {}", action, selector),
                reason: "no visible element".to_string(),
            }),
        }
    }
}

struct Inner {
    dom: Dom,
    handlers: HashMap<String, Handler>,
    actions: Vec<String>,
}

pub struct FakeConsole {
    inner: Mutex<Inner>,
}

impl FakeConsole {
    pub fn new(setup: impl FnOnce(&mut Dom)) -> Self {
        let mut dom = Dom::default();
        setup(&mut dom);
        Self {
            inner: Mutex::new(Inner {
                dom,
                handlers: HashMap::new(),
                actions: vec![],
            }),
        }
    }

    /// Run `handler` after every `event`, e.g. `click:#button-create-new-cluster`
    pub fn on(&self, event: &str, handler: impl FnMut(&mut Dom) + Send + 'static) {
        self.inner.lock().unwrap().handlers.insert(event.to_string(), Box::new(handler));
    }

    pub fn with_dom<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.inner.lock().unwrap().dom)
    }

    /// Every action performed so far, as event names
    pub fn actions(&self) -> Vec<String> {
        self.inner.lock().unwrap().actions.clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.inner.lock().unwrap().actions.iter().filter(|a| *a == event).count()
    }

    fn act(&self, event: String, apply: impl FnOnce(&mut Dom) -> E2eResult<()>) -> E2eResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let Inner { dom, handlers, actions } = &mut *inner;
        dom.settle();
        apply(dom)?;
        if let Some(handler) = handlers.get_mut(&event) {
            handler(dom);
        }
        actions.push(event);
        Ok(())
    }
}

#[async_trait]
impl Page for FakeConsole {
    async fn visit(&self, path: &str) -> E2eResult<()> {
        self.act(format!("visit:{}", path), |_| Ok(()))
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.act(format!("click:{}", selector), |dom| dom.require("click", selector))
    }

    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.act(format!("type:{}", selector), |dom| {
            dom.require("type", selector)?;
            dom.element(selector).value.push_str(text);
            Ok(())
        })
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.act(format!("fill:{}", selector), |dom| {
            dom.require("fill", selector)?;
            dom.element(selector).value = value.to_string();
            Ok(())
        })
    }

    async fn clear(&self, selector: &str) -> E2eResult<()> {
        self.act(format!("clear:{}", selector), |dom| {
            dom.require("clear", selector)?;
            dom.element(selector).value.clear();
            Ok(())
        })
    }

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()> {
        self.act(format!("press:{}:{}", selector, key), |dom| {
            dom.require("press", selector)?;
            if key == "Backspace" {
                dom.element(selector).value.pop();
            }
            Ok(())
        })
    }

    async fn submit(&self, form_selector: &str) -> E2eResult<()> {
        self.act(format!("submit:{}", form_selector), |dom| dom.require("submit", form_selector))
    }

    async fn select_option(&self, selector: &str, index: usize) -> E2eResult<()> {
        self.act(format!("select:{}", selector), |dom| {
            dom.require("select", selector)?;
            let element = dom.element(selector);
            let option = element.items.get(index).cloned().ok_or_else(|| E2eError::StepFailed {
                step: format!("select {}", selector),
                reason: format!("no option {}", index),
            })?;
            element.value = option;
            Ok(())
        })
    }

    async fn read(&self, selector: &str, probe: Probe) -> E2eResult<Observed> {
        let mut inner = self.inner.lock().unwrap();
        inner.dom.settle();
        let observed = match (inner.dom.get(selector), probe) {
            (None, Probe::Count) => Observed::Count(0),
            (None, _) => Observed::Missing,
            (Some(e), Probe::Text) => Observed::Text(e.text.clone()),
            (Some(e), Probe::Value) => Observed::Text(e.value.clone()),
            (Some(_), Probe::Exists) => Observed::Flag(true),
            (Some(e), Probe::Visible) => Observed::Flag(e.visible),
            (Some(e), Probe::Enabled) => Observed::Flag(e.enabled),
            (Some(e), Probe::Count) => Observed::Count(e.count),
            (Some(e), Probe::Texts) if e.items.is_empty() => Observed::Texts(vec![e.text.clone()]),
            (Some(e), Probe::Texts) => Observed::Texts(e.items.clone()),
        };
        Ok(observed)
    }

    async fn cookie(&self, name: &str) -> E2eResult<Option<String>> {
        Ok(self.inner.lock().unwrap().dom.cookies.get(name).cloned())
    }

    async fn take_aborted_requests(&self) -> E2eResult<Vec<String>> {
        let mut inner = self.inner.lock().unwrap();
        inner.dom.settle();
        Ok(std::mem::take(&mut inner.dom.aborted))
    }
}

/// A complete run configuration for three masters and two workers
pub fn run_config() -> RunConfig {
    run_config_with(&[])
}

pub fn run_config_with(overrides: &[(&str, &str)]) -> RunConfig {
    let mut vars: HashMap<&str, &str> = HashMap::from([
        ("API_BASE_URL", "http://127.0.0.1:9"),
        ("PULL_SECRET", "{\"auths\":{\"cloud.openshift.com\":{}}}"),
        ("SSH_PUB_KEY", "ssh-rsa AAAAB3Nza test@e2e"),
        ("CLUSTER_NAME", "test-infra-cluster"),
        ("DNS_DOMAIN_NAME", "redhat.com"),
        ("API_VIP", "192.168.126.100"),
        ("INGRESS_VIP", "192.168.126.101"),
        ("NUM_MASTERS", "3"),
        ("NUM_WORKERS", "2"),
    ]);
    vars.extend(overrides.iter().copied());
    RunConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

/// Console over `page` sampling every 100 ms
pub fn console<'a>(page: &'a FakeConsole, config: &'a RunConfig) -> Console<'a> {
    Console::new(page, config).with_poller(Poller::with_backoff(Duration::from_millis(100)))
}

/// Session token the fake installer API accepts
pub const API_TOKEN: &str = "token-1";

/// Cluster names served by [`serve_installer_api`]; push to create one
pub type ApiClusters = Arc<Mutex<Vec<String>>>;

async fn list_clusters(State(clusters): State<ApiClusters>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let expected = format!("Bearer {}", API_TOKEN);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let names = clusters.lock().unwrap().clone();
    Ok(Json(Value::Array(
        names.into_iter().map(|name| serde_json::json!({ "name": name, "status": "ready" })).collect(),
    )))
}

/// Serve the clusters endpoint on a local port, returning its base URL
pub async fn serve_installer_api(clusters: ApiClusters) -> String {
    let app = Router::new().route(CLUSTERS_ENDPOINT, get(list_clusters)).with_state(clusters);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
