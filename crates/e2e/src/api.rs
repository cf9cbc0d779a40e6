//! Assisted installer API access
//!
//! Checks that cross the UI boundary go straight to the REST API, with the
//! session token the console stored in its `cs_jwt` cookie when one is set.

use std::time::Duration;

use futures::FutureExt;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::page::Page;
use crate::poll::{Expectation, Observation, Observed, Poller};

/// Endpoint listing every cluster
pub const CLUSTERS_ENDPOINT: &str = "/api/assisted-install/v1/clusters";

/// Cookie holding the OCM API token
pub const SESSION_COOKIE: &str = "cs_jwt";

/// Response of an API call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Thin client over the installer REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> E2eResult<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call `{base_url}{postfix}`.
    ///
    /// With `fail_on_status`, a non-2xx answer is an [`E2eError::Api`].
    pub async fn call(
        &self,
        method: Method,
        postfix: &str,
        body: Option<&Value>,
        fail_on_status: bool,
        bearer: Option<&str>,
    ) -> E2eResult<ApiResponse> {
        let url = format!("{}{}", self.base_url, postfix);
        let mut request = self.client.request(method.clone(), &url);

        if let Some(token) = bearer {
            debug!("Using session token for {} {}", method, url);
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if fail_on_status && !status.is_success() {
            return Err(E2eError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body: parse_body(&text),
        })
    }

    /// Names of every cluster the API knows about
    pub async fn list_cluster_names(&self, bearer: Option<&str>) -> E2eResult<Vec<String>> {
        let response = self.call(Method::GET, CLUSTERS_ENDPOINT, None, true, bearer).await?;
        cluster_names(&response.body)
    }

    /// Wait until the API answers at all
    pub async fn wait_until_reachable(&self, poller: &Poller, deadline: Duration) -> E2eResult<()> {
        let observation = Observation::new(format!("reachability of {}", self.base_url), move || {
            async move {
                let response = self.client.get(&self.base_url).send().await?;
                Ok(Observed::Flag(response.status() < StatusCode::INTERNAL_SERVER_ERROR))
            }
            .boxed()
        });
        poller.wait_for(&observation, &Expectation::IsTrue, deadline).await?;
        info!("API is reachable at {}", self.base_url);
        Ok(())
    }
}

/// Session token from the console's cookie, if it has one
pub async fn bearer_from(page: &dyn Page) -> E2eResult<Option<String>> {
    page.cookie(SESSION_COOKIE).await
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn cluster_names(body: &Value) -> E2eResult<Vec<String>> {
    let clusters = body
        .as_array()
        .ok_or_else(|| E2eError::AssertionFailed(format!("cluster list is not an array: {}", body)))?;
    Ok(clusters
        .iter()
        .filter_map(|c| c.get("name").and_then(Value::as_str))
        .map(String::from)
        .collect())
}

impl<'a> Observation<'a> {
    /// Cluster names as listed by the API
    pub fn cluster_names(api: &'a ApiClient, bearer: Option<String>) -> Self {
        Observation::new(format!("clusters listed at {}{}", api.base_url(), CLUSTERS_ENDPOINT), move || {
            let bearer = bearer.clone();
            async move { api.list_cluster_names(bearer.as_deref()).await.map(Observed::Texts) }.boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    async fn clusters(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer token-1") => Ok(Json(serde_json::json!([
                { "name": "test-infra-cluster", "status": "ready" },
                { "name": "test-dummy-cluster", "status": "insufficient" }
            ]))),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }

    async fn serve() -> String {
        let app = Router::new()
            .route(CLUSTERS_ENDPOINT, get(clusters))
            .route("/", get(|| async { "ok" }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_list_cluster_names_with_bearer() {
        let api = ApiClient::new(serve().await, Duration::from_secs(5)).unwrap();
        let names = api.list_cluster_names(Some("token-1")).await.unwrap();
        assert_eq!(names, vec!["test-infra-cluster", "test-dummy-cluster"]);
    }

    #[tokio::test]
    async fn test_fail_on_status() {
        let api = ApiClient::new(serve().await, Duration::from_secs(5)).unwrap();

        let err = api.list_cluster_names(None).await.unwrap_err();
        assert!(matches!(err, E2eError::Api { status: 401, .. }));

        let response = api.call(Method::GET, CLUSTERS_ENDPOINT, None, false, None).await.unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.body, Value::Null);
    }

    #[tokio::test]
    async fn test_cluster_presence_is_observable() {
        let api = ApiClient::new(serve().await, Duration::from_secs(5)).unwrap();
        let poller = Poller::with_backoff(Duration::from_millis(10));

        api.wait_until_reachable(&poller, Duration::from_secs(5)).await.unwrap();

        let observation = Observation::cluster_names(&api, Some("token-1".to_string()));
        let present = poller
            .poll(&observation, &Expectation::includes("test-dummy-cluster"), Duration::from_secs(1))
            .await;
        assert!(present.is_satisfied());

        let absent = poller
            .poll(&observation, &Expectation::includes("nope"), Duration::from_millis(50))
            .await;
        assert!(!absent.is_satisfied());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("[1]"), serde_json::json!([1]));
        assert_eq!(parse_body("oops"), Value::String("oops".into()));
        assert!(cluster_names(&serde_json::json!({})).is_err());
    }
}
