//! Marketplace REST API client.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use marketlane_core::refund::{RefundGateway, RefundSubmission, RefundSummary, active_refund_for};
use marketlane_core::timeline::{OrderTimelineView, ResponseShape};
use marketlane_core::{
    Order, OrderId, RefundError, RefundId, RefundPolicy, RefundWorkflow, SessionContext,
    SubmitError, SubmitOutcome,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ApiError, OrderFetchError, SubmitWorkflowError};
use crate::order_detail::{self, OrderDetailSource};
use crate::submit::submit_workflow;

/// Header carrying a per-call correlation ID.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Marketplace API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct MarketClient {
    inner: Arc<MarketClientInner>,
}

struct MarketClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
    submit_timeout: Duration,
    refund_policy: RefundPolicy,
}

impl MarketClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(MarketClientInner {
                client,
                base_url: config.base_url.clone(),
                api_token: config.api_token.clone(),
                submit_timeout: config.submit_timeout,
                refund_policy: config.refund_policy,
            }),
        })
    }

    /// Cap and fee schedule refund workflows are started with.
    #[must_use]
    pub fn refund_policy(&self) -> RefundPolicy {
        self.inner.refund_policy
    }

    /// How long a refund submission may take before it counts as failed.
    #[must_use]
    pub fn submit_timeout(&self) -> Duration {
        self.inner.submit_timeout
    }

    /// Build an absolute endpoint URL from a path relative to the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request_id = Uuid::new_v4();
        debug!(%method, %url, %request_id, "API request");
        let builder = self
            .inner
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        match &self.inner.api_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Read a JSON body, turning non-2xx responses into `ApiError::Api`.
    async fn json_body(response: Response) -> Result<Value, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Load the canonical timeline view, falling back to the legacy endpoint.
    ///
    /// # Errors
    ///
    /// Returns `OrderFetchError` if neither endpoint yields a usable body.
    pub async fn order_timeline(
        &self,
        order_id: &OrderId,
    ) -> Result<OrderTimelineView, OrderFetchError> {
        order_detail::load_order_timeline(self, order_id).await
    }

    /// Load the full order model.
    ///
    /// # Errors
    ///
    /// Returns `OrderFetchError` if the legacy endpoint fails.
    pub async fn order(&self, order_id: &OrderId) -> Result<Order, OrderFetchError> {
        order_detail::fetch_order(self, order_id).await
    }

    // =========================================================================
    // Refunds
    // =========================================================================

    /// List the signed-in buyer's refund requests.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn my_refunds(&self) -> Result<Vec<RefundSummary>, ApiError> {
        let url = self.endpoint("refunds/mine/")?;
        let response = self.request(Method::GET, url).send().await?;
        let body = Self::json_body(response).await?;
        parse_refund_list(body)
    }

    /// Resolve a refund ID to its current record.
    ///
    /// # Errors
    ///
    /// Returns error if the listing cannot be loaded.
    #[instrument(skip(self), fields(refund_id = %refund_id))]
    pub async fn find_refund(&self, refund_id: &RefundId) -> Result<Option<RefundSummary>, ApiError> {
        let refunds = self.my_refunds().await?;
        Ok(marketlane_core::refund::find_refund(&refunds, refund_id).cloned())
    }

    /// Start a refund workflow on `order` under the configured policy.
    ///
    /// # Errors
    ///
    /// See [`RefundWorkflow::start`].
    pub fn start_refund(
        &self,
        order: Order,
        context: SessionContext,
        now: DateTime<Utc>,
    ) -> Result<RefundWorkflow, RefundError> {
        RefundWorkflow::start(order, context, now, self.inner.refund_policy)
    }

    /// Submit a workflow at review through this client, bounded by the
    /// configured submit timeout.
    ///
    /// # Errors
    ///
    /// See [`submit_workflow`].
    pub async fn submit(
        &self,
        workflow: &mut RefundWorkflow,
    ) -> Result<SubmitOutcome, SubmitWorkflowError> {
        submit_workflow(workflow, self, self.inner.submit_timeout).await
    }

    /// The active refund request on an order, looked up from the listing.
    async fn active_refund_id(&self, order_id: &OrderId) -> Option<RefundId> {
        match self.my_refunds().await {
            Ok(refunds) => active_refund_for(&refunds, order_id).map(|r| r.refund_id.clone()),
            Err(e) => {
                warn!(%order_id, error = %e, "Could not look up existing refund");
                None
            }
        }
    }
}

impl OrderDetailSource for MarketClient {
    #[instrument(skip(self), fields(endpoint = %shape, order_id = %order_id))]
    async fn fetch_order_detail(
        &self,
        shape: ResponseShape,
        order_id: &OrderId,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(&format!("orders/{order_id}/{}/", shape.as_str()))?;
        let response = self.request(Method::GET, url).send().await?;
        Self::json_body(response).await
    }
}

impl RefundGateway for MarketClient {
    #[instrument(skip(self, submission), fields(order_id = %submission.order_id))]
    async fn submit_refund(&self, submission: &RefundSubmission) -> Result<RefundId, SubmitError> {
        let url = self.endpoint("refunds/").map_err(SubmitError::from)?;
        let response = self
            .request(Method::POST, url)
            .json(submission)
            .send()
            .await
            .map_err(|e| SubmitError::from(ApiError::from(e)))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let existing = match extract_refund_id(&body) {
                Some(id) => Some(id),
                None => self.active_refund_id(&submission.order_id).await,
            };
            return match existing {
                Some(refund_id) => Err(SubmitError::Conflict { refund_id }),
                None => Err(SubmitError::Rejected {
                    status: status.as_u16(),
                    message: "refund request already exists".to_string(),
                }),
            };
        }

        // From here on the request exists; only its ID may be missing.
        let body = match Self::json_body(response).await {
            Ok(body) => body,
            Err(ApiError::Parse(e)) => {
                warn!(error = %e, "Refund created but response was not JSON");
                Value::Null
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(refund_id) = extract_refund_id(&body) {
            return Ok(refund_id);
        }
        match self.active_refund_id(&submission.order_id).await {
            Some(refund_id) => Ok(refund_id),
            None => Err(SubmitError::CreatedWithoutId(
                "response had no refund ID and none is listed yet".to_string(),
            )),
        }
    }
}

/// Find a refund ID in a submit or conflict response.
///
/// Accepts `refund_id`, `existing_refund_id` or `id`, at the top level or
/// under `data`, as a string or a number.
fn extract_refund_id(body: &Value) -> Option<RefundId> {
    let candidates = [body, body.get("data").unwrap_or(&Value::Null)];
    candidates.into_iter().find_map(|obj| {
        ["refund_id", "existing_refund_id", "id"]
            .into_iter()
            .find_map(|key| match obj.get(key)? {
                Value::String(s) if !s.trim().is_empty() => Some(RefundId::new(s.trim())),
                Value::Number(n) => Some(RefundId::new(n.to_string())),
                _ => None,
            })
    })
}

/// Parse a my-refunds body: a bare array, or one under `data` or `refunds`.
fn parse_refund_list(body: Value) -> Result<Vec<RefundSummary>, ApiError> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut obj) => obj
            .remove("data")
            .or_else(|| obj.remove("refunds"))
            .ok_or_else(|| ApiError::Parse("refund list not found in response".to_string()))?,
        _ => return Err(ApiError::Parse("unexpected refund list body".to_string())),
    };
    serde_json::from_value(list).map_err(|e| ApiError::Parse(e.to_string()))
}
