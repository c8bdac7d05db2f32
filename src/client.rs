//! HTTP client core for the sitedesk console
//!
//! Every backend call goes through [`HttpClient::execute`], which attaches the
//! bearer token, classifies the outcome and transparently refreshes an expired
//! session before replaying the request once.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use sitedesk_protocol::Envelope;

use crate::config::ClientConfig;
use crate::error::{DeskError, Result};
use crate::events::{InvalidationReason, SessionCallback, SessionEvent, SessionEvents};
use crate::interceptor::{self, Disposition, REFRESH_PATH};
use crate::notice::{Notice, NoticeCallback, Notifier};
use crate::refresh::{AuthState, RefreshCoordinator};
use crate::scheduler::{ProactiveScheduler, ScheduleOutcome};
use crate::store::TokenStore;

// ============================================================================
// Request and response model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// One owned multipart field, so a request can be sent again after a refresh
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    /// Read `path` into a file field
    pub async fn file(name: impl Into<String>, path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DeskError::file_not_found(path.display().to_string()));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DeskError::io_from_error(format!("Reading {}", path.display()), e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            name: name.into(),
            value: FormValue::File {
                mime: guess_mime(path).map(str::to_string),
                file_name,
                bytes,
            },
        })
    }
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Filled in by the request interceptor
    pub bearer: Option<String>,
    /// Set once the request has been replayed after a refresh
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            bearer: None,
            retried: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }
}

/// A response as received, before classification
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub authorization: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Token carried in the `Authorization` response header
    pub fn bearer_token(&self) -> Option<String> {
        let value = self.authorization.as_deref()?.trim();
        let token = match value.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => value,
        };
        (!token.is_empty()).then(|| token.to_string())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            DeskError::invalid_response(format!("Invalid API response ({}): {}", e, self.body))
        })
    }

    /// Parse the standard envelope; an empty body counts as success.
    pub fn envelope(&self) -> Result<Envelope> {
        if self.body.trim().is_empty() {
            return Ok(Envelope {
                status: sitedesk_protocol::STATUS_SUCCESS.to_string(),
                ..Envelope::default()
            });
        }

        let envelope: Envelope = self.json()?;
        if !envelope.is_success() {
            let message = envelope
                .message
                .clone()
                .unwrap_or_else(|| format!("Request failed with status '{}'", envelope.status));
            return Err(DeskError::api_with_body(
                self.status,
                message,
                serde_json::from_str(&self.body).ok(),
            ));
        }
        Ok(envelope)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Sends one request and returns whatever came back.
///
/// A transport reports a missing response as a network error and never
/// interprets statuses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        // The refresh endpoint authenticates with an HTTP-only cookie
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let url = self.config.endpoint_url(&request.endpoint);

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder.header(CONTENT_TYPE, "application/json"),
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let authorization = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if self.config.verbose {
            debug!(method = %request.method, %url, status, "HTTP exchange");
        }

        Ok(RawResponse {
            status,
            authorization,
            body,
        })
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match &part.value {
            FormValue::Text(text) => form.text(part.name.clone(), text.clone()),
            FormValue::File {
                file_name,
                mime,
                bytes,
            } => {
                let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file.mime_str(mime)?;
                }
                form.part(part.name.clone(), file)
            }
        };
    }
    Ok(form)
}

// ============================================================================
// Client
// ============================================================================

/// Where a refresh was started from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
    /// A request came back 401
    Reactive,
    /// The timer fired ahead of expiry
    Proactive,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    store: Arc<TokenStore>,
    coordinator: RefreshCoordinator,
    scheduler: ProactiveScheduler,
    notifier: Notifier,
    events: SessionEvents,
}

/// Shared client; clones share one session, coordinator and timer
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.config.base_url)
            .field("state", &self.inner.coordinator.state())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Client backed by reqwest and the configured session file
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        let store = Arc::new(TokenStore::new(&config.session_storage)?);
        Ok(Self::with_transport(config, transport, store))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<TokenStore>,
    ) -> Self {
        let inner = ClientInner {
            scheduler: ProactiveScheduler::new(config.refresh_lead()),
            notifier: Notifier::new(config.notice_window()),
            coordinator: RefreshCoordinator::new(),
            events: SessionEvents::new(),
            config,
            transport,
            store,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub fn auth_state(&self) -> AuthState {
        self.inner.coordinator.state()
    }

    pub fn has_scheduled_refresh(&self) -> bool {
        self.inner.scheduler.is_armed()
    }

    pub fn set_event_callback(&self, callback: SessionCallback) {
        self.inner.events.subscribe(callback);
    }

    pub fn set_notice_callback(&self, callback: NoticeCallback) {
        self.inner.notifier.set_callback(callback);
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        self.inner.events.emit(event);
    }

    /// Attach credentials and send once, without classification.
    pub(crate) async fn dispatch(&self, request: &mut ApiRequest) -> Result<RawResponse> {
        interceptor::attach_credentials(request, &self.inner.store);
        self.inner.transport.send(request).await
    }

    /// Send `request` through the full pipeline.
    ///
    /// A 401 on a non-exempt request is resolved by refreshing the session and
    /// replaying the request once; callers only see it if the refresh fails.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<RawResponse> {
        loop {
            let outcome = self.dispatch(&mut request).await;
            let disposition = interceptor::classify(&request, &outcome);

            let response = match outcome {
                Ok(response) => response,
                Err(e) => {
                    if disposition == Disposition::NetworkUnreachable {
                        self.inner.notifier.notify(Notice::network_unreachable());
                    }
                    return Err(e);
                }
            };

            match disposition {
                Disposition::Deliver => return Ok(response),
                Disposition::ServerFault(status) => {
                    self.inner.notifier.notify(Notice::server_fault(status));
                    return Err(interceptor::error_from_response(&response));
                }
                Disposition::Refresh => {
                    debug!(endpoint = %request.endpoint, "Access token rejected, refreshing");
                    request.retried = true;
                    self.refresh_access_token(RefreshOrigin::Reactive).await?;
                }
                Disposition::Unauthorized => {
                    self.teardown();
                    return Err(interceptor::error_from_response(&response));
                }
                Disposition::NetworkUnreachable | Disposition::Reject => {
                    return Err(interceptor::error_from_response(&response));
                }
            }
        }
    }

    /// Execute and parse the standard envelope
    pub async fn send_envelope(&self, request: ApiRequest) -> Result<Envelope> {
        self.execute(request).await?.envelope()
    }

    /// Obtain a new access token, sharing any refresh already in flight.
    ///
    /// On success the token is stored and the next proactive refresh armed
    /// before any queued caller resumes. A refusal ends the session when any
    /// caller of the flight was a rejected request, whichever origin started
    /// it.
    pub async fn refresh_access_token(&self, origin: RefreshOrigin) -> Result<String> {
        let inner = &self.inner;
        inner
            .coordinator
            .run(
                origin == RefreshOrigin::Reactive,
                || async move {
                    info!(?origin, "Refreshing access token");
                    let token = self.request_new_token().await?;
                    inner.store.set(token.clone());
                    let _ = self.schedule_proactive_refresh();
                    inner.events.emit(SessionEvent::Refreshed);
                    info!(?origin, "Access token refreshed");
                    Ok(token)
                },
                |outcome, reactive| self.conclude_refresh(outcome, reactive),
            )
            .await
    }

    /// Apply the failure policy once per flight, before waiters wake.
    fn conclude_refresh(&self, outcome: Result<String>, reactive: bool) -> Result<String> {
        let e = match outcome {
            Ok(token) => return Ok(token),
            Err(e) => e,
        };
        let inner = &self.inner;

        if e.is_network_error() {
            warn!(error = %e, "Refresh could not reach the server");
            inner.notifier.notify(Notice::network_unreachable());
            return Err(e);
        }
        if e.is_server_fault() {
            let status = e.status().unwrap_or(500);
            warn!(status, error = %e, "Refresh endpoint failed");
            inner.notifier.notify(Notice::server_fault(status));
            return Err(e);
        }
        if !reactive {
            warn!(error = %e, "Proactive refresh failed");
            return Err(e);
        }

        warn!(error = %e, "Refresh rejected, ending session");
        self.teardown();
        inner.events.emit(SessionEvent::Invalidated {
            reason: InvalidationReason::RefreshFailed,
        });
        Err(DeskError::session_expired(format!(
            "Session expired, please log in again ({})",
            e
        )))
    }

    async fn request_new_token(&self) -> Result<String> {
        let mut request = ApiRequest::get(REFRESH_PATH);
        let response = self.dispatch(&mut request).await?;
        if !response.is_success() {
            return Err(interceptor::error_from_response(&response));
        }
        response.bearer_token().ok_or_else(|| {
            DeskError::invalid_response("Refresh response carried no Authorization header")
        })
    }

    /// Arm the proactive refresh for the stored token, replacing any timer.
    pub fn schedule_proactive_refresh(&self) -> ScheduleOutcome {
        let inner = &self.inner;
        let delay = match inner.scheduler.plan(inner.store.get().as_deref()) {
            Ok(delay) => delay,
            Err(outcome) => {
                inner.scheduler.cancel();
                debug!(?outcome, "No proactive refresh scheduled");
                return outcome;
            }
        };

        let weak = Arc::downgrade(&self.inner);
        inner.scheduler.arm(delay, async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let client = HttpClient { inner };
            if let Err(e) = client
                .refresh_access_token(RefreshOrigin::Proactive)
                .await
            {
                debug!(error = %e, "Proactive refresh did not complete");
            }
        });

        ScheduleOutcome::Scheduled { delay }
    }

    /// Clear the session and cancel the proactive timer.
    pub fn teardown(&self) {
        self.inner.store.clear();
        self.inner.scheduler.cancel();
        info!("Session cleared");
    }

    /// Whether the backend answers at all
    pub async fn probe(&self) -> bool {
        match self.inner.transport.send(&ApiRequest::get("/")).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Server probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::tests::mocks::MockTransport;
    use crate::tests::utils::test_helpers::{
        json_response, make_jwt, raw_response, test_config, token_response, unauthorized,
    };
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn client_with(transport: Arc<MockTransport>) -> HttpClient {
        HttpClient::with_transport(test_config(), transport, Arc::new(TokenStore::in_memory()))
    }

    /// Backend where `fresh` is the only accepted token and refresh issues it
    fn rotating_backend(fresh: String) -> MockTransport {
        MockTransport::new(move |request| {
            if request.endpoint == REFRESH_PATH {
                return Ok(token_response(&fresh));
            }
            if request.bearer.as_deref() == Some(fresh.as_str()) {
                Ok(json_response(json!({"status": "success", "data": []})))
            } else {
                Ok(unauthorized())
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_expired_calls_share_one_refresh() {
        let fresh = make_jwt(Utc::now().timestamp() + 3600);
        let transport = Arc::new(
            rotating_backend(fresh.clone()).with_refresh_delay(Duration::from_millis(50)),
        );
        let client = client_with(transport.clone());
        client.store().set("expired");

        let (a, b, c) = tokio::join!(
            client.execute(ApiRequest::get("/faqs")),
            client.execute(ApiRequest::get("/partners")),
            client.execute(ApiRequest::get("/news")),
        );

        assert!(a.unwrap().is_success());
        assert!(b.unwrap().is_success());
        assert!(c.unwrap().is_success());
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(client.store().get(), Some(fresh.clone()));
        assert_eq!(client.auth_state(), AuthState::Idle);

        // Every original call is replayed exactly once with the new token
        for endpoint in ["/faqs", "/partners", "/news"] {
            let bearers = transport.bearers(endpoint);
            assert_eq!(bearers.len(), 2);
            assert_eq!(bearers[1].as_deref(), Some(fresh.as_str()));
        }
    }

    #[tokio::test]
    async fn test_replay_that_fails_again_is_not_retried() {
        let transport = Arc::new(MockTransport::new(|request| {
            if request.endpoint == REFRESH_PATH {
                Ok(token_response("still-rejected"))
            } else {
                Ok(unauthorized())
            }
        }));
        let client = client_with(transport.clone());
        client.store().set("expired");

        let err = client.execute(ApiRequest::get("/faqs")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(transport.count("/faqs"), 2);
        assert_eq!(transport.count(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn test_exempt_401_never_refreshes() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(raw_response(
                401,
                r#"{"status":"fail","message":"Incorrect email or password"}"#,
            ))
        }));
        let client = client_with(transport.clone());
        client.store().set("old");

        let err = client
            .execute(ApiRequest::post(interceptor::LOGIN_PATH).json(json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Incorrect email or password"));
        assert_eq!(transport.count(REFRESH_PATH), 0);
        assert_eq!(client.store().get(), None);
        assert_eq!(transport.bearers(interceptor::LOGIN_PATH), vec![None]);
    }

    #[tokio::test]
    async fn test_failed_refresh_tears_down_and_rejects_waiters() {
        let transport = Arc::new(
            MockTransport::new(|request| {
                if request.endpoint == REFRESH_PATH {
                    Ok(raw_response(401, r#"{"message":"refresh token expired"}"#))
                } else {
                    Ok(unauthorized())
                }
            })
            .with_refresh_delay(Duration::from_millis(20)),
        );
        let client = client_with(transport.clone());
        client.store().set("expired");
        client.store().set_profile(&sitedesk_protocol::Role::Admin, false);

        let invalidated = count_invalidations(&client);

        let (a, b) = tokio::join!(
            client.execute(ApiRequest::get("/faqs")),
            client.execute(ApiRequest::get("/team")),
        );

        for outcome in [a, b] {
            assert_eq!(outcome.unwrap_err().code(), ErrorCode::SessionExpired);
        }
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(invalidated.load(Ordering::SeqCst), 1);

        let snapshot = client.store().snapshot();
        assert_eq!(snapshot.access_token, None);
        assert_eq!(snapshot.user_role, None);
        assert_eq!(snapshot.first_time_login, None);
        assert!(!client.has_scheduled_refresh());
    }

    #[tokio::test]
    async fn test_server_fault_notice_not_stacked() {
        let transport = Arc::new(MockTransport::new(|_| Ok(raw_response(500, "{}"))));
        let client = client_with(transport.clone());
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        client.set_notice_callback(Box::new(move |notice| {
            sink.lock().unwrap().push(notice.key.clone());
        }));

        for _ in 0..3 {
            let err = client.execute(ApiRequest::get("/faqs")).await.unwrap_err();
            assert!(err.is_server_fault());
        }

        assert_eq!(*notices.lock().unwrap(), vec!["server-error".to_string()]);
        assert_eq!(transport.count("/faqs"), 3);
    }

    #[tokio::test]
    async fn test_network_failure_is_not_retried() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(DeskError::unreachable("connection refused"))
        }));
        let client = client_with(transport.clone());
        client.store().set("token");

        let err = client.execute(ApiRequest::get("/faqs")).await.unwrap_err();

        assert!(err.is_network_error());
        assert_eq!(transport.count("/faqs"), 1);
        assert_eq!(client.store().get().as_deref(), Some("token"));
    }

    #[tokio::test]
    async fn test_teardown_then_stale_request_does_not_loop() {
        let transport = Arc::new(MockTransport::new(|request| {
            if request.endpoint == REFRESH_PATH {
                Ok(raw_response(401, "{}"))
            } else {
                Ok(unauthorized())
            }
        }));
        let client = client_with(transport.clone());
        client.store().set("stale");
        client.teardown();
        assert_eq!(client.store().get(), None);

        let err = client.execute(ApiRequest::get("/faqs")).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::SessionExpired);
        assert_eq!(transport.count("/faqs"), 1);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.bearers("/faqs"), vec![None]);
    }

    fn count_invalidations(client: &HttpClient) -> Arc<AtomicUsize> {
        let invalidated = Arc::new(AtomicUsize::new(0));
        let counter = invalidated.clone();
        client.set_event_callback(Box::new(move |event| {
            if matches!(event, SessionEvent::Invalidated { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        invalidated
    }

    #[tokio::test]
    async fn test_reactive_call_joins_running_proactive_refresh() {
        let fresh = make_jwt(Utc::now().timestamp() + 3600);
        let transport = Arc::new(
            rotating_backend(fresh.clone()).with_refresh_delay(Duration::from_millis(50)),
        );
        let client = client_with(transport.clone());
        client.store().set("expired");

        let (proactive, reactive) = tokio::join!(
            client.refresh_access_token(RefreshOrigin::Proactive),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                client.execute(ApiRequest::get("/faqs")).await
            }
        );

        assert_eq!(proactive.unwrap(), fresh);
        assert!(reactive.unwrap().is_success());
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(
            transport.bearers("/faqs"),
            vec![Some("expired".to_string()), Some(fresh.clone())]
        );
        assert_eq!(client.store().get(), Some(fresh));
    }

    #[tokio::test]
    async fn test_reactive_call_behind_refused_proactive_refresh_ends_session() {
        let transport = Arc::new(
            MockTransport::new(|request| {
                if request.endpoint == REFRESH_PATH {
                    Ok(raw_response(401, r#"{"message":"refresh token expired"}"#))
                } else {
                    Ok(unauthorized())
                }
            })
            .with_refresh_delay(Duration::from_millis(50)),
        );
        let client = client_with(transport.clone());
        client.store().set("expired");
        let invalidated = count_invalidations(&client);

        let (proactive, reactive) = tokio::join!(
            client.refresh_access_token(RefreshOrigin::Proactive),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                client.execute(ApiRequest::get("/faqs")).await
            }
        );

        assert_eq!(reactive.unwrap_err().code(), ErrorCode::SessionExpired);
        assert_eq!(proactive.unwrap_err().code(), ErrorCode::SessionExpired);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.count("/faqs"), 1);
        assert_eq!(client.store().get(), None);
        assert_eq!(invalidated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_proactive_refresh_alone_keeps_session() {
        let transport = Arc::new(MockTransport::new(|_| Ok(raw_response(401, "{}"))));
        let client = client_with(transport.clone());
        client.store().set("still-valid");
        let invalidated = count_invalidations(&client);

        let err = client
            .refresh_access_token(RefreshOrigin::Proactive)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(client.store().get().as_deref(), Some("still-valid"));
        assert_eq!(invalidated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_server_fault_keeps_session() {
        let transport = Arc::new(MockTransport::new(|request| {
            if request.endpoint == REFRESH_PATH {
                Ok(raw_response(503, r#"{"message":"Service Unavailable"}"#))
            } else {
                Ok(unauthorized())
            }
        }));
        let client = client_with(transport.clone());
        client.store().set("expired");
        let invalidated = count_invalidations(&client);
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        client.set_notice_callback(Box::new(move |notice| {
            sink.lock().unwrap().push(notice.key.clone());
        }));

        let err = client.execute(ApiRequest::get("/faqs")).await.unwrap_err();

        assert!(err.is_server_fault());
        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.count("/faqs"), 1);
        assert_eq!(client.store().get().as_deref(), Some("expired"));
        assert_eq!(invalidated.load(Ordering::SeqCst), 0);
        assert_eq!(*notices.lock().unwrap(), vec!["server-error".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_proactive_refresh_fires_ahead_of_expiry() {
        let next = make_jwt(Utc::now().timestamp() + 3600);
        let transport = Arc::new(rotating_backend(next.clone()));
        let client = client_with(transport.clone());
        client.store().set(make_jwt(Utc::now().timestamp() + 6 * 60));

        match client.schedule_proactive_refresh() {
            ScheduleOutcome::Scheduled { delay } => {
                assert!(delay <= Duration::from_secs(60));
                assert!(delay > Duration::from_secs(58));
            }
            other => panic!("expected a scheduled refresh, got {:?}", other),
        }

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(transport.count(REFRESH_PATH), 0);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(client.store().get(), Some(next));
        // Rescheduled from the new token
        assert!(client.has_scheduled_refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_near_expiry_token_arms_nothing() {
        let transport = Arc::new(rotating_backend(make_jwt(0)));
        let client = client_with(transport.clone());
        client.store().set(make_jwt(Utc::now().timestamp() + 4 * 60));

        assert_eq!(client.schedule_proactive_refresh(), ScheduleOutcome::TooLate);
        assert!(!client.has_scheduled_refresh());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.count(REFRESH_PATH), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_scheduling_keeps_one_timer() {
        let next = make_jwt(Utc::now().timestamp() + 3600);
        let transport = Arc::new(rotating_backend(next));
        let client = client_with(transport.clone());
        client.store().set(make_jwt(Utc::now().timestamp() + 6 * 60));

        let _ = client.schedule_proactive_refresh();
        let _ = client.schedule_proactive_refresh();

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(transport.count(REFRESH_PATH), 1);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut response = raw_response(200, "");
        assert_eq!(response.bearer_token(), None);

        response.authorization = Some("Bearer abc.def.ghi".to_string());
        assert_eq!(response.bearer_token().as_deref(), Some("abc.def.ghi"));

        response.authorization = Some("abc".to_string());
        assert_eq!(response.bearer_token().as_deref(), Some("abc"));

        response.authorization = Some("Bearer ".to_string());
        assert_eq!(response.bearer_token(), None);
    }

    #[test]
    fn test_envelope_failure_keeps_message() {
        let response = raw_response(200, r#"{"status":"fail","message":"Slug taken"}"#);
        let err = response.envelope().unwrap_err();
        assert!(err.to_string().contains("Slug taken"));

        assert!(raw_response(204, "").envelope().unwrap().is_success());
    }
}
