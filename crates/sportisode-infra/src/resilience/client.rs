use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::descriptor::{DataClass, IntegrationDescriptor, HEALTH_CHECK_TIMEOUT};
use super::error::{Fail, FailKind};
use super::state::{IntegrationState, IntegrationStatus};

/// One outbound GET against an integration
#[derive(Debug, Clone)]
pub struct IntegrationRequest {
    endpoint: String,
    params: Vec<(String, String)>,
    cache_key: Option<String>,
    class: DataClass,
    cacheable: bool,
}

impl IntegrationRequest {
    pub fn new(endpoint: impl Into<String>, class: DataClass) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            cache_key: None,
            class,
            cacheable: true,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn uncached(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn class(&self) -> DataClass {
        self.class
    }

    /// Explicit key, or one derived from integration name, endpoint and the
    /// sorted parameters.
    pub fn resolved_cache_key(&self, integration: &str) -> String {
        if let Some(key) = &self.cache_key {
            return format!("{}:{}", integration, key);
        }
        let mut params = self.params.clone();
        params.sort();
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}:{}?{}", integration, self.endpoint, query)
    }
}

/// HTTP client wrapped in cache, circuit breaker and rate limiter
#[derive(Clone)]
pub struct ResilientClient {
    descriptor: Arc<IntegrationDescriptor>,
    state: Arc<IntegrationState>,
    http: reqwest::Client,
}

impl ResilientClient {
    pub fn new(
        descriptor: IntegrationDescriptor,
        state: Arc<IntegrationState>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(descriptor.timeout)
            .build()?;
        Ok(Self::with_http_client(descriptor, state, http))
    }

    pub fn with_http_client(
        descriptor: IntegrationDescriptor,
        state: Arc<IntegrationState>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            state,
            http,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> &Arc<IntegrationState> {
        &self.state
    }

    fn fail(&self, kind: FailKind) -> Fail {
        Fail::new(self.descriptor.name.clone(), kind)
    }

    #[tracing::instrument(skip(self, request), fields(integration = %self.descriptor.name, endpoint = %request.endpoint))]
    pub async fn call(&self, request: &IntegrationRequest) -> Result<Value, Fail> {
        let cache_key = request.resolved_cache_key(&self.descriptor.name);

        if request.cacheable {
            if let Some(hit) = self.state.cache().get_fresh(&cache_key) {
                tracing::debug!(cache_key = %cache_key, "Integration cache hit");
                return Ok(hit);
            }
        }

        {
            let mut circuit = self.state.lock().await;
            let now = Instant::now();
            if !circuit.breaker.allow(now) {
                tracing::debug!("Circuit open, skipping request");
                return Err(self.fail(FailKind::CircuitOpen));
            }
            if !circuit.limiter.try_reserve(now) {
                tracing::debug!(
                    requests_this_minute = circuit.limiter.requests_this_minute(),
                    requests_this_hour = circuit.limiter.requests_this_hour(),
                    "Rate limit reached, skipping request"
                );
                return Err(self.fail(FailKind::RateLimited));
            }
        }

        let outcome = self.dispatch(request).await;

        {
            let mut circuit = self.state.lock().await;
            match &outcome {
                Ok(_) => circuit.breaker.on_success(),
                Err(fail) => {
                    let opened = circuit.breaker.on_failure(Instant::now());
                    tracing::info!(
                        error = %fail,
                        failure_count = circuit.breaker.failure_count(),
                        "Integration request failed"
                    );
                    if opened {
                        tracing::info!(
                            failure_count = circuit.breaker.failure_count(),
                            "Circuit breaker opened"
                        );
                    }
                }
            }
        }

        let value = outcome?;
        if request.cacheable {
            let ttl = self.descriptor.ttl_for(request.class);
            self.state.cache().insert(cache_key, value.clone(), ttl);
        }
        Ok(value)
    }

    /// Like [`call`](Self::call), but answers with the last cached value (even an
    /// expired one) when the live call fails.
    pub async fn call_with_fallback(&self, request: &IntegrationRequest) -> Result<Value, Fail> {
        match self.call(request).await {
            Ok(value) => Ok(value),
            Err(fail) => {
                let cache_key = request.resolved_cache_key(&self.descriptor.name);
                match self.state.cache().get_stale(&cache_key) {
                    Some(stale) => {
                        tracing::info!(
                            integration = %self.descriptor.name,
                            error = %fail,
                            "Serving stale cached response"
                        );
                        Ok(stale)
                    }
                    None => Err(fail),
                }
            }
        }
    }

    async fn dispatch(&self, request: &IntegrationRequest) -> Result<Value, Fail> {
        let url = self.descriptor.url_for(&request.endpoint);
        let mut builder = self
            .http
            .get(&url)
            .query(&request.params)
            .timeout(self.descriptor.timeout);
        for (name, value) in &self.descriptor.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.fail(FailKind::TransportError(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.fail(FailKind::HttpError(status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.fail(FailKind::TransportError(e.to_string())))?;

        serde_json::from_slice(&body).map_err(|e| self.fail(FailKind::DecodeError(e.to_string())))
    }

    /// Probe the descriptor's health endpoint, bypassing cache, breaker and limiter.
    pub async fn health_check(&self) -> bool {
        let Some(probe) = &self.descriptor.health_probe else {
            tracing::debug!(integration = %self.descriptor.name, "No health probe configured");
            return false;
        };

        let mut builder = self
            .http
            .get(self.descriptor.url_for(&probe.endpoint))
            .query(&probe.params)
            .timeout(HEALTH_CHECK_TIMEOUT);
        for (name, value) in &self.descriptor.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match builder.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::info!(
                    integration = %self.descriptor.name,
                    error = %e,
                    "Health check failed"
                );
                false
            }
        }
    }

    pub async fn status(&self) -> IntegrationStatus {
        self.state.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone)]
    struct Upstream {
        hits: Arc<AtomicUsize>,
        status: Arc<AtomicU16>,
        body: Arc<std::sync::Mutex<String>>,
    }

    impl Upstream {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        fn respond_with(&self, status: u16, body: &str) {
            self.status.store(status, Ordering::SeqCst);
            *self.body.lock().unwrap() = body.to_string();
        }
    }

    async fn handler(State(upstream): State<Upstream>) -> (StatusCode, String) {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        let status = StatusCode::from_u16(upstream.status.load(Ordering::SeqCst)).unwrap();
        (status, upstream.body.lock().unwrap().clone())
    }

    async fn spawn_upstream(status: u16, body: &str) -> (String, Upstream) {
        let upstream = Upstream {
            hits: Arc::new(AtomicUsize::new(0)),
            status: Arc::new(AtomicU16::new(status)),
            body: Arc::new(std::sync::Mutex::new(body.to_string())),
        };
        let app = Router::new()
            .route("/data", get(handler))
            .route("/health", get(handler))
            .with_state(upstream.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), upstream)
    }

    fn client(descriptor: IntegrationDescriptor) -> ResilientClient {
        let state = Arc::new(IntegrationState::new(&descriptor));
        ResilientClient::new(descriptor, state).unwrap()
    }

    fn data() -> IntegrationRequest {
        IntegrationRequest::new("data", DataClass::Standings)
    }

    #[tokio::test]
    async fn cached_response_skips_network() {
        let (base, upstream) = spawn_upstream(200, r#"{"table":[1,2,3]}"#).await;
        let client = client(IntegrationDescriptor::new("demo", base));

        let first = client.call(&data()).await.unwrap();
        let second = client.call(&data()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first["table"][2], 3);
        assert_eq!(upstream.hits(), 1);
    }

    #[tokio::test]
    async fn uncached_requests_always_hit_network() {
        let (base, upstream) = spawn_upstream(200, "{}").await;
        let client = client(IntegrationDescriptor::new("demo", base));

        client.call(&data().uncached()).await.unwrap();
        client.call(&data().uncached()).await.unwrap();

        assert_eq!(upstream.hits(), 2);
    }

    #[tokio::test]
    async fn three_failures_open_the_circuit() {
        let (base, upstream) = spawn_upstream(500, "boom").await;
        let client = client(IntegrationDescriptor::new("demo", base));

        for _ in 0..3 {
            let err = client.call(&data()).await.unwrap_err();
            assert_eq!(err.kind, FailKind::HttpError(500));
        }

        let err = client.call(&data()).await.unwrap_err();
        assert_eq!(err.kind, FailKind::CircuitOpen);
        assert_eq!(upstream.hits(), 3);

        let status = client.status().await;
        assert!(status.open);
        assert_eq!(status.failure_count, 3);
        assert!(status.last_failure.is_some());
        // rejected calls are not counted against the limiter
        assert_eq!(status.requests_this_hour, 3);
    }

    #[tokio::test]
    async fn success_after_cooldown_closes_the_circuit() {
        let (base, upstream) = spawn_upstream(503, "down").await;
        let client = client(
            IntegrationDescriptor::new("demo", base)
                .with_circuit(3, Duration::from_millis(100))
                .with_limits(50, 100),
        );

        for _ in 0..3 {
            client.call(&data()).await.unwrap_err();
        }
        assert_eq!(
            client.call(&data()).await.unwrap_err().kind,
            FailKind::CircuitOpen
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        upstream.respond_with(200, r#"{"ok":true}"#);

        let value = client.call(&data()).await.unwrap();
        assert_eq!(value["ok"], true);

        let status = client.status().await;
        assert!(!status.open);
        assert_eq!(status.failure_count, 0);
    }

    #[tokio::test]
    async fn burst_limit_plus_one_is_rate_limited() {
        let (base, upstream) = spawn_upstream(200, "{}").await;
        let client = client(IntegrationDescriptor::new("demo", base).with_limits(10, 100));

        for _ in 0..10 {
            client.call(&data().uncached()).await.unwrap();
        }
        let err = client.call(&data().uncached()).await.unwrap_err();

        assert_eq!(err.kind, FailKind::RateLimited);
        assert_eq!(upstream.hits(), 10);
        let status = client.status().await;
        assert_eq!(status.requests_this_minute, 10);
        assert_eq!(status.requests_this_hour, 10);
        assert_eq!(status.failure_count, 0);
    }

    #[tokio::test]
    async fn concurrent_calls_never_exceed_the_burst() {
        let (base, upstream) = spawn_upstream(200, "{}").await;
        let client = client(IntegrationDescriptor::new("demo", base).with_limits(5, 100));

        let calls = (0..12).map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(&data().uncached()).await })
        });
        let results = join_handles(calls).await;

        let limited = results
            .iter()
            .filter(|r| matches!(r, Err(f) if f.kind == FailKind::RateLimited))
            .count();
        assert_eq!(limited, 7);
        assert_eq!(upstream.hits(), 5);
    }

    async fn join_handles(
        handles: impl Iterator<Item = tokio::task::JoinHandle<Result<Value, Fail>>>,
    ) -> Vec<Result<Value, Fail>> {
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test]
    async fn unparseable_body_is_decode_error() {
        let (base, _upstream) = spawn_upstream(200, "<html>").await;
        let client = client(IntegrationDescriptor::new("demo", base));

        let err = client.call(&data()).await.unwrap_err();
        assert!(matches!(err.kind, FailKind::DecodeError(_)));
        assert_eq!(client.status().await.failure_count, 1);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(IntegrationDescriptor::new("demo", format!("http://{}", addr)));
        let err = client.call(&data()).await.unwrap_err();
        assert!(matches!(err.kind, FailKind::TransportError(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn fallback_serves_stale_value() {
        let (base, upstream) = spawn_upstream(200, r#"{"round":1}"#).await;
        let client = client(
            IntegrationDescriptor::new("demo", base)
                .with_ttl(DataClass::Live, Duration::from_millis(20)),
        );
        let live = IntegrationRequest::new("data", DataClass::Live);

        client.call_with_fallback(&live).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        upstream.respond_with(500, "");

        let value = client.call_with_fallback(&live).await.unwrap();
        assert_eq!(value["round"], 1);
        assert_eq!(upstream.hits(), 2);
    }

    #[tokio::test]
    async fn fallback_without_cache_propagates() {
        let (base, _upstream) = spawn_upstream(404, "").await;
        let client = client(IntegrationDescriptor::new("demo", base));

        let err = client.call_with_fallback(&data()).await.unwrap_err();
        assert_eq!(err.kind, FailKind::HttpError(404));
    }

    #[tokio::test]
    async fn integrations_do_not_share_state() {
        let (base, _upstream) = spawn_upstream(500, "").await;
        let broken = client(IntegrationDescriptor::new("broken", base.clone()));
        let healthy = client(IntegrationDescriptor::new("healthy", base));

        for _ in 0..3 {
            broken.call(&data()).await.unwrap_err();
        }

        assert!(broken.status().await.open);
        let other = healthy.status().await;
        assert!(!other.open);
        assert_eq!(other.failure_count, 0);
    }

    #[tokio::test]
    async fn health_check_uses_probe() {
        let (base, upstream) = spawn_upstream(200, "{}").await;
        let probed = client(
            IntegrationDescriptor::new("demo", base.clone())
                .with_health_probe("health", [("s", "Soccer")]),
        );
        assert!(probed.health_check().await);
        assert_eq!(upstream.hits(), 1);

        let unprobed = client(IntegrationDescriptor::new("demo", base));
        assert!(!unprobed.health_check().await);

        upstream.respond_with(502, "");
        assert!(!probed.health_check().await);
    }

    #[test]
    fn derived_cache_key_sorts_params() {
        let a = IntegrationRequest::new("standings", DataClass::Standings)
            .param("season", "2024")
            .param("league", "39");
        let b = IntegrationRequest::new("standings", DataClass::Standings)
            .param("league", "39")
            .param("season", "2024");

        assert_eq!(a.resolved_cache_key("x"), b.resolved_cache_key("x"));
        assert_eq!(
            a.resolved_cache_key("x"),
            "x:standings?league=39&season=2024"
        );
        assert_ne!(a.resolved_cache_key("x"), a.resolved_cache_key("y"));
    }
}
