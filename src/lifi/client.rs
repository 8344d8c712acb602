//! Rate-limited, retrying HTTP client for the LI.FI REST API.
//!
//! Every upstream call goes through [`HttpClient::get`] or [`HttpClient::post`].
//! Each attempt (retries included) takes a token from the shared
//! [`RateLimiter`]. Transport failures, 429 and 5xx responses are retried with
//! exponential backoff plus jitter; any other non-2xx status is returned to the
//! caller immediately.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use thiserror::Error;
use tracing::{debug, warn};

use super::rate_limiter::RateLimiter;
use super::transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport};
use crate::config::Config;
use crate::mcp::context::CallContext;

pub const DEFAULT_BASE_URL: &str = "https://li.quest";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("rate limited by upstream (status 429), retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("API error (status {status}): {body}")]
    Status { status: u16, body: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<HttpError> },
    #[error("failed to initialise HTTP client: {0}")]
    Setup(String),
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Transport(_) | HttpError::RateLimited { .. } => true,
            HttpError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The HTTP status behind this error, if the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::RateLimited { .. } => Some(429),
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fractional jitter applied symmetrically around the computed delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32);
        let mut delay = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        if self.jitter > 0.0 {
            let spread = delay * self.jitter;
            delay = delay - spread + rand::random::<f64>() * spread * 2.0;
        }
        Duration::from_secs_f64(delay.max(0.0))
    }

    /// Interprets a `Retry-After` value as delta-seconds or an HTTP-date,
    /// falling back to the base delay.
    pub fn retry_after(&self, header: Option<&str>, now: DateTime<Utc>) -> Duration {
        let Some(raw) = header.map(str::trim).filter(|h| !h.is_empty()) else {
            return self.base_delay;
        };
        if let Ok(secs) = raw.parse::<u64>() {
            return Duration::from_secs(secs);
        }
        if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
            return (date.with_timezone(&Utc) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
        }
        self.base_delay
    }
}

pub struct HttpClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            limiter,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::new(config.http_timeout)
            .map_err(|e| HttpError::Setup(e.to_string()))?;
        let limiter = RateLimiter::new(config.rate_limit_max_tokens, config.rate_limit_period);
        Ok(Self::new(
            config.api_base_url.clone(),
            Arc::new(transport),
            Arc::new(limiter),
            RetryPolicy::default(),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path with the given query pairs encoded.
    pub fn endpoint(&self, path: &str, query: &[(&str, String)]) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }

    pub async fn get(&self, ctx: &CallContext, url: &str) -> Result<Vec<u8>, HttpError> {
        self.execute(ctx, Method::GET, url, None).await
    }

    pub async fn post(&self, ctx: &CallContext, url: &str, body: Vec<u8>) -> Result<Vec<u8>, HttpError> {
        self.execute(ctx, Method::POST, url, Some(body)).await
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, HttpError> {
        let request = OutboundRequest {
            method,
            url: url.to_string(),
            body,
            credential: ctx.credential().cloned(),
        };
        let cancel = ctx.cancellation();

        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire(cancel).await?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HttpError::Cancelled),
                sent = self.transport.send(&request) => sent,
            };
            let err = match outcome {
                Ok(response) => match self.classify(response) {
                    Ok(body) => {
                        debug!(method = %request.method, attempt, "upstream request succeeded");
                        return Ok(body);
                    }
                    Err(err) => err,
                },
                Err(e) => HttpError::Transport(e.0),
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.retry.max_retries {
                return Err(HttpError::Exhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            let delay = self.retry.backoff(attempt);
            warn!(
                method = %request.method,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying upstream request"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HttpError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn classify(&self, response: RawResponse) -> Result<Vec<u8>, HttpError> {
        match response.status {
            200..=299 => Ok(response.body),
            429 => Err(HttpError::RateLimited {
                retry_after: self
                    .retry
                    .retry_after(response.retry_after.as_deref(), Utc::now()),
            }),
            status => Err(HttpError::Status {
                status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::lifi::transport::TransportError;

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        pub requests: Mutex<Vec<OutboundRequest>>,
    }

    impl ScriptedTransport {
        pub fn push(&self, status: u16, body: &str) -> &Self {
            self.responses.lock().unwrap().push_back(Ok(RawResponse {
                status,
                retry_after: None,
                body: body.as_bytes().to_vec(),
            }));
            self
        }

        pub fn push_raw(&self, response: Result<RawResponse, TransportError>) -> &Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError("no scripted response".into())))
        }
    }

    pub fn client_with(transport: Arc<ScriptedTransport>) -> HttpClient {
        HttpClient::new(
            "https://li.quest",
            transport,
            Arc::new(RateLimiter::new(1000, Duration::from_secs(1))),
            RetryPolicy::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::lifi::transport::TransportError;
    use crate::mcp::context::ApiKey;
    use chrono::TimeZone;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn retries_server_errors_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::default());
        transport
            .push(500, "boom")
            .push(500, "boom")
            .push(200, r#"{"ok":true}"#);
        let client = client_with(transport.clone());

        let start = Instant::now();
        let body = client
            .get(&CallContext::default(), "https://li.quest/v1/chains")
            .await
            .unwrap();
        let slept = start.elapsed();

        assert_eq!(body, br#"{"ok":true}"#);
        assert_eq!(transport.calls(), 3);
        // Two backoffs: 500ms and 1000ms, each within +/-30% jitter.
        assert!(slept >= Duration::from_millis(1050), "slept {:?}", slept);
        assert!(slept <= Duration::from_millis(1950), "slept {:?}", slept);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(404, "not found").push(200, "unused");
        let client = client_with(transport.clone());

        let start = Instant::now();
        let err = client
            .get(&CallContext::default(), "https://li.quest/v1/token")
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "API error (status 404): not found");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_three_retries() {
        let transport = Arc::new(ScriptedTransport::default());
        for _ in 0..5 {
            transport.push_raw(Err(TransportError("connection reset".into())));
        }
        let client = client_with(transport.clone());

        let err = client
            .get(&CallContext::default(), "https://li.quest/v1/tools")
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 4);
        match err {
            HttpError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, HttpError::Transport(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_response_is_retried_and_reports_hint() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_raw(Ok(RawResponse {
            status: 429,
            retry_after: Some("7".into()),
            body: Vec::new(),
        }));
        transport.push(200, "[]");
        let client = client_with(transport.clone());

        let start = Instant::now();
        let body = client
            .get(&CallContext::default(), "https://li.quest/v1/tokens")
            .await
            .unwrap();
        assert_eq!(body, b"[]");
        // Standard backoff only; the hint does not extend the wait.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn credential_and_body_are_forwarded() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(200, "{}");
        let client = client_with(transport.clone());
        let ctx = CallContext::new(ApiKey::new("k-123"));

        client
            .post(&ctx, "https://li.quest/v1/advanced/routes", b"{\"a\":1}".to_vec())
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].credential.as_ref().unwrap().expose(), "k-123");
        assert_eq!(requests[0].body.as_deref(), Some(&b"{\"a\":1}"[..]));
    }

    #[tokio::test]
    async fn cancelled_context_stops_before_sending() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(200, "{}");
        let client = client_with(transport.clone());
        let ctx = CallContext::default();
        ctx.cancel();

        let err = client.get(&ctx, "https://li.quest/v1/chains").await.unwrap_err();
        assert!(matches!(err, HttpError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_retrying() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(500, "boom").push(200, "unused");
        let client = client_with(transport.clone());
        let ctx = CallContext::default();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            // First backoff is at least 350ms, so this lands mid-sleep.
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let err = client.get(&ctx, "https://li.quest/v1/chains").await.unwrap_err();

        assert!(matches!(err, HttpError::Cancelled), "{err:?}");
        assert_eq!(transport.calls(), 1);
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn rate_limit_with_http_date_hint_surfaces_remaining_wait() {
        let transport = Arc::new(ScriptedTransport::default());
        let retry_at = (Utc::now() + chrono::Duration::seconds(120))
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        transport.push_raw(Ok(RawResponse {
            status: 429,
            retry_after: Some(retry_at),
            body: Vec::new(),
        }));
        let client = HttpClient::new(
            "https://li.quest",
            transport.clone(),
            Arc::new(RateLimiter::new(1000, Duration::from_secs(1))),
            RetryPolicy {
                max_retries: 0,
                ..RetryPolicy::default()
            },
        );

        let err = client
            .get(&CallContext::default(), "https://li.quest/v1/quote")
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(err.status(), Some(429));
        match err {
            HttpError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                match *last {
                    HttpError::RateLimited { retry_after } => {
                        assert!(
                            (100..=120).contains(&retry_after.as_secs()),
                            "retry after {:?}",
                            retry_after
                        );
                    }
                    other => panic!("unexpected inner error: {other:?}"),
                }
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn retry_after_parsing() {
        let policy = RetryPolicy::default();
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(policy.retry_after(Some("120"), now), Duration::from_secs(120));
        assert_eq!(
            policy.retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT"), now),
            Duration::from_secs(60)
        );
        assert_eq!(policy.retry_after(Some("soon"), now), policy.base_delay);
        assert_eq!(policy.retry_after(None, now), policy.base_delay);
    }

    #[test]
    fn backoff_is_capped_and_jittered() {
        let policy = RetryPolicy::default();
        for attempt in 0..3 {
            let nominal = 0.5 * 2f64.powi(attempt as i32);
            let d = policy.backoff(attempt).as_secs_f64();
            assert!(d >= nominal * 0.7 - 1e-9 && d <= nominal * 1.3 + 1e-9);
        }
        assert!(policy.backoff(20) <= Duration::from_secs_f64(30.0 * 1.3));
    }

    #[test]
    fn endpoint_encodes_query() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client_with(transport);
        assert_eq!(
            client.endpoint("/v1/token", &[("chain", "1".into()), ("token", "USDC x".into())]),
            "https://li.quest/v1/token?chain=1&token=USDC+x"
        );
        assert_eq!(client.endpoint("/v1/gas/prices", &[]), "https://li.quest/v1/gas/prices");
    }
}
