use crate::{
    error::SocketError,
    metric::{Field, Metric, Tag},
    protocol::http::{BuildStrategy, HttpParser, rest::RestRequest},
    rate_limit::RateLimiter,
};
use bytes::Bytes;
use chrono::Utc;
use std::{borrow::Cow, time::Duration};
use tracing::warn;

/// Default number of attempts for a [`RestRequest`] that keeps failing with transient errors.
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff between retried [`RestRequest`]s, doubled on each further attempt.
const RETRY_BACKOFF_INITIAL: Duration = Duration::from_millis(250);

/// Configurable REST client capable of executing signed [`RestRequest`]s. Use this when
/// integrating APIs that require Http in order to interact with resources. Each API will require
/// a specific combination of [`Signer`](super::super::private::Signer), [`Mac`](hmac::Mac),
/// signature [`Encoder`](super::super::private::encoder::Encoder), and [`HttpParser`].
///
/// Requests pass through an optional per-host [`RateLimiter`] before execution, and transient
/// failures (IO, timeout, venue rate limit refusal) are retried with exponential backoff up to a
/// bounded number of attempts.
#[derive(Debug)]
pub struct RestClient<'a, Strategy, Parser> {
    /// HTTP [`reqwest::Client`] for executing signed [`reqwest::Request`]s.
    pub http_client: reqwest::Client,

    /// Base Url of the API being interacted with.
    pub base_url: Cow<'a, str>,

    /// [`RestRequest`] build strategy for the API being interacted with that implements
    /// [`BuildStrategy`].
    pub strategy: Strategy,

    /// [`HttpParser`] that deserialises [`RestRequest::Response`]s, and upon failure parses
    /// API errors returned from the server.
    pub parser: Parser,

    /// Optional token bucket shared by every request to this host.
    pub rate_limiter: Option<RateLimiter>,

    /// Maximum number of attempts for transient failures.
    pub retry_attempts: u32,
}

impl<Strategy, Parser> RestClient<'_, Strategy, Parser>
where
    Strategy: BuildStrategy,
    Parser: HttpParser,
{
    /// Execute the provided [`RestRequest`], retrying transient failures with backoff.
    pub async fn execute<Request>(
        &self,
        request: Request,
    ) -> Result<(Request::Response, Metric), Parser::OutputError>
    where
        Request: RestRequest + Clone,
    {
        let mut backoff = RETRY_BACKOFF_INITIAL;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.execute_once(request.clone()).await {
                Ok(success) => break Ok(success),
                Err(ExecuteError::Transient(error)) if attempt < self.retry_attempts => {
                    warn!(
                        %error,
                        attempt,
                        max_attempts = self.retry_attempts,
                        ?backoff,
                        "transient RestRequest failure - retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(ExecuteError::Transient(error)) => {
                    break Err(Parser::OutputError::from(error));
                }
                Err(ExecuteError::Parse(error)) => break Err(error),
                Err(ExecuteError::Fatal(error)) => {
                    break Err(Parser::OutputError::from(error));
                }
            }
        }
    }

    async fn execute_once<Request>(
        &self,
        request: Request,
    ) -> Result<(Request::Response, Metric), ExecuteError<Parser::OutputError>>
    where
        Request: RestRequest,
    {
        // Wait for a rate limit permit before touching the wire
        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.acquire().await;
        }

        // Use provided Request to construct a signed reqwest::Request
        let request = self.build(request).map_err(ExecuteError::Fatal)?;

        // Measure request execution
        let (status, payload, latency) = self
            .measured_execution::<Request>(request)
            .await
            .map_err(|error| {
                if error.is_transient() {
                    ExecuteError::Transient(error)
                } else {
                    ExecuteError::Fatal(error)
                }
            })?;

        // A rate limit refusal is transient: surface it as such so the retry loop backs off
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ExecuteError::Transient(SocketError::RateLimit {
                retry_after_ms: RETRY_BACKOFF_INITIAL.as_millis() as u64,
            }));
        }

        // Attempt to parse API Success or Error response
        self.parser
            .parse::<Request::Response>(status, &payload)
            .map(|response| (response, latency))
            .map_err(ExecuteError::Parse)
    }

    /// Use the provided [`RestRequest`] to construct a signed Http [`reqwest::Request`].
    pub fn build<Request>(&self, request: Request) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        // Construct url
        let url = format!("{}{}", self.base_url, request.path());

        // Construct RequestBuilder with method & url
        let mut builder = self
            .http_client
            .request(Request::method(), url)
            .timeout(Request::timeout());

        // Add optional query parameters
        if let Some(query_params) = request.query_params() {
            builder = builder.query(query_params);
        }

        // Add optional Body
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        // Use RequestBuilder (public or private strategy) to build reqwest::Request
        self.strategy.build(request, builder)
    }

    /// Execute the built [`reqwest::Request`] using the [`reqwest::Client`].
    ///
    /// Measures and returns the Http request round trip duration.
    pub async fn measured_execution<Request>(
        &self,
        request: reqwest::Request,
    ) -> Result<(reqwest::StatusCode, Bytes, Metric), SocketError>
    where
        Request: RestRequest,
    {
        // Construct Http request duration Metric
        let mut latency = Metric {
            name: "http_request_duration",
            time: Utc::now().timestamp_millis() as u64,
            tags: vec![
                Tag::new("http_method", Request::method().as_str()),
                Tag::new("base_url", self.base_url.as_ref()),
                Tag::new("path", request.url().path()),
            ],
            fields: Vec::with_capacity(1),
        };

        // Measure the HTTP request round trip duration
        let start = std::time::Instant::now();
        let response = self.http_client.execute(request).await?;
        let duration = start.elapsed().as_millis() as u64;

        // Update Metric with response status and request duration
        latency
            .tags
            .push(Tag::new("status_code", response.status().as_str()));
        latency.fields.push(Field::new("duration", duration));

        // Extract Status Code & reqwest::Response Bytes
        let status_code = response.status();
        let payload = response.bytes().await?;

        Ok((status_code, payload, latency))
    }
}

impl<'a, Strategy, Parser> RestClient<'a, Strategy, Parser> {
    /// Construct a new [`Self`] using the provided configuration.
    pub fn new<Url: Into<Cow<'a, str>>>(base_url: Url, strategy: Strategy, parser: Parser) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            strategy,
            parser,
            rate_limiter: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    /// Attach a per-host [`RateLimiter`] every request must acquire a permit from.
    pub fn with_rate_limiter(self, rate_limiter: RateLimiter) -> Self {
        Self {
            rate_limiter: Some(rate_limiter),
            ..self
        }
    }

    /// Override the bounded number of attempts for transient failures.
    pub fn with_retry_attempts(self, retry_attempts: u32) -> Self {
        Self {
            retry_attempts: retry_attempts.max(1),
            ..self
        }
    }
}

enum ExecuteError<ParseError> {
    Transient(SocketError),
    Fatal(SocketError),
    Parse(ParseError),
}
