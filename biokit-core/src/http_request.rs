use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};

use crate::error::BioKitError;

/// A thin wrapper on an HTTP client. Sets sensible defaults such as timeouts and user-agent.
///
/// Requests are sent exactly once. A handshake nonce is single-use, so a failed round trip is
/// surfaced to the caller, who restarts the whole handshake if they want to.
pub struct Request {
    client: reqwest::Client,
    timeout: Duration,
}

impl Request {
    /// Initializes a new `Request` instance with the given per-request timeout.
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header("Accept", "application/json")
            .header(
                "User-Agent",
                format!("biokit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    /// Sends a request built by `req`/`get`/`post`.
    ///
    /// Any HTTP status is returned as a response; only transport failures become errors.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, BioKitError> {
        let (client, request) = request_builder.build_split();
        let request = request.map_err(|err| BioKitError::NetworkError {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: None,
            error: format!("request build failed: {err}"),
        })?;
        let url = request.url().to_string();

        client.execute(request).await.map_err(|err| {
            let error = if err.is_timeout() {
                format!("request timed out: {err}")
            } else if err.is_connect() {
                format!("could not connect: {err}")
            } else {
                format!("request failed: {err}")
            };
            BioKitError::NetworkError {
                url,
                status: None,
                error,
            }
        })
    }
}
