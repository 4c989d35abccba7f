use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT_ENCODING, USER_AGENT};
use http::{HeaderValue, Request, Response, header::InvalidHeaderValue};
use http_body_util::{BodyExt, Collected, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid user agent: {0}")]
    InvalidUserAgent(#[from] InvalidHeaderValue),
    #[error("{}", ErrorChain(.0))]
    CallRequest(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read response: {0}")]
    ReadBody(#[source] crate::Error),
    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("failed to build HTTP request: {0}")]
    BuildRequest(#[from] http::Error),
    #[error("timeout exceeded after {0:?}")]
    Timeout(Duration),
}

/// Renders an error followed by all of its sources, e.g.
/// `client error (Connect): tcp connect error: Connection refused`.
struct ErrorChain<'a>(&'a dyn std::error::Error);

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;

        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }

        Ok(())
    }
}

/// Responses with a larger body are rejected unless the client is built
/// with another limit, see [`HttpClient::with_body_limit`].
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// A cheaply cloneable HTTP/1 client.
///
/// Clones share the same connection pool, so a single client can be created
/// once and used by many concurrent tasks.
#[derive(Clone)]
pub struct HttpClient<B = Full<Bytes>> {
    client: Client<HttpConnector, B>,
    user_agent: HeaderValue,
    timeout: Duration,
    body_limit: usize,
}

impl<B> HttpClient<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<crate::Error>,
{
    /// Build a client whose requests, response body included, must finish
    /// within `timeout`. `user_agent` is sent unless a request sets its own.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<HttpClient<B>, HttpError> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(http);
        let user_agent = HeaderValue::from_str(user_agent)?;

        Ok(HttpClient {
            client,
            user_agent,
            timeout,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    /// Maximum size of a response body in bytes.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    /// Send the request and read the whole response body.
    pub async fn fetch(&self, mut req: Request<B>) -> Result<Response<Collected<Bytes>>, HttpError> {
        default_request_headers(&mut req, &self.user_agent);

        let uri = req.uri().clone();
        let exchange = async {
            let resp = self.client.request(req).await?;

            debug!(
                message = "HTTP response received",
                %uri,
                status = %resp.status(),
                version = ?resp.version(),
            );

            let (parts, incoming) = resp.into_parts();
            let body = Limited::new(incoming, self.body_limit)
                .collect()
                .await
                .map_err(|err| {
                    if err.is::<LengthLimitError>() {
                        HttpError::BodyTooLarge(self.body_limit)
                    } else {
                        HttpError::ReadBody(err)
                    }
                })?;

            Ok::<_, HttpError>(Response::from_parts(parts, body))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_elapsed) => Err(HttpError::Timeout(self.timeout)),
        }
    }
}

fn default_request_headers<B>(request: &mut Request<B>, user_agent: &HeaderValue) {
    if !request.headers().contains_key(USER_AGENT) {
        request.headers_mut().insert(USER_AGENT, user_agent.clone());
    }

    if !request.headers().contains_key(ACCEPT_ENCODING) {
        // compressed responses are not supported
        request
            .headers_mut()
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    }
}
