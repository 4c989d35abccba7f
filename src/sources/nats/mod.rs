mod endpoint;
mod varz;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use framework::Accumulator;
use framework::http::{HttpClient, HttpError};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

pub use endpoint::{DEFAULT_PORT, Endpoint, ParseEndpointError};
pub use varz::Varz;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("natscope/", env!("CARGO_PKG_VERSION"));

/// A `/varz` document is a few kilobytes, even for large clusters.
const MAX_VARZ_SIZE: usize = 1024 * 1024;

fn default_urls() -> Vec<String> {
    vec!["http://localhost:4222".to_string()]
}

const fn default_response_timeout() -> Duration {
    DEFAULT_RESPONSE_TIMEOUT
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Config {
    /// An array of NATS monitoring URLs to gather stats from.
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,

    /// HTTP response timeout, values below one second fall back to 5s.
    #[serde(
        default = "default_response_timeout",
        with = "humanize::duration::serde"
    )]
    pub response_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            urls: default_urls(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse address '{address}': {err}")]
    ParseAddress {
        address: String,
        err: ParseEndpointError,
    },

    #[error("build http client failed, {0}")]
    BuildClient(#[source] HttpError),

    #[error("error making HTTP request to {endpoint}: {err}")]
    Request { endpoint: String, err: HttpError },

    #[error("{endpoint} returned HTTP status {status}")]
    Status {
        endpoint: String,
        status: StatusCode,
    },

    #[error("{endpoint} returned unexpected content type {content_type}")]
    ContentType {
        endpoint: String,
        content_type: String,
    },

    #[error("Error while decoding JSON response")]
    Decode(#[source] serde_json::Error),

    #[error("gather task of {endpoint} failed, {err}")]
    Task { endpoint: String, err: JoinError },
}

/// Collects `/varz` stats from NATS monitoring endpoints.
///
/// The HTTP client is created on the first [`Nats::gather`] call and reused
/// by every later one.
pub struct Nats {
    urls: Vec<String>,
    response_timeout: Duration,

    client: Option<HttpClient>,
}

impl Nats {
    pub fn new(config: Config) -> Self {
        let response_timeout = if config.response_timeout < Duration::from_secs(1) {
            DEFAULT_RESPONSE_TIMEOUT
        } else {
            config.response_timeout
        };

        Nats {
            urls: config.urls,
            response_timeout,
            client: None,
        }
    }

    /// The timeout every request is bound to.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    fn client(&mut self) -> Result<HttpClient, Error> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let client = HttpClient::new(self.response_timeout, USER_AGENT)
            .map_err(Error::BuildClient)?
            .with_body_limit(MAX_VARZ_SIZE);
        self.client = Some(client.clone());

        Ok(client)
    }

    /// Run one collection cycle.
    ///
    /// Every endpoint is fetched by its own task and this returns once all
    /// of them finished. Failures of single endpoints are added to `acc`,
    /// only a client which cannot be built fails the whole cycle.
    pub async fn gather<A: Accumulator>(&mut self, acc: &Arc<A>) -> Result<(), Error> {
        let client = self.client()?;

        let mut tasks = JoinSet::new();
        let mut endpoints = HashMap::with_capacity(self.urls.len());
        for url in &self.urls {
            let endpoint = match url.parse::<Endpoint>() {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    acc.add_error(
                        Error::ParseAddress {
                            address: url.clone(),
                            err,
                        }
                        .into(),
                    );

                    continue;
                }
            };

            let client = client.clone();
            let acc = Arc::clone(acc);
            let name = endpoint.to_string();
            let handle = tasks.spawn(async move {
                if let Err(err) = varz::gather(&client, &endpoint, acc.as_ref()).await {
                    acc.add_error(err.into());
                }
            });

            endpoints.insert(handle.id(), name);
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                let endpoint = endpoints.remove(&err.id()).unwrap_or_default();
                warn!(message = "gather task failed", %endpoint, %err);

                acc.add_error(Error::Task { endpoint, err }.into());
            }
        }

        Ok(())
    }
}
