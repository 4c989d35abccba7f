use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use event::tags;
use http::Uri;
use http::uri::InvalidUri;
use thiserror::Error;

/// Port the NATS client protocol listens on by default.
pub const DEFAULT_PORT: &str = "4222";

#[derive(Debug, Error)]
pub enum ParseEndpointError {
    #[error(transparent)]
    InvalidUri(#[from] InvalidUri),
    #[error("missing scheme")]
    MissingScheme,
    #[error("missing host")]
    MissingHost,
}

/// An absolute URL of a NATS monitoring server, e.g. `http://localhost:8222`.
#[derive(Clone, Debug)]
pub struct Endpoint {
    // configured text without the trailing slash
    raw: String,
    uri: Uri,
}

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uri = s.parse::<Uri>()?;
        if uri.scheme().is_none() {
            return Err(ParseEndpointError::MissingScheme);
        }

        match uri.authority() {
            Some(authority) if !authority.host().is_empty() => {}
            _ => return Err(ParseEndpointError::MissingHost),
        }

        Ok(Endpoint {
            raw: s.trim_end_matches('/').to_string(),
            uri,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Endpoint {
    pub fn varz(&self) -> String {
        format!("{}/varz", self.raw)
    }

    /// `server` and `port` tags identifying this endpoint.
    ///
    /// Without an explicit port, `server` is the host as written and `port`
    /// falls back to [`DEFAULT_PORT`].
    pub fn tags(&self) -> BTreeMap<String, String> {
        // checked by `from_str`
        let Some(authority) = self.uri.authority() else {
            return tags!("server" => "", "port" => DEFAULT_PORT);
        };

        let host = authority.host();
        match authority.port() {
            Some(port) => {
                let host = host
                    .strip_prefix('[')
                    .and_then(|h| h.strip_suffix(']'))
                    .unwrap_or(host);

                tags!(
                    "server" => host,
                    "port" => port.as_str(),
                )
            }
            None => tags!(
                "server" => host,
                "port" => DEFAULT_PORT,
            ),
        }
    }
}
