use std::collections::BTreeMap;
use std::fmt;

use bytes::{Buf, Bytes};
use event::{Metric, fields};
use framework::Accumulator;
use framework::http::HttpClient;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, StatusCode};
use http_body_util::Full;
use serde::Deserialize;
use serde::de::{Deserializer, Visitor};

use super::Error;
use super::endpoint::Endpoint;

const JSON_CONTENT_TYPE: &str = "application/json";

/// The part of a `/varz` response we report, every other key is ignored.
///
/// https://docs.nats.io/running-a-nats-service/nats_admin/monitoring#general-information
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Varz {
    #[serde(rename = "mem", deserialize_with = "integer")]
    pub memory: i64,
    #[serde(deserialize_with = "integer")]
    pub cpu: i64,
    #[serde(deserialize_with = "integer")]
    pub connections: i64,
    #[serde(deserialize_with = "integer")]
    pub total_connections: i64,
    #[serde(deserialize_with = "integer")]
    pub routes: i64,
    #[serde(deserialize_with = "integer")]
    pub remotes: i64,
    #[serde(deserialize_with = "integer")]
    pub in_msgs: i64,
    #[serde(deserialize_with = "integer")]
    pub out_msgs: i64,
    #[serde(deserialize_with = "integer")]
    pub in_bytes: i64,
    #[serde(deserialize_with = "integer")]
    pub out_bytes: i64,
    #[serde(deserialize_with = "integer")]
    pub slow_consumers: i64,
    #[serde(deserialize_with = "integer")]
    pub subscriptions: i64,
}

impl Varz {
    pub fn into_metric(self, tags: BTreeMap<String, String>) -> Metric {
        Metric::new(
            "nats",
            tags,
            fields!(
                "connections" => self.connections,
                "total_connections" => self.total_connections,
                "memory" => self.memory,
                "used_cpu" => self.cpu,
                "routes" => self.routes,
                "remotes" => self.remotes,
                "in_messages" => self.in_msgs,
                "out_messages" => self.out_msgs,
                "in_bytes" => self.in_bytes,
                "out_bytes" => self.out_bytes,
                "slow_consumers" => self.slow_consumers,
                "subscriptions" => self.subscriptions,
            ),
        )
    }
}

/// Accepts any JSON number, fractions are truncated toward zero. `null`
/// reads as zero.
///
/// NATS reports `cpu` as a percentage with a fraction, e.g. `1.5`.
fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    struct IntegerVisitor;

    impl Visitor<'_> for IntegerVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number")
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom(format!("{v} overflows i64")))
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<i64, E> {
            if v.is_finite() {
                Ok(v as i64)
            } else {
                Err(E::custom("number is not finite"))
            }
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<i64, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(IntegerVisitor)
}

/// Fetch `<endpoint>/varz` once and add the decoded status to `acc`.
pub async fn gather<A>(client: &HttpClient, endpoint: &Endpoint, acc: &A) -> Result<(), Error>
where
    A: Accumulator + ?Sized,
{
    let req = Request::get(endpoint.varz())
        .header(ACCEPT, JSON_CONTENT_TYPE)
        .body(Full::<Bytes>::default())
        .map_err(|err| Error::Request {
            endpoint: endpoint.to_string(),
            err: err.into(),
        })?;

    let resp = client.fetch(req).await.map_err(|err| Error::Request {
        endpoint: endpoint.to_string(),
        err,
    })?;

    // the body is dropped at the end of this scope, on every path
    let (parts, body) = resp.into_parts();
    if parts.status != StatusCode::OK {
        return Err(Error::Status {
            endpoint: endpoint.to_string(),
            status: parts.status,
        });
    }

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default();
    if media_type != JSON_CONTENT_TYPE {
        return Err(Error::ContentType {
            endpoint: endpoint.to_string(),
            content_type: media_type.to_string(),
        });
    }

    let varz: Varz = serde_json::from_reader(body.aggregate().reader()).map_err(Error::Decode)?;

    debug!(message = "varz decoded", %endpoint, connections = varz.connections);

    acc.add_metric(varz.into_metric(endpoint.tags()));

    Ok(())
}
