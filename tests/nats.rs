use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use event::{FieldValue, Metric, tags};
use framework::{Accumulator, MemoryAccumulator};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use natscope::sources::nats::{Config, Nats};
use pretty_assertions::assert_eq;

const SAMPLE: &str = include_str!("fixtures/varz.json");

fn varz_response(content_type: &str, status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut resp = testify::http::with_content_type(content_type, body);
    *resp.status_mut() = status;
    resp
}

/// Serves `body` on `/varz` only.
async fn varz_server(content_type: &'static str, status: StatusCode, body: &'static str) -> SocketAddr {
    testify::http::serve(service_fn(move |req: Request<Incoming>| async move {
        if req.uri().path() != "/varz" {
            return Ok::<_, Infallible>(testify::http::not_found());
        }

        Ok(varz_response(content_type, status, body))
    }))
    .await
}

async fn sample_server() -> SocketAddr {
    varz_server("application/json", StatusCode::OK, SAMPLE).await
}

fn nats(urls: impl IntoIterator<Item = String>) -> Nats {
    Nats::new(Config {
        urls: urls.into_iter().collect(),
        ..Default::default()
    })
}

async fn gather(nats: &mut Nats) -> (Vec<Metric>, Vec<String>) {
    let acc = Arc::new(MemoryAccumulator::default());
    nats.gather(&acc).await.unwrap();

    let (mut metrics, mut errors) = acc.take();
    metrics.sort_by(|a, b| a.tags().cmp(b.tags()));
    errors.sort();

    (metrics, errors)
}

fn integer_fields(metric: &Metric) -> Vec<(&str, i64)> {
    metric
        .fields()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_i64()))
        .collect()
}

#[tokio::test]
async fn sample_varz() {
    let addr = sample_server().await;
    let mut nats = nats([format!("http://127.0.0.1:{}", addr.port())]);

    let (metrics, errors) = gather(&mut nats).await;

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(metrics.len(), 1);

    let metric = &metrics[0];
    assert_eq!(metric.name(), "nats");
    assert_eq!(
        metric.tags(),
        &tags!(
            "server" => "127.0.0.1",
            "port" => addr.port().to_string(),
        )
    );
    assert_eq!(
        integer_fields(metric),
        [
            ("connections", 2),
            ("in_bytes", 0),
            ("in_messages", 0),
            ("memory", 6193152),
            ("out_bytes", 0),
            ("out_messages", 0),
            ("remotes", 0),
            ("routes", 0),
            ("slow_consumers", 0),
            ("subscriptions", 25),
            ("total_connections", 2),
            ("used_cpu", 0),
        ]
    );
}

#[tokio::test]
async fn trailing_slash() {
    let addr = sample_server().await;
    let mut nats = nats([format!("http://{addr}/")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].field("connections"), Some(&FieldValue::Integer(2)));
}

#[tokio::test]
async fn invalid_urls_are_skipped() {
    let addr = sample_server().await;
    let mut nats = nats([
        "not a url".to_string(),
        format!("http://{addr}"),
        "localhost:8222".to_string(),
    ]);

    let (metrics, errors) = gather(&mut nats).await;

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].tag("port"), Some(addr.port().to_string().as_str()));
    assert_eq!(
        errors,
        [
            "Unable to parse address 'localhost:8222': missing scheme",
            "Unable to parse address 'not a url': invalid uri character",
        ]
    );
}

#[tokio::test]
async fn failed_status_is_isolated() {
    let ok = sample_server().await;
    let failed = varz_server(
        "application/json",
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"error": "boom"}"#,
    )
    .await;

    let mut nats = nats([format!("http://{failed}"), format!("http://{ok}")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].tag("port"), Some(ok.port().to_string().as_str()));
    assert_eq!(
        errors,
        [format!(
            "http://{failed} returned HTTP status 500 Internal Server Error"
        )]
    );
}

#[tokio::test]
async fn not_found() {
    // no `/varz` under this prefix
    let addr = sample_server().await;
    let mut nats = nats([format!("http://{addr}/nats")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert!(metrics.is_empty());
    assert_eq!(
        errors,
        [format!("http://{addr}/nats returned HTTP status 404 Not Found")]
    );
}

#[tokio::test]
async fn unexpected_content_type() {
    let html = varz_server("text/html", StatusCode::OK, "<html></html>").await;
    let json = varz_server("application/json; charset=utf-8", StatusCode::OK, SAMPLE).await;

    let mut nats = nats([format!("http://{html}"), format!("http://{json}")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].tag("port"), Some(json.port().to_string().as_str()));
    assert_eq!(
        errors,
        [format!("http://{html} returned unexpected content type text/html")]
    );
}

#[tokio::test]
async fn malformed_json() {
    let addr = varz_server("application/json", StatusCode::OK, r#"{"connections": 2"#).await;
    let mut nats = nats([format!("http://{addr}")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert!(metrics.is_empty());
    assert_eq!(errors, ["Error while decoding JSON response"]);
}

#[tokio::test]
async fn unreachable() {
    let port = testify::pick_unused_local_port();
    let mut nats = nats([format!("http://127.0.0.1:{port}")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert!(metrics.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].starts_with(&format!(
            "error making HTTP request to http://127.0.0.1:{port}: "
        )),
        "{}",
        errors[0]
    );
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let slow = testify::http::serve(service_fn(|_req: Request<Incoming>| async move {
        tokio::time::sleep(Duration::from_secs(4)).await;
        Ok::<_, Infallible>(varz_response("application/json", StatusCode::OK, SAMPLE))
    }))
    .await;
    let fast = sample_server().await;

    let mut nats = Nats::new(Config {
        urls: vec![format!("http://{slow}"), format!("http://{fast}")],
        response_timeout: Duration::from_secs(1),
    });

    let (metrics, errors) = gather(&mut nats).await;

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].tag("port"), Some(fast.port().to_string().as_str()));
    assert_eq!(
        errors,
        [format!(
            "error making HTTP request to http://{slow}: timeout exceeded after 1s"
        )]
    );
}

#[tokio::test]
async fn client_reused_between_cycles() {
    let requests = Arc::new(AtomicUsize::new(0));
    let (addr, connections) = {
        let requests = Arc::clone(&requests);
        testify::http::serve_counted(service_fn(move |_req: Request<Incoming>| {
            requests.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, Infallible>(varz_response("application/json", StatusCode::OK, SAMPLE))
            }
        }))
        .await
    };

    let mut nats = nats([format!("http://{addr}")]);
    for _ in 0..3 {
        let (metrics, errors) = gather(&mut nats).await;

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(metrics.len(), 1);

        // let the connection go back to the idle pool
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(requests.load(Ordering::SeqCst), 3);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn endpoints_are_fetched_concurrently() {
    const ENDPOINTS: usize = 4;
    const DELAY: Duration = Duration::from_millis(500);

    let mut urls = Vec::with_capacity(ENDPOINTS);
    for _ in 0..ENDPOINTS {
        let addr = testify::http::serve(service_fn(|_req: Request<Incoming>| async move {
            tokio::time::sleep(DELAY).await;
            Ok::<_, Infallible>(varz_response("application/json", StatusCode::OK, SAMPLE))
        }))
        .await;

        urls.push(format!("http://{addr}"));
    }

    let mut nats = nats(urls);
    let start = Instant::now();
    let (metrics, errors) = gather(&mut nats).await;
    let elapsed = start.elapsed();

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(metrics.len(), ENDPOINTS);
    assert!(elapsed >= DELAY, "{elapsed:?}");
    assert!(elapsed < DELAY * 3, "{elapsed:?}");
}

/// Records errors but panics on every metric.
#[derive(Default)]
struct PanickingAccumulator {
    inner: MemoryAccumulator,
}

impl Accumulator for PanickingAccumulator {
    fn add_metric(&self, _metric: Metric) {
        panic!("add metric");
    }

    fn add_error(&self, err: framework::Error) {
        self.inner.add_error(err);
    }
}

#[tokio::test]
async fn panicking_task_is_reported() {
    let addr = sample_server().await;
    let mut nats = nats([format!("http://{addr}")]);

    let acc = Arc::new(PanickingAccumulator::default());
    nats.gather(&acc).await.unwrap();

    let errors = acc.inner.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(
        errors[0].starts_with(&format!("gather task of http://{addr} failed, ")),
        "{}",
        errors[0]
    );
    assert!(errors[0].contains("panicked"), "{}", errors[0]);
    assert!(acc.inner.metrics().is_empty());
}

#[tokio::test]
async fn missing_content_type() {
    let addr = testify::http::serve(service_fn(|_req: Request<Incoming>| async move {
        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(SAMPLE.as_bytes()))))
    }))
    .await;
    let mut nats = nats([format!("http://{addr}")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert!(metrics.is_empty());
    assert_eq!(
        errors,
        [format!("http://{addr} returned unexpected content type ")]
    );
}

#[tokio::test]
async fn oversized_body() {
    let addr = testify::http::serve(service_fn(|_req: Request<Incoming>| async move {
        let mut body = br#"{"connections": 2, "padding": ""#.to_vec();
        body.resize(body.len() + 2 * 1024 * 1024, b'x');
        body.extend_from_slice(br#""}"#);

        Ok::<_, Infallible>(testify::http::with_content_type("application/json", body))
    }))
    .await;
    let mut nats = nats([format!("http://{addr}")]);

    let (metrics, errors) = gather(&mut nats).await;

    assert!(metrics.is_empty());
    assert_eq!(
        errors,
        [format!(
            "error making HTTP request to http://{addr}: response body exceeds 1048576 bytes"
        )]
    );
}
