use axum::Router;
use axum::extract::{OriginalUri, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use http::Method;
use std::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

async fn ok() -> impl IntoResponse {
    "ok"
}

async fn err() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "fail")
}

// /slow/150 answers after 150 ms
async fn slow_ms(Path(ms): Path<u64>) -> impl IntoResponse {
    sleep(Duration::from_millis(ms)).await;
    "slept"
}

async fn fallback(method: Method, uri: OriginalUri) -> String {
    format!("fallback: {} {}", method, uri.0)
}

/// Binds an ephemeral port and serves the routes the integration tests hit.
/// Returns (base_url, shutdown sender, join handle).
pub fn spawn_test_server() -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    let app = Router::new()
        .route("/ok", get(ok).post(ok).put(ok).delete(ok))
        .route("/err", get(err).post(err))
        .route("/slow/{ms}", get(slow_ms))
        .fallback(fallback);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let server = axum::serve(tokio::net::TcpListener::from_std(listener).unwrap(), app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });

        // a crashed server must fail the test that spawned it
        server.await.unwrap();
    });

    (base_url, shutdown_tx, handle)
}

pub async fn wait_until_ready(url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..20 {
        if client.get(format!("{url}/ok")).send().await.is_ok() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("test server not ready");
}
