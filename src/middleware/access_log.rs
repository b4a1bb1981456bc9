use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// One line per request: `<ms> ms "METHOD PATH VERSION" STATUS`.
pub async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let version = req.version();
    let started = Instant::now();

    let resp = next.run(req).await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    info!(
        target: "access",
        "{:.0} ms \"{} {} {:?}\" {}",
        elapsed_ms,
        method,
        path,
        version,
        resp.status().as_u16()
    );
    resp
}
