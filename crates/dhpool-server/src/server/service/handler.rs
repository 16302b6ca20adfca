//! HTTP retrieval surface.
//!
//! | Route             | Response                                           |
//! |-------------------|----------------------------------------------------|
//! | `GET /`           | HTML page with the available count per size class  |
//! | `GET /status`     | The same counts as JSON                            |
//! | `GET /get/{bits}` | A random parameter file, downloaded as `dhparams.key` |
//!
//! Handlers only read the pool. A request for an empty class is answered
//! immediately with `503`; nothing is queued.

use crate::server::service::error::ApiError;
use crate::server::telemetry::{increment_artifacts_served, increment_requests, record_serve_duration};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use dhpool::{PUBLIC_FILENAME, PoolStatus, Retrieval};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Metric label for requests naming a size class that is not served.
const INVALID_CLASS_LABEL: &str = "invalid";

/// Builds the router serving `retrieval`.
pub fn router(retrieval: Retrieval) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/status", get(status_json))
        .route("/get/{class}", get(get_artifact))
        .with_state(retrieval)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}

async fn status_page(State(retrieval): State<Retrieval>) -> Html<String> {
    Html(render_status(&retrieval.status()))
}

async fn status_json(State(retrieval): State<Retrieval>) -> Json<PoolStatus> {
    Json(retrieval.status())
}

#[tracing::instrument(skip(retrieval))]
async fn get_artifact(
    State(retrieval): State<Retrieval>,
    Path(class): Path<String>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let picked = retrieval.pick(&class);
    increment_requests(request_label(&picked, &class));

    let path = picked?;
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Picked file is gone");
            return Err(ApiError::Vanished { class });
        }
        Err(e) => return Err(dhpool::Error::from(e).into()),
    };

    tracing::debug!(path = %path.display(), "Serving parameters");
    increment_artifacts_served(&class);
    record_serve_duration(start.elapsed().as_secs_f64() * 1_000.0);

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{PUBLIC_FILENAME}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// Client input only becomes a metric attribute once it is a served class.
fn request_label<'a>(picked: &dhpool::Result<PathBuf>, class: &'a str) -> &'a str {
    match picked {
        Err(dhpool::Error::UnrecognizedClass { .. }) => INVALID_CLASS_LABEL,
        _ => class,
    }
}

fn render_status(status: &PoolStatus) -> String {
    let mut page = String::from(
        "<html><head><title>Diffie-Hellman parameter distributor</title></head><body>Status: <br />\n",
    );
    for class in &status.classes {
        let _ = writeln!(
            page,
            "{} {}-bit keys available <br />",
            class.available, class.class
        );
    }
    page.push_str("<br />\n<br />\n");
    if let Some(first) = status.classes.first() {
        let url = format!("/get/{}", first.class);
        let _ = write!(
            page,
            "Example usage: query <a href=\"{url}\">{url}</a> to download a {}-bit {PUBLIC_FILENAME} file.",
            first.class
        );
    }
    page.push_str("\n<br /></body></html>");
    page
}
