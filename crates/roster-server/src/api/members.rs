//! `/members`: metric updates pushed by the measurement page
//!
//! The route accepts every method so that anything but `POST` gets the same
//! `405` carrying the fixed cross-origin headers the page expects.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::AppState;
use crate::pipeline::Updater;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST,OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

pub async fn member_metrics(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return method_not_allowed();
    }

    let update = match Updater::parse_request(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Rejected metric update");
            return e.status_code().into_response();
        }
    };

    match state.updater.apply(update).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => e.status_code().into_response(),
    }
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN)),
            (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS)),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS)),
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
        ],
    )
        .into_response()
}
