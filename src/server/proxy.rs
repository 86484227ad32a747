//! Reverse proxy to the development site.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use super::reload::CLIENT_SCRIPT_PATH;
use super::routes::AppState;

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Turn a bare host (`mysite.local`, `localhost:8000/`) into a base URL.
pub fn normalize_target(target: &str) -> String {
    let trimmed = target.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Insert the live-reload client before the last `</body>`, or append it.
pub fn inject_client_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}" async></script>"#, CLIENT_SCRIPT_PATH);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], tag, &html[idx..]),
        None => format!("{}{}", html, tag),
    }
}

/// Inject into an HTML body. Bodies that are not valid UTF-8 pass through
/// untouched.
fn rewrite_html(bytes: Bytes) -> Bytes {
    match std::str::from_utf8(&bytes) {
        Ok(html) => Bytes::from(inject_client_script(html)),
        Err(_) => {
            tracing::debug!("Proxied HTML is not UTF-8, live-reload script not injected");
            bytes
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn forwardable(headers: &HeaderMap, skip: &[HeaderName]) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        if is_hop_by_hop(name) || skip.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

pub async fn proxy_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let uri = req.uri().clone();
    match forward(&state, req).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Proxy request {} failed: {:#}", uri, e);
            (StatusCode::BAD_GATEWAY, format!("Proxy error: {}", e)).into_response()
        }
    }
}

async fn forward(state: &AppState, req: Request) -> anyhow::Result<Response> {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.target, path_and_query);

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;

    let mut headers = forwardable(&parts.headers, &[header::HOST, header::ACCEPT_ENCODING]);
    // the body may be rewritten, so ask for it uncompressed
    headers.insert(header::ACCEPT_ENCODING, header::HeaderValue::from_static("identity"));

    let upstream = state
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let is_html = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false);
    let response_headers = forwardable(upstream.headers(), &[header::CONTENT_LENGTH]);
    let bytes = upstream.bytes().await?;

    let body = if is_html {
        Body::from(rewrite_html(bytes))
    } else {
        Body::from(bytes)
    };

    let mut response = Response::builder().status(status).body(body)?;
    *response.headers_mut() = response_headers;
    Ok(response)
}
