//! The HTTP companion: three unauthenticated endpoints
//! serving the gateway's CA identity, plus one token-authenticated
//! `known_hosts` fragment. Grounded on the `poem`-based
//! `warpgate-protocol-http` crate — same server stack, timeouts and
//! graceful-shutdown shape — trimmed to a `Route` with four handlers instead
//! of its full admin UI/API/SSO/proxy surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use data_encoding::BASE64;
use poem::http::{header, StatusCode};
use poem::listener::TcpListener;
use poem::middleware::Timeout;
use poem::web::Data;
use poem::{handler, EndpointExt, IntoResponse, Request, Response, Route, Server};
use tokio::sync::Notify;
use tracing::info;
use vandrare_core::ca::host_certificate_principals;
use vandrare_core::Services;

/// Read/write timeout applied to every request: server-wide read/write
/// timeouts of one minute. `poem`'s high-level
/// `Server` doesn't expose the header-read-timeout/max-header-bytes knobs
/// independently of the request timeout below; those two finer limits are
/// left to hyper's own defaults rather than faked with a hand-rolled
/// listener.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(60);

pub struct HttpState {
    pub services: Services,
    /// Authorized-keys-format rendering of this process's host certificate —
    /// the very one installed into the SSH listener, not a freshly issued
    /// one (`CaKey::issue_host_certificate` mints a new key and signature on
    /// every call, so the binary issues it once and shares the string).
    pub host_certificate_openssh: String,
}

pub async fn run_server(state: Arc<HttpState>, bind: SocketAddr, shutdown: Arc<Notify>) -> Result<()> {
    let app = Route::new()
        .at("/health/liveness", poem::get(liveness))
        .at("/gateway/ssh/certificates/host_ca.pub", poem::get(host_ca_pub))
        .at("/gateway/ssh/certificates/self", poem::get(host_certificate_self))
        .at("/gateway/ssh/certificates/known_hosts", poem::get(known_hosts))
        .data(state)
        .with(Timeout::new(REQUEST_TIMEOUT));

    info!(%bind, "HTTP listener starting");
    Server::new(TcpListener::bind(bind))
        .run_with_graceful_shutdown(app, async move { shutdown.notified().await }, Some(SHUTDOWN_DRAIN))
        .await
        .with_context(|| format!("running HTTP listener on {bind}"))
}

#[handler]
fn liveness() -> Response {
    let now = now_rfc3339();
    json_response(serde_json::json!({ "now": now }).to_string())
}

#[handler]
fn host_ca_pub(state: Data<&Arc<HttpState>>) -> Response {
    match state.services.ca.public_key_openssh() {
        Ok(line) => text_response(line),
        Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string()),
    }
}

#[handler]
fn host_certificate_self(state: Data<&Arc<HttpState>>) -> Response {
    text_response(state.host_certificate_openssh.clone())
}

#[handler]
async fn known_hosts(req: &Request, state: Data<&Arc<HttpState>>) -> Response {
    let Some(token) = extract_token(req) else {
        return error_response(StatusCode::UNAUTHORIZED, "missing bearer/basic token");
    };

    let authorized = {
        let store = state.services.store.lock().await;
        match store.ops(false).await {
            Ok(mut ops) => {
                let result = ops.tokens().valid(&token).await;
                let _ = ops.close().await;
                matches!(result, Ok((true, _)))
            }
            Err(_) => false,
        }
    };

    if !authorized {
        return error_response(StatusCode::UNAUTHORIZED, "invalid token");
    }

    let principals = host_certificate_principals(&state.services.config.self_domains);
    let ca_pubkey = match state.services.ca.public_key_openssh() {
        Ok(key) => key,
        Err(error) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string()),
    };
    let body = vandrare_core::known_hosts::render(
        &state.services.ca.fingerprint(),
        &ca_pubkey,
        &principals,
        &state.services.config.subdomains,
    );
    text_response(body)
}

/// Bearer token, or HTTP Basic where the password field carries the token
/// and the user field is ignored.
fn extract_token(req: &Request) -> Option<String> {
    let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    if let Some(token) = header.strip_prefix("Bearer ") {
        return Some(token.to_string());
    }
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_user, password) = decoded.split_once(':')?;
    Some(password.to_string())
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

fn text_response(body: String) -> Response {
    Response::builder().content_type("text/plain").body(body)
}

fn json_response(body: String) -> Response {
    Response::builder().content_type("text/json").body(body)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_token_prefers_bearer() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc123")
            .finish();
        assert_eq!(extract_token(&req), Some("abc123".to_string()));
    }

    #[test]
    fn extract_token_reads_basic_password_as_token() {
        let encoded = BASE64.encode(b"ignored-user:the-token");
        let req = Request::builder()
            .header(header::AUTHORIZATION, format!("Basic {encoded}"))
            .finish();
        assert_eq!(extract_token(&req), Some("the-token".to_string()));
    }

    #[test]
    fn extract_token_rejects_missing_header() {
        let req = Request::builder().finish();
        assert_eq!(extract_token(&req), None);
    }
}
