//! HTTP catalog server.
//!
//! Loads one descriptor set at startup, builds the catalog, and serves it
//! read-only until the process exits. There is no reload: a new schema means
//! a new process.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tokio::net::TcpListener;

use protocat_catalog::descriptor::FileDescriptorSet;
use protocat_catalog::{Catalog, CatalogOptions};

use crate::cors::CorsPolicy;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub descriptor: PathBuf,
    pub options: CatalogOptions,
    pub gateway_url: String,
    pub cors: CorsPolicy,
    pub ready_file: Option<PathBuf>,
}

struct ServerState {
    config: ServerConfig,
    catalog: Catalog,
}

#[derive(Serialize)]
struct CommentResponse<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SettingsResponse<'a> {
    services: Vec<String>,
    #[serde(rename = "gatewayUrl")]
    gateway_url: &'a str,
    file_descriptor_set: &'a FileDescriptorSet,
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    // The catalog is complete before anything can observe it.
    let catalog = tokio::task::spawn_blocking({
        let path = config.descriptor.clone();
        let options = config.options;
        move || crate::load_catalog(&path, options)
    })
    .await
    .map_err(|e| anyhow!("serve: failed to join loader task: {e}"))??;

    let state = Arc::new(ServerState {
        config: config.clone(),
        catalog,
    });

    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow!("serve: failed to bind {}: {e}", config.listen))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("serve: failed to read bound addr: {e}"))?;

    tracing::info!(addr = %bound, descriptor = %config.descriptor.display(), "listening");
    if let Some(path) = config.ready_file.as_ref() {
        write_ready_file(path, bound)
            .map_err(|e| anyhow!("serve: failed to write ready file {}: {e}", path.display()))?;
    }

    loop {
        let (stream, _peer) = tokio::select! {
            accepted = listener.accept() => {
                accepted.map_err(|e| anyhow!("serve: accept failed: {e}"))?
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::warn!(error = %e, "connection error");
            }
        });
    }
}

/// Write `{addr, pid}` next to `path` and rename it into place, so a poller
/// sees either no file or the whole document.
fn write_ready_file(path: &Path, bound: SocketAddr) -> std::io::Result<()> {
    let payload = serde_json::json!({
        "addr": bound.to_string(),
        "pid": std::process::id(),
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let text = serde_json::to_string_pretty(&payload).map_err(std::io::Error::other)?;
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    tracing::info!("{} {}", method, req.uri());

    let cors = &state.config.cors;
    let resp = match method {
        Method::OPTIONS => {
            let mut resp = empty_response(StatusCode::NO_CONTENT);
            resp.headers_mut().extend(cors.preflight_headers(req.headers()));
            return Ok(resp);
        }
        Method::GET | Method::HEAD => match decoded_path(req.uri().path()) {
            Some(path) => route(&state, &path),
            None => json_error(StatusCode::BAD_REQUEST, "request path is not valid UTF-8"),
        },
        _ => json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    };

    Ok(with_headers(resp, cors.response_headers(req.headers())))
}

fn route(state: &ServerState, path: &str) -> Response<Full<Bytes>> {
    let catalog = &state.catalog;

    if path == "/healthz" {
        return text_response(StatusCode::OK, "ok\n");
    }
    if path == "/status" {
        return json_response(StatusCode::OK, &catalog.stats());
    }
    if path == "/settings" {
        let settings = SettingsResponse {
            services: catalog.service_names(),
            gateway_url: &state.config.gateway_url,
            file_descriptor_set: catalog.snapshot().descriptor_set(),
        };
        return json_response(StatusCode::OK, &settings);
    }
    if let Some(name) = tail_segment(path, "/messages/") {
        return match catalog.get_message(name) {
            Some(msg) => json_response(StatusCode::OK, msg),
            None => not_found(name),
        };
    }
    if let Some(name) = tail_segment(path, "/services/") {
        return match catalog.get_service(name) {
            Some(svc) => json_response(StatusCode::OK, svc),
            None => not_found(name),
        };
    }
    if let Some(name) = tail_segment(path, "/comments/") {
        let body = CommentResponse {
            text: catalog.comment(name),
        };
        return json_response(StatusCode::OK, &body);
    }

    json_error(StatusCode::NOT_FOUND, "not found")
}

/// Request path with percent-escapes decoded. Fallback comment keys such as
/// `demo.path:[5 0]` only arrive encoded.
fn decoded_path(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|p| p.into_owned())
}

/// `/prefix/{name}` → `name`; `None` for deeper paths.
fn tail_segment<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (!rest.contains('/')).then_some(rest)
}

fn not_found(name: &str) -> Response<Full<Bytes>> {
    tracing::info!(name, "could not find definition");
    json_error(StatusCode::NOT_FOUND, &format!("could not find `{name}`"))
}

fn with_headers(mut resp: Response<Full<Bytes>>, headers: HeaderMap) -> Response<Full<Bytes>> {
    resp.headers_mut().extend(headers);
    resp
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, msg: &str) -> Response<Full<Bytes>> {
    let v = serde_json::json!({ "error": msg });
    json_response(status, &v)
}
