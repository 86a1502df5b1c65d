//! `tiny_http` server loop.
//!
//! Binds with port retry, converts each incoming request into a
//! [`Request`], dispatches it through the shared [`Router`] on a small
//! worker pool and writes the [`Response`] back.

use super::access::{EventTimer, log_access};
use super::base_url::BaseUrlLookup;
use super::{Body, Method, Request, Response, Router};
use crate::log;
use anyhow::{Context, Result};
use std::{
    fs::File,
    io::Read,
    net::{IpAddr, SocketAddr},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};
use tiny_http::{Header, Server, StatusCode};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Worker threads handling requests.
const WORKER_THREADS: usize = 8;

static SERVER: OnceLock<Arc<Server>> = OnceLock::new();
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl+C handler. Call once at program start.
///
/// Before a server is registered the process exits immediately; afterwards
/// the server is unblocked so the request loop can return.
pub fn setup_shutdown_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
        if let Some(server) = SERVER.get() {
            log!("serve"; "shutting down...");
            server.unblock();
        } else {
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_err = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Serve until shutdown (blocking).
pub fn serve(
    interface: IpAddr,
    port: u16,
    router: Arc<Router>,
    base_urls: Arc<BaseUrlLookup>,
) -> Result<()> {
    let (server, addr) = bind_with_retry(interface, port)?;
    let server = Arc::new(server);
    let _ = SERVER.set(Arc::clone(&server));
    log!("serve"; "http://{}", addr);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(WORKER_THREADS)
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        if is_shutdown() {
            break;
        }
        let router = Arc::clone(&router);
        let base_urls = Arc::clone(&base_urls);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &router, &base_urls) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(
    raw: tiny_http::Request,
    router: &Router,
    base_urls: &BaseUrlLookup,
) -> Result<()> {
    let started = Instant::now();
    let request = convert_request(&raw);
    let request = {
        let base = base_urls.for_request(&request).to_string();
        request.with_base_url_path(base)
    };
    let remote = raw.remote_addr().map(|a| a.ip().to_string());

    let mut timer = EventTimer::new();
    timer.start("dispatch");
    let response = router.dispatch(&request);
    timer.stop("dispatch");

    log_access(&request, &response, remote.as_deref(), started.elapsed(), &timer);
    write_response(raw, &request, response)
}

fn convert_request(raw: &tiny_http::Request) -> Request {
    let method = Method::parse(&raw.method().to_string());
    raw.headers()
        .iter()
        .fold(Request::new(method, raw.url()), |req, h| {
            req.with_header(h.field.as_str().as_str(), h.value.as_str())
        })
}

fn write_response(raw: tiny_http::Request, request: &Request, response: Response) -> Result<()> {
    let status = StatusCode(response.status());
    let headers: Vec<Header> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| Header::from_bytes(k.as_bytes(), v.as_bytes()).ok())
        .collect();

    if request.method() == Method::Head {
        return send(raw, tiny_http::Response::empty(status), headers);
    }

    match response.into_body() {
        Body::Empty => send(raw, tiny_http::Response::empty(status), headers),
        Body::Bytes(bytes) => send(
            raw,
            tiny_http::Response::from_data(bytes.to_vec()).with_status_code(status),
            headers,
        ),
        Body::File(path) => match File::open(&path) {
            Ok(file) => send(
                raw,
                tiny_http::Response::from_file(file).with_status_code(status),
                headers,
            ),
            Err(e) => {
                log!("serve"; "failed to open {}: {}", path.display(), e);
                let fallback = Response::not_found();
                let Body::Bytes(bytes) = fallback.into_body() else {
                    return Ok(());
                };
                send(
                    raw,
                    tiny_http::Response::from_data(bytes.to_vec()).with_status_code(404),
                    Vec::new(),
                )
            }
        },
    }
}

fn send<R: Read>(
    raw: tiny_http::Request,
    mut response: tiny_http::Response<R>,
    headers: Vec<Header>,
) -> Result<()> {
    for header in headers {
        response.add_header(header);
    }
    raw.respond(response)?;
    Ok(())
}
