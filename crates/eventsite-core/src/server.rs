//! Native HTTP server implementation
//!
//! hyper HTTP/1.1 on a multi-threaded tokio runtime:
//! - [`App`] holds the API router, middleware and the static bundle
//! - SO_REUSEPORT / TCP_NODELAY tuned listener
//! - bounded body collection
//! - graceful shutdown that drains open connections

use crate::handlers::StaticFiles;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::{Method, Request, Response, Result, StatusCode};
use bytes::Bytes;
use eventsite_router::Router;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub workers: usize,
    /// How long to wait for open connections on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            workers: num_cpus::get(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Dynamic route handler type
pub type DynamicHandler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// Wrap an async fn or closure as a [`DynamicHandler`]
pub fn handler<F, Fut>(f: F) -> DynamicHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req| -> HandlerFuture { Box::pin(f(req)) })
}

#[derive(Clone)]
struct Endpoint {
    handler: DynamicHandler,
    middleware: Option<Arc<MiddlewareChain>>,
}

/// Application state shared across all connections
pub struct App {
    router: Router<Endpoint>,
    middleware: MiddlewareChain,
    static_files: Option<StaticFiles>,
    max_body_size: usize,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            middleware: MiddlewareChain::new(),
            static_files: None,
            max_body_size: 1024 * 1024,
        }
    }

    /// Add a global middleware
    pub fn wrap<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.add(middleware);
        self
    }

    /// Serve GET/HEAD requests that match no API route from `files`
    pub fn static_files(mut self, files: StaticFiles) -> Self {
        self.static_files = Some(files);
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn body_limit(&self) -> usize {
        self.max_body_size
    }

    pub fn route(&mut self, method: Method, path: &str, handler: DynamicHandler) -> Result<()> {
        self.router.insert(
            method.as_str(),
            path,
            Endpoint {
                handler,
                middleware: None,
            },
        )?;
        Ok(())
    }

    /// Register a route behind its own middleware chain
    pub fn route_with(
        &mut self,
        method: Method,
        path: &str,
        middleware: Arc<MiddlewareChain>,
        handler: DynamicHandler,
    ) -> Result<()> {
        self.router.insert(
            method.as_str(),
            path,
            Endpoint {
                handler,
                middleware: Some(middleware),
            },
        )?;
        Ok(())
    }

    /// Run a request through global middleware and dispatch
    pub async fn handle(&self, mut req: Request) -> Response {
        if let Some(res) = self.middleware.run_before(&mut req) {
            return res;
        }
        let mut res = self.dispatch(&mut req).await;
        self.middleware.run_after(&req, &mut res);
        res
    }

    /// Answer with `res` unless global middleware answers first
    ///
    /// Used for requests rejected before they reach the router.
    pub fn respond(&self, mut req: Request, mut res: Response) -> Response {
        if let Some(early) = self.middleware.run_before(&mut req) {
            return early;
        }
        self.middleware.run_after(&req, &mut res);
        res
    }

    async fn dispatch(&self, req: &mut Request) -> Response {
        let found = self
            .router
            .find(req.method.as_str(), &req.path)
            .map(|m| (m.value.clone(), m.params_map()));

        if let Some((endpoint, params)) = found {
            req.params = params;
            return match endpoint.middleware {
                Some(chain) => {
                    if let Some(res) = chain.run_before(req) {
                        return res;
                    }
                    let mut res = (endpoint.handler)(req.clone()).await;
                    chain.run_after(req, &mut res);
                    res
                }
                None => (endpoint.handler)(req.clone()).await,
            };
        }

        let allowed = self.router.allowed_methods(&req.path);
        if !allowed.is_empty() {
            let mut res = Response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
            res.set_header("Allow", allowed.join(", "));
            return res;
        }

        if req.path == "/api" || req.path.starts_with("/api/") {
            return Response::error(StatusCode::NOT_FOUND, "Not found");
        }

        match &self.static_files {
            Some(files) if req.method.is_read() => files.handle(req).await,
            _ => Response::not_found(),
        }
    }
}

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    socket.set_nodelay(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Bind a non-blocking tokio listener on a tuned socket
pub fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = create_optimized_socket(&addr)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// Convert request head and collected body to our Request type
pub fn from_hyper_parts(
    parts: http::request::Parts,
    body: Bytes,
    remote_addr: SocketAddr,
) -> Option<Request> {
    let method = Method::from_str(parts.method.as_str()).ok()?;

    let mut request = Request::new(method, parts.uri.path());
    request.query = parts.uri.query().map(str::to_string);
    request.remote_addr = Some(remote_addr);
    request.body = body;

    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            request.headers.push((name.as_str().to_string(), v.to_string()));
        }
    }

    Some(request)
}

/// Convert our Response to hyper Response
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(res.status.as_u16());

    for (name, value) in &res.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(Full::new(res.body)) {
        Ok(res) => res,
        Err(e) => {
            tracing::error!(error = %e, "invalid response head");
            let mut res = hyper::Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            res
        }
    }
}

async fn handle_request(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let collected = Limited::new(body, app.max_body_size).collect().await;
    let (body, body_error) = match collected {
        Ok(collected) => (collected.to_bytes(), None),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            let err = crate::Error::BodyTooLarge {
                size: parts
                    .headers
                    .get(http::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
                limit: app.max_body_size,
            };
            tracing::debug!(error = %err, "rejecting request body");
            (
                Bytes::new(),
                Some(Response::error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")),
            )
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            (
                Bytes::new(),
                Some(Response::error(StatusCode::BAD_REQUEST, "Failed to read request body")),
            )
        }
    };

    let Some(request) = from_hyper_parts(parts, body, remote_addr) else {
        return Ok(to_hyper_response(Response::error(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        )));
    };

    let response = match body_error {
        Some(rejected) => app.respond(request, rejected),
        None => app.handle(request).await,
    };
    Ok(to_hyper_response(response))
}

/// Tracks active connections for graceful shutdown
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
    shutting_down: AtomicBool,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn start_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Wait until all connections closed; false if `timeout` ran out first
    pub async fn drain(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.count() > 0 {
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

/// HTTP server
pub struct Server {
    app: Arc<App>,
    config: ServerConfig,
    tracker: Arc<ConnectionTracker>,
}

impl Server {
    pub fn new(app: App, config: ServerConfig) -> Self {
        Self {
            app: Arc::new(app),
            config,
            tracker: Arc::new(ConnectionTracker::new()),
        }
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        self.tracker.clone()
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let listener = bind(self.config.listen)?;
        self.run_on(listener, shutdown).await
    }

    /// Serve on an existing listener until `shutdown` resolves
    pub async fn run_on(self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<()> {
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper_util::rt::TokioIo;

        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, workers = self.config.workers, "listening");

        let (close_tx, close_rx) = tokio::sync::watch::channel(());
        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };

            if self.tracker.is_shutting_down() {
                drop(stream);
                continue;
            }

            let app = self.app.clone();
            let tracker = self.tracker.clone();
            let mut close_rx = close_rx.clone();
            tracker.increment();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| handle_request(app.clone(), req, remote_addr));

                let conn = http1::Builder::new().serve_connection(io, service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    res = conn.as_mut() => res,
                    _ = close_rx.changed() => {
                        conn.as_mut().graceful_shutdown();
                        conn.as_mut().await
                    }
                };

                if let Err(e) = result {
                    if !e.is_incomplete_message() {
                        tracing::debug!(peer = %remote_addr, error = %e, "connection error");
                    }
                }
                tracker.decrement();
            });
        }

        self.tracker.start_shutdown();
        drop(listener);
        close_tx.send_replace(());

        let open = self.tracker.count();
        tracing::info!(open, "shutting down, draining connections");
        if !self.tracker.drain(self.config.shutdown_timeout).await {
            tracing::warn!(open = self.tracker.count(), "shutdown timeout reached with open connections");
        }
        Ok(())
    }
}
