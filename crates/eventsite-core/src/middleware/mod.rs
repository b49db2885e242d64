//! Middleware implementations
//!
//! Middleware run synchronously around a handler: `before` in
//! registration order (any of them may answer early), `after` in
//! reverse order.

pub mod body_limit;
pub mod cors;
pub mod jwt;
pub mod trace;

pub use body_limit::{format_size, BodyLimit, BodyLimitConfig};
pub use cors::{Cors, CorsConfig};
pub use jwt::{Jwt, JwtAuth, JwtConfig, JwtError};
pub use trace::{RequestId, Trace, TraceConfig};

use crate::{Request, Response};

/// Middleware trait - process request/response
pub trait Middleware: Send + Sync {
    /// Process request before handler; `Some` short-circuits the chain
    fn before(&self, req: &mut Request) -> Option<Response>;

    /// Process response after handler
    fn after(&self, req: &Request, res: &mut Response);
}

/// Middleware chain
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Builder-style [`add`](Self::add)
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run before middlewares, return early response if any
    ///
    /// When a middleware answers early, the `after` hooks of the
    /// middlewares that already ran are applied to that response.
    pub fn run_before(&self, req: &mut Request) -> Option<Response> {
        for (i, m) in self.middlewares.iter().enumerate() {
            if let Some(mut res) = m.before(req) {
                for ran in self.middlewares[..i].iter().rev() {
                    ran.after(req, &mut res);
                }
                return Some(res);
            }
        }
        None
    }

    /// Run after middlewares in reverse order
    pub fn run_after(&self, req: &Request, res: &mut Response) {
        for m in self.middlewares.iter().rev() {
            m.after(req, res);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, RequestBuilder, StatusCode};
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        stop: bool,
    }

    impl Middleware for Recorder {
        fn before(&self, _req: &mut Request) -> Option<Response> {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            self.stop.then(|| Response::new(StatusCode::FORBIDDEN))
        }

        fn after(&self, _req: &Request, _res: &mut Response) {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
        }
    }

    #[test]
    fn test_chain_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .with(Recorder { name: "a", log: log.clone(), stop: false })
            .with(Recorder { name: "b", log: log.clone(), stop: false });

        let mut req = RequestBuilder::new(Method::Get, "/").build();
        assert!(chain.run_before(&mut req).is_none());
        let mut res = Response::ok();
        chain.run_after(&req, &mut res);

        assert_eq!(
            *log.lock().unwrap(),
            ["before:a", "before:b", "after:b", "after:a"]
        );
    }

    #[test]
    fn test_short_circuit_unwinds_ran_middlewares() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .with(Recorder { name: "a", log: log.clone(), stop: false })
            .with(Recorder { name: "b", log: log.clone(), stop: true })
            .with(Recorder { name: "c", log: log.clone(), stop: false });

        let mut req = RequestBuilder::new(Method::Get, "/").build();
        let res = chain.run_before(&mut req).unwrap();

        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(*log.lock().unwrap(), ["before:a", "before:b", "after:a"]);
    }
}
