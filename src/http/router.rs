//! Ordered GET routing with fall-through.
//!
//! Routes are tried in registration order. A handler either responds or
//! passes with [`Outcome::Next`], letting later routes (and finally the
//! not-found handler) see the request. A handler failing with
//! [`AccessRestricted`] gets a 403 instead of the error handler.

use super::{Method, Request, Response};
use crate::log;
use crate::utils::mime::types;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Handler error denying the client access to a resource.
#[derive(Debug, Clone, Copy, Error)]
#[error("access restricted")]
pub struct AccessRestricted;

pub enum Outcome {
    Respond(Response),
    Next,
}

/// Route handler. The second argument is the path remainder after a prefix
/// route's prefix (empty for exact routes).
pub type Handler = Arc<dyn Fn(&Request, &str) -> anyhow::Result<Outcome> + Send + Sync>;

type PageHandler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&Request, &anyhow::Error) -> Response + Send + Sync>;

enum Pattern {
    Exact(String),
    Prefix(String),
}

impl Pattern {
    /// Case-insensitive match, returning the remainder on success.
    fn matches<'a>(&self, path: &'a str) -> Option<&'a str> {
        match self {
            Self::Exact(p) => path.eq_ignore_ascii_case(p).then_some(""),
            Self::Prefix(p) => {
                let head = path.get(..p.len())?;
                head.eq_ignore_ascii_case(p).then(|| &path[p.len()..])
            }
        }
    }
}

struct Route {
    pattern: Pattern,
    handler: Handler,
}

pub struct Router {
    routes: Vec<Route>,
    not_found: PageHandler,
    access_restricted: PageHandler,
    error: ErrorHandler,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            not_found: Arc::new(|_| Response::not_found()),
            access_restricted: Arc::new(|_| Response::access_restricted()),
            error: Arc::new(|_, _| Response::server_error()),
        }
    }

    /// Register a GET route on an exact path.
    pub fn get<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &str) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        self.routes.push(Route {
            pattern: Pattern::Exact(path.to_string()),
            handler: Arc::new(handler),
        });
        self
    }

    /// Register a GET route on every path under `prefix`.
    pub fn get_prefix<F>(&mut self, prefix: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &str) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        self.routes.push(Route {
            pattern: Pattern::Prefix(prefix.to_string()),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn on_not_found<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.not_found = Arc::new(handler);
        self
    }

    /// Page for [`AccessRestricted`] failures. XHR requests always get a
    /// JSON body instead.
    pub fn on_access_restricted<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.access_restricted = Arc::new(handler);
        self
    }

    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Request, &anyhow::Error) -> Response + Send + Sync + 'static,
    {
        self.error = Arc::new(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Run the request through the route table.
    ///
    /// Handler failures never escape: they are logged and turned into the
    /// error handler's response.
    pub fn dispatch(&self, request: &Request) -> Response {
        if matches!(request.method(), Method::Get | Method::Head) {
            for route in &self.routes {
                let Some(rest) = route.pattern.matches(request.path()) else {
                    continue;
                };
                match (route.handler)(request, rest) {
                    Ok(Outcome::Respond(response)) => return response,
                    Ok(Outcome::Next) => continue,
                    Err(e) if e.is::<AccessRestricted>() => return self.restricted(request),
                    Err(e) => {
                        log!("error"; "{} {}: {:#}", request.method().as_str(), request.path(), e);
                        return (self.error)(request, &e);
                    }
                }
            }
        }
        (self.not_found)(request)
    }

    fn restricted(&self, request: &Request) -> Response {
        if request.is_xhr() {
            let body = json!({"status": "error", "error": "access restricted"}).to_string();
            return Response::ok(types::JSON, body.into_bytes()).with_status(403);
        }
        (self.access_restricted)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::mime::types;

    fn text(body: &'static str) -> Outcome {
        Outcome::Respond(Response::ok(types::PLAIN, body.as_bytes()))
    }

    fn body_of(res: &Response) -> Vec<u8> {
        match res.body() {
            super::super::Body::Bytes(b) => b.to_vec(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_exact_and_prefix() {
        let mut router = Router::new();
        router.get("/a.js", |_, _| Ok(text("exact")));
        router.get_prefix("/static/", |_, rest| {
            Ok(Outcome::Respond(Response::ok(
                types::PLAIN,
                rest.as_bytes().to_vec(),
            )))
        });

        assert_eq!(body_of(&router.dispatch(&Request::get("/A.JS"))), b"exact");
        assert_eq!(
            body_of(&router.dispatch(&Request::get("/Static/img/x.png"))),
            b"img/x.png"
        );
        assert_eq!(router.dispatch(&Request::get("/other")).status(), 404);
    }

    #[test]
    fn test_fall_through() {
        let mut router = Router::new();
        router.get_prefix("/r/", |_, _| Ok(Outcome::Next));
        router.get_prefix("/r/", |_, _| Ok(text("second")));
        assert_eq!(body_of(&router.dispatch(&Request::get("/r/x"))), b"second");
    }

    #[test]
    fn test_error_handler() {
        let mut router = Router::new();
        router.get("/boom", |_, _| Err(anyhow::anyhow!("boom")));
        router.on_error(|_, e| Response::ok(types::PLAIN, e.to_string().into_bytes()).with_status(500));
        crate::logger::set_quiet(true);
        let res = router.dispatch(&Request::get("/boom"));
        assert_eq!(res.status(), 500);
        assert_eq!(body_of(&res), b"boom");
    }

    #[test]
    fn test_access_restricted() {
        let mut router = Router::new();
        router.get("/admin", |_, _| Err(AccessRestricted.into()));
        router.on_error(|_, _| Response::server_error());

        let res = router.dispatch(&Request::get("/admin"));
        assert_eq!(res.status(), 403);
        assert_eq!(body_of(&res), b"Access Restricted");

        let xhr = Request::get("/admin").with_header("X-Requested-With", "XMLHttpRequest");
        let res = router.dispatch(&xhr);
        assert_eq!(res.status(), 403);
        assert_eq!(res.header("Content-Type"), Some(types::JSON));
        assert_eq!(body_of(&res), br#"{"status":"error","error":"access restricted"}"#);

        router.on_access_restricted(|_| Response::ok(types::HTML, b"custom".as_slice()).with_status(403));
        assert_eq!(body_of(&router.dispatch(&Request::get("/admin"))), b"custom");
    }

    #[test]
    fn test_non_get_is_not_routed() {
        let mut router = Router::new();
        router.get("/a", |_, _| Ok(text("a")));
        let res = router.dispatch(&Request::new(Method::Post, "/a"));
        assert_eq!(res.status(), 404);
    }
}
