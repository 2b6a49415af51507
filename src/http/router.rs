//! Exact-match request routing.

use std::collections::HashMap;
use std::fmt;

use http::Uri;

use crate::http::message::{HttpRequest, HttpResponse};
use crate::http::method::Method;
use crate::http::status::StatusCode;
use crate::{Error, Result};

/// A registered route handler.
pub type RouteHandler = Box<dyn Fn(&HttpRequest, &mut HttpResponse) + Send + 'static>;

/// Dispatches requests on exact `(method, path)` pairs.
///
/// The request target is parsed as an origin-form URI; the query string never
/// participates in matching and the raw target reaches handlers untouched.
#[derive(Default)]
pub struct Router {
    routes: HashMap<(Method, String), RouteHandler>,
}

impl Router {
    pub fn new() -> Router {
        Router::default()
    }

    /// Registers a handler; a second route for the same method and path is
    /// refused.
    pub fn add_route<F>(&mut self, method: Method, path: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + 'static,
    {
        let key = (method, path.into());
        if self.routes.contains_key(&key) {
            return Err(Error::new_duplicate_route());
        }
        self.routes.insert(key, Box::new(handler));
        Ok(())
    }

    /// Fills `response` by dispatching `request`.
    ///
    /// An unparseable target yields `400 Bad Request`; an unmatched route
    /// yields `404 Not Found`, both with plaintext bodies naming the status.
    pub fn route(&self, request: &HttpRequest, response: &mut HttpResponse) {
        let Some(path) = origin_form_path(request.target()) else {
            response.set_status(StatusCode::BadRequest);
            response.set_body("400 Bad Request");
            return;
        };

        match self.routes.get(&(request.method(), path)) {
            Some(handler) => handler(request, response),
            None => {
                response.set_status(StatusCode::NotFound);
                response.set_body("404 Not Found");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes.len()).finish()
    }
}

fn origin_form_path(target: &str) -> Option<String> {
    if !target.starts_with('/') {
        return None;
    }
    let uri: Uri = target.parse().ok()?;
    if uri.scheme().is_some() || uri.authority().is_some() {
        return None;
    }
    Some(uri.path().to_string())
}
