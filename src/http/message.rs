//! Request and response value types.

use std::fmt;

use crate::http::headers::Headers;
use crate::http::method::Method;
use crate::http::status::StatusCode;

/// An HTTP/1.x request.
///
/// The target is carried exactly as the peer supplied it; nothing here
/// canonicalizes it. `version` is encoded as `10` or `11`.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    method: Method,
    target: String,
    version: u8,
    headers: Headers,
    body: Vec<u8>,
}

impl Default for HttpRequest {
    fn default() -> HttpRequest {
        HttpRequest::new(Method::Unknown, "")
    }
}

impl HttpRequest {
    pub fn new(method: Method, target: impl Into<String>) -> HttpRequest {
        HttpRequest {
            method,
            target: target.into(),
            version: 11,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// An HTTP/1.x response.
#[derive(Clone, PartialEq)]
pub struct HttpResponse {
    status: StatusCode,
    version: u8,
    headers: Headers,
    body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> HttpResponse {
        HttpResponse {
            status: StatusCode::Ok,
            version: 11,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> HttpResponse {
        HttpResponse {
            status,
            ..HttpResponse::default()
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    fn with_status(&mut self, status: StatusCode, body: &[u8]) -> &mut Self {
        self.status = status;
        if !body.is_empty() {
            self.body = body.to_vec();
        }
        self
    }

    pub fn ok(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.with_status(StatusCode::Ok, body.as_ref())
    }

    pub fn created(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.with_status(StatusCode::Created, body.as_ref())
    }

    pub fn no_content(&mut self) -> &mut Self {
        self.status = StatusCode::NoContent;
        self.body.clear();
        self
    }

    pub fn bad_request(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.with_status(StatusCode::BadRequest, body.as_ref())
    }

    pub fn unauthorized(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.with_status(StatusCode::Unauthorized, body.as_ref())
    }

    pub fn forbidden(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.with_status(StatusCode::Forbidden, body.as_ref())
    }

    pub fn not_found(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.with_status(StatusCode::NotFound, body.as_ref())
    }

    pub fn internal_server_error(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.with_status(StatusCode::InternalServerError, body.as_ref())
    }

    pub fn json(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        self.set_header("Content-Type", "application/json");
        self
    }

    pub fn text(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        self.set_header("Content-Type", "text/plain");
        self
    }

    pub fn html(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        self.set_header("Content-Type", "text/html");
        self
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}
