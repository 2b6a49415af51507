//! Application façades over the server and client.

use std::sync::{Arc, Mutex};

use tokio_rustls::rustls::{ClientConfig, ServerConfig};

use crate::http::client::{HttpClient, HttpClientConfig};
use crate::http::headers::Headers;
use crate::http::message::{HttpRequest, HttpResponse};
use crate::http::method::Method;
use crate::http::router::Router;
use crate::http::server::{HttpServer, HttpServerConfig, HttpServerHandler};
use crate::net::addr::{Endpoint, HostEndpoint};
use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct HttpServerAppConfig {
    pub server: HttpServerConfig,
    /// Value of the `Server:` header stamped on every response.
    pub server_name: String,
}

impl Default for HttpServerAppConfig {
    fn default() -> Self {
        HttpServerAppConfig {
            server: HttpServerConfig::default(),
            server_name: "hawser".to_string(),
        }
    }
}

type ErrorHandler = Box<dyn FnMut(Error) + Send + 'static>;

/// Routed HTTP server with verb registration shortcuts.
///
/// Every outgoing response echoes the request's HTTP version and carries the
/// configured `Server:` name; unmatched or unparseable requests answer 404
/// and 400 on their own.
pub struct HttpServerApp {
    core: Arc<Mutex<AppCore>>,
    server: HttpServer,
}

struct AppCore {
    router: Router,
    server_name: String,
    on_error: Option<ErrorHandler>,
}

impl HttpServerApp {
    /// Must be created from within a Tokio runtime context.
    pub fn new(config: HttpServerAppConfig) -> HttpServerApp {
        HttpServerApp::build(config, None)
    }

    /// An HTTPS variant serving with the given TLS config.
    pub fn new_tls(config: HttpServerAppConfig, tls: Arc<ServerConfig>) -> HttpServerApp {
        HttpServerApp::build(config, Some(tls))
    }

    fn build(config: HttpServerAppConfig, tls: Option<Arc<ServerConfig>>) -> HttpServerApp {
        let core = Arc::new(Mutex::new(AppCore {
            router: Router::new(),
            server_name: config.server_name,
            on_error: None,
        }));
        let server = HttpServer::new(config.server, core.clone(), tls);
        HttpServerApp { core, server }
    }

    pub fn serve(&self, endpoint: Endpoint) -> Result<()> {
        self.server.serve(endpoint)
    }

    pub fn stop(&self) -> Result<()> {
        self.server.stop()
    }

    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.server.local_endpoint()
    }

    pub fn get<F>(&self, path: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + 'static,
    {
        self.add_route(Method::Get, path, handler)
    }

    pub fn post<F>(&self, path: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + 'static,
    {
        self.add_route(Method::Post, path, handler)
    }

    pub fn put<F>(&self, path: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + 'static,
    {
        self.add_route(Method::Put, path, handler)
    }

    pub fn del<F>(&self, path: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + 'static,
    {
        self.add_route(Method::Delete, path, handler)
    }

    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: FnMut(Error) + Send + 'static,
    {
        self.core.lock().unwrap().on_error = Some(Box::new(handler));
    }

    fn add_route<F>(&self, method: Method, path: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + 'static,
    {
        self.core.lock().unwrap().router.add_route(method, path, handler)
    }
}

impl Drop for HttpServerApp {
    fn drop(&mut self) {
        let _ = self.server.stop();
    }
}

impl std::fmt::Debug for HttpServerApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerApp")
            .field("local", &self.local_endpoint())
            .finish()
    }
}

impl HttpServerHandler for AppCore {
    fn on_server_error(&mut self, err: Error) {
        if let Some(on_error) = self.on_error.as_mut() {
            on_error(err);
        }
    }

    fn handle_request(&mut self, request: &HttpRequest) -> HttpResponse {
        let mut response = HttpResponse::default();
        response.set_version(request.version());
        response.set_header("Server", self.server_name.clone());
        self.router.route(request, &mut response);
        response
    }
}

#[derive(Clone, Debug, Default)]
pub struct HttpClientAppConfig {
    pub client: HttpClientConfig,
}

/// Verb-level convenience wrapper over [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientApp {
    client: HttpClient,
}

impl HttpClientApp {
    /// Must be created from within a Tokio runtime context.
    pub fn new(destination: HostEndpoint, config: HttpClientAppConfig) -> HttpClientApp {
        HttpClientApp {
            client: HttpClient::new(destination, config.client, None),
        }
    }

    /// An HTTPS variant connecting with the given TLS config.
    pub fn new_tls(
        destination: HostEndpoint,
        config: HttpClientAppConfig,
        tls: Arc<ClientConfig>,
    ) -> HttpClientApp {
        HttpClientApp {
            client: HttpClient::new(destination, config.client, Some(tls)),
        }
    }

    pub fn get<F>(&self, target: impl Into<String>, headers: &Headers, callback: F)
    where
        F: FnOnce(Result<HttpResponse>) + Send + 'static,
    {
        self.send(Method::Get, target, headers, Vec::new(), callback);
    }

    pub fn post<F>(
        &self,
        target: impl Into<String>,
        headers: &Headers,
        body: impl Into<Vec<u8>>,
        callback: F,
    ) where
        F: FnOnce(Result<HttpResponse>) + Send + 'static,
    {
        self.send(Method::Post, target, headers, body.into(), callback);
    }

    pub fn put<F>(
        &self,
        target: impl Into<String>,
        headers: &Headers,
        body: impl Into<Vec<u8>>,
        callback: F,
    ) where
        F: FnOnce(Result<HttpResponse>) + Send + 'static,
    {
        self.send(Method::Put, target, headers, body.into(), callback);
    }

    pub fn del<F>(
        &self,
        target: impl Into<String>,
        headers: &Headers,
        body: impl Into<Vec<u8>>,
        callback: F,
    ) where
        F: FnOnce(Result<HttpResponse>) + Send + 'static,
    {
        self.send(Method::Delete, target, headers, body.into(), callback);
    }

    fn send<F>(
        &self,
        method: Method,
        target: impl Into<String>,
        headers: &Headers,
        body: Vec<u8>,
        callback: F,
    ) where
        F: FnOnce(Result<HttpResponse>) + Send + 'static,
    {
        let mut request = HttpRequest::new(method, target);
        for (name, value) in headers.iter() {
            request.set_header(name, value);
        }
        request.set_body(body);
        self.client.request(request, callback);
    }
}
