//! Construction surface for the HTTP layer.

use std::sync::{Arc, Mutex};

use tokio_rustls::rustls::{ClientConfig, ServerConfig};

use crate::http::client::{HttpClient, HttpClientConfig};
use crate::http::server::{HttpServer, HttpServerConfig, HttpServerHandler};
use crate::net::addr::HostEndpoint;

/// Composes sockets and acceptors into HTTP clients and servers.
///
/// Every `create_*` method must be called from within a Tokio runtime
/// context.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpFactory {
    _priv: (),
}

impl HttpFactory {
    pub fn new() -> HttpFactory {
        HttpFactory { _priv: () }
    }

    pub fn create_http_client(
        &self,
        destination: HostEndpoint,
        config: HttpClientConfig,
    ) -> HttpClient {
        HttpClient::new(destination, config, None)
    }

    pub fn create_https_client(
        &self,
        destination: HostEndpoint,
        config: HttpClientConfig,
        tls: Arc<ClientConfig>,
    ) -> HttpClient {
        HttpClient::new(destination, config, Some(tls))
    }

    /// The server holds the strong handler reference; keep a clone only if
    /// the application needs to reach the handler while the server runs.
    pub fn create_http_server<H>(
        &self,
        config: HttpServerConfig,
        handler: Arc<Mutex<H>>,
    ) -> HttpServer
    where
        H: HttpServerHandler,
    {
        HttpServer::new(config, handler, None)
    }

    pub fn create_https_server<H>(
        &self,
        config: HttpServerConfig,
        handler: Arc<Mutex<H>>,
        tls: Arc<ServerConfig>,
    ) -> HttpServer
    where
        H: HttpServerHandler,
    {
        HttpServer::new(config, handler, Some(tls))
    }
}
