//! HTTP/1.1 server: acceptor ownership and per-connection sessions.

use std::sync::{Arc, Mutex};

use tokio_rustls::rustls::ServerConfig;
use tracing::trace;

use crate::common::handler::ExpiringRef;
use crate::http::message::{HttpRequest, HttpResponse};
use crate::net::accept::{TcpAcceptor, TcpAcceptorHandler};
use crate::net::addr::Endpoint;
use crate::net::config::TcpAcceptorConfig;
use crate::net::factory::SocketFactory;
use crate::net::inbound::{InboundInner, TcpInboundSocket, TcpInboundSocketHandler};
use crate::proto::h1::{encode_response, MessageParser};
use crate::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct HttpServerConfig {
    pub acceptor: TcpAcceptorConfig,
}

/// The application side of an [`HttpServer`].
pub trait HttpServerHandler: Send + 'static {
    fn on_server_started(&mut self) {}
    fn on_server_stopped(&mut self) {}
    fn on_server_error(&mut self, err: Error);
    fn handle_request(&mut self, request: &HttpRequest) -> HttpResponse;
}

pub(crate) type SharedHandler = Arc<Mutex<dyn HttpServerHandler>>;

/// Accepts connections and runs one [`Session`] per peer.
///
/// The server holds the strong reference to the shared handler; every
/// session holds an expiring one. Dropping the server therefore silences all
/// live sessions at once, without joining them.
pub struct HttpServer {
    handler: SharedHandler,
    acceptor: TcpAcceptor,
}

impl HttpServer {
    /// Must be created from within a Tokio runtime context.
    pub(crate) fn new(
        config: HttpServerConfig,
        handler: SharedHandler,
        tls: Option<Arc<ServerConfig>>,
    ) -> HttpServer {
        let bridge = Bridge {
            handler: ExpiringRef::new(&handler),
        };
        let factory = SocketFactory::new();
        let acceptor = match tls {
            None => factory.create_tcp_acceptor(config.acceptor, bridge),
            Some(tls) => factory.create_ssl_tcp_acceptor(config.acceptor, tls, bridge),
        };
        HttpServer { handler, acceptor }
    }

    /// Binds `endpoint` and starts accepting.
    pub fn serve(&self, endpoint: Endpoint) -> Result<()> {
        self.acceptor.listen(endpoint)?;
        self.handler.lock().unwrap().on_server_started();
        Ok(())
    }

    /// Stops accepting new connections.
    pub fn stop(&self) -> Result<()> {
        self.acceptor.close()?;
        self.handler.lock().unwrap().on_server_stopped();
        Ok(())
    }

    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.acceptor.local_endpoint()
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("local", &self.local_endpoint())
            .finish()
    }
}

/// Acceptor observer spawning sessions.
struct Bridge {
    handler: ExpiringRef<dyn HttpServerHandler>,
}

impl TcpAcceptorHandler for Bridge {
    fn on_accepted(&mut self, socket: TcpInboundSocket) {
        if !self.handler.is_valid() {
            return;
        }
        Session::run(socket, self.handler.clone());
    }

    fn on_accept_error(&mut self, err: Error) {
        self.handler.with(|h| h.on_server_error(err));
    }
}

/// One connection's state: socket, request parser, expirable handler ref.
///
/// The session becomes the socket's observer, so the socket keeps it alive
/// through all async work and releases it with the terminal disconnect
/// event.
struct Session {
    socket: TcpInboundSocket,
    parser: MessageParser<HttpRequest>,
    handler: ExpiringRef<dyn HttpServerHandler>,
}

impl Session {
    fn run(socket: TcpInboundSocket, handler: ExpiringRef<dyn HttpServerHandler>) {
        let shared = socket.shared();
        let session = Session {
            socket,
            parser: MessageParser::new(),
            handler,
        };
        shared.install(Box::new(session));
        InboundInner::start_read(&shared);
    }
}

impl TcpInboundSocketHandler for Session {
    fn on_data_read(&mut self, data: &[u8]) {
        let mut requests = Vec::new();
        if let Err(err) = self.parser.feed(data, |request| requests.push(request)) {
            self.handler.with(|h| h.on_server_error(err));
            let _ = self.socket.disconnect(false);
            return;
        }

        for request in requests {
            // An expired handler means the server is gone; the session goes
            // quiet and drops with the next disconnect.
            let Some(response) = self.handler.with(|h| h.handle_request(&request)) else {
                return;
            };
            trace!(
                "{} {} -> {}",
                request.method(),
                request.target(),
                response.status()
            );

            let chunks = encode_response(&response);
            for chunk in &chunks {
                if let Err(err) = self.socket.send(chunk) {
                    self.handler.with(|h| h.on_server_error(err));
                    let _ = self.socket.disconnect(false);
                    return;
                }
            }
        }
    }

    fn on_data_sent(&mut self, _data: &[u8]) {}

    fn on_disconnected(&mut self, _err: Option<Error>) {
        trace!("session closed");
    }
}
