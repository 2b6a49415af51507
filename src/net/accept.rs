//! Listening and accepting connections.

use std::io;
use std::net::ToSocketAddrs;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, trace};

use crate::common::handler::HandlerSlot;
use crate::net::addr::Endpoint;
use crate::net::config::TcpAcceptorConfig;
use crate::net::inbound::TcpInboundSocket;
use crate::net::stream::Transport;
use crate::{Error, Result};

const LISTEN_BACKLOG: u32 = 1024;

/// Observer of a [`TcpAcceptor`].
pub trait TcpAcceptorHandler: Send + 'static {
    /// A connection was accepted (and, for TLS, completed its handshake).
    fn on_accepted(&mut self, socket: TcpInboundSocket);

    /// Accepting (or handshaking) one connection failed. The acceptor keeps
    /// accepting.
    fn on_accept_error(&mut self, err: Error);
}

/// Listens on an endpoint and publishes accepted connections.
///
/// The TLS variant completes the server-side handshake before publishing; a
/// failed handshake is reported and does not stop the accept loop. Dropping
/// the handle detaches the observer and closes the listener.
pub struct TcpAcceptor {
    inner: Arc<Inner>,
}

struct Inner {
    rt: Handle,
    config: TcpAcceptorConfig,
    tls: Option<Arc<ServerConfig>>,
    handler: HandlerSlot<dyn TcpAcceptorHandler>,
    shared: Mutex<Shared>,
}

struct Shared {
    listening: bool,
    local: Option<Endpoint>,
    task: Option<JoinHandle<()>>,
}

impl TcpAcceptor {
    /// Must be created from within a Tokio runtime context.
    pub(crate) fn new(
        config: TcpAcceptorConfig,
        tls: Option<Arc<ServerConfig>>,
        handler: Box<dyn TcpAcceptorHandler>,
    ) -> TcpAcceptor {
        TcpAcceptor {
            inner: Arc::new(Inner {
                rt: Handle::current(),
                config,
                tls,
                handler: HandlerSlot::new(handler),
                shared: Mutex::new(Shared {
                    listening: false,
                    local: None,
                    task: None,
                }),
            }),
        }
    }

    /// Binds and starts the accept loop.
    pub fn listen(&self, endpoint: Endpoint) -> Result<()> {
        let inner = &self.inner;
        let mut shared = inner.shared.lock().unwrap();
        if shared.listening {
            return Err(Error::new_in_progress());
        }

        let socket = tokio::net::TcpSocket::new_v4().map_err(Error::new_listen)?;
        socket
            .set_reuseaddr(inner.config.reuse_address)
            .map_err(Error::new_listen)?;
        socket.bind(endpoint.into()).map_err(Error::new_bind)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(Error::new_listen)?;

        shared.local = listener
            .local_addr()
            .ok()
            .and_then(|sa| Endpoint::try_from(sa).ok());
        shared.listening = true;
        shared.task = Some(
            inner
                .rt
                .spawn(Inner::accept_loop(inner.clone(), listener)),
        );
        debug!("listening on {:?}", shared.local);
        Ok(())
    }

    /// Resolves `host` and binds to its first IPv4 address.
    pub fn listen_host(&self, host: &str, port: u16) -> Result<()> {
        let endpoint = (host, port)
            .to_socket_addrs()
            .map_err(Error::new_resolve)?
            .find_map(|sa| Endpoint::try_from(sa).ok())
            .ok_or_else(|| {
                Error::new_resolve(io::Error::new(
                    io::ErrorKind::NotFound,
                    "host resolved to no IPv4 addresses",
                ))
            })?;
        self.listen(endpoint)
    }

    /// Cancels the pending accept and closes the listener.
    pub fn close(&self) -> Result<()> {
        let mut shared = self.inner.shared.lock().unwrap();
        shared.listening = false;
        shared.local = None;
        if let Some(task) = shared.task.take() {
            task.abort();
        }
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.inner.shared.lock().unwrap().listening
    }

    /// The bound address; after `listen` the port is resolved even when `0`
    /// was requested.
    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.inner.shared.lock().unwrap().local
    }
}

impl Drop for TcpAcceptor {
    fn drop(&mut self) {
        self.inner.handler.detach();
        let _ = self.close();
    }
}

impl std::fmt::Debug for TcpAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock().unwrap();
        f.debug_struct("TcpAcceptor")
            .field("listening", &shared.listening)
            .field("local", &shared.local)
            .finish()
    }
}

impl Inner {
    async fn accept_loop(inner: Arc<Inner>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    trace!("accepted connection from {}", peer);
                    if inner.config.keep_alive {
                        if let Err(err) = socket2::SockRef::from(&stream).set_keepalive(true) {
                            trace!("error trying to set TCP keepalive: {}", err);
                        }
                    }

                    let local = stream
                        .local_addr()
                        .ok()
                        .and_then(|sa| Endpoint::try_from(sa).ok());
                    let remote = Endpoint::try_from(peer).ok();

                    let transport = match &inner.tls {
                        None => Transport::plain(stream),
                        Some(config) => {
                            // Publish only after the handshake completes.
                            let acceptor = TlsAcceptor::from(config.clone());
                            match acceptor.accept(stream).await {
                                Ok(tls_stream) => Transport::tls(tls_stream),
                                Err(err) => {
                                    debug!("TLS handshake failed: {}", err);
                                    inner
                                        .handler
                                        .fire(|h| h.on_accept_error(Error::new_tls(err)));
                                    continue;
                                }
                            }
                        }
                    };

                    let socket = TcpInboundSocket::new(
                        transport,
                        local,
                        remote,
                        inner.config.socket_buffer.clone(),
                    );
                    inner.handler.fire(|h| h.on_accepted(socket));
                }
                Err(err) => {
                    // Connection-level errors just mean the next accept might
                    // succeed.
                    if is_connection_error(&err) {
                        debug!("accepted connection already errored: {}", err);
                        continue;
                    }
                    inner
                        .handler
                        .fire(|h| h.on_accept_error(Error::new_accept(err)));
                    continue;
                }
            }
        }
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
