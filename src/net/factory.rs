//! Construction surface for the socket types.

use std::sync::Arc;

use tokio_rustls::rustls::{ClientConfig, ServerConfig};

use crate::net::accept::{TcpAcceptor, TcpAcceptorHandler};
use crate::net::config::{TcpAcceptorConfig, TcpSocketConfig, UdpSocketConfig};
use crate::net::tcp::{TcpSocket, TcpSocketHandler};
use crate::net::udp::{UdpSocket, UdpSocketHandler};

/// Creates sockets and acceptors bound to the ambient Tokio runtime.
///
/// Every `create_*` method must be called from within a runtime context.
#[derive(Clone, Copy, Debug, Default)]
pub struct SocketFactory {
    _priv: (),
}

impl SocketFactory {
    pub fn new() -> SocketFactory {
        SocketFactory { _priv: () }
    }

    pub fn create_udp(
        &self,
        config: UdpSocketConfig,
        handler: impl UdpSocketHandler,
    ) -> UdpSocket {
        UdpSocket::new(config, Box::new(handler))
    }

    pub fn create_tcp(
        &self,
        config: TcpSocketConfig,
        handler: impl TcpSocketHandler,
    ) -> TcpSocket {
        TcpSocket::new(config, None, Box::new(handler))
    }

    /// A TCP socket that runs a TLS client handshake on top of each
    /// connection before reporting it connected.
    pub fn create_ssl_tcp(
        &self,
        config: TcpSocketConfig,
        tls: Arc<ClientConfig>,
        handler: impl TcpSocketHandler,
    ) -> TcpSocket {
        TcpSocket::new(config, Some(tls), Box::new(handler))
    }

    pub fn create_tcp_acceptor(
        &self,
        config: TcpAcceptorConfig,
        handler: impl TcpAcceptorHandler,
    ) -> TcpAcceptor {
        TcpAcceptor::new(config, None, Box::new(handler))
    }

    /// An acceptor that completes the server-side TLS handshake before
    /// publishing each connection.
    pub fn create_ssl_tcp_acceptor(
        &self,
        config: TcpAcceptorConfig,
        tls: Arc<ServerConfig>,
        handler: impl TcpAcceptorHandler,
    ) -> TcpAcceptor {
        TcpAcceptor::new(config, Some(tls), Box::new(handler))
    }
}
