//! Asynchronous UDP, TCP and TLS transports.

pub mod accept;
pub mod addr;
pub mod config;
pub mod factory;
pub mod inbound;
mod stream;
pub mod tcp;
pub mod tls;
pub mod udp;

pub use self::accept::{TcpAcceptor, TcpAcceptorHandler};
pub use self::addr::{ConnectTarget, Endpoint, HostEndpoint};
pub use self::config::{
    BufferConfig, ReconnectConfig, TcpAcceptorConfig, TcpSocketConfig, UdpSocketConfig,
};
pub use self::factory::SocketFactory;
pub use self::inbound::{TcpInboundSocket, TcpInboundSocketHandler};
pub use self::tcp::{TcpSocket, TcpSocketHandler};
pub use self::tls::{insecure_tls_client_config, tls_server_config};
pub use self::udp::{UdpSocket, UdpSocketHandler};
