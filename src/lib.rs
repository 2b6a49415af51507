//! # hawser
//!
//! A reusable networking and I/O foundation: asynchronous UDP and TCP
//! sockets (plaintext and TLS), a TCP acceptor, an HTTP/1.1 client and
//! server built on those sockets, a retry/backoff executor, an interval
//! timer, and a deadline helper.
//!
//! The transports are observer-driven: each socket owns background driver
//! tasks on the ambient Tokio runtime and reports lifecycle and data events
//! through a handler trait. Callbacks for one socket never run concurrently,
//! and dropping a handle silences its observer before closing.
//!
//! At a glance:
//!
//! - [`net`]: [`UdpSocket`](net::UdpSocket), [`TcpSocket`](net::TcpSocket)
//!   with policy-driven reconnect, [`TcpAcceptor`](net::TcpAcceptor),
//!   [`TcpInboundSocket`](net::TcpInboundSocket) and the
//!   [`SocketFactory`](net::SocketFactory).
//! - [`http`]: [`HttpClient`](http::HttpClient) with a serialized request
//!   queue, [`HttpServer`](http::HttpServer) with per-connection sessions,
//!   the exact-match [`Router`](http::Router) and the
//!   [`HttpServerApp`](http::HttpServerApp) façade.
//! - [`time`]: [`IntervalTimer`](time::IntervalTimer),
//!   [`RetryExecutor`](time::RetryExecutor) and
//!   [`deadline`](time::deadline()).
//! - [`crypto`]: CSR and self-signed certificate generation.

#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;

pub mod crypto;
pub mod http;
pub mod net;
pub mod time;

pub(crate) mod common;
pub(crate) mod proto;

pub use crate::error::{Error, Result};
