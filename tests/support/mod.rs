#![allow(dead_code)]

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use hawser::http::{HttpClient, HttpRequest, HttpResponse};
use hawser::net::{TcpAcceptorHandler, TcpInboundSocket, TcpSocketHandler, UdpSocketHandler};
use hawser::net::Endpoint;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Events recorded from a socket observer, in delivery order.
#[derive(Debug)]
pub enum SocketEvent {
    Connected,
    Disconnected {
        error: Option<String>,
        will_reconnect: bool,
    },
    Read(Vec<u8>),
    Sent(Vec<u8>),
}

pub struct RecordingTcpHandler {
    tx: mpsc::UnboundedSender<SocketEvent>,
}

impl RecordingTcpHandler {
    pub fn new() -> (RecordingTcpHandler, mpsc::UnboundedReceiver<SocketEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RecordingTcpHandler { tx }, rx)
    }
}

impl TcpSocketHandler for RecordingTcpHandler {
    fn on_connected(&mut self) {
        let _ = self.tx.send(SocketEvent::Connected);
    }

    fn on_disconnected(&mut self, err: Option<hawser::Error>, will_reconnect: bool) {
        let _ = self.tx.send(SocketEvent::Disconnected {
            error: err.map(|e| e.to_string()),
            will_reconnect,
        });
    }

    fn on_data_read(&mut self, data: &[u8]) {
        let _ = self.tx.send(SocketEvent::Read(data.to_vec()));
    }

    fn on_data_sent(&mut self, data: &[u8]) {
        let _ = self.tx.send(SocketEvent::Sent(data.to_vec()));
    }
}

/// Events recorded from an acceptor observer, in delivery order.
#[derive(Debug)]
pub enum AcceptorEvent {
    Accepted(TcpInboundSocket),
    Error(String),
}

pub struct RecordingAcceptorHandler {
    tx: mpsc::UnboundedSender<AcceptorEvent>,
}

impl RecordingAcceptorHandler {
    pub fn new() -> (
        RecordingAcceptorHandler,
        mpsc::UnboundedReceiver<AcceptorEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RecordingAcceptorHandler { tx }, rx)
    }
}

impl TcpAcceptorHandler for RecordingAcceptorHandler {
    fn on_accepted(&mut self, socket: TcpInboundSocket) {
        let _ = self.tx.send(AcceptorEvent::Accepted(socket));
    }

    fn on_accept_error(&mut self, err: hawser::Error) {
        let _ = self.tx.send(AcceptorEvent::Error(err.to_string()));
    }
}

/// Events recorded from a UDP observer.
#[derive(Debug)]
pub enum UdpEvent {
    Read(Endpoint, Vec<u8>),
    Sent(Endpoint, Vec<u8>),
    ReadError(String),
    SendError(Endpoint, String),
}

pub struct RecordingUdpHandler {
    tx: mpsc::UnboundedSender<UdpEvent>,
}

impl RecordingUdpHandler {
    pub fn new() -> (RecordingUdpHandler, mpsc::UnboundedReceiver<UdpEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RecordingUdpHandler { tx }, rx)
    }
}

impl UdpSocketHandler for RecordingUdpHandler {
    fn on_data_read(&mut self, peer: Endpoint, data: &[u8]) {
        let _ = self.tx.send(UdpEvent::Read(peer, data.to_vec()));
    }

    fn on_data_sent(&mut self, peer: Endpoint, data: &[u8]) {
        let _ = self.tx.send(UdpEvent::Sent(peer, data.to_vec()));
    }

    fn on_read_error(&mut self, err: hawser::Error) {
        let _ = self.tx.send(UdpEvent::ReadError(err.to_string()));
    }

    fn on_send_error(&mut self, peer: Endpoint, _data: &[u8], err: hawser::Error) {
        let _ = self.tx.send(UdpEvent::SendError(peer, err.to_string()));
    }
}

/// Waits for the next event or fails the test.
pub async fn next_event<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// True when no event arrives within `window`.
pub async fn stays_quiet<T: std::fmt::Debug>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    window: Duration,
) -> bool {
    tokio::time::timeout(window, rx.recv()).await.is_err()
}

/// Submits a request and awaits its callback.
pub async fn fetch(client: &HttpClient, request: HttpRequest) -> hawser::Result<HttpResponse> {
    let (tx, rx) = oneshot::channel();
    client.request(request, move |result| {
        let _ = tx.send(result);
    });
    tokio::time::timeout(EVENT_TIMEOUT, rx)
        .await
        .expect("timed out waiting for response")
        .expect("client dropped the callback")
}
