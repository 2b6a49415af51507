//! HTTP/1.1 client over a single connection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use tokio_rustls::rustls::ClientConfig;
use tracing::trace;

use crate::http::message::{HttpRequest, HttpResponse};
use crate::net::addr::HostEndpoint;
use crate::net::config::{BufferConfig, ReconnectConfig, TcpSocketConfig};
use crate::net::factory::SocketFactory;
use crate::net::tcp::{TcpSocket, TcpSocketHandler};
use crate::proto::h1::{encode_request, MessageParser};
use crate::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct HttpClientConfig {
    /// Enable TCP keep-alive on the underlying socket.
    pub keep_alive: bool,
    pub buffer: BufferConfig,
}

/// Completion callback of a submitted request.
pub type ResponseCallback = Box<dyn FnOnce(Result<HttpResponse>) + Send + 'static>;

type Completion = (ResponseCallback, Result<HttpResponse>);

/// An HTTP/1.1 client for one destination.
///
/// Requests are serialized: one request is on the wire at a time, the rest
/// queue in submission order, and response callbacks fire in that same order.
/// The client connects lazily, disconnects gracefully once the queue is
/// empty, and never auto-reconnects — a failed request surfaces through its
/// callback instead.
pub struct HttpClient {
    core: Arc<Core>,
}

struct Core {
    state: Mutex<ClientState>,
}

struct ClientState {
    socket: Option<TcpSocket>,
    destination: HostEndpoint,
    queue: VecDeque<Pending>,
    current: Option<Pending>,
    parser: MessageParser<HttpResponse>,
}

struct Pending {
    request: HttpRequest,
    callback: ResponseCallback,
}

impl HttpClient {
    /// Must be created from within a Tokio runtime context.
    pub(crate) fn new(
        destination: HostEndpoint,
        config: HttpClientConfig,
        tls: Option<Arc<ClientConfig>>,
    ) -> HttpClient {
        let core = Arc::new(Core {
            state: Mutex::new(ClientState {
                socket: None,
                destination,
                queue: VecDeque::new(),
                current: None,
                parser: MessageParser::new(),
            }),
        });

        let bridge = Bridge {
            core: Arc::downgrade(&core),
        };
        let tcp_config = TcpSocketConfig {
            keep_alive: config.keep_alive,
            reconnect: ReconnectConfig {
                enabled: false,
                ..ReconnectConfig::default()
            },
            buffer: config.buffer,
        };
        let factory = SocketFactory::new();
        let socket = match tls {
            None => factory.create_tcp(tcp_config, bridge),
            Some(tls) => factory.create_ssl_tcp(tcp_config, tls, bridge),
        };
        core.state.lock().unwrap().socket = Some(socket);

        HttpClient { core }
    }

    pub fn destination(&self) -> HostEndpoint {
        self.core.state.lock().unwrap().destination.clone()
    }

    /// Submits `request`; `callback` fires with the response or the error.
    pub fn request<F>(&self, mut request: HttpRequest, callback: F)
    where
        F: FnOnce(Result<HttpResponse>) + Send + 'static,
    {
        let mut completions = Vec::new();
        {
            let mut state = self.core.state.lock().unwrap();
            if !request.has_header("host") {
                request.set_header("Host", state.destination.to_string());
            }
            state.queue.push_back(Pending {
                request,
                callback: Box::new(callback),
            });
            if state.current.is_none() {
                ClientState::pump(&mut state, &mut completions);
            }
        }
        run_completions(completions);
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.lock().unwrap();
        f.debug_struct("HttpClient")
            .field("destination", &state.destination)
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl Drop for HttpClient {
    fn drop(&mut self) {
        let state = self.core.state.lock().unwrap();
        if let Some(socket) = state.socket.as_ref() {
            let _ = socket.disconnect(true);
        }
    }
}

impl ClientState {
    /// Promotes queued requests until one is in flight or the queue is empty.
    fn pump(state: &mut ClientState, completions: &mut Vec<Completion>) {
        while state.current.is_none() {
            let Some(next) = state.queue.pop_front() else {
                return;
            };
            state.current = Some(next);

            let connected = state
                .socket
                .as_ref()
                .map(|s| s.is_connected())
                .unwrap_or(false);
            if connected {
                if ClientState::send_current(state, completions) {
                    return;
                }
                continue;
            }

            let destination = state.destination.clone();
            let connect_result = match state.socket.as_ref() {
                Some(socket) => socket.connect(destination),
                None => Err(Error::new_not_connected()),
            };
            match connect_result {
                // The request is serialized from on_connected.
                Ok(()) => return,
                Err(err) => {
                    if let Some(pending) = state.current.take() {
                        completions.push((pending.callback, Err(err)));
                    }
                }
            }
        }
    }

    /// Serializes the in-flight request onto the socket. On failure the
    /// request is completed with the error and cleared; returns false.
    fn send_current(state: &mut ClientState, completions: &mut Vec<Completion>) -> bool {
        let Some(pending) = state.current.as_ref() else {
            return false;
        };
        trace!("sending {} {}", pending.request.method(), pending.request.target());

        let failure = match encode_request(&pending.request) {
            Ok(chunks) => {
                let mut failure = None;
                for chunk in &chunks {
                    let sent = match state.socket.as_ref() {
                        Some(socket) => socket.send(chunk),
                        None => Err(Error::new_not_connected()),
                    };
                    if let Err(err) = sent {
                        failure = Some(err);
                        break;
                    }
                }
                failure
            }
            Err(err) => Some(err),
        };

        match failure {
            None => true,
            Some(err) => {
                if let Some(pending) = state.current.take() {
                    completions.push((pending.callback, Err(err)));
                }
                false
            }
        }
    }
}

/// Socket observer; holds a weak back-reference so a dropped client turns
/// late completions into no-ops.
struct Bridge {
    core: Weak<Core>,
}

impl TcpSocketHandler for Bridge {
    fn on_connected(&mut self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let mut completions = Vec::new();
        {
            let mut state = core.state.lock().unwrap();
            if state.current.is_some() && !ClientState::send_current(&mut state, &mut completions)
            {
                ClientState::pump(&mut state, &mut completions);
            }
        }
        run_completions(completions);
    }

    fn on_disconnected(&mut self, err: Option<Error>, will_reconnect: bool) {
        debug_assert!(!will_reconnect, "client sockets never auto-reconnect");
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let mut completions = Vec::new();
        {
            let mut state = core.state.lock().unwrap();
            if let Some(err) = err {
                // The in-flight request failed with the connection.
                if let Some(pending) = state.current.take() {
                    completions.push((pending.callback, Err(err)));
                }
                if !state.queue.is_empty() {
                    ClientState::pump(&mut state, &mut completions);
                }
            }
        }
        run_completions(completions);
    }

    fn on_data_read(&mut self, data: &[u8]) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let mut completions = Vec::new();
        {
            let mut guard = core.state.lock().unwrap();
            let state = &mut *guard;

            let current = &mut state.current;
            let fed = state.parser.feed(data, |response| {
                // Responses without an active request are dropped.
                if let Some(pending) = current.take() {
                    completions.push((pending.callback, Ok(response)));
                }
            });
            if let Err(err) = fed {
                if let Some(pending) = state.current.take() {
                    completions.push((pending.callback, Err(err)));
                }
            }

            if state.current.is_none() && !completions.is_empty() {
                if state.queue.is_empty() {
                    // Nothing left to send; release the connection.
                    if let Some(socket) = state.socket.as_ref() {
                        let _ = socket.disconnect(true);
                    }
                } else {
                    ClientState::pump(state, &mut completions);
                }
            }
        }
        run_completions(completions);
    }

    fn on_data_sent(&mut self, _data: &[u8]) {
        // Nothing to do until the response arrives.
    }
}

fn run_completions(completions: Vec<Completion>) {
    for (callback, result) in completions {
        callback(result);
    }
}
