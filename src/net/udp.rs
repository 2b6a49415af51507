//! Asynchronous IPv4 UDP socket.

use std::collections::VecDeque;
use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex};

use socket2::{Domain, Protocol, SockAddr, SockRef, Type};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::common::arena::{Arena, ArenaBuf};
use crate::common::handler::HandlerSlot;
use crate::net::addr::Endpoint;
use crate::net::config::UdpSocketConfig;
use crate::{Error, Result};

/// Observer of a [`UdpSocket`].
pub trait UdpSocketHandler: Send + 'static {
    fn on_data_read(&mut self, peer: Endpoint, data: &[u8]);
    fn on_data_sent(&mut self, peer: Endpoint, data: &[u8]);
    /// A receive failed; the receive loop keeps running.
    fn on_read_error(&mut self, err: Error);
    /// Sending one datagram failed; it is dropped and the queue continues.
    fn on_send_error(&mut self, peer: Endpoint, data: &[u8], err: Error);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    Closing,
}

/// An asynchronous datagram socket with a queued writer.
///
/// `open` starts the receive loop immediately; `bind` may follow to claim a
/// local endpoint. Dropping the handle detaches the observer and closes
/// immediately.
pub struct UdpSocket {
    inner: Arc<Inner>,
}

struct Inner {
    rt: Handle,
    read_buffer_size: usize,
    handler: HandlerSlot<dyn UdpSocketHandler>,
    arena: Arena,
    wake_writer: Notify,
    shared: Mutex<Shared>,
}

struct Shared {
    state: State,
    generation: u64,
    socket: Option<Arc<tokio::net::UdpSocket>>,
    queue: VecDeque<(Endpoint, ArenaBuf)>,
    sending: bool,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl UdpSocket {
    /// Must be created from within a Tokio runtime context.
    pub(crate) fn new(config: UdpSocketConfig, handler: Box<dyn UdpSocketHandler>) -> UdpSocket {
        UdpSocket {
            inner: Arc::new(Inner {
                rt: Handle::current(),
                read_buffer_size: config.buffer.read_buffer_size,
                handler: HandlerSlot::new(handler),
                arena: Arena::new(
                    config.buffer.initial_send_chunk_count,
                    config.buffer.initial_send_chunk_size,
                ),
                wake_writer: Notify::new(),
                shared: Mutex::new(Shared {
                    state: State::Closed,
                    generation: 0,
                    socket: None,
                    queue: VecDeque::new(),
                    sending: false,
                    reader: None,
                    writer: None,
                }),
            }),
        }
    }

    /// Opens the datagram socket and starts the receive loop.
    pub fn open(&self) -> Result<()> {
        let inner = &self.inner;
        let mut shared = inner.shared.lock().unwrap();
        if shared.state != State::Closed {
            return Ok(());
        }

        let raw = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(Error::new_bind)?;
        raw.set_nonblocking(true).map_err(Error::new_bind)?;
        let socket = {
            let _guard = inner.rt.enter();
            tokio::net::UdpSocket::from_std(raw.into()).map_err(Error::new_bind)?
        };
        let socket = Arc::new(socket);

        shared.state = State::Open;
        shared.generation += 1;
        let generation = shared.generation;
        shared.socket = Some(socket.clone());
        shared.reader = Some(
            inner
                .rt
                .spawn(Inner::read_loop(inner.clone(), generation, socket.clone())),
        );
        shared.writer = Some(
            inner
                .rt
                .spawn(Inner::write_loop(inner.clone(), generation, socket)),
        );
        Ok(())
    }

    /// Binds the open socket to a local endpoint.
    pub fn bind(&self, endpoint: Endpoint) -> Result<()> {
        let shared = self.inner.shared.lock().unwrap();
        let Some(socket) = shared.socket.as_ref() else {
            return Err(Error::new_not_connected());
        };
        SockRef::from(socket.as_ref())
            .bind(&SockAddr::from(SocketAddrV4::from(endpoint)))
            .map_err(Error::new_bind)
    }

    /// Queues `data` for delivery to `endpoint`.
    pub fn send(&self, endpoint: Endpoint, data: &[u8]) -> Result<()> {
        {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.state == State::Closed {
                return Err(Error::new_not_connected());
            }
            let buf = self.inner.arena.acquire_from(data);
            shared.queue.push_back((endpoint, buf));
        }
        self.inner.wake_writer.notify_one();
        Ok(())
    }

    /// Closes the socket; with `send_pending` the queued datagrams go out
    /// first.
    pub fn close(&self, send_pending: bool) -> Result<()> {
        Inner::close(&self.inner, send_pending)
    }

    pub fn is_open(&self) -> bool {
        self.inner.shared.lock().unwrap().state == State::Open
    }

    pub fn local_endpoint(&self) -> Option<Endpoint> {
        let shared = self.inner.shared.lock().unwrap();
        shared
            .socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .and_then(|sa| Endpoint::try_from(sa).ok())
    }
}

impl Drop for UdpSocket {
    fn drop(&mut self) {
        self.inner.handler.detach();
        let _ = Inner::close(&self.inner, false);
    }
}

impl std::fmt::Debug for UdpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock().unwrap();
        f.debug_struct("UdpSocket")
            .field("state", &shared.state)
            .finish()
    }
}

impl Inner {
    fn close(inner: &Arc<Inner>, send_pending: bool) -> Result<()> {
        let mut shared = inner.shared.lock().unwrap();
        match shared.state {
            State::Closed => return Ok(()),
            State::Closing if send_pending => return Ok(()),
            State::Open if send_pending && (!shared.queue.is_empty() || shared.sending) => {
                shared.state = State::Closing;
                inner.wake_writer.notify_one();
                return Ok(());
            }
            State::Open | State::Closing => {}
        }

        Inner::finish_close(&mut shared);
        Ok(())
    }

    fn finish_close(shared: &mut Shared) {
        debug!("closing UDP socket");
        shared.generation += 1;
        shared.state = State::Closed;
        shared.queue.clear();
        shared.sending = false;
        shared.socket = None;
        if let Some(task) = shared.reader.take() {
            task.abort();
        }
        if let Some(task) = shared.writer.take() {
            task.abort();
        }
    }

    async fn read_loop(inner: Arc<Inner>, generation: u64, socket: Arc<tokio::net::UdpSocket>) {
        let mut buf = vec![0u8; inner.read_buffer_size];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((n, peer)) => {
                    {
                        let shared = inner.shared.lock().unwrap();
                        if shared.generation != generation {
                            return;
                        }
                    }
                    let Ok(peer) = Endpoint::try_from(peer) else {
                        continue;
                    };
                    trace!("received {} bytes from {}", n, peer);
                    inner.handler.fire(|h| h.on_data_read(peer, &buf[..n]));
                }
                Err(err) => {
                    {
                        let shared = inner.shared.lock().unwrap();
                        if shared.generation != generation {
                            return;
                        }
                    }
                    // Receive failures do not stop the loop.
                    inner.handler.fire(|h| h.on_read_error(Error::new_io(err)));
                }
            }
        }
    }

    async fn write_loop(inner: Arc<Inner>, generation: u64, socket: Arc<tokio::net::UdpSocket>) {
        loop {
            enum Step {
                Send(Endpoint, ArenaBuf),
                Drained,
                Wait,
            }

            let step = {
                let mut shared = inner.shared.lock().unwrap();
                if shared.generation != generation {
                    return;
                }
                match shared.queue.pop_front() {
                    Some((peer, buf)) => {
                        shared.sending = true;
                        Step::Send(peer, buf)
                    }
                    None => {
                        shared.sending = false;
                        if shared.state == State::Closing {
                            Step::Drained
                        } else {
                            Step::Wait
                        }
                    }
                }
            };

            match step {
                Step::Send(peer, buf) => {
                    let result = socket.send_to(&buf, std::net::SocketAddr::from(peer)).await;
                    {
                        let shared = inner.shared.lock().unwrap();
                        if shared.generation != generation {
                            return;
                        }
                    }
                    match result {
                        Ok(n) => {
                            trace!("sent {} bytes to {}", n, peer);
                            inner.handler.fire(|h| h.on_data_sent(peer, &buf));
                        }
                        Err(err) => {
                            // Drop this datagram, move on to the next.
                            inner
                                .handler
                                .fire(|h| h.on_send_error(peer, &buf, Error::new_io(err)));
                        }
                    }
                }
                Step::Drained => {
                    let mut shared = inner.shared.lock().unwrap();
                    if shared.generation != generation {
                        return;
                    }
                    Inner::finish_close(&mut shared);
                    return;
                }
                Step::Wait => {
                    inner.wake_writer.notified().await;
                }
            }
        }
    }
}
