//! Server-side peer socket produced by the acceptor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::common::arena::{Arena, ArenaBuf};
use crate::common::handler::HandlerSlot;
use crate::net::addr::Endpoint;
use crate::net::config::BufferConfig;
use crate::net::stream::Transport;
use crate::{Error, Result};

/// Observer of a [`TcpInboundSocket`].
///
/// `on_disconnected` is the final event; afterwards the socket releases the
/// handler, which frees observers that own their own socket handle (server
/// sessions self-own exactly this way).
pub trait TcpInboundSocketHandler: Send + 'static {
    fn on_disconnected(&mut self, err: Option<Error>);
    fn on_data_read(&mut self, data: &[u8]);
    fn on_data_sent(&mut self, data: &[u8]);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Connected,
    Disconnecting,
    Disconnected,
}

/// An accepted connection: same queued-send and receive semantics as the
/// outbound socket, minus connect and reconnect.
///
/// The receive loop starts only when [`read`](TcpInboundSocket::read) is
/// called, so an owner can finish wiring itself up first.
pub struct TcpInboundSocket {
    inner: Arc<InboundInner>,
}

pub(crate) struct InboundInner {
    rt: Handle,
    read_buffer_size: usize,
    pub(crate) handler: HandlerSlot<dyn TcpInboundSocketHandler>,
    arena: Arena,
    wake_writer: Notify,
    shared: Mutex<Shared>,
}

struct Shared {
    state: State,
    generation: u64,
    queue: VecDeque<ArenaBuf>,
    writing: bool,
    local: Option<Endpoint>,
    remote: Option<Endpoint>,
    read_half: Option<ReadHalf<Transport>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl TcpInboundSocket {
    pub(crate) fn new(
        transport: Transport,
        local: Option<Endpoint>,
        remote: Option<Endpoint>,
        buffer: BufferConfig,
    ) -> TcpInboundSocket {
        let (read_half, write_half) = tokio::io::split(transport);
        let inner = Arc::new(InboundInner {
            rt: Handle::current(),
            read_buffer_size: buffer.read_buffer_size,
            handler: HandlerSlot::empty(),
            arena: Arena::new(buffer.initial_send_chunk_count, buffer.initial_send_chunk_size),
            wake_writer: Notify::new(),
            shared: Mutex::new(Shared {
                state: State::Connected,
                generation: 0,
                queue: VecDeque::new(),
                writing: false,
                local,
                remote,
                read_half: Some(read_half),
                reader: None,
                writer: None,
            }),
        });
        let writer = inner
            .rt
            .spawn(InboundInner::write_loop(inner.clone(), 0, write_half));
        inner.shared.lock().unwrap().writer = Some(writer);
        TcpInboundSocket { inner }
    }

    pub(crate) fn shared(&self) -> Arc<InboundInner> {
        self.inner.clone()
    }

    /// Installs the observer. Must happen before [`read`](Self::read).
    pub fn set_handler(&self, handler: impl TcpInboundSocketHandler) {
        self.inner.handler.install(Box::new(handler));
    }

    /// Starts the receive loop.
    pub fn read(&self) {
        InboundInner::start_read(&self.inner);
    }

    /// Copies `data` into the send queue. Fails when disconnected.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.inner.send(data)
    }

    /// Disconnects; with `send_pending` the queued writes drain first.
    pub fn disconnect(&self, send_pending: bool) -> Result<()> {
        InboundInner::disconnect(&self.inner, send_pending)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.shared.lock().unwrap().state == State::Connected
    }

    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.inner.shared.lock().unwrap().local
    }

    pub fn remote_endpoint(&self) -> Option<Endpoint> {
        self.inner.shared.lock().unwrap().remote
    }
}

impl Drop for TcpInboundSocket {
    fn drop(&mut self) {
        self.inner.handler.detach();
        let _ = InboundInner::disconnect(&self.inner, false);
    }
}

impl std::fmt::Debug for TcpInboundSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock().unwrap();
        f.debug_struct("TcpInboundSocket")
            .field("state", &shared.state)
            .field("remote", &shared.remote)
            .finish()
    }
}

impl InboundInner {
    pub(crate) fn install(&self, handler: Box<dyn TcpInboundSocketHandler>) {
        self.handler.install(handler);
    }

    pub(crate) fn start_read(inner: &Arc<InboundInner>) {
        let mut shared = inner.shared.lock().unwrap();
        let Some(read_half) = shared.read_half.take() else {
            return;
        };
        if shared.state == State::Disconnected {
            return;
        }
        let generation = shared.generation;
        let task = inner
            .rt
            .spawn(InboundInner::read_loop(inner.clone(), generation, read_half));
        shared.reader = Some(task);
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::new_invalid_input());
        }
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.state == State::Disconnected {
                return Err(Error::new_not_connected());
            }
            let buf = self.arena.acquire_from(data);
            shared.queue.push_back(buf);
        }
        self.wake_writer.notify_one();
        Ok(())
    }

    fn disconnect(inner: &Arc<InboundInner>, send_pending: bool) -> Result<()> {
        let mut shared = inner.shared.lock().unwrap();
        match shared.state {
            State::Disconnected => return Ok(()),
            State::Disconnecting if send_pending => return Ok(()),
            State::Connected if send_pending && (!shared.queue.is_empty() || shared.writing) => {
                shared.state = State::Disconnecting;
                if let Some(reader) = shared.reader.take() {
                    reader.abort();
                }
                inner.wake_writer.notify_one();
                return Ok(());
            }
            State::Connected | State::Disconnecting => {}
        }

        shared.generation += 1;
        shared.state = State::Disconnected;
        shared.queue.clear();
        shared.writing = false;
        let reader = shared.reader.take();
        let writer = shared.writer.take();
        drop(shared);

        if let Some(task) = reader {
            task.abort();
        }
        if let Some(task) = writer {
            task.abort();
        }

        // The terminal event is delivered from the executor, releasing the
        // handler afterwards.
        let inner = inner.clone();
        let rt = inner.rt.clone();
        rt.spawn(async move {
            inner.handler.fire_last(|h| h.on_disconnected(None));
        });
        Ok(())
    }

    async fn read_loop(inner: Arc<InboundInner>, generation: u64, mut read_half: ReadHalf<Transport>) {
        let mut buf = vec![0u8; inner.read_buffer_size];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => {
                    InboundInner::connection_failed(&inner, generation, Error::new_closed());
                    return;
                }
                Ok(n) => {
                    {
                        let shared = inner.shared.lock().unwrap();
                        if shared.generation != generation {
                            return;
                        }
                    }
                    trace!("read {} bytes", n);
                    inner.handler.fire(|h| h.on_data_read(&buf[..n]));
                }
                Err(err) => {
                    InboundInner::connection_failed(&inner, generation, Error::new_io(err));
                    return;
                }
            }
        }
    }

    async fn write_loop(
        inner: Arc<InboundInner>,
        generation: u64,
        mut write_half: WriteHalf<Transport>,
    ) {
        loop {
            enum Step {
                Write(ArenaBuf),
                Drained,
                Wait,
            }

            let step = {
                let mut shared = inner.shared.lock().unwrap();
                if shared.generation != generation {
                    return;
                }
                match shared.queue.pop_front() {
                    Some(buf) => {
                        shared.writing = true;
                        Step::Write(buf)
                    }
                    None => {
                        shared.writing = false;
                        if shared.state == State::Disconnecting {
                            Step::Drained
                        } else {
                            Step::Wait
                        }
                    }
                }
            };

            match step {
                Step::Write(buf) => {
                    let written = async {
                        write_half.write_all(&buf).await?;
                        write_half.flush().await
                    }
                    .await;
                    match written {
                        Ok(()) => {
                            {
                                let shared = inner.shared.lock().unwrap();
                                if shared.generation != generation {
                                    return;
                                }
                            }
                            trace!("flushed {} bytes", buf.len());
                            inner.handler.fire(|h| h.on_data_sent(&buf));
                        }
                        Err(err) => {
                            InboundInner::connection_failed(&inner, generation, Error::new_io(err));
                            return;
                        }
                    }
                }
                Step::Drained => {
                    if let Err(err) = write_half.shutdown().await {
                        // A peer that tears the transport down without a
                        // clean TLS close surfaces here; benign.
                        warn!("error shutting down connection: {}", err);
                    }
                    {
                        let mut shared = inner.shared.lock().unwrap();
                        if shared.generation != generation {
                            return;
                        }
                        shared.generation += 1;
                        shared.state = State::Disconnected;
                        shared.writer = None;
                        if let Some(reader) = shared.reader.take() {
                            reader.abort();
                        }
                    }
                    inner.handler.fire_last(|h| h.on_disconnected(None));
                    return;
                }
                Step::Wait => {
                    inner.wake_writer.notified().await;
                }
            }
        }
    }

    fn connection_failed(inner: &Arc<InboundInner>, generation: u64, err: Error) {
        {
            let mut shared = inner.shared.lock().unwrap();
            if shared.generation != generation || shared.state == State::Disconnected {
                return;
            }
            shared.generation += 1;
            shared.state = State::Disconnected;
            shared.queue.clear();
            shared.writing = false;
            if let Some(reader) = shared.reader.take() {
                reader.abort();
            }
            if let Some(writer) = shared.writer.take() {
                writer.abort();
            }
        }
        inner.handler.fire_last(|h| h.on_disconnected(Some(err)));
    }
}
