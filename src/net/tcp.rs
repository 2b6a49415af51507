//! Outbound TCP socket with optional TLS and policy-driven reconnect.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, Weak};

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace, warn};

use crate::common::arena::{Arena, ArenaBuf};
use crate::common::handler::HandlerSlot;
use crate::net::addr::{ConnectTarget, Endpoint};
use crate::net::config::TcpSocketConfig;
use crate::net::stream::Transport;
use crate::net::tls;
use crate::time::retry::RetryExecutor;
use crate::{Error, Result};

/// Observer of a [`TcpSocket`]'s lifecycle and data flow.
///
/// Callbacks for one socket never run concurrently. `on_disconnected` is the
/// last event of a connection lifetime; `will_reconnect` reports whether the
/// socket will retry on its own.
pub trait TcpSocketHandler: Send + 'static {
    fn on_connected(&mut self);
    fn on_disconnected(&mut self, err: Option<Error>, will_reconnect: bool);
    fn on_data_read(&mut self, data: &[u8]);
    fn on_data_sent(&mut self, data: &[u8]);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// An asynchronous IPv4 TCP socket, plaintext or TLS.
///
/// Connects directly to an [`Endpoint`] or by hostname, queues sends through
/// a buffer arena, reads continuously once connected, and — when configured —
/// schedules reconnect attempts after runtime failures. Dropping the handle
/// detaches the observer and closes immediately; late completions no-op.
pub struct TcpSocket {
    inner: Arc<Inner>,
}

struct Inner {
    rt: Handle,
    config: TcpSocketConfig,
    tls: Option<Arc<ClientConfig>>,
    handler: HandlerSlot<dyn TcpSocketHandler>,
    arena: Arena,
    wake_writer: Notify,
    retry: Option<RetryExecutor>,
    shared: Mutex<Shared>,
}

struct Shared {
    state: State,
    // Bumped on every connect/teardown; tasks ignore events from other
    // generations.
    generation: u64,
    target: Option<ConnectTarget>,
    queue: VecDeque<ArenaBuf>,
    writing: bool,
    local: Option<Endpoint>,
    remote: Option<Endpoint>,
    driver: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl TcpSocket {
    /// Must be created from within a Tokio runtime context.
    pub(crate) fn new(
        config: TcpSocketConfig,
        tls: Option<Arc<ClientConfig>>,
        handler: Box<dyn TcpSocketHandler>,
    ) -> TcpSocket {
        let arena = Arena::new(
            config.buffer.initial_send_chunk_count,
            config.buffer.initial_send_chunk_size,
        );
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let retry = if config.reconnect.enabled {
                let executor = RetryExecutor::new(config.reconnect.policy.clone());
                let weak = weak.clone();
                executor.set_retry_action(move || {
                    if let Some(inner) = weak.upgrade() {
                        Inner::reconnect(&inner);
                    }
                });
                Some(executor)
            } else {
                None
            };
            Inner {
                rt: Handle::current(),
                config,
                tls,
                handler: HandlerSlot::new(handler),
                arena,
                wake_writer: Notify::new(),
                retry,
                shared: Mutex::new(Shared {
                    state: State::Disconnected,
                    generation: 0,
                    target: None,
                    queue: VecDeque::new(),
                    writing: false,
                    local: None,
                    remote: None,
                    driver: None,
                    writer: None,
                }),
            }
        });
        TcpSocket { inner }
    }

    /// Starts connecting to a direct endpoint or hostname target.
    pub fn connect(&self, target: impl Into<ConnectTarget>) -> Result<()> {
        Inner::connect(&self.inner, target.into())
    }

    /// Disconnects; with `send_pending` the queued writes drain first.
    ///
    /// Manual disconnect always cancels pending reconnect attempts.
    pub fn disconnect(&self, send_pending: bool) -> Result<()> {
        Inner::disconnect(&self.inner, send_pending)
    }

    /// Copies `data` into the send queue. Fails when not connected.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.inner.send(data)
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

impl Drop for TcpSocket {
    fn drop(&mut self) {
        self.inner.handler.detach();
        let _ = Inner::disconnect(&self.inner, false);
    }
}

impl std::fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock().unwrap();
        f.debug_struct("TcpSocket")
            .field("state", &shared.state)
            .field("remote", &shared.remote)
            .finish()
    }
}

impl Inner {
    fn connect(inner: &Arc<Inner>, target: ConnectTarget) -> Result<()> {
        let generation = {
            let mut shared = inner.shared.lock().unwrap();
            if shared.state != State::Disconnected {
                return Err(Error::new_in_progress());
            }
            if let Some(retry) = &inner.retry {
                // A manual connect after exhausted reconnects starts a fresh
                // attempt budget.
                if retry.is_exhausted() {
                    retry.reset();
                }
            }
            shared.state = State::Connecting;
            shared.generation += 1;
            shared.target = Some(target.clone());
            shared.generation
        };

        trace!("connecting to {}", target);
        let task = inner
            .rt
            .spawn(Inner::drive(inner.clone(), generation, target));

        let mut shared = inner.shared.lock().unwrap();
        if shared.generation == generation {
            shared.driver = Some(task);
        } else {
            task.abort();
        }
        Ok(())
    }

    fn disconnect(inner: &Arc<Inner>, send_pending: bool) -> Result<()> {
        if let Some(retry) = &inner.retry {
            retry.cancel();
        }

        let mut shared = inner.shared.lock().unwrap();
        match shared.state {
            State::Disconnected => return Ok(()),
            State::Disconnecting if send_pending => return Ok(()),
            State::Connected if send_pending && (!shared.queue.is_empty() || shared.writing) => {
                // Stop reading, let the writer drain the queue and close.
                shared.state = State::Disconnecting;
                if let Some(driver) = shared.driver.take() {
                    driver.abort();
                }
                inner.wake_writer.notify_one();
                return Ok(());
            }
            State::Connecting | State::Connected | State::Disconnecting => {}
        }

        shared.generation += 1;
        shared.state = State::Disconnected;
        shared.queue.clear();
        shared.writing = false;
        shared.local = None;
        shared.remote = None;
        let driver = shared.driver.take();
        let writer = shared.writer.take();
        drop(shared);

        if let Some(task) = driver {
            task.abort();
        }
        if let Some(task) = writer {
            task.abort();
        }

        // Report from the executor so observer callbacks stay serialized on
        // the socket's driver.
        spawn_disconnect_notify(inner.clone());
        Ok(())
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::new_invalid_input());
        }
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.state != State::Connected && shared.state != State::Disconnecting {
                return Err(Error::new_not_connected());
            }
            let buf = self.arena.acquire_from(data);
            shared.queue.push_back(buf);
        }
        self.wake_writer.notify_one();
        Ok(())
    }

    async fn drive(inner: Arc<Inner>, generation: u64, target: ConnectTarget) {
        match Inner::establish(&inner, &target).await {
            Err(err) => {
                debug!("connect to {} failed: {}", target, err);
                Inner::connection_failed(&inner, generation, err);
            }
            Ok((transport, local, remote)) => {
                let (read_half, write_half) = tokio::io::split(transport);
                {
                    let mut shared = inner.shared.lock().unwrap();
                    if shared.generation != generation || shared.state != State::Connecting {
                        // Cancelled while we were connecting.
                        return;
                    }
                    shared.state = State::Connected;
                    shared.local = local;
                    shared.remote = remote;
                    if let Some(retry) = &inner.retry {
                        retry.reset();
                    }
                    let writer = inner
                        .rt
                        .spawn(Inner::write_loop(inner.clone(), generation, write_half));
                    shared.writer = Some(writer);
                }
                debug!("connected to {}", target);
                inner.handler.fire(|h| h.on_connected());
                Inner::read_loop(inner, generation, read_half).await;
            }
        }
    }

    async fn establish(
        inner: &Arc<Inner>,
        target: &ConnectTarget,
    ) -> Result<(Transport, Option<Endpoint>, Option<Endpoint>)> {
        let stream = match target {
            ConnectTarget::Endpoint(ep) => TcpStream::connect(std::net::SocketAddr::from(*ep))
                .await
                .map_err(Error::new_connect)?,
            ConnectTarget::Host(host) => {
                let addrs = tokio::net::lookup_host((host.host(), host.port()))
                    .await
                    .map_err(Error::new_resolve)?
                    .filter(|addr| addr.is_ipv4())
                    .collect::<Vec<_>>();
                if addrs.is_empty() {
                    return Err(Error::new_resolve(io::Error::new(
                        io::ErrorKind::NotFound,
                        "host resolved to no IPv4 addresses",
                    )));
                }
                let mut connected = None;
                let mut last_err = None;
                for addr in addrs {
                    match TcpStream::connect(addr).await {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(err) => {
                            trace!("connect attempt to {} failed: {}", addr, err);
                            last_err = Some(err);
                        }
                    }
                }
                match connected {
                    Some(stream) => stream,
                    None => {
                        return Err(match last_err {
                            Some(err) => Error::new_connect(err),
                            None => Error::new_connect(io::Error::new(
                                io::ErrorKind::NotConnected,
                                "no address attempted",
                            )),
                        })
                    }
                }
            }
        };

        if inner.config.keep_alive {
            if let Err(err) = socket2::SockRef::from(&stream).set_keepalive(true) {
                trace!("error trying to set TCP keepalive: {}", err);
            }
        }

        let local = stream
            .local_addr()
            .ok()
            .and_then(|sa| Endpoint::try_from(sa).ok());
        let remote = stream
            .peer_addr()
            .ok()
            .and_then(|sa| Endpoint::try_from(sa).ok());

        let transport = match &inner.tls {
            None => Transport::plain(stream),
            Some(config) => {
                let name = tls::server_name_for(target)?;
                let connector = TlsConnector::from(config.clone());
                let tls_stream = connector
                    .connect(name, stream)
                    .await
                    .map_err(Error::new_tls)?;
                Transport::tls(tls_stream)
            }
        };

        Ok((transport, local, remote))
    }

    async fn read_loop(inner: Arc<Inner>, generation: u64, mut read_half: ReadHalf<Transport>) {
        let mut buf = vec![0u8; inner.config.buffer.read_buffer_size];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => {
                    Inner::connection_failed(&inner, generation, Error::new_closed());
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
                    Inner::connection_failed(&inner, generation, Error::new_io(err));
                    return;
                }
            }
        }
    }

    async fn write_loop(inner: Arc<Inner>, generation: u64, mut write_half: WriteHalf<Transport>) {
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
                            Inner::connection_failed(&inner, generation, Error::new_io(err));
                            return;
                        }
                    }
                }
                Step::Drained => {
                    // Graceful close: pending writes are on the wire.
                    if let Err(err) = write_half.shutdown().await {
                        // Peers tearing the transport down without closing
                        // TLS cleanly surface here; benign.
                        warn!("error shutting down connection: {}", err);
                    }
                    {
                        let mut shared = inner.shared.lock().unwrap();
                        if shared.generation != generation {
                            return;
                        }
                        shared.generation += 1;
                        shared.state = State::Disconnected;
                        shared.local = None;
                        shared.remote = None;
                        shared.writer = None;
                        if let Some(driver) = shared.driver.take() {
                            driver.abort();
                        }
                    }
                    inner.handler.fire(|h| h.on_disconnected(None, false));
                    return;
                }
                Step::Wait => {
                    inner.wake_writer.notified().await;
                }
            }
        }
    }

    /// Runtime-reported failure: tear down, notify, consult the reconnect
    /// executor.
    fn connection_failed(inner: &Arc<Inner>, generation: u64, err: Error) {
        let will_reconnect;
        {
            let mut shared = inner.shared.lock().unwrap();
            if shared.generation != generation || shared.state == State::Disconnected {
                return;
            }
            shared.generation += 1;
            shared.state = State::Disconnected;
            shared.queue.clear();
            shared.writing = false;
            shared.local = None;
            shared.remote = None;
            if let Some(driver) = shared.driver.take() {
                driver.abort();
            }
            if let Some(writer) = shared.writer.take() {
                writer.abort();
            }
            will_reconnect = inner
                .retry
                .as_ref()
                .map(|retry| !retry.is_exhausted() && !retry.is_canceled())
                .unwrap_or(false);
        }

        debug!("disconnected: {} (will_reconnect={})", err, will_reconnect);
        inner.handler.fire(|h| h.on_disconnected(Some(err), will_reconnect));

        // The handler may have cancelled reconnection; retry() no-ops then.
        if will_reconnect {
            if let Some(retry) = &inner.retry {
                retry.retry();
            }
        }
    }

    /// Retry-executor action: attempt the stored target again.
    fn reconnect(inner: &Arc<Inner>) {
        let target = {
            let shared = inner.shared.lock().unwrap();
            if shared.state != State::Disconnected {
                return;
            }
            shared.target.clone()
        };
        let Some(target) = target else { return };

        if let Err(err) = Inner::connect(inner, target) {
            inner.handler.fire(|h| h.on_disconnected(Some(err), true));
            if let Some(retry) = &inner.retry {
                retry.retry();
            }
        }
    }
}

fn spawn_disconnect_notify(inner: Arc<Inner>) {
    let rt = inner.rt.clone();
    rt.spawn(async move {
        inner.handler.fire(|h| h.on_disconnected(None, false));
    });
}
