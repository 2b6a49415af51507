//! Socket configuration.

use crate::time::retry::RetryPolicy;

/// Buffer sizing shared by the socket types.
#[derive(Clone, Debug)]
pub struct BufferConfig {
    /// Initial reserve of each pooled send buffer, in bytes.
    pub initial_send_chunk_size: usize,
    /// Number of send buffers pre-populated in the pool.
    pub initial_send_chunk_count: usize,
    /// Size of the receive buffer reused across reads.
    pub read_buffer_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            initial_send_chunk_size: 1024,
            initial_send_chunk_count: 4,
            read_buffer_size: 8 * 1024,
        }
    }
}

/// Automatic reconnection behavior of an outbound TCP socket.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// When false the socket stays disconnected after a runtime failure.
    pub enabled: bool,
    pub policy: RetryPolicy,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            enabled: true,
            policy: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TcpSocketConfig {
    /// Enable TCP keep-alive on the connected socket.
    pub keep_alive: bool,
    pub reconnect: ReconnectConfig,
    pub buffer: BufferConfig,
}

#[derive(Clone, Debug)]
pub struct TcpAcceptorConfig {
    /// Set `SO_REUSEADDR` before binding the listener.
    pub reuse_address: bool,
    /// Apply TCP keep-alive to accepted sockets.
    pub keep_alive: bool,
    /// Buffer sizing handed to each accepted socket.
    pub socket_buffer: BufferConfig,
}

impl Default for TcpAcceptorConfig {
    fn default() -> Self {
        TcpAcceptorConfig {
            reuse_address: true,
            keep_alive: false,
            socket_buffer: BufferConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct UdpSocketConfig {
    pub buffer: BufferConfig,
}
