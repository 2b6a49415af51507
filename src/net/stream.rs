//! Transport abstraction over plaintext and TLS streams.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsStream;

pin_project_lite::pin_project! {
    /// A connected byte stream, with or without TLS on top.
    #[project = TransportProj]
    pub(crate) enum Transport {
        Plain { #[pin] io: TcpStream },
        Tls { #[pin] io: Box<TlsStream<TcpStream>> },
    }
}

impl Transport {
    pub(crate) fn plain(io: TcpStream) -> Transport {
        Transport::Plain { io }
    }

    pub(crate) fn tls(io: impl Into<TlsStream<TcpStream>>) -> Transport {
        Transport::Tls { io: Box::new(io.into()) }
    }
}

impl AsyncRead for Transport {
    #[inline]
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            TransportProj::Plain { io } => io.poll_read(cx, buf),
            TransportProj::Tls { io } => io.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    #[inline]
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            TransportProj::Plain { io } => io.poll_write(cx, buf),
            TransportProj::Tls { io } => io.poll_write(cx, buf),
        }
    }

    #[inline]
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            TransportProj::Plain { io } => io.poll_flush(cx),
            TransportProj::Tls { io } => io.poll_flush(cx),
        }
    }

    #[inline]
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            TransportProj::Plain { io } => io.poll_shutdown(cx),
            TransportProj::Tls { io } => io.poll_shutdown(cx),
        }
    }

    #[inline]
    fn is_write_vectored(&self) -> bool {
        match self {
            Transport::Plain { io } => io.is_write_vectored(),
            Transport::Tls { io } => io.is_write_vectored(),
        }
    }

    #[inline]
    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            TransportProj::Plain { io } => io.poll_write_vectored(cx, bufs),
            TransportProj::Tls { io } => io.poll_write_vectored(cx, bufs),
        }
    }
}
