//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;

/// Result type often returned from methods that can have hawser `Error`s.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur handling sockets and HTTP streams.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(super) enum Kind {
    Parse(Parse),
    User(User),
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    Io,
    /// Error occurred while connecting.
    Connect,
    /// DNS resolution failed, or produced no usable address.
    Resolve,
    /// TLS handshake failure.
    Tls,
    /// Error creating a listener.
    Listen,
    /// Error binding a socket to a local endpoint.
    Bind,
    /// Error accepting a connection.
    Accept,
    /// The peer closed the connection.
    Closed,
    /// A deadline elapsed before the awaited operation completed.
    Timeout,
}

#[derive(Debug)]
pub(super) enum Parse {
    #[allow(unused)]
    Method,
    Version,
    #[allow(unused)]
    Uri,
    Header,
    Status,
    TooLarge,
    Chunked,
}

#[derive(Debug)]
pub(super) enum User {
    /// The socket is not connected.
    NotConnected,
    /// A connect was issued while another connection attempt or connection exists.
    InProgress,
    /// The caller handed over unusable input (e.g. an empty send payload).
    InvalidInput,
    /// A route for the same method and path was already registered.
    DuplicateRoute,
    /// A timer handler was installed twice.
    HandlerAlreadySet,
    /// The request carried a method that cannot be put on the wire.
    UnencodableMethod,
}

/// Sentinel type to indicate the error was caused by a timeout.
#[derive(Debug)]
pub(crate) struct TimedOut;

impl Error {
    /// Returns true if this was an HTTP parse error.
    pub fn is_parse(&self) -> bool {
        matches!(self.inner.kind, Kind::Parse(_))
    }

    /// Returns true if this was a parse error caused by a message that exceeded a limit.
    pub fn is_parse_too_large(&self) -> bool {
        matches!(self.inner.kind, Kind::Parse(Parse::TooLarge))
    }

    /// Returns true if this error was caused by user code.
    pub fn is_user(&self) -> bool {
        matches!(self.inner.kind, Kind::User(_))
    }

    /// Returns true if this was an error on a not-connected socket.
    pub fn is_not_connected(&self) -> bool {
        matches!(self.inner.kind, Kind::User(User::NotConnected))
    }

    /// Returns true if this was an error while connecting.
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    /// Returns true if this was a DNS resolution error.
    pub fn is_resolve(&self) -> bool {
        matches!(self.inner.kind, Kind::Resolve)
    }

    /// Returns true if this was a TLS error.
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns true if the peer closed the connection.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::Closed)
    }

    /// Returns true if this was an error accepting a connection.
    pub fn is_accept(&self) -> bool {
        matches!(self.inner.kind, Kind::Accept)
    }

    /// Returns true if the error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout) || self.find_source::<TimedOut>().is_some()
    }

    /// Consumes the error, returning its cause.
    pub fn into_cause(self) -> Option<Box<dyn StdError + Send + Sync>> {
        self.inner.cause
    }

    pub(super) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(super) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn find_source<E: StdError + 'static>(&self) -> Option<&E> {
        let mut cause = self.source();
        while let Some(err) = cause {
            if let Some(typed) = err.downcast_ref() {
                return Some(typed);
            }
            cause = err.source();
        }

        // else
        None
    }

    pub(super) fn new_io(cause: std::io::Error) -> Error {
        Error::new(Kind::Io).with(cause)
    }

    pub(super) fn new_connect<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Connect).with(cause)
    }

    pub(super) fn new_resolve<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Resolve).with(cause)
    }

    pub(super) fn new_tls<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Tls).with(cause)
    }

    pub(super) fn new_listen<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Listen).with(cause)
    }

    pub(super) fn new_bind<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Bind).with(cause)
    }

    pub(super) fn new_accept<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Accept).with(cause)
    }

    pub(super) fn new_closed() -> Error {
        Error::new(Kind::Closed)
    }

    pub(super) fn new_timeout() -> Error {
        Error::new(Kind::Timeout).with(TimedOut)
    }

    fn new_user(user: User) -> Error {
        Error::new(Kind::User(user))
    }

    pub(super) fn new_not_connected() -> Error {
        Error::new_user(User::NotConnected)
    }

    pub(super) fn new_in_progress() -> Error {
        Error::new_user(User::InProgress)
    }

    pub(super) fn new_invalid_input() -> Error {
        Error::new_user(User::InvalidInput)
    }

    pub(super) fn new_duplicate_route() -> Error {
        Error::new_user(User::DuplicateRoute)
    }

    pub(super) fn new_handler_already_set() -> Error {
        Error::new_user(User::HandlerAlreadySet)
    }

    pub(super) fn new_unencodable_method() -> Error {
        Error::new_user(User::UnencodableMethod)
    }

    /// The error's standalone message, without the message from the source.
    pub fn message(&self) -> impl fmt::Display + '_ {
        self.description()
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::Parse(Parse::Method) => "invalid HTTP method parsed",
            Kind::Parse(Parse::Version) => "invalid HTTP version parsed",
            Kind::Parse(Parse::Uri) => "invalid URI",
            Kind::Parse(Parse::Header) => "invalid HTTP header parsed",
            Kind::Parse(Parse::Status) => "invalid HTTP status-code parsed",
            Kind::Parse(Parse::TooLarge) => "message is too large",
            Kind::Parse(Parse::Chunked) => "invalid chunked body",
            Kind::Io => "connection error",
            Kind::Connect => "error trying to connect",
            Kind::Resolve => "error resolving host",
            Kind::Tls => "TLS error",
            Kind::Listen => "error creating listener",
            Kind::Bind => "error binding socket",
            Kind::Accept => "error accepting connection",
            Kind::Closed => "connection closed by peer",
            Kind::Timeout => "operation timed out",

            Kind::User(User::NotConnected) => "socket is not connected",
            Kind::User(User::InProgress) => "connection already in progress",
            Kind::User(User::InvalidInput) => "invalid input",
            Kind::User(User::DuplicateRoute) => "route already registered",
            Kind::User(User::HandlerAlreadySet) => "timer handler already set",
            Kind::User(User::UnencodableMethod) => "request method cannot be serialized",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("hawser::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cause) = self.inner.cause {
            write!(f, "{}: {}", self.description(), cause)
        } else {
            f.write_str(self.description())
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}

#[doc(hidden)]
impl From<Parse> for Error {
    fn from(err: Parse) -> Error {
        Error::new(Kind::Parse(err))
    }
}

impl From<httparse::Error> for Parse {
    fn from(err: httparse::Error) -> Parse {
        match err {
            httparse::Error::HeaderName
            | httparse::Error::HeaderValue
            | httparse::Error::NewLine
            | httparse::Error::Token => Parse::Header,
            httparse::Error::Status => Parse::Status,
            httparse::Error::TooManyHeaders => Parse::TooLarge,
            httparse::Error::Version => Parse::Version,
        }
    }
}

#[doc(hidden)]
trait AssertSendSync: Send + Sync + 'static {}
#[doc(hidden)]
impl AssertSendSync for Error {}

// ===== impl TimedOut =====

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation timed out")
    }
}

impl StdError for TimedOut {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn error_size_of() {
        assert_eq!(mem::size_of::<Error>(), mem::size_of::<usize>());
    }

    #[test]
    fn timeout_finds_sentinel() {
        let err = Error::new_timeout();
        assert!(err.is_timeout());
        assert!(!err.is_parse());
    }

    #[test]
    fn httparse_header_maps_to_parse() {
        let err = Error::from(Parse::from(httparse::Error::Token));
        assert!(err.is_parse());
        assert!(!err.is_parse_too_large());
    }
}
