//! Incremental HTTP/1.1 message parsing over a sliding buffer.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::error::{Error, Parse};
use crate::http::{Headers, HttpRequest, HttpResponse, Method, StatusCode};

use super::decode::{BodyKind, Decoder};

pub(crate) const MAX_HEADERS: usize = 100;

/// If a head has not completed by the time this much input is buffered, the
/// message is refused.
const MAX_HEAD_SIZE: usize = 8192 + 4096 * 100;

/// Upper bound on an assembled message body.
const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// One side of an HTTP/1.1 exchange that can be parsed off the wire.
pub(crate) trait Http1Message: Sized {
    /// Tries to parse a message head from the front of `buf`.
    ///
    /// Yields the head, the bytes consumed and the body framing, or `None`
    /// when more input is required.
    fn parse_head(buf: &[u8]) -> Result<Option<(Self, usize, BodyKind)>, Error>;

    fn attach_body(&mut self, body: Vec<u8>);
}

enum State<T> {
    Head,
    Body {
        head: T,
        decoder: Decoder,
        body: Vec<u8>,
    },
}

/// Incremental parser producing complete messages through a sink closure.
///
/// Fragmented input never drops bytes between `feed` calls. After each
/// complete message the parser resets itself, so keep-alive streams parse
/// message after message. A parse error clears the buffer and resets the
/// parser before it is surfaced.
pub(crate) struct MessageParser<T> {
    buf: BytesMut,
    state: State<T>,
}

impl<T: Http1Message> MessageParser<T> {
    pub(crate) fn new() -> MessageParser<T> {
        MessageParser {
            buf: BytesMut::new(),
            state: State::Head,
        }
    }

    /// Appends `data` and emits every message that completes.
    pub(crate) fn feed(
        &mut self,
        data: &[u8],
        mut sink: impl FnMut(T),
    ) -> Result<(), Error> {
        self.buf.extend_from_slice(data);
        match self.drain(&mut sink) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!("parse error: {}", err);
                self.buf.clear();
                self.state = State::Head;
                Err(err)
            }
        }
    }

    fn drain(&mut self, sink: &mut impl FnMut(T)) -> Result<(), Error> {
        loop {
            match std::mem::replace(&mut self.state, State::Head) {
                State::Head => {
                    if self.buf.is_empty() {
                        return Ok(());
                    }
                    match T::parse_head(&self.buf)? {
                        Some((head, consumed, kind)) => {
                            trace!("parsed head, {} bytes", consumed);
                            self.buf.advance(consumed);
                            self.state = State::Body {
                                head,
                                decoder: Decoder::new(kind),
                                body: Vec::new(),
                            };
                        }
                        None => {
                            if self.buf.len() > MAX_HEAD_SIZE {
                                return Err(Parse::TooLarge.into());
                            }
                            return Ok(());
                        }
                    }
                }
                State::Body {
                    mut head,
                    mut decoder,
                    mut body,
                } => {
                    if decoder.decode(&mut self.buf, &mut body, MAX_BODY_SIZE)? {
                        head.attach_body(body);
                        sink(head);
                        self.state = State::Head;
                    } else {
                        self.state = State::Body {
                            head,
                            decoder,
                            body,
                        };
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl Http1Message for HttpRequest {
    fn parse_head(buf: &[u8]) -> Result<Option<(Self, usize, BodyKind)>, Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);
        let status = parsed
            .parse(buf)
            .map_err(|e| Error::from(Parse::from(e)))?;
        let consumed = match status {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };

        let mut request = HttpRequest::new(
            Method::from_wire(parsed.method.unwrap()),
            parsed.path.unwrap(),
        );
        request.set_version(wire_version(parsed.version.unwrap()));
        *request.headers_mut() = collect_headers(parsed.headers);

        let kind = request_body_kind(request.headers())?;
        Ok(Some((request, consumed, kind)))
    }

    fn attach_body(&mut self, body: Vec<u8>) {
        self.set_body(body);
    }
}

impl Http1Message for HttpResponse {
    fn parse_head(buf: &[u8]) -> Result<Option<(Self, usize, BodyKind)>, Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut headers);
        let status = httparse::ParserConfig::default()
            .allow_obsolete_multiline_headers_in_responses(true)
            .parse_response(&mut parsed, buf)
            .map_err(|e| Error::from(Parse::from(e)))?;
        let consumed = match status {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };

        let code = parsed.code.unwrap();
        let mut response = HttpResponse::new(StatusCode::from_u16(code));
        response.set_version(wire_version(parsed.version.unwrap()));
        *response.headers_mut() = collect_headers(parsed.headers);

        let kind = response_body_kind(code, response.headers())?;
        Ok(Some((response, consumed, kind)))
    }

    fn attach_body(&mut self, body: Vec<u8>) {
        self.set_body(body);
    }
}

fn wire_version(minor: u8) -> u8 {
    if minor == 1 {
        11
    } else {
        10
    }
}

fn collect_headers(parsed: &[httparse::Header<'_>]) -> Headers {
    parsed
        .iter()
        .map(|h| (h.name, String::from_utf8_lossy(h.value).into_owned()))
        .collect()
}

fn request_body_kind(headers: &Headers) -> Result<BodyKind, Error> {
    if let Some(te) = headers.get("transfer-encoding") {
        return if te_is_chunked(te) {
            Ok(BodyKind::Chunked)
        } else {
            Err(Parse::Header.into())
        };
    }
    if let Some(cl) = headers.get("content-length") {
        return Ok(BodyKind::Length(parse_content_length(cl)?));
    }
    Ok(BodyKind::Empty)
}

fn response_body_kind(code: u16, headers: &Headers) -> Result<BodyKind, Error> {
    // These statuses never carry a body.
    if (100..200).contains(&code) || code == 204 || code == 304 {
        return Ok(BodyKind::Empty);
    }
    if let Some(te) = headers.get("transfer-encoding") {
        return if te_is_chunked(te) {
            Ok(BodyKind::Chunked)
        } else {
            Err(Parse::Header.into())
        };
    }
    if let Some(cl) = headers.get("content-length") {
        return Ok(BodyKind::Length(parse_content_length(cl)?));
    }
    Ok(BodyKind::Empty)
}

fn te_is_chunked(value: &str) -> bool {
    value
        .rsplit(',')
        .next()
        .map(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

fn parse_content_length(value: &str) -> Result<u64, Error> {
    let digits = value.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Parse::Header.into());
    }
    digits.parse().map_err(|_| Parse::Header.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_requests(parser: &mut MessageParser<HttpRequest>, input: &[u8]) -> Vec<HttpRequest> {
        let mut out = Vec::new();
        parser.feed(input, |req| out.push(req)).unwrap();
        out
    }

    #[test]
    fn simple_request() {
        let mut parser = MessageParser::<HttpRequest>::new();
        let reqs = parse_requests(&mut parser, b"GET /test HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method(), Method::Get);
        assert_eq!(reqs[0].target(), "/test");
        assert_eq!(reqs[0].version(), 11);
        assert_eq!(reqs[0].header("host"), Some("x"));
        assert!(reqs[0].body().is_empty());
    }

    #[test]
    fn byte_at_a_time_yields_one_message() {
        let raw = b"POST /api/data HTTP/1.1\r\nContent-Length: 15\r\n\r\n{\"key\":\"value\"}";
        let mut parser = MessageParser::<HttpRequest>::new();
        let mut out = Vec::new();
        for &byte in raw.iter() {
            parser.feed(&[byte], |req| out.push(req)).unwrap();
        }
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].method(), Method::Post);
        assert_eq!(out[0].body(), b"{\"key\":\"value\"}");
    }

    #[test]
    fn pipelined_requests_parse_in_order() {
        let mut parser = MessageParser::<HttpRequest>::new();
        let reqs = parse_requests(
            &mut parser,
            b"GET /first HTTP/1.1\r\n\r\nGET /second HTTP/1.1\r\n\r\n",
        );
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].target(), "/first");
        assert_eq!(reqs[1].target(), "/second");
    }

    #[test]
    fn chunked_request_body() {
        let mut parser = MessageParser::<HttpRequest>::new();
        let reqs = parse_requests(
            &mut parser,
            b"PUT /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n",
        );
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].body(), b"abc");
    }

    #[test]
    fn header_casing_preserved_and_lookup_insensitive() {
        let mut parser = MessageParser::<HttpRequest>::new();
        let reqs = parse_requests(&mut parser, b"GET / HTTP/1.1\r\nX-CuStOm: yes\r\n\r\n");
        let headers = reqs[0].headers();
        assert_eq!(headers.iter().next(), Some(("X-CuStOm", "yes")));
        assert_eq!(headers.get("x-custom"), Some("yes"));
    }

    #[test]
    fn unsupported_and_unknown_methods() {
        let mut parser = MessageParser::<HttpRequest>::new();
        let reqs = parse_requests(&mut parser, b"HEAD / HTTP/1.1\r\n\r\n");
        assert_eq!(reqs[0].method(), Method::Unsupported);
        let reqs = parse_requests(&mut parser, b"BREW /pot HTTP/1.1\r\n\r\n");
        assert_eq!(reqs[0].method(), Method::Unknown);
    }

    #[test]
    fn error_resets_parser_for_next_message() {
        let mut parser = MessageParser::<HttpRequest>::new();
        let err = parser.feed(b"broken stuff\r\n\r\n", |_| {}).unwrap_err();
        assert!(err.is_parse());
        // A fresh, valid request parses cleanly afterwards.
        let reqs = parse_requests(&mut parser, b"GET /ok HTTP/1.1\r\n\r\n");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].target(), "/ok");
    }

    #[test]
    fn invalid_content_length_is_an_error() {
        let mut parser = MessageParser::<HttpRequest>::new();
        let err = parser
            .feed(b"POST / HTTP/1.1\r\nContent-Length: nope\r\n\r\n", |_| {})
            .unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn response_with_body() {
        let mut parser = MessageParser::<HttpResponse>::new();
        let mut out = Vec::new();
        parser
            .feed(
                b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello",
                |res| out.push(res),
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status(), StatusCode::Ok);
        assert_eq!(out[0].body(), b"hello");
    }

    #[test]
    fn response_unknown_status_maps_to_unknown() {
        let mut parser = MessageParser::<HttpResponse>::new();
        let mut out = Vec::new();
        parser
            .feed(b"HTTP/1.1 599 Whatever\r\nContent-Length: 0\r\n\r\n", |res| {
                out.push(res)
            })
            .unwrap();
        assert_eq!(out[0].status(), StatusCode::Unknown);
    }

    #[test]
    fn response_obs_fold_is_tolerated() {
        let mut parser = MessageParser::<HttpResponse>::new();
        let mut out = Vec::new();
        parser
            .feed(
                b"HTTP/1.1 200 OK\r\nX-Folded: one\r\n two\r\nContent-Length: 0\r\n\r\n",
                |res| out.push(res),
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].header("x-folded").is_some());
    }

    #[test]
    fn response_without_framing_has_empty_body() {
        let mut parser = MessageParser::<HttpResponse>::new();
        let mut out = Vec::new();
        parser
            .feed(b"HTTP/1.1 204 No Content\r\n\r\n", |res| out.push(res))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].body().is_empty());
    }
}
