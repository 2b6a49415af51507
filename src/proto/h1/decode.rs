//! Body decoders for Content-Length and chunked framing.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Parse};

/// Maximum bytes allowed in chunk extensions, across the whole body.
const CHUNKED_EXTENSIONS_LIMIT: u64 = 1024 * 16;

/// Maximum bytes allowed for all trailer fields. Trailers are tolerated and
/// discarded; this only bounds how much of them we will chew through.
const TRAILER_LIMIT: u64 = 1024 * 16;

/// Body framing selected from a message head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BodyKind {
    Empty,
    Length(u64),
    Chunked,
}

/// Incremental body decoder over the sliding input buffer.
#[derive(Debug)]
pub(crate) struct Decoder {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Empty,
    Length {
        remaining: u64,
    },
    Chunked {
        state: ChunkedState,
        chunk_len: u64,
        extensions_len: u64,
        trailers_len: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChunkedState {
    Start,
    Size,
    SizeLws,
    Extension,
    SizeLf,
    Body,
    BodyCr,
    BodyLf,
    Trailer,
    TrailerField,
    TrailerLf,
    EndLf,
    End,
}

impl Decoder {
    pub(crate) fn new(kind: BodyKind) -> Decoder {
        let kind = match kind {
            BodyKind::Empty => Kind::Empty,
            BodyKind::Length(0) => Kind::Empty,
            BodyKind::Length(len) => Kind::Length { remaining: len },
            BodyKind::Chunked => Kind::Chunked {
                state: ChunkedState::Start,
                chunk_len: 0,
                extensions_len: 0,
                trailers_len: 0,
            },
        };
        Decoder { kind }
    }

    /// Consumes framed body bytes from `buf`, appending the payload to `out`.
    ///
    /// Returns `Ok(true)` once the body is complete; `Ok(false)` means more
    /// input is needed.
    pub(crate) fn decode(
        &mut self,
        buf: &mut BytesMut,
        out: &mut Vec<u8>,
        max_body: usize,
    ) -> Result<bool, Error> {
        match &mut self.kind {
            Kind::Empty => Ok(true),
            Kind::Length { remaining } => {
                if *remaining > 0 && !buf.is_empty() {
                    let take = (*remaining).min(buf.len() as u64) as usize;
                    if out.len() + take > max_body {
                        return Err(Parse::TooLarge.into());
                    }
                    out.extend_from_slice(&buf[..take]);
                    buf.advance(take);
                    *remaining -= take as u64;
                }
                Ok(*remaining == 0)
            }
            Kind::Chunked {
                state,
                chunk_len,
                extensions_len,
                trailers_len,
            } => loop {
                if *state == ChunkedState::End {
                    return Ok(true);
                }

                if *state == ChunkedState::Body {
                    if buf.is_empty() {
                        return Ok(false);
                    }
                    let take = (*chunk_len).min(buf.len() as u64) as usize;
                    if out.len() + take > max_body {
                        return Err(Parse::TooLarge.into());
                    }
                    out.extend_from_slice(&buf[..take]);
                    buf.advance(take);
                    *chunk_len -= take as u64;
                    if *chunk_len == 0 {
                        *state = ChunkedState::BodyCr;
                    }
                    continue;
                }

                let Some(&byte) = buf.first() else {
                    return Ok(false);
                };
                buf.advance(1);

                *state = match *state {
                    ChunkedState::Start => match hex_digit(byte) {
                        Some(value) => {
                            *chunk_len = u64::from(value);
                            ChunkedState::Size
                        }
                        None => return Err(Parse::Chunked.into()),
                    },
                    ChunkedState::Size => match (hex_digit(byte), byte) {
                        (Some(value), _) => {
                            if *chunk_len > u64::MAX / 16 {
                                return Err(Parse::TooLarge.into());
                            }
                            *chunk_len = *chunk_len * 16 + u64::from(value);
                            ChunkedState::Size
                        }
                        (None, b';') => ChunkedState::Extension,
                        (None, b' ') | (None, b'\t') => ChunkedState::SizeLws,
                        (None, b'\r') => ChunkedState::SizeLf,
                        _ => return Err(Parse::Chunked.into()),
                    },
                    ChunkedState::SizeLws => match byte {
                        b' ' | b'\t' => ChunkedState::SizeLws,
                        b';' => ChunkedState::Extension,
                        b'\r' => ChunkedState::SizeLf,
                        _ => return Err(Parse::Chunked.into()),
                    },
                    ChunkedState::Extension => match byte {
                        b'\r' => ChunkedState::SizeLf,
                        // A LF inside an extension is never valid.
                        b'\n' => return Err(Parse::Chunked.into()),
                        _ => {
                            *extensions_len += 1;
                            if *extensions_len > CHUNKED_EXTENSIONS_LIMIT {
                                return Err(Parse::TooLarge.into());
                            }
                            ChunkedState::Extension
                        }
                    },
                    ChunkedState::SizeLf => match byte {
                        b'\n' if *chunk_len == 0 => ChunkedState::Trailer,
                        b'\n' => ChunkedState::Body,
                        _ => return Err(Parse::Chunked.into()),
                    },
                    // Payload bytes are drained in bulk above.
                    ChunkedState::Body => return Err(Parse::Chunked.into()),
                    ChunkedState::BodyCr => match byte {
                        b'\r' => ChunkedState::BodyLf,
                        _ => return Err(Parse::Chunked.into()),
                    },
                    ChunkedState::BodyLf => match byte {
                        b'\n' => ChunkedState::Start,
                        _ => return Err(Parse::Chunked.into()),
                    },
                    ChunkedState::Trailer => match byte {
                        b'\r' => ChunkedState::EndLf,
                        _ => {
                            *trailers_len += 1;
                            if *trailers_len > TRAILER_LIMIT {
                                return Err(Parse::TooLarge.into());
                            }
                            ChunkedState::TrailerField
                        }
                    },
                    ChunkedState::TrailerField => match byte {
                        b'\r' => ChunkedState::TrailerLf,
                        _ => {
                            *trailers_len += 1;
                            if *trailers_len > TRAILER_LIMIT {
                                return Err(Parse::TooLarge.into());
                            }
                            ChunkedState::TrailerField
                        }
                    },
                    ChunkedState::TrailerLf => match byte {
                        b'\n' => ChunkedState::Trailer,
                        _ => return Err(Parse::Chunked.into()),
                    },
                    ChunkedState::EndLf => match byte {
                        b'\n' => ChunkedState::End,
                        _ => return Err(Parse::Chunked.into()),
                    },
                    ChunkedState::End => ChunkedState::End,
                };
            },
        }
    }
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
