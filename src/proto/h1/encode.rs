//! Serialization of requests and responses into send chunks.
//!
//! A message becomes a head chunk plus zero or more body chunks; the caller
//! hands each chunk to the socket's send queue in order.

use crate::http::{HttpRequest, HttpResponse, Method, StatusCode};
use crate::{Error, Result};

use super::date;

pub(crate) fn encode_request(req: &HttpRequest) -> Result<Vec<Vec<u8>>> {
    let method = req
        .method()
        .as_str()
        .ok_or_else(Error::new_unencodable_method)?;
    let target = if req.target().is_empty() {
        "/"
    } else {
        req.target()
    };

    let mut head = Vec::with_capacity(128);
    head.extend_from_slice(method.as_bytes());
    head.push(b' ');
    head.extend_from_slice(target.as_bytes());
    head.push(b' ');
    head.extend_from_slice(version_line(req.version()));
    head.extend_from_slice(b"\r\n");

    extend_headers(&mut head, req.headers().iter());

    let chunked = is_chunked(req.headers().get("transfer-encoding"));
    let wants_length = !req.body().is_empty()
        || matches!(req.method(), Method::Post | Method::Put);
    if !chunked && wants_length && !req.headers().contains("content-length") {
        extend_content_length(&mut head, req.body().len());
    }
    head.extend_from_slice(b"\r\n");

    let mut chunks = vec![head];
    extend_body(&mut chunks, req.body(), chunked);
    Ok(chunks)
}

pub(crate) fn encode_response(res: &HttpResponse) -> Vec<Vec<u8>> {
    // An unknown status cannot be put on the wire; answer as a server error.
    let status = if res.status() == StatusCode::Unknown {
        StatusCode::InternalServerError
    } else {
        res.status()
    };
    let code = status.as_u16();

    let mut head = Vec::with_capacity(128);
    head.extend_from_slice(version_line(res.version()));
    head.push(b' ');
    let mut fmt = itoa::Buffer::new();
    head.extend_from_slice(fmt.format(code).as_bytes());
    head.push(b' ');
    head.extend_from_slice(status.reason().as_bytes());
    head.extend_from_slice(b"\r\n");

    extend_headers(&mut head, res.headers().iter());

    if !res.headers().contains("date") {
        head.extend_from_slice(b"date: ");
        date::extend(&mut head);
        head.extend_from_slice(b"\r\n");
    }

    let bodyless = (100..200).contains(&code) || code == 204 || code == 304;
    let chunked = is_chunked(res.headers().get("transfer-encoding"));
    if !bodyless && !chunked && !res.headers().contains("content-length") {
        extend_content_length(&mut head, res.body().len());
    }
    head.extend_from_slice(b"\r\n");

    let mut chunks = vec![head];
    if !bodyless {
        extend_body(&mut chunks, res.body(), chunked);
    }
    chunks
}

fn version_line(version: u8) -> &'static [u8] {
    if version == 10 {
        b"HTTP/1.0"
    } else {
        b"HTTP/1.1"
    }
}

fn extend_headers<'a>(dst: &mut Vec<u8>, headers: impl Iterator<Item = (&'a str, &'a str)>) {
    for (name, value) in headers {
        dst.extend_from_slice(name.as_bytes());
        dst.extend_from_slice(b": ");
        dst.extend_from_slice(value.as_bytes());
        dst.extend_from_slice(b"\r\n");
    }
}

fn extend_content_length(dst: &mut Vec<u8>, len: usize) {
    let mut fmt = itoa::Buffer::new();
    dst.extend_from_slice(b"content-length: ");
    dst.extend_from_slice(fmt.format(len).as_bytes());
    dst.extend_from_slice(b"\r\n");
}

fn extend_body(chunks: &mut Vec<Vec<u8>>, body: &[u8], chunked: bool) {
    if chunked {
        if !body.is_empty() {
            let mut framed = Vec::with_capacity(body.len() + 20);
            framed.extend_from_slice(format!("{:X}\r\n", body.len()).as_bytes());
            framed.extend_from_slice(body);
            framed.extend_from_slice(b"\r\n");
            chunks.push(framed);
        }
        chunks.push(b"0\r\n\r\n".to_vec());
    } else if !body.is_empty() {
        chunks.push(body.to_vec());
    }
}

fn is_chunked(te: Option<&str>) -> bool {
    te.map(|value| {
        value
            .rsplit(',')
            .next()
            .map(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            .unwrap_or(false)
    })
    .unwrap_or(false)
}
