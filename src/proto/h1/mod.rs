//! HTTP/1.x protocol framing.

pub(crate) mod date;
pub(crate) mod decode;
pub(crate) mod encode;
pub(crate) mod parse;

pub(crate) use self::encode::{encode_request, encode_response};
pub(crate) use self::parse::MessageParser;
