//! gRPC message framing shared by the native and gRPC-Web adapters.
//!
//! A frame is one flag byte, a four byte big-endian length and the payload.
//! gRPC-Web appends a frame with the trailer flag set whose payload is the
//! trailers in HTTP/1 header text form.

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderValue};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tonic::Status;

use crate::error::GatewayError;

/// Flag byte plus length prefix.
pub const FRAME_HEADER_LEN: usize = 5;

/// Flag bit marking a compressed payload.
pub const COMPRESSED_FLAG: u8 = 0x01;

/// Flag bit marking a gRPC-Web trailer frame.
pub const TRAILER_FLAG: u8 = 0x80;

/// Characters escaped in `grpc-message`: everything outside printable
/// ASCII, plus `%` itself.
const GRPC_MESSAGE: &AsciiSet = &CONTROLS.add(b'%');

/// Frame `payload` with `flags`.
pub fn encode_frame(flags: u8, payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.put_u8(flags);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    frame.freeze()
}

/// Payload of a body holding exactly one uncompressed message frame.
pub fn decode_single_frame(body: Bytes) -> Result<Bytes, GatewayError> {
    if body.len() < FRAME_HEADER_LEN {
        return Err(GatewayError::InvalidRequest {
            reason: format!("grpc frame too short: {} bytes", body.len()),
        });
    }
    let flags = body[0];
    if flags & COMPRESSED_FLAG != 0 {
        return Err(GatewayError::Unsupported {
            reason: "compressed grpc messages".to_string(),
        });
    }
    if flags & TRAILER_FLAG != 0 {
        return Err(GatewayError::InvalidRequest {
            reason: "request contains a trailer frame".to_string(),
        });
    }

    let declared = u32::from_be_bytes([body[1], body[2], body[3], body[4]]) as usize;
    let actual = body.len() - FRAME_HEADER_LEN;
    if declared != actual {
        return Err(GatewayError::InvalidRequest {
            reason: format!(
                "grpc frame declares {declared} bytes but carries {actual}; only unary calls are supported"
            ),
        });
    }
    Ok(body.slice(FRAME_HEADER_LEN..))
}

/// A gRPC-Web trailer frame holding `trailers`.
pub fn encode_trailer_frame(trailers: &HeaderMap) -> Bytes {
    let mut text = Vec::new();
    for (name, value) in trailers {
        text.extend_from_slice(name.as_str().as_bytes());
        text.extend_from_slice(b": ");
        text.extend_from_slice(value.as_bytes());
        text.extend_from_slice(b"\r\n");
    }
    encode_frame(TRAILER_FLAG, &text)
}

/// Percent-encode a status message for the `grpc-message` header.
pub fn encode_grpc_message(message: &str) -> String {
    utf8_percent_encode(message, GRPC_MESSAGE).to_string()
}

/// Decode a `grpc-message` header value.
pub fn decode_grpc_message(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// `grpc-status`, `grpc-message` and the status metadata as headers.
pub fn status_headers(status: &Status) -> HeaderMap {
    let mut headers = status.metadata().clone().into_headers();
    headers.insert("grpc-status", HeaderValue::from(status.code() as i32));
    if !status.message().is_empty() {
        if let Ok(value) = HeaderValue::from_str(&encode_grpc_message(status.message())) {
            headers.insert("grpc-message", value);
        }
    }
    headers
}

/// Trailers of a successful call.
pub fn ok_trailers() -> HeaderMap {
    let mut trailers = HeaderMap::new();
    trailers.insert("grpc-status", HeaderValue::from_static("0"));
    trailers
}
