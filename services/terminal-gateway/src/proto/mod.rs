//! Protobuf messages of the backend surfaces the gateway understands
//!
//! Most traffic is forwarded as opaque bytes. Messages are only decoded where
//! the gateway itself acts on them: signing-authority calls, the session
//! service and REST transcoding. Types are generated from `proto/` at build
//! time. JSON uses the proto field names, emits unpopulated fields, renders
//! 64-bit integers as strings and bytes as base64.

#![allow(missing_docs)]

pub mod frdrpc;
pub mod litrpc;
pub mod lnrpc;
pub mod looprpc;
pub mod poolrpc;

/// Protobuf body of version 3 macaroon identifiers.
pub(crate) mod macaroonpb {
    tonic::include_proto!("macaroonpb");
}

use prost::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::GatewayError;

/// Converts between REST JSON and protobuf for one method.
#[derive(Clone, Copy)]
pub struct Transcoder {
    request: fn(&[u8]) -> Result<Vec<u8>, GatewayError>,
    response: fn(&[u8]) -> Result<Vec<u8>, GatewayError>,
}

impl Transcoder {
    /// Transcoder for a method taking `Req` and returning `Resp`.
    pub fn of<Req, Resp>() -> Self
    where
        Req: Message + Default + DeserializeOwned,
        Resp: Message + Default + Serialize,
    {
        Self {
            request: json_to_proto::<Req>,
            response: proto_to_json::<Resp>,
        }
    }

    /// JSON request body to protobuf. An empty body is the default message.
    pub fn request_to_proto(&self, body: &[u8]) -> Result<Vec<u8>, GatewayError> {
        (self.request)(body)
    }

    /// Protobuf response to JSON bytes.
    pub fn response_to_json(&self, message: &[u8]) -> Result<Vec<u8>, GatewayError> {
        (self.response)(message)
    }
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transcoder")
    }
}

fn json_to_proto<M>(body: &[u8]) -> Result<Vec<u8>, GatewayError>
where
    M: Message + Default + DeserializeOwned,
{
    let message = if body.iter().all(u8::is_ascii_whitespace) {
        M::default()
    } else {
        serde_json::from_slice::<M>(body).map_err(|e| GatewayError::InvalidRequest {
            reason: format!("invalid JSON request body: {e}"),
        })?
    };
    Ok(message.encode_to_vec())
}

fn proto_to_json<M>(message: &[u8]) -> Result<Vec<u8>, GatewayError>
where
    M: Message + Default + Serialize,
{
    let decoded = M::decode(message).map_err(|e| {
        GatewayError::Internal(anyhow::anyhow!("backend returned undecodable message: {e}"))
    })?;
    serde_json::to_vec(&decoded)
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("unable to render JSON: {e}")))
}

/// Bytes fields as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// 64-bit integers as decimal strings; numbers are accepted on input.
pub(crate) mod int64_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr + Deserialize<'de>,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Text(String),
            Number(T),
        }

        match Repr::<T>::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Repr::Number(value) => Ok(value),
        }
    }
}
