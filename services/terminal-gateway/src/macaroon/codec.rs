//! Binary macaroon encodings.
//!
//! Decoding accepts the V2 binary format and the legacy V1 packet format.
//! Encoding always produces V2.

use thiserror::Error;

use super::{Caveat, Macaroon, SIGNATURE_LEN};

/// Errors produced while decoding or verifying a macaroon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacaroonError {
    /// No bytes at all
    #[error("empty macaroon data")]
    Empty,

    /// V1 data shorter than a packet header
    #[error("packet too short")]
    PacketTooShort,

    /// Leading byte matches no known encoding
    #[error("cannot determine data format of binary-encoded macaroon")]
    UnknownFormat,

    /// Structurally invalid data
    #[error("{0}")]
    Corrupt(String),

    /// Metadata value is not hex
    #[error("invalid hex encoding: {0}")]
    Hex(String),

    /// Signature chain does not match
    #[error("signature mismatch after caveat verification")]
    SignatureMismatch,
}

const VERSION_2: u8 = 2;

const FIELD_EOS: u8 = 0;
const FIELD_LOCATION: u8 = 1;
const FIELD_IDENTIFIER: u8 = 2;
const FIELD_VERIFICATION_ID: u8 = 4;
const FIELD_SIGNATURE: u8 = 6;

const V1_PACKET_PREFIX_LEN: usize = 4;
const V1_MIN_PACKET_LEN: usize = V1_PACKET_PREFIX_LEN + 2;

impl Macaroon {
    /// Decode a binary macaroon, detecting the format from the first byte.
    pub fn from_binary(data: &[u8]) -> Result<Self, MacaroonError> {
        match data.first() {
            None => Err(MacaroonError::Empty),
            Some(&VERSION_2) => decode_v2(&data[1..]),
            Some(b) if b.is_ascii_hexdigit() => decode_v1(data),
            Some(_) => Err(MacaroonError::UnknownFormat),
        }
    }

    /// V2 binary encoding.
    pub fn to_binary(&self) -> Vec<u8> {
        let mut out = vec![VERSION_2];
        if let Some(location) = &self.location {
            put_field(&mut out, FIELD_LOCATION, location.as_bytes());
        }
        put_field(&mut out, FIELD_IDENTIFIER, &self.identifier);
        out.push(FIELD_EOS);

        for caveat in &self.caveats {
            if let Some(location) = &caveat.location {
                put_field(&mut out, FIELD_LOCATION, location.as_bytes());
            }
            put_field(&mut out, FIELD_IDENTIFIER, &caveat.id);
            if let Some(vid) = &caveat.verification_id {
                put_field(&mut out, FIELD_VERIFICATION_ID, vid);
            }
            out.push(FIELD_EOS);
        }
        out.push(FIELD_EOS);

        put_field(&mut out, FIELD_SIGNATURE, &self.signature);
        out
    }
}

fn put_field(out: &mut Vec<u8>, kind: u8, payload: &[u8]) {
    out.push(kind);
    put_uvarint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

fn put_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

// ============================================================================
// V2
// ============================================================================

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Result<u8, MacaroonError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| MacaroonError::Corrupt("unexpected end of data".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn uvarint(&mut self) -> Result<u64, MacaroonError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let b = self.byte()?;
            value |= u64::from(b & 0x7f) << shift;
            if b < 0x80 {
                return Ok(value);
            }
        }
        Err(MacaroonError::Corrupt("varint overflow".to_string()))
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8], MacaroonError> {
        let remaining = (self.data.len() - self.pos) as u64;
        if len > remaining {
            return Err(MacaroonError::Corrupt(
                "field extends past end of buffer".to_string(),
            ));
        }
        let start = self.pos;
        self.pos += len as usize;
        Ok(&self.data[start..self.pos])
    }

    /// Reads fields up to the next end-of-section marker.
    fn section(&mut self) -> Result<Vec<(u8, &'a [u8])>, MacaroonError> {
        let mut fields = Vec::new();
        loop {
            let kind = self.byte()?;
            if kind == FIELD_EOS {
                return Ok(fields);
            }
            if let Some((last, _)) = fields.last() {
                if kind <= *last {
                    return Err(MacaroonError::Corrupt(format!(
                        "field type {kind} out of order"
                    )));
                }
            }
            let len = self.uvarint()?;
            fields.push((kind, self.take(len)?));
        }
    }
}

struct SectionFields<'a> {
    location: Option<&'a [u8]>,
    identifier: &'a [u8],
    verification_id: Option<&'a [u8]>,
}

fn split_section<'a>(
    fields: &[(u8, &'a [u8])],
    allow_vid: bool,
) -> Result<SectionFields<'a>, MacaroonError> {
    let mut location = None;
    let mut identifier = None;
    let mut verification_id = None;
    for &(kind, payload) in fields {
        match kind {
            FIELD_LOCATION => location = Some(payload),
            FIELD_IDENTIFIER => identifier = Some(payload),
            FIELD_VERIFICATION_ID if allow_vid => verification_id = Some(payload),
            other => {
                return Err(MacaroonError::Corrupt(format!(
                    "unexpected field type {other}"
                )))
            }
        }
    }
    Ok(SectionFields {
        location,
        identifier: identifier
            .ok_or_else(|| MacaroonError::Corrupt("missing identifier".to_string()))?,
        verification_id,
    })
}

fn utf8(bytes: &[u8], what: &str) -> Result<String, MacaroonError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| MacaroonError::Corrupt(format!("{what} is not valid UTF-8")))
}

fn signature_bytes(bytes: &[u8]) -> Result<[u8; SIGNATURE_LEN], MacaroonError> {
    bytes.try_into().map_err(|_| {
        MacaroonError::Corrupt(format!(
            "signature has unexpected length {}",
            bytes.len()
        ))
    })
}

fn decode_v2(data: &[u8]) -> Result<Macaroon, MacaroonError> {
    let mut reader = Reader::new(data);

    let header = split_section(&reader.section()?, false)?;
    let location = header.location.map(|l| utf8(l, "location")).transpose()?;

    let mut caveats = Vec::new();
    loop {
        let fields = reader.section()?;
        if fields.is_empty() {
            break;
        }
        let section = split_section(&fields, true)?;
        caveats.push(Caveat {
            id: section.identifier.to_vec(),
            verification_id: section.verification_id.map(<[u8]>::to_vec),
            location: section
                .location
                .map(|l| utf8(l, "caveat location"))
                .transpose()?,
        });
    }

    if reader.byte()? != FIELD_SIGNATURE {
        return Err(MacaroonError::Corrupt("missing signature".to_string()));
    }
    let len = reader.uvarint()?;
    let signature = signature_bytes(reader.take(len)?)?;

    if !reader.is_empty() {
        return Err(MacaroonError::Corrupt(
            "trailing data after signature".to_string(),
        ));
    }

    Ok(Macaroon::from_parts(
        location,
        header.identifier.to_vec(),
        caveats,
        signature,
    ))
}

// ============================================================================
// V1
// ============================================================================

fn parse_packet_v1(data: &[u8]) -> Result<(&[u8], &[u8], &[u8]), MacaroonError> {
    if data.len() < V1_MIN_PACKET_LEN {
        return Err(MacaroonError::PacketTooShort);
    }
    let size = std::str::from_utf8(&data[..V1_PACKET_PREFIX_LEN])
        .ok()
        .and_then(|s| usize::from_str_radix(s, 16).ok())
        .ok_or_else(|| MacaroonError::Corrupt("cannot parse packet size".to_string()))?;
    if size < V1_MIN_PACKET_LEN {
        return Err(MacaroonError::PacketTooShort);
    }
    if size > data.len() {
        return Err(MacaroonError::Corrupt("packet size too big".to_string()));
    }

    let body = &data[V1_PACKET_PREFIX_LEN..size];
    let body = body
        .strip_suffix(b"\n")
        .ok_or_else(|| MacaroonError::Corrupt("packet has no trailing newline".to_string()))?;
    let split = body
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| MacaroonError::Corrupt("cannot parse packet field name".to_string()))?;

    Ok((&body[..split], &body[split + 1..], &data[size..]))
}

fn decode_v1(data: &[u8]) -> Result<Macaroon, MacaroonError> {
    let mut rest = data;
    let mut location = None;
    let mut identifier = None;
    let mut caveats: Vec<Caveat> = Vec::new();

    while !rest.is_empty() {
        let (key, value, remaining) = parse_packet_v1(rest)?;
        rest = remaining;

        match key {
            b"location" => location = Some(utf8(value, "location")?),
            b"identifier" => identifier = Some(value.to_vec()),
            b"cid" => caveats.push(Caveat::first_party(value)),
            b"vid" | b"cl" => {
                let caveat = caveats.last_mut().ok_or_else(|| {
                    MacaroonError::Corrupt("caveat field before cid".to_string())
                })?;
                if key == b"vid" {
                    caveat.verification_id = Some(value.to_vec());
                } else {
                    caveat.location = Some(utf8(value, "caveat location")?);
                }
            }
            b"signature" => {
                if !rest.is_empty() {
                    return Err(MacaroonError::Corrupt(
                        "trailing data after signature".to_string(),
                    ));
                }
                let identifier = identifier
                    .ok_or_else(|| MacaroonError::Corrupt("missing identifier".to_string()))?;
                return Ok(Macaroon::from_parts(
                    location,
                    identifier,
                    caveats,
                    signature_bytes(value)?,
                ));
            }
            other => {
                return Err(MacaroonError::Corrupt(format!(
                    "unexpected field {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        }
    }

    Err(MacaroonError::Corrupt("missing signature".to_string()))
}
