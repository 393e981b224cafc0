// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! OBEX header codec.
//!
//! Every header is `id:u8` followed by an id-dependent value encoding; the
//! top two bits of the id select the wire class (IrOBEX 1.3 § 2.1):
//!
//! ```text
//! 0x00  null-terminated UTF-16BE text, u16 BE length prefix
//! 0x40  raw byte sequence, u16 BE length prefix
//! 0x80  single byte
//! 0xC0  four bytes, big-endian
//! ```
//!
//! Both length prefixes count the three header-prefix bytes themselves.
//! The PBAP engine treats the Application Parameters payload as opaque
//! bytes here; the TLV sub-framing lives in [`crate::params`].

use anyhow::{Result, bail};
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

const ID_NAME: u8 = 0x01;
const ID_TYPE: u8 = 0x42;
const ID_TARGET: u8 = 0x46;
const ID_BODY: u8 = 0x48;
const ID_END_OF_BODY: u8 = 0x49;
const ID_WHO: u8 = 0x4A;
const ID_APP_PARAMETERS: u8 = 0x4C;
const ID_LENGTH: u8 = 0xC3;
const ID_CONNECTION_ID: u8 = 0xCB;

const CLASS_MASK: u8 = 0xC0;
const CLASS_UNICODE: u8 = 0x00;
const CLASS_BYTES: u8 = 0x40;
const CLASS_U8: u8 = 0x80;
const CLASS_U32: u8 = 0xC0;

/// Raised for header ids this layer does not understand. The engine logs
/// the id and rejects the request; the session survives.
#[derive(Debug, Error)]
#[error("unknown obex header id: 0x{0:02x}")]
pub struct UnknownHeader(pub u8);

/// One decoded OBEX header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// Folder or object name (unicode class).
    Name(String),
    /// Object type, e.g. `x-bt/phonebook` (byte-sequence class).
    Type(String),
    /// Service UUID of a directed connection.
    Target(Bytes),
    /// Echo of the Target UUID in a CONNECT response.
    Who(Bytes),
    /// Opaque PBAP application-parameters TLV block.
    AppParameters(Bytes),
    /// One chunk of a streamed object.
    Body(Bytes),
    /// Final chunk of an object.
    EndOfBody(Bytes),
    /// Total object length hint.
    Length(u32),
    /// Connection id assigned by the server on CONNECT.
    ConnectionId(u32),
}

impl Header {
    #[inline]
    pub fn id(&self) -> u8 {
        match self {
            Self::Name(_) => ID_NAME,
            Self::Type(_) => ID_TYPE,
            Self::Target(_) => ID_TARGET,
            Self::Who(_) => ID_WHO,
            Self::AppParameters(_) => ID_APP_PARAMETERS,
            Self::Body(_) => ID_BODY,
            Self::EndOfBody(_) => ID_END_OF_BODY,
            Self::Length(_) => ID_LENGTH,
            Self::ConnectionId(_) => ID_CONNECTION_ID,
        }
    }

    /// Appends the wire form of this header to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Self::Name(s) => {
                // An empty name is encoded with an empty payload, without
                // the UTF-16 null terminator.
                let mut payload = Vec::with_capacity(s.len() * 2 + 2);
                if !s.is_empty() {
                    for unit in s.encode_utf16() {
                        payload.extend_from_slice(&unit.to_be_bytes());
                    }
                    payload.extend_from_slice(&[0, 0]);
                }
                put_sized(buf, ID_NAME, &payload);
            },
            Self::Type(s) => {
                // Type values are null-terminated ASCII on the wire.
                let mut payload = Vec::with_capacity(s.len() + 1);
                payload.extend_from_slice(s.as_bytes());
                payload.push(0);
                put_sized(buf, ID_TYPE, &payload);
            },
            Self::Target(b) => put_sized(buf, ID_TARGET, b),
            Self::Who(b) => put_sized(buf, ID_WHO, b),
            Self::AppParameters(b) => put_sized(buf, ID_APP_PARAMETERS, b),
            Self::Body(b) => put_sized(buf, ID_BODY, b),
            Self::EndOfBody(b) => put_sized(buf, ID_END_OF_BODY, b),
            Self::Length(v) => {
                buf.put_u8(ID_LENGTH);
                buf.put_u32(*v);
            },
            Self::ConnectionId(v) => {
                buf.put_u8(ID_CONNECTION_ID);
                buf.put_u32(*v);
            },
        }
    }

    /// Number of bytes `encode_into` will append.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Name(s) if s.is_empty() => 3,
            Self::Name(s) => 3 + s.encode_utf16().count() * 2 + 2,
            Self::Type(s) => 3 + s.len() + 1,
            Self::Target(b) | Self::Who(b) | Self::AppParameters(b) => 3 + b.len(),
            Self::Body(b) | Self::EndOfBody(b) => 3 + b.len(),
            Self::Length(_) | Self::ConnectionId(_) => 5,
        }
    }
}

fn put_sized(buf: &mut BytesMut, id: u8, payload: &[u8]) {
    buf.put_u8(id);
    buf.put_u16((payload.len() + 3) as u16);
    buf.put_slice(payload);
}

/// Decodes the complete header list of one packet.
pub fn decode_all(mut data: &[u8]) -> Result<Vec<Header>> {
    let mut headers = Vec::new();
    while !data.is_empty() {
        let id = data[0];
        let (header, rest) = decode_one(id, &data[1..])?;
        headers.push(header);
        data = rest;
    }
    Ok(headers)
}

fn decode_one(id: u8, data: &[u8]) -> Result<(Header, &[u8])> {
    match id & CLASS_MASK {
        CLASS_UNICODE | CLASS_BYTES => {
            if data.len() < 2 {
                bail!("truncated obex header 0x{id:02x}: missing length");
            }
            let total = u16::from_be_bytes([data[0], data[1]]) as usize;
            if total < 3 || total - 3 > data.len() - 2 {
                bail!("truncated obex header 0x{id:02x}: length {total}");
            }
            let payload = &data[2..total - 1];
            let rest = &data[total - 1..];
            let header = match id {
                ID_NAME => Header::Name(decode_unicode(payload)?),
                ID_TYPE => {
                    let text = String::from_utf8_lossy(payload);
                    Header::Type(
                        text.trim_end_matches(['\r', '\n', '\t', '\0']).to_string(),
                    )
                },
                ID_TARGET => Header::Target(Bytes::copy_from_slice(payload)),
                ID_WHO => Header::Who(Bytes::copy_from_slice(payload)),
                ID_APP_PARAMETERS => {
                    Header::AppParameters(Bytes::copy_from_slice(payload))
                },
                ID_BODY => Header::Body(Bytes::copy_from_slice(payload)),
                ID_END_OF_BODY => Header::EndOfBody(Bytes::copy_from_slice(payload)),
                other => return Err(UnknownHeader(other).into()),
            };
            Ok((header, rest))
        },
        // No single-byte headers are defined at this layer.
        CLASS_U8 => Err(UnknownHeader(id).into()),
        CLASS_U32 => {
            if data.len() < 4 {
                bail!("truncated obex header 0x{id:02x}: missing value");
            }
            let v = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
            let rest = &data[4..];
            let header = match id {
                ID_LENGTH => Header::Length(v),
                ID_CONNECTION_ID => Header::ConnectionId(v),
                other => return Err(UnknownHeader(other).into()),
            };
            Ok((header, rest))
        },
        _ => unreachable!("CLASS_MASK covers all four classes"),
    }
}

fn decode_unicode(payload: &[u8]) -> Result<String> {
    if payload.len() % 2 != 0 {
        bail!("unicode header payload has odd length {}", payload.len());
    }
    let mut units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    Ok(String::from_utf16_lossy(&units))
}

/// The headers the transaction engine cares about, pulled out of the
/// decoded list. Repeated `Body` chunks within one packet are concatenated.
#[derive(Debug, Default, Clone)]
pub struct HeaderSet {
    pub name: Option<String>,
    pub object_type: Option<String>,
    pub target: Option<Bytes>,
    pub who: Option<Bytes>,
    pub app_parameters: Option<Bytes>,
    pub body: BytesMut,
    pub end_of_body: Option<Bytes>,
    pub length: Option<u32>,
    pub connection_id: Option<u32>,
}

impl HeaderSet {
    pub fn collect(headers: &[Header]) -> Self {
        let mut set = Self::default();
        for header in headers {
            match header {
                Header::Name(s) => set.name = Some(s.clone()),
                Header::Type(s) => set.object_type = Some(s.clone()),
                Header::Target(b) => set.target = Some(b.clone()),
                Header::Who(b) => set.who = Some(b.clone()),
                Header::AppParameters(b) => set.app_parameters = Some(b.clone()),
                Header::Body(b) => set.body.extend_from_slice(b),
                Header::EndOfBody(b) => set.end_of_body = Some(b.clone()),
                Header::Length(v) => set.length = Some(*v),
                Header::ConnectionId(v) => set.connection_id = Some(*v),
            }
        }
        set
    }
}
