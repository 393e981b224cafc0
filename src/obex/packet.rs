// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! OBEX packet framing.
//!
//! Every packet is `first:u8 ‖ length:u16 BE ‖ [prelude] ‖ headers`, where
//! `length` counts the whole packet including the three prefix bytes.
//! CONNECT packets (both directions) carry a `version ‖ flags ‖
//! max_packet_length` prelude; SETPATH requests carry `flags ‖ constants`.

use anyhow::{Result, bail};
use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};
use enum_dispatch::enum_dispatch;

use crate::obex::{
    OBEX_VERSION, PACKET_PREFIX_LEN,
    header::{Header, decode_all},
    opcode::{FINAL_MASK, Opcode, RequestOpcode, ResponseCode},
};

bitflags! {
    /// SETPATH flag bits (IrOBEX 1.3 § 3.3.6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SetPathFlags: u8 {
        /// Navigate to the parent folder before applying the Name header.
        const NAVIGATE_TO_PARENT = 0x01;
        /// Fail instead of creating the folder when it does not exist.
        const DONT_CREATE_DIR = 0x02;
    }
}

/// Common behavior of every request packet.
#[enum_dispatch]
pub trait ObexPacket {
    /// Operation code of this packet (without the Final bit).
    fn opcode(&self) -> Opcode;

    /// State of the Final bit on the wire.
    fn is_final(&self) -> bool;

    /// Headers carried by this packet.
    fn headers(&self) -> &[Header];

    /// Encodes the complete packet, prefix included.
    fn encode(&self) -> Bytes;
}

fn encode_packet(first: u8, prelude: &[u8], headers: &[Header]) -> Bytes {
    let total = PACKET_PREFIX_LEN
        + prelude.len()
        + headers.iter().map(Header::encoded_len).sum::<usize>();
    let mut buf = BytesMut::with_capacity(total);
    buf.put_u8(first);
    buf.put_u16(total as u16);
    buf.put_slice(prelude);
    for header in headers {
        header.encode_into(&mut buf);
    }
    buf.freeze()
}

/// CONNECT request: always final, carries the OBEX version and the largest
/// packet the sender is willing to receive.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub max_packet_length: u16,
    pub headers: Vec<Header>,
}

impl ObexPacket for ConnectRequest {
    fn opcode(&self) -> Opcode {
        Opcode::Connect
    }

    fn is_final(&self) -> bool {
        true
    }

    fn headers(&self) -> &[Header] {
        &self.headers
    }

    fn encode(&self) -> Bytes {
        let mut prelude = [OBEX_VERSION, 0, 0, 0];
        prelude[2..].copy_from_slice(&self.max_packet_length.to_be_bytes());
        encode_packet(Opcode::Connect as u8 | FINAL_MASK, &prelude, &self.headers)
    }
}

/// DISCONNECT request: always final.
#[derive(Debug, Clone)]
pub struct DisconnectRequest {
    pub headers: Vec<Header>,
}

impl ObexPacket for DisconnectRequest {
    fn opcode(&self) -> Opcode {
        Opcode::Disconnect
    }

    fn is_final(&self) -> bool {
        true
    }

    fn headers(&self) -> &[Header] {
        &self.headers
    }

    fn encode(&self) -> Bytes {
        encode_packet(Opcode::Disconnect as u8 | FINAL_MASK, &[], &self.headers)
    }
}

/// GET request. The engine honors only final GETs; non-final ones show up
/// as continuation reads during response streaming.
#[derive(Debug, Clone)]
pub struct GetRequest {
    pub final_bit: bool,
    pub headers: Vec<Header>,
}

impl ObexPacket for GetRequest {
    fn opcode(&self) -> Opcode {
        Opcode::Get
    }

    fn is_final(&self) -> bool {
        self.final_bit
    }

    fn headers(&self) -> &[Header] {
        &self.headers
    }

    fn encode(&self) -> Bytes {
        let first = Opcode::Get as u8 | if self.final_bit { FINAL_MASK } else { 0 };
        encode_packet(first, &[], &self.headers)
    }
}

/// PUT request. PBAP is read-only from the client side, so the engine
/// rejects these, but the codec still frames them.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub final_bit: bool,
    pub headers: Vec<Header>,
}

impl ObexPacket for PutRequest {
    fn opcode(&self) -> Opcode {
        Opcode::Put
    }

    fn is_final(&self) -> bool {
        self.final_bit
    }

    fn headers(&self) -> &[Header] {
        &self.headers
    }

    fn encode(&self) -> Bytes {
        let first = Opcode::Put as u8 | if self.final_bit { FINAL_MASK } else { 0 };
        encode_packet(first, &[], &self.headers)
    }
}

/// SETPATH request with its two flag bits. The `constants` octet of the
/// wire prelude is reserved and always zero.
#[derive(Debug, Clone)]
pub struct SetPathRequest {
    pub flags: SetPathFlags,
    pub headers: Vec<Header>,
}

impl ObexPacket for SetPathRequest {
    fn opcode(&self) -> Opcode {
        Opcode::SetPath
    }

    fn is_final(&self) -> bool {
        true
    }

    fn headers(&self) -> &[Header] {
        &self.headers
    }

    fn encode(&self) -> Bytes {
        let prelude = [self.flags.bits(), 0];
        encode_packet(Opcode::SetPath as u8 | FINAL_MASK, &prelude, &self.headers)
    }
}

/// ABORT request: always final, no prelude.
#[derive(Debug, Clone)]
pub struct AbortRequest {
    pub headers: Vec<Header>,
}

impl ObexPacket for AbortRequest {
    fn opcode(&self) -> Opcode {
        Opcode::Abort
    }

    fn is_final(&self) -> bool {
        true
    }

    fn headers(&self) -> &[Header] {
        &self.headers
    }

    fn encode(&self) -> Bytes {
        encode_packet(Opcode::Abort as u8 | FINAL_MASK, &[], &self.headers)
    }
}

/// One decoded OBEX request.
#[enum_dispatch(ObexPacket)]
#[derive(Debug, Clone)]
pub enum Request {
    Connect(ConnectRequest),
    Disconnect(DisconnectRequest),
    Get(GetRequest),
    Put(PutRequest),
    SetPath(SetPathRequest),
    Abort(AbortRequest),
}

impl Request {
    /// Decodes a complete packet (as delivered by the transport framing).
    pub fn decode(packet: &[u8]) -> Result<Self> {
        if packet.len() < PACKET_PREFIX_LEN {
            bail!("obex request shorter than the packet prefix");
        }
        let first = RequestOpcode::try_from(packet[0])?;
        let body = &packet[PACKET_PREFIX_LEN..];
        Ok(match first.opcode {
            Opcode::Connect => {
                if body.len() < 4 {
                    bail!("connect request missing its version prelude");
                }
                let max_packet_length = u16::from_be_bytes([body[2], body[3]]);
                Request::Connect(ConnectRequest {
                    max_packet_length,
                    headers: decode_all(&body[4..])?,
                })
            },
            Opcode::Disconnect => Request::Disconnect(DisconnectRequest {
                headers: decode_all(body)?,
            }),
            Opcode::Get => Request::Get(GetRequest {
                final_bit: first.final_bit,
                headers: decode_all(body)?,
            }),
            Opcode::Put => Request::Put(PutRequest {
                final_bit: first.final_bit,
                headers: decode_all(body)?,
            }),
            Opcode::SetPath => {
                if body.len() < 2 {
                    bail!("setpath request missing its flags prelude");
                }
                Request::SetPath(SetPathRequest {
                    flags: SetPathFlags::from_bits_retain(body[0]),
                    headers: decode_all(&body[2..])?,
                })
            },
            Opcode::Abort => Request::Abort(AbortRequest {
                headers: decode_all(body)?,
            }),
        })
    }
}

/// One OBEX response. `max_packet_length` is present iff this answers a
/// CONNECT, which changes the wire prelude.
#[derive(Debug, Clone)]
pub struct Response {
    pub code: ResponseCode,
    pub max_packet_length: Option<u16>,
    pub headers: Vec<Header>,
}

impl Response {
    pub fn new(code: ResponseCode, headers: Vec<Header>) -> Self {
        Self {
            code,
            max_packet_length: None,
            headers,
        }
    }

    /// A bare failure or success response without headers.
    pub fn empty(code: ResponseCode) -> Self {
        Self::new(code, Vec::new())
    }

    /// A CONNECT reply carrying the version prelude.
    pub fn connect(code: ResponseCode, max_packet_length: u16, headers: Vec<Header>) -> Self {
        Self {
            code,
            max_packet_length: Some(max_packet_length),
            headers,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self.max_packet_length {
            Some(mtu) => {
                let mut prelude = [OBEX_VERSION, 0, 0, 0];
                prelude[2..].copy_from_slice(&mtu.to_be_bytes());
                encode_packet(self.code as u8, &prelude, &self.headers)
            },
            None => encode_packet(self.code as u8, &[], &self.headers),
        }
    }

    /// Decodes a complete response packet. `to_connect` selects the
    /// CONNECT prelude layout, which only the requesting side knows.
    pub fn decode(packet: &[u8], to_connect: bool) -> Result<Self> {
        if packet.len() < PACKET_PREFIX_LEN {
            bail!("obex response shorter than the packet prefix");
        }
        let code = ResponseCode::try_from(packet[0])?;
        let body = &packet[PACKET_PREFIX_LEN..];
        if to_connect && code.is_success() {
            if body.len() < 4 {
                bail!("connect response missing its version prelude");
            }
            let mtu = u16::from_be_bytes([body[2], body[3]]);
            Ok(Self {
                code,
                max_packet_length: Some(mtu),
                headers: decode_all(&body[4..])?,
            })
        } else {
            Ok(Self {
                code,
                max_packet_length: None,
                headers: decode_all(body)?,
            })
        }
    }
}
