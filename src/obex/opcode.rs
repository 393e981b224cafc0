// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Helpers for encoding / decoding the first byte of every OBEX packet.
//!
//! For requests the byte layout is:
//!
//! ```text
//!  7   6 5 4 3 2 1 0      bit position
//! +---+-----------------+
//! | F |  OPCODE (7 bits)|  ← first request octet
//! +---+-----------------+
//! ```
//!
//! * **F** – *Final* flag. A request may span several packets; only the
//!   packet with F set completes the operation.
//! * **OPCODE** – 7-bit operation code identifying the request type.
//!
//! Responses reuse the same octet position for a one-byte response code
//! whose high bit is likewise the Final flag, so `0x90` (`Continue`) is the
//! only non-final code a server emits.

use core::fmt;

use thiserror::Error;

/// Mask that selects the lower 7 bits (**OPCODE**) from the first octet.
const OPCODE_MASK: u8 = 0b0111_1111;
/// Mask that selects the **Final** bit from the first octet.
pub const FINAL_MASK: u8 = 0b1000_0000;

/// Request op-codes used by OBEX (IrOBEX 1.3 § 3.3).
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    #[default]
    Connect = 0x00,
    Disconnect = 0x01,
    Put = 0x02,
    Get = 0x03,
    SetPath = 0x05,
    Abort = 0x7F,
}

impl Opcode {
    #[inline]
    pub fn from_u7(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::Connect,
            0x01 => Self::Disconnect,
            0x02 => Self::Put,
            0x03 => Self::Get,
            0x05 => Self::SetPath,
            0x7F => Self::Abort,
            _ => return None,
        })
    }
}

/// Returned when the lower seven bits contain an undefined op-code.
#[derive(Debug, Error)]
#[error("invalid obex opcode: 0x{0:02x}")]
pub struct UnknownOpcode(pub u8);

/// Typed representation of the first octet of a request packet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestOpcode {
    pub final_bit: bool,
    pub opcode: Opcode,
}

impl TryFrom<u8> for RequestOpcode {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let final_bit = (byte & FINAL_MASK) != 0;
        let code = byte & OPCODE_MASK;
        let opcode = Opcode::from_u7(code).ok_or(UnknownOpcode(code))?;
        Ok(Self { final_bit, opcode })
    }
}

impl From<&RequestOpcode> for u8 {
    fn from(r: &RequestOpcode) -> u8 {
        let mut raw = r.opcode as u8;
        if r.final_bit {
            raw |= FINAL_MASK;
        }
        raw
    }
}

/// Response codes used at the PBAP layer.
///
/// The lower block mirrors HTTP status semantics as prescribed by OBEX;
/// `NotAcceptable`, `NotImplemented` and `ServiceUnavailable` are the
/// PBAP-specific additions to the standard dispatcher.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Continue = 0x90,
    Success = 0xA0,
    BadRequest = 0xC0,
    Unauthorized = 0xC1,
    Forbidden = 0xC3,
    NotFound = 0xC4,
    NotAcceptable = 0xC6,
    PreconditionFailed = 0xCC,
    InternalServerError = 0xD0,
    NotImplemented = 0xD1,
    ServiceUnavailable = 0xD3,
}

impl ResponseCode {
    /// A `Success` or `Continue` answer; everything else is a failure.
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::Continue)
    }

    /// True when more packets of the same response follow.
    #[inline]
    pub fn is_final(self) -> bool {
        (self as u8) & FINAL_MASK != 0 && !matches!(self, Self::Continue)
    }
}

/// Returned when a response octet is not a known code.
#[derive(Debug, Error)]
#[error("invalid obex response code: 0x{0:02x}")]
pub struct UnknownResponseCode(pub u8);

impl TryFrom<u8> for ResponseCode {
    type Error = UnknownResponseCode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x90 => Self::Continue,
            0xA0 => Self::Success,
            0xC0 => Self::BadRequest,
            0xC1 => Self::Unauthorized,
            0xC3 => Self::Forbidden,
            0xC4 => Self::NotFound,
            0xC6 => Self::NotAcceptable,
            0xCC => Self::PreconditionFailed,
            0xD0 => Self::InternalServerError,
            0xD1 => Self::NotImplemented,
            0xD3 => Self::ServiceUnavailable,
            other => return Err(UnknownResponseCode(other)),
        })
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} (0x{:02X})", *self as u8)
    }
}
