// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PBAP application-parameters sub-framing.
//!
//! The OBEX Application Parameters header carries an opaque byte block;
//! PBAP defines its contents as a sequence of `tag:u8 ‖ length:u8 ‖
//! value[length]` triplets with big-endian integer values. This module owns
//! that block: the OBEX layer never looks inside it.

pub mod codec;

use tracing::warn;

pub use crate::params::codec::{AppParam, decode, encode};
use crate::errors::PbapError;

/// `MaxListCount` value meaning "no restriction".
pub const UNRESTRICTED_LIST_COUNT: u16 = 65535;

/// Listing order requested by the PCE.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Order {
    #[default]
    Indexed = 0x00,
    Alphanumeric = 0x01,
    Phonetical = 0x02,
}

impl Order {
    /// Any out-of-range octet falls back to phonetical ordering, matching
    /// the sort-key selection of deployed servers.
    pub fn from_u8(v: u8) -> Self {
        match v {
            0x00 => Self::Indexed,
            0x01 => Self::Alphanumeric,
            _ => Self::Phonetical,
        }
    }
}

/// Attribute a listing search matches against.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SearchAttribute {
    #[default]
    Name,
    Number,
    Sound,
    /// Undefined attribute octet; disables the search with a warning.
    Other(u8),
}

impl SearchAttribute {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0x00 => Self::Name,
            0x01 => Self::Number,
            0x02 => Self::Sound,
            other => Self::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Name => 0x00,
            Self::Number => 0x01,
            Self::Sound => 0x02,
            Self::Other(v) => v,
        }
    }

    /// Record attribute name this search matches, `None` for undefined
    /// octets.
    pub fn query_attribute(self) -> Option<&'static str> {
        match self {
            Self::Name => Some("N"),
            Self::Number => Some("Number"),
            Self::Sound => Some("Sound"),
            Self::Other(_) => None,
        }
    }
}

/// Requested vCard rendering version.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    #[default]
    V2_1,
    V3_0,
}

impl Format {
    /// Wire semantics: zero selects 2.1, anything else 3.0.
    pub fn from_u8(v: u8) -> Self {
        if v == 0 { Self::V2_1 } else { Self::V3_0 }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::V2_1 => 0,
            Self::V3_0 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2_1 => "2.1",
            Self::V3_0 => "3.0",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = PbapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2.1" => Ok(Self::V2_1),
            "3.0" => Ok(Self::V3_0),
            other => Err(PbapError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// Request parameters of the three phonebook GET operations, with the
/// defaults the profile prescribes for absent tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonebookParams {
    pub order: Order,
    pub search_attribute: SearchAttribute,
    /// Empty value disables the search.
    pub search_value: Vec<u8>,
    pub max_list_count: u16,
    pub list_start_offset: u16,
    /// Raw 64-bit attribute mask; zero means "include everything".
    pub filter: u64,
    pub format: Format,
}

impl Default for PhonebookParams {
    fn default() -> Self {
        Self {
            order: Order::Indexed,
            search_attribute: SearchAttribute::Name,
            search_value: Vec::new(),
            max_list_count: UNRESTRICTED_LIST_COUNT,
            list_start_offset: 0,
            filter: 0,
            format: Format::V2_1,
        }
    }
}

impl PhonebookParams {
    /// Decodes a TLV block, filling absent tags with their defaults.
    /// `None` input (no Application Parameters header at all) yields the
    /// all-defaults record.
    pub fn from_tlv(data: Option<&[u8]>) -> Result<Self, PbapError> {
        let mut params = Self::default();
        let Some(data) = data else {
            return Ok(params);
        };
        for param in decode(data)? {
            match param {
                AppParam::Order(v) => params.order = Order::from_u8(v),
                AppParam::SearchValue(v) => params.search_value = v,
                AppParam::SearchAttribute(v) => {
                    params.search_attribute = SearchAttribute::from_u8(v);
                },
                AppParam::MaxListCount(v) => params.max_list_count = v,
                AppParam::ListStartOffset(v) => params.list_start_offset = v,
                AppParam::Filter(v) => params.filter = v,
                AppParam::Format(v) => params.format = Format::from_u8(v),
                AppParam::PhonebookSize(_) | AppParam::NewMissedCalls(_) => {
                    warn!("response-only parameter {param:?} in a request; ignored");
                },
            }
        }
        Ok(params)
    }
}

/// Parameters a PSE attaches to its responses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResponseParams {
    pub phonebook_size: Option<u16>,
    pub new_missed_calls: Option<u8>,
}

impl ResponseParams {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.phonebook_size.is_none() && self.new_missed_calls.is_none()
    }

    /// Encodes the present parameters as a TLV block (ascending tag order).
    pub fn to_tlv(&self) -> Vec<u8> {
        let mut params = Vec::with_capacity(2);
        if let Some(size) = self.phonebook_size {
            params.push(AppParam::PhonebookSize(size));
        }
        if let Some(missed) = self.new_missed_calls {
            params.push(AppParam::NewMissedCalls(missed));
        }
        encode(&params)
    }

    pub fn from_tlv(data: &[u8]) -> Result<Self, PbapError> {
        let mut out = Self::default();
        for param in decode(data)? {
            match param {
                AppParam::PhonebookSize(v) => out.phonebook_size = Some(v),
                AppParam::NewMissedCalls(v) => out.new_missed_calls = Some(v),
                other => {
                    warn!("request-only parameter {other:?} in a response; ignored");
                },
            }
        }
        Ok(out)
    }
}
