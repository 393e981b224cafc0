// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::errors::PbapError;

/// Tag ids of the PBAP application parameters (PBAP 1.1 § 6.2.1).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamTag {
    Order = 0x01,
    SearchValue = 0x02,
    SearchAttribute = 0x03,
    MaxListCount = 0x04,
    ListStartOffset = 0x05,
    Filter = 0x06,
    Format = 0x07,
    PhonebookSize = 0x08,
    NewMissedCalls = 0x09,
}

impl ParamTag {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x01 => Self::Order,
            0x02 => Self::SearchValue,
            0x03 => Self::SearchAttribute,
            0x04 => Self::MaxListCount,
            0x05 => Self::ListStartOffset,
            0x06 => Self::Filter,
            0x07 => Self::Format,
            0x08 => Self::PhonebookSize,
            0x09 => Self::NewMissedCalls,
            _ => return None,
        })
    }

    /// Fixed value width in bytes, `None` for the variable-length tag.
    fn width(self) -> Option<usize> {
        match self {
            Self::Order
            | Self::SearchAttribute
            | Self::Format
            | Self::NewMissedCalls => Some(1),
            Self::MaxListCount | Self::ListStartOffset | Self::PhonebookSize => Some(2),
            Self::Filter => Some(8),
            Self::SearchValue => None,
        }
    }
}

/// One decoded application parameter; the variant fixes the wire width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppParam {
    Order(u8),
    SearchValue(Vec<u8>),
    SearchAttribute(u8),
    MaxListCount(u16),
    ListStartOffset(u16),
    Filter(u64),
    Format(u8),
    PhonebookSize(u16),
    NewMissedCalls(u8),
}

impl AppParam {
    pub fn tag(&self) -> ParamTag {
        match self {
            Self::Order(_) => ParamTag::Order,
            Self::SearchValue(_) => ParamTag::SearchValue,
            Self::SearchAttribute(_) => ParamTag::SearchAttribute,
            Self::MaxListCount(_) => ParamTag::MaxListCount,
            Self::ListStartOffset(_) => ParamTag::ListStartOffset,
            Self::Filter(_) => ParamTag::Filter,
            Self::Format(_) => ParamTag::Format,
            Self::PhonebookSize(_) => ParamTag::PhonebookSize,
            Self::NewMissedCalls(_) => ParamTag::NewMissedCalls,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        match self {
            Self::Order(v)
            | Self::SearchAttribute(v)
            | Self::Format(v)
            | Self::NewMissedCalls(v) => vec![*v],
            Self::MaxListCount(v) | Self::ListStartOffset(v) | Self::PhonebookSize(v) => {
                v.to_be_bytes().to_vec()
            },
            Self::Filter(v) => v.to_be_bytes().to_vec(),
            Self::SearchValue(v) => v.clone(),
        }
    }

    fn from_wire(tag: ParamTag, value: &[u8]) -> Result<Self, PbapError> {
        if let Some(width) = tag.width()
            && value.len() != width
        {
            return Err(PbapError::MalformedParams(format!(
                "tag {tag:?} carries {} bytes, expected {width}",
                value.len()
            )));
        }
        Ok(match tag {
            ParamTag::Order => Self::Order(value[0]),
            ParamTag::SearchValue => Self::SearchValue(value.to_vec()),
            ParamTag::SearchAttribute => Self::SearchAttribute(value[0]),
            ParamTag::MaxListCount => {
                Self::MaxListCount(u16::from_be_bytes([value[0], value[1]]))
            },
            ParamTag::ListStartOffset => {
                Self::ListStartOffset(u16::from_be_bytes([value[0], value[1]]))
            },
            ParamTag::Filter => {
                let mut be = [0u8; 8];
                be.copy_from_slice(value);
                Self::Filter(u64::from_be_bytes(be))
            },
            ParamTag::Format => Self::Format(value[0]),
            ParamTag::PhonebookSize => {
                Self::PhonebookSize(u16::from_be_bytes([value[0], value[1]]))
            },
            ParamTag::NewMissedCalls => Self::NewMissedCalls(value[0]),
        })
    }
}

/// Decodes a complete TLV block.
///
/// Unknown tags fail the decode instead of being length-skipped: known-good
/// peers never emit them, and silently ignoring one is more likely to mask
/// an interop bug than to help. Duplicate tags within one block fail for
/// the same reason.
pub fn decode(mut data: &[u8]) -> Result<Vec<AppParam>, PbapError> {
    let mut params: Vec<AppParam> = Vec::new();
    while !data.is_empty() {
        if data.len() < 2 {
            return Err(PbapError::MalformedParams(
                "dangling tag without a length octet".into(),
            ));
        }
        let raw_tag = data[0];
        let length = data[1] as usize;
        let tag = ParamTag::from_u8(raw_tag).ok_or_else(|| {
            PbapError::MalformedParams(format!("unknown tag 0x{raw_tag:02x}"))
        })?;
        if data.len() < 2 + length {
            return Err(PbapError::MalformedParams(format!(
                "tag {tag:?} announces {length} value bytes, {} available",
                data.len() - 2
            )));
        }
        if params.iter().any(|p| p.tag() == tag) {
            return Err(PbapError::MalformedParams(format!("duplicate tag {tag:?}")));
        }
        params.push(AppParam::from_wire(tag, &data[2..2 + length])?);
        data = &data[2 + length..];
    }
    Ok(params)
}

/// Encodes parameters in ascending tag order for deterministic output.
pub fn encode(params: &[AppParam]) -> Vec<u8> {
    let mut sorted: Vec<&AppParam> = params.iter().collect();
    sorted.sort_by_key(|p| p.tag());

    let mut out = Vec::new();
    for param in sorted {
        let value = param.value_bytes();
        out.push(param.tag() as u8);
        out.push(value.len() as u8);
        out.extend_from_slice(&value);
    }
    out
}
