// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! 64-bit attribute-mask filtering.

use bitflags::bitflags;

use crate::params::Format;
use crate::vcard::VCard;

bitflags! {
    /// Attribute filter bit positions (PBAP 1.1 § 5.1.4.1). Bits 29–38 are
    /// reserved; 39–63 are proprietary and ignored by this implementation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterMask: u64 {
        const VERSION = 1 << 0;
        const FN = 1 << 1;
        const N = 1 << 2;
        const PHOTO = 1 << 3;
        const BDAY = 1 << 4;
        const ADR = 1 << 5;
        const LABEL = 1 << 6;
        const TEL = 1 << 7;
        const EMAIL = 1 << 8;
        const MAILER = 1 << 9;
        const TZ = 1 << 10;
        const GEO = 1 << 11;
        const TITLE = 1 << 12;
        const ROLE = 1 << 13;
        const LOGO = 1 << 14;
        const AGENT = 1 << 15;
        const ORG = 1 << 16;
        const NOTE = 1 << 17;
        const REV = 1 << 18;
        const SOUND = 1 << 19;
        const URL = 1 << 20;
        const UID = 1 << 21;
        const KEY = 1 << 22;
        const NICKNAME = 1 << 23;
        const CATEGORIES = 1 << 24;
        const PRODID = 1 << 25;
        const CLASS = 1 << 26;
        const SORT_STRING = 1 << 27;
        const X_IRMC_CALL_DATETIME = 1 << 28;
    }
}

/// Bit position → property type name.
pub const FILTER_ATTRS: [(FilterMask, &str); 29] = [
    (FilterMask::VERSION, "VERSION"),
    (FilterMask::FN, "FN"),
    (FilterMask::N, "N"),
    (FilterMask::PHOTO, "PHOTO"),
    (FilterMask::BDAY, "BDAY"),
    (FilterMask::ADR, "ADR"),
    (FilterMask::LABEL, "LABEL"),
    (FilterMask::TEL, "TEL"),
    (FilterMask::EMAIL, "EMAIL"),
    (FilterMask::MAILER, "MAILER"),
    (FilterMask::TZ, "TZ"),
    (FilterMask::GEO, "GEO"),
    (FilterMask::TITLE, "TITLE"),
    (FilterMask::ROLE, "ROLE"),
    (FilterMask::LOGO, "LOGO"),
    (FilterMask::AGENT, "AGENT"),
    (FilterMask::ORG, "ORG"),
    (FilterMask::NOTE, "NOTE"),
    (FilterMask::REV, "REV"),
    (FilterMask::SOUND, "SOUND"),
    (FilterMask::URL, "URL"),
    (FilterMask::UID, "UID"),
    (FilterMask::KEY, "KEY"),
    (FilterMask::NICKNAME, "NICKNAME"),
    (FilterMask::CATEGORIES, "CATEGORIES"),
    (FilterMask::PRODID, "PRODID"),
    (FilterMask::CLASS, "CLASS"),
    (FilterMask::SORT_STRING, "SORT-STRING"),
    (FilterMask::X_IRMC_CALL_DATETIME, "X-IRMC-CALL-DATETIME"),
];

/// Attributes every response must carry for the given version, forced on
/// before filtering.
pub fn mandatory(version: Format) -> FilterMask {
    match version {
        Format::V2_1 => FilterMask::VERSION
            .union(FilterMask::N)
            .union(FilterMask::TEL),
        Format::V3_0 => FilterMask::VERSION
            .union(FilterMask::FN)
            .union(FilterMask::N)
            .union(FilterMask::TEL),
    }
}

/// Applies a raw 64-bit mask to a record. A zero mask means "no filter".
///
/// `BEGIN`/`VERSION`/`END` are absent from the IR, so the VERSION bit only
/// matters for the serializer's framing, never for removal here.
pub fn apply(vcard: &VCard, mask: u64, version: Format) -> VCard {
    if mask == 0 {
        return vcard.clone();
    }
    let effective = FilterMask::from_bits_truncate(mask) | mandatory(version);
    let properties = vcard
        .properties
        .iter()
        .filter(|property| {
            FILTER_ATTRS
                .iter()
                .any(|(bit, name)| *name == property.name && effective.contains(*bit))
        })
        .cloned()
        .collect();
    VCard { properties }
}
