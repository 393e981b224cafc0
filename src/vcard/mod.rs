// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Version-independent vCard pipeline.
//!
//! Stored objects are parsed once into a normalized intermediate
//! representation ([`VCard`]), which is what the storage backends hand to
//! the transaction engine; rendering back to 2.1 or 3.0 wire text happens
//! per request, after attribute filtering.

pub mod encoding;
pub mod filter;
pub mod parse;
pub mod property;
pub mod serialize;

pub use crate::vcard::property::{Property, PropertyClass};

/// A normalized vCard: `BEGIN`/`VERSION`/`END` are stripped, character-set
/// and transfer encodings have been applied, and property order is the
/// stored order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VCard {
    pub properties: Vec<Property>,
}

impl VCard {
    /// First property with the given (uppercase) type name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The `;`-joined value of the first property with the given type
    /// name, e.g. the full structured `N` value used for listing names and
    /// alphanumeric ordering.
    pub fn joined_value(&self, name: &str) -> Option<String> {
        self.property(name).map(|p| p.values.join(";"))
    }
}
