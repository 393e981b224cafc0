// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// One vCard property in the normalized representation.
///
/// `values` preserves the `;`-separated slot structure of properties like
/// `N` and `ADR`, including positional empties; it always has at least one
/// element. Parameter keys may be empty (bare parameter values of 2.1
/// input keep their empty key until a normalizing class rewrites them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Uppercased type name, e.g. `N`, `TEL`, `X-IRMC-CALL-DATETIME`.
    pub name: String,
    pub parameters: Vec<(String, String)>,
    pub values: Vec<String>,
}

impl Property {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<(String, String)>,
        values: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            values,
        }
    }
}

/// Encoding strategy of a property type.
///
/// The original profile implementations model this as a class hierarchy;
/// here it collapses to three concrete strategies chosen by type name
/// through one immutable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyClass {
    /// No encoding normalization; parameters pass through untouched.
    Plain,
    /// Text-bearing: character set and QUOTED-PRINTABLE transfer encoding
    /// are applied on parse and restored for 2.1 output.
    Text,
    /// Binary-bearing: BASE64 bodies stay encoded, tagged `ENCODING=b`.
    Binary,
}

/// Type-name registry. Populated once; the parser consults it both for the
/// property-start test during unfolding and for strategy selection.
pub static PROPERTY_CLASSES: Lazy<HashMap<&'static str, PropertyClass>> =
    Lazy::new(|| {
        use PropertyClass::{Binary, Plain, Text};
        HashMap::from([
            // Framing; stripped from the IR after parsing.
            ("BEGIN", Plain),
            ("VERSION", Plain),
            ("END", Plain),
            // Text-bearing properties.
            ("ADR", Text),
            ("N", Text),
            ("FN", Text),
            ("EMAIL", Text),
            ("IMPP", Text),
            ("LABEL", Text),
            ("MAILER", Text),
            ("ORG", Text),
            ("TITLE", Text),
            ("UID", Text),
            ("URL", Text),
            ("X-IRMC-CALL-DATETIME", Text),
            // Binary-bearing properties.
            ("KEY", Binary),
            ("LOGO", Binary),
            ("PHOTO", Binary),
            ("SOUND", Binary),
            ("TEL", Binary),
            // Everything else passes through.
            ("AGENT", Plain),
            ("BDAY", Plain),
            ("CATEGORIES", Plain),
            ("CLASS", Plain),
            ("GEO", Plain),
            ("NAME", Plain),
            ("NICKNAME", Plain),
            ("NOTE", Plain),
            ("PRODID", Plain),
            ("PROFILE", Plain),
            ("REV", Plain),
            ("ROLE", Plain),
            ("SORT-STRING", Plain),
            ("SOURCE", Plain),
            ("TZ", Plain),
        ])
    });

/// Strategy for an uppercased type name, `None` for unknown types
/// (including unregistered `X-` extensions, which are dropped on parse).
pub fn property_class(name: &str) -> Option<PropertyClass> {
    PROPERTY_CLASSES.get(name).copied()
}
