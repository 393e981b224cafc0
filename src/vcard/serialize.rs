// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Normalized representation → vCard wire text.

use crate::params::Format;
use crate::vcard::{
    Property, PropertyClass, VCard, encoding::qp_encode, property::property_class,
};

/// Renders a normalized vCard at the requested version, restoring the
/// version-dependent parameters the parser stripped.
///
/// For any wire input the parser accepts at version `V`, re-parsing
/// `serialize(parse(input), V)` yields the same IR; exact bytes are not
/// guaranteed because quoted-printable leaves encoding freedom.
pub fn serialize(vcard: &VCard, version: Format) -> String {
    let mut out = String::new();
    out.push_str("BEGIN:VCARD\r\n");
    out.push_str("VERSION:");
    out.push_str(version.as_str());
    out.push_str("\r\n");
    for property in &vcard.properties {
        render(&mut out, &denormalize(property, version));
    }
    out.push_str("END:VCARD\r\n");
    out
}

fn denormalize(property: &Property, version: Format) -> Property {
    let class = property_class(&property.name).unwrap_or(PropertyClass::Plain);
    match class {
        PropertyClass::Plain => property.clone(),
        PropertyClass::Text => denormalize_text(property, version),
        PropertyClass::Binary => denormalize_binary(property, version),
    }
}

/// 2.1 text output is quoted-printable UTF-8 with bare type parameters;
/// 3.0 output keeps the raw UTF-8 values and `TYPE=` parameters.
fn denormalize_text(property: &Property, version: Format) -> Property {
    if version != Format::V2_1 {
        return property.clone();
    }
    let encoded = qp_encode(&property.values.join(";"));
    let values = encoded.split(';').map(str::to_string).collect();
    let mut parameters: Vec<(String, String)> = property
        .parameters
        .iter()
        .map(|(key, val)| {
            if key.eq_ignore_ascii_case("TYPE") {
                (String::new(), val.clone())
            } else {
                (key.clone(), val.clone())
            }
        })
        .collect();
    parameters.push(("CHARSET".to_string(), "UTF-8".to_string()));
    parameters.push(("ENCODING".to_string(), "QUOTED-PRINTABLE".to_string()));
    Property::new(property.name.clone(), parameters, values)
}

fn denormalize_binary(property: &Property, version: Format) -> Property {
    let mut parameters: Vec<(String, String)> = property
        .parameters
        .iter()
        .map(|(key, val)| {
            if key.eq_ignore_ascii_case("ENCODING") {
                let restored = match version {
                    Format::V2_1 => "BASE64",
                    Format::V3_0 => "b",
                };
                ("ENCODING".to_string(), restored.to_string())
            } else if key.eq_ignore_ascii_case("TYPE") && version == Format::V2_1 {
                (String::new(), val.clone())
            } else {
                (key.clone(), val.clone())
            }
        })
        .collect();
    // 2.1 has no VALUE parameter for inline photos.
    if property.name == "PHOTO" && version == Format::V2_1 {
        parameters.retain(|(key, _)| !key.eq_ignore_ascii_case("VALUE"));
    }
    Property::new(property.name.clone(), parameters, property.values.clone())
}

fn render(out: &mut String, property: &Property) {
    out.push_str(&property.name);
    let params = join_parameters(&property.parameters);
    if !params.is_empty() {
        out.push(';');
        out.push_str(&params);
    }
    out.push(':');
    out.push_str(&property.values.join(";"));
    out.push_str("\r\n");
}

/// Key-less parameters render as the bare value, 2.1 style.
fn join_parameters(parameters: &[(String, String)]) -> String {
    parameters
        .iter()
        .map(|(key, value)| {
            if key.is_empty() {
                value.clone()
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}
