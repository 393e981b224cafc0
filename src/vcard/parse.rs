// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! vCard wire text → normalized representation.

use tracing::warn;

use crate::errors::PbapError;
use crate::vcard::{
    Property, PropertyClass, VCard,
    encoding::{charset_decode, qp_decode},
    property::property_class,
};

/// Parses one stored vCard (or a concatenation of several; framing
/// properties are stripped either way) into the normalized IR.
///
/// Unknown property types drop their whole line with a warning and never
/// abort the parse. Per-property value schemas (dates, URIs) are not
/// validated.
pub fn parse(input: &str) -> Result<VCard, PbapError> {
    if input.is_empty() {
        return Err(PbapError::EmptyInput);
    }

    let mut properties = Vec::new();
    for line in unfold(input) {
        if let Some(property) = parse_property(&line) {
            properties.push(property);
        }
    }
    properties
        .retain(|p| !matches!(p.name.as_str(), "BEGIN" | "VERSION" | "END"));

    Ok(VCard { properties })
}

/// Joins folded lines. A line starts a property iff its uppercased prefix
/// before `;` or `:` is a registered type name or begins with `X-`; any
/// other line continues the previous one with its leading whitespace
/// character removed.
fn unfold(input: &str) -> Vec<String> {
    let mut unfolded: Vec<String> = Vec::new();
    for line in input.lines() {
        if is_property_start(line) {
            unfolded.push(line.to_string());
        } else if let Some(last) = unfolded.last_mut() {
            last.push_str(line.strip_prefix([' ', '\t']).unwrap_or(line));
        } else if !line.is_empty() {
            warn!("continuation line before any property start: {line:?}");
        }
    }
    unfolded
}

fn is_property_start(line: &str) -> bool {
    let prefix_end = line.find([';', ':']).unwrap_or(line.len());
    let prefix = line[..prefix_end].to_ascii_uppercase();
    prefix.starts_with("X-") || property_class(&prefix).is_some()
}

fn parse_property(line: &str) -> Option<Property> {
    let (lhs, value) = line.split_once(':').unwrap_or((line, ""));
    let (raw_name, raw_params) = match lhs.split_once(';') {
        Some((name, params)) => (name, params),
        None => (lhs, ""),
    };
    let name = raw_name.to_ascii_uppercase();

    let Some(class) = property_class(&name) else {
        warn!("unsupported property type {raw_name:?}; line dropped");
        return None;
    };

    let parameters = split_parameters(raw_params);
    Some(normalize(name, class, parameters, value))
}

/// `key=value` pairs split at the LAST `=`; a parameter with no `=` keeps
/// its raw text as the value under an empty key.
fn split_parameters(raw: &str) -> Vec<(String, String)> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(';')
        .map(|p| match p.rfind('=') {
            Some(i) => (p[..i].to_string(), p[i + 1..].to_string()),
            None => (String::new(), p.to_string()),
        })
        .collect()
}

fn normalize(
    name: String,
    class: PropertyClass,
    parameters: Vec<(String, String)>,
    value: &str,
) -> Property {
    match class {
        PropertyClass::Plain => {
            Property::new(name, parameters, split_unescaped(value))
        },
        PropertyClass::Text => normalize_text(name, parameters, value),
        PropertyClass::Binary => normalize_binary(name, parameters, value),
    }
}

/// Applies `ENCODING` / `CHARSET`, dropping both after use, and rewrites
/// bare or `TYPE` parameters as `("TYPE", value)`.
fn normalize_text(
    name: String,
    parameters: Vec<(String, String)>,
    value: &str,
) -> Property {
    let mut encoding = None;
    let mut charset = None;
    let mut out_params = Vec::with_capacity(parameters.len());
    for (key, val) in parameters {
        let upper = key.to_ascii_uppercase();
        if upper == "ENCODING" {
            encoding = Some(val);
        } else if upper == "CHARSET" {
            charset = Some(val);
        } else if upper.is_empty() || upper == "TYPE" {
            out_params.push(("TYPE".to_string(), val));
        } else {
            out_params.push((key, val));
        }
    }

    let mut bytes = value.as_bytes().to_vec();
    if let Some(encoding) = encoding {
        if encoding.eq_ignore_ascii_case("QUOTED-PRINTABLE") {
            bytes = qp_decode(&bytes);
        } else {
            warn!("transfer encoding {encoding:?} on {name} left unapplied");
        }
    }
    let text = match charset {
        Some(charset) => charset_decode(&bytes, &charset),
        None => String::from_utf8_lossy(&bytes).into_owned(),
    };

    Property::new(name, out_params, split_unescaped(&text))
}

/// Keeps BASE64 bodies encoded: the encoding parameter collapses to
/// `ENCODING=b`, type parameters are normalized, the body stays untouched.
fn normalize_binary(
    name: String,
    parameters: Vec<(String, String)>,
    value: &str,
) -> Property {
    let normalized = parameters
        .into_iter()
        .map(|(key, val)| {
            let upper = key.to_ascii_uppercase();
            if upper == "ENCODING" {
                ("ENCODING".to_string(), "b".to_string())
            } else if upper.is_empty() || upper == "TYPE" {
                ("TYPE".to_string(), val)
            } else {
                (key, val)
            }
        })
        .collect();
    Property::new(name, normalized, split_unescaped(value))
}

/// Splits on `;` separators that are not backslash-escaped, preserving
/// empty slots. Escapes stay in the content.
pub(crate) fn split_unescaped(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == ';' {
            out.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    out.push(current);
    out
}
