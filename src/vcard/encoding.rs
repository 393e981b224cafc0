// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Transfer-encoding and character-set helpers for the vCard pipeline.

use tracing::warn;

/// Decodes a QUOTED-PRINTABLE byte string.
///
/// `=XX` hex escapes become the raw byte, a soft line break (`=` directly
/// before CRLF or LF) disappears, and any other `=` is kept literally, the
/// lenient behavior phone-generated 2.1 vCards require.
pub fn qp_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        match input.get(i + 1..i + 3) {
            Some([b'\r', b'\n']) => i += 3,
            _ if input.get(i + 1) == Some(&b'\n') => i += 2,
            Some(hex) => {
                if let (Some(hi), Some(lo)) =
                    (hex_value(hex[0]), hex_value(hex[1]))
                {
                    out.push(hi << 4 | lo);
                    i += 3;
                } else {
                    out.push(b'=');
                    i += 1;
                }
            },
            None => {
                out.push(b'=');
                i += 1;
            },
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Encodes text as QUOTED-PRINTABLE without soft line breaks.
///
/// Printable ASCII (minus `=`), space and tab stay literal, so the `;`
/// value separators survive encoding and the serializer can re-split the
/// encoded string.
pub fn qp_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        match b {
            b' ' | b'\t' => out.push(b as char),
            0x21..=0x7E if b != b'=' => out.push(b as char),
            _ => {
                out.push('=');
                out.push_str(&format!("{b:02X}"));
            },
        }
    }
    out
}

/// Decodes bytes from the named character set, replacing malformed
/// sequences. Unknown labels fall back to lossy UTF-8 with a warning.
pub fn charset_decode(bytes: &[u8], label: &str) -> String {
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) => {
            let (text, _, _) = encoding.decode(bytes);
            text.into_owned()
        },
        None => {
            warn!("unknown charset {label:?}; decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        },
    }
}
