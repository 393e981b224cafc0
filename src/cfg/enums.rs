// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Storage backend carrying the virtual phone-book folder.
///
/// The filesystem backend serves a mirrored `.vcf` tree below a root
/// directory; the memory backend starts from the well-known empty folder
/// skeleton and is meant for fixtures and tests.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    #[serde(rename = "Fs", alias = "fs", alias = "FS", alias = "filesystem")]
    Fs,
    #[serde(rename = "Memory", alias = "memory", alias = "MEMORY", alias = "mem")]
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageBackend::Fs => "Fs",
            StorageBackend::Memory => "Memory",
        })
    }
}
