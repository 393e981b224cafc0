// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::StorageBackend;

/// Room reserved for the packet prefix and response headers when
/// validating the body-chunk cap against the packet length.
const RESPONSE_HEADER_OVERHEAD: usize = 32;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Transport endpoints and I/O limits. The addresses stand in for the
    /// RFCOMM channel the SDP layer would hand over on real hardware.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Virtual-folder storage selection.
    #[serde(default)]
    pub storage: StorageConfig,
    /// OBEX session limits.
    #[serde(default)]
    pub obex: ObexConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_listen_address")]
    /// Address the PSE service loop binds.
    pub listen_address: String,

    #[serde(default)]
    /// Address the PCE connects to; the REPL `connect` argument overrides
    /// this.
    pub target_address: String,

    #[serde(default = "default_io_timeout", with = "serde_secs")]
    /// Per-read/per-write transport timeout.
    pub timeout_connection: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            target_address: String::new(),
            timeout_connection: default_io_timeout(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    /// Which backend serves the virtual folder.
    pub backend: StorageBackend,

    #[serde(default = "default_rootdir")]
    /// Root of the `.vcf` tree for the filesystem backend.
    pub rootdir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            rootdir: default_rootdir(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ObexConfig {
    #[serde(default = "default_max_packet_length")]
    /// Largest OBEX packet either side is asked to send us.
    pub max_packet_length: u16,

    #[serde(default = "default_max_body_chunk")]
    /// Body bytes per response fragment. The profile's deployed servers
    /// use a conservative 700; raise it toward the negotiated packet
    /// length minus header overhead if the transport allows.
    pub max_body_chunk: usize,
}

impl Default for ObexConfig {
    fn default() -> Self {
        Self {
            max_packet_length: default_max_packet_length(),
            max_body_chunk: default_max_body_chunk(),
        }
    }
}

fn default_listen_address() -> String {
    "127.0.0.1:10009".to_string()
}

fn default_io_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_rootdir() -> String {
    "phonebook_vfolder".to_string()
}

fn default_max_packet_length() -> u16 {
    8192
}

fn default_max_body_chunk() -> usize {
    700
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.transport.listen_address.is_empty(),
            "listen_address must not be empty"
        );
        ensure!(self.obex.max_body_chunk >= 1, "max_body_chunk must be >= 1");
        ensure!(
            self.obex.max_body_chunk + RESPONSE_HEADER_OVERHEAD
                <= self.obex.max_packet_length as usize,
            "max_body_chunk must leave room for headers within max_packet_length"
        );
        if self.storage.backend == StorageBackend::Fs {
            ensure!(
                !self.storage.rootdir.is_empty(),
                "rootdir is required for the filesystem backend"
            );
        }
        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
