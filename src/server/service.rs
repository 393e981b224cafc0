// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Outer PSE service loop.
//!
//! Accepts one peer at a time and runs the transaction engine until the
//! session ends, then re-enters accept, so a torn-down transport never
//! takes the service with it. The TCP listener stands in for the RFCOMM
//! accept socket an SDP-registered Bluetooth stack would provide; the
//! engine itself is transport-agnostic.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cfg::{config::Config, enums::StorageBackend};
use crate::server::engine::PbapServer;
use crate::vfolder::{Phonebook, fs::FsPhonebook, mem::MemPhonebook};

pub struct PbapService {
    cfg: Config,
    vfolder: Arc<dyn Phonebook + Send + Sync>,
}

impl PbapService {
    /// Builds the service with the backend the config selects.
    pub fn new(cfg: Config) -> Self {
        let vfolder: Arc<dyn Phonebook + Send + Sync> = match cfg.storage.backend {
            StorageBackend::Fs => Arc::new(FsPhonebook::new(cfg.storage.rootdir.as_str())),
            StorageBackend::Memory => Arc::new(MemPhonebook::new()),
        };
        Self { cfg, vfolder }
    }

    /// Builds the service around an externally constructed backend.
    pub fn with_backend(cfg: Config, vfolder: Arc<dyn Phonebook + Send + Sync>) -> Self {
        Self { cfg, vfolder }
    }

    /// Accept loop; returns when cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(&self.cfg.transport.listen_address)
            .await
            .with_context(|| {
                format!("failed to bind {}", self.cfg.transport.listen_address)
            })?;
        info!(
            "phonebook access server listening on {}",
            self.cfg.transport.listen_address
        );

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                },
            };
            info!("connection from {peer}");
            let mut engine = PbapServer::new(Arc::clone(&self.vfolder), self.cfg.clone());
            if let Err(e) = engine.serve_connection(stream, cancel.clone()).await {
                warn!("session with {peer} ended: {e}");
            } else {
                info!("session with {peer} closed");
            }
        }
    }
}
