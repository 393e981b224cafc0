// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use pbap_rs::{
    cfg::{cli::CliOptions, cli::resolve_config_path, config::Config, logger::init_logger},
    server::PbapService,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let opts = CliOptions::parse(std::env::args().skip(1))?;
    let logger_config = opts
        .logger_config
        .clone()
        .unwrap_or_else(|| "tests/config_logger.yaml".to_string());
    let _init_logger = init_logger(&logger_config)?;

    let mut cfg = resolve_config_path(&opts.config)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;
    if let Some(rootdir) = opts.rootdir {
        cfg.storage.rootdir = rootdir;
    }
    if let Some(address) = opts.address {
        cfg.transport.listen_address = address;
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal_cancel.cancel();
        }
    });

    // If a session tears the listener down, rebuild and re-register until
    // we are told to stop.
    while !cancel.is_cancelled() {
        let service = PbapService::new(cfg.clone());
        match service.run(cancel.clone()).await {
            Ok(()) => break,
            Err(e) => {
                warn!("service loop failed, restarting: {e:#}");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            },
        }
    }
    Ok(())
}
