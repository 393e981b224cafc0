// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use pbap_rs::{
    cfg::{
        cli::{CliOptions, resolve_config_path},
        config::Config,
        logger::init_default_logger,
    },
    client::repl::Repl,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_default_logger()?;
    let opts = CliOptions::parse(std::env::args().skip(1))?;

    // The REPL works without a config file; fall back to defaults then.
    let cfg = match resolve_config_path(&opts.config) {
        Ok(path) => Config::load_from_file(path).context("failed to load config")?,
        Err(_) => Config::default(),
    };

    info!("Welcome to the PhoneBook Access Profile!");
    let cancel = CancellationToken::new();
    let mut repl = Repl::new(cfg, cancel);
    repl.run().await
}
