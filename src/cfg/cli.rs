// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Resolves a possibly-relative config path against the current working
/// directory and canonicalizes it.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// Command-line options shared by the PSE and PCE binaries.
#[derive(Debug, Clone)]
pub struct CliOptions {
    /// Path of the YAML config file.
    pub config: String,
    /// Path of the YAML logger config file.
    pub logger_config: Option<String>,
    /// Overrides `storage.rootdir` from the config.
    pub rootdir: Option<String>,
    /// Overrides the transport address from the config.
    pub address: Option<String>,
}

impl CliOptions {
    /// Parses `--config/--logger-config/--rootdir/--address` pairs from
    /// the process arguments.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut opts = Self {
            config: "config.yaml".to_string(),
            logger_config: None,
            rootdir: None,
            address: None,
        };
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let mut take = |flag: &str| -> Result<String> {
                iter.next()
                    .with_context(|| format!("{flag} requires a value"))
            };
            match arg.as_str() {
                "--config" => opts.config = take("--config")?,
                "--logger-config" => opts.logger_config = Some(take("--logger-config")?),
                "--rootdir" => opts.rootdir = Some(take("--rootdir")?),
                "--address" => opts.address = Some(take("--address")?),
                other => bail!("unknown argument: {other}"),
            }
        }
        Ok(opts)
    }
}
