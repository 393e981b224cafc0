// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Interactive PCE front-end.
//!
//! Line-oriented command surface: `connect`, `disconnect`, the three pull
//! operations, `set_phonebook`, `mirror_vfolder` and `quit`. On real
//! hardware `connect` would run an SDP search by profile id 0x1130 first;
//! here the argument is the transport address the service listens on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cfg::config::Config;
use crate::client::client::PbapClient;
use crate::params::{Format, Order, SearchAttribute};
use crate::vfolder::PHONEBOOK_OBJECTS;

/// One parsed REPL command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { address: Option<String> },
    Disconnect,
    PullPhonebook {
        name: String,
        filter: u64,
        format: Format,
        max_list_count: u16,
        list_start_offset: u16,
    },
    PullVcardListing {
        name: String,
        order: Order,
        search_attribute: SearchAttribute,
        search_value: Option<String>,
        max_list_count: u16,
        list_start_offset: u16,
    },
    PullVcardEntry {
        name: String,
        filter: u64,
        format: Format,
    },
    SetPhonebook {
        name: String,
        to_parent: bool,
        to_root: bool,
    },
    MirrorVfolder {
        address: String,
        rootdir: String,
    },
    Quit,
}

/// Parses one input line; `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace().map(str::to_string);
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<String> = words.collect();
    let command = match head.as_str() {
        "connect" => Command::Connect {
            address: rest.first().cloned(),
        },
        "disconnect" => Command::Disconnect,
        "pull_phonebook" => {
            let (flags, name) = split_flags(&rest)?;
            Command::PullPhonebook {
                name: name.context("pull_phonebook requires an object name")?,
                filter: flag_u64(&flags, &["-f", "--filter"], 0)?,
                format: Format::from_u8(flag_u64(&flags, &["-t", "--format"], 0)? as u8),
                max_list_count: flag_u64(&flags, &["-c", "--max-count"], 65535)? as u16,
                list_start_offset: flag_u64(&flags, &["-o", "--start-offset"], 0)?
                    as u16,
            }
        },
        "pull_vcard_listing" => {
            let (flags, name) = split_flags(&rest)?;
            Command::PullVcardListing {
                name: name.unwrap_or_default(),
                order: Order::from_u8(flag_u64(&flags, &["-r", "--order"], 0)? as u8),
                search_attribute: SearchAttribute::from_u8(flag_u64(
                    &flags,
                    &["--search-attribute"],
                    0,
                )? as u8),
                search_value: flag_value(&flags, &["--search-value"]),
                max_list_count: flag_u64(&flags, &["-c", "--max-count"], 65535)? as u16,
                list_start_offset: flag_u64(&flags, &["-o", "--start-offset"], 0)?
                    as u16,
            }
        },
        "pull_vcard_entry" => {
            let (flags, name) = split_flags(&rest)?;
            Command::PullVcardEntry {
                name: name.context("pull_vcard_entry requires an object name")?,
                filter: flag_u64(&flags, &["-f", "--filter"], 0)?,
                format: Format::from_u8(flag_u64(&flags, &["-t", "--format"], 0)? as u8),
            }
        },
        "set_phonebook" => {
            let to_parent = rest.iter().any(|w| w == "--to-parent");
            let to_root = rest.iter().any(|w| w == "--to-root");
            let name = rest
                .iter()
                .find(|w| !w.starts_with("--"))
                .cloned()
                .unwrap_or_default();
            Command::SetPhonebook {
                name,
                to_parent,
                to_root,
            }
        },
        "mirror_vfolder" => Command::MirrorVfolder {
            address: rest
                .first()
                .context("mirror_vfolder requires a server address")?
                .clone(),
            rootdir: rest
                .get(1)
                .cloned()
                .unwrap_or_else(|| "phonebook_vfolder".to_string()),
        },
        "quit" | "q" => Command::Quit,
        other => bail!("unknown command: {other}"),
    };
    Ok(Some(command))
}

/// Splits `[flag value]... name` argument lists; the one word that is not
/// a flag or a flag value becomes the positional name.
fn split_flags(words: &[String]) -> Result<(Vec<(String, String)>, Option<String>)> {
    let mut flags = Vec::new();
    let mut name = None;
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        if word.starts_with('-') {
            let value = iter
                .next()
                .with_context(|| format!("{word} requires a value"))?;
            flags.push((word.clone(), value.clone()));
        } else if name.is_none() {
            name = Some(word.clone());
        } else {
            bail!("unexpected argument: {word}");
        }
    }
    Ok((flags, name))
}

fn flag_value(flags: &[(String, String)], names: &[&str]) -> Option<String> {
    flags
        .iter()
        .find(|(flag, _)| names.contains(&flag.as_str()))
        .map(|(_, value)| value.clone())
}

/// Integer flag with `0x` support, falling back to `default`.
fn flag_u64(flags: &[(String, String)], names: &[&str], default: u64) -> Result<u64> {
    match flag_value(flags, names) {
        None => Ok(default),
        Some(raw) => parse_u64(&raw),
    }
}

fn parse_u64(raw: &str) -> Result<u64> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.with_context(|| format!("not a number: {raw}"))
}

/// REPL session state.
pub struct Repl {
    cfg: Config,
    cancel: CancellationToken,
    client: Option<PbapClient<TcpStream>>,
}

impl Repl {
    pub fn new(cfg: Config, cancel: CancellationToken) -> Self {
        Self {
            cfg,
            cancel,
            client: None,
        }
    }

    /// Reads commands from stdin until `quit` or EOF.
    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            stdout.write_all(b"pbap> ").await?;
            stdout.flush().await?;
            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };
            match parse_command(&line) {
                Ok(None) => {},
                Ok(Some(Command::Quit)) => return Ok(()),
                Ok(Some(command)) => {
                    if let Err(e) = self.dispatch(command).await {
                        error!("command failed: {e:#}");
                    }
                },
                Err(e) => error!("{e:#}"),
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Connect { address } => {
                let address = address
                    .or_else(|| {
                        let fallback = self.cfg.transport.target_address.clone();
                        (!fallback.is_empty()).then_some(fallback)
                    })
                    .context("no server address given and none configured")?;
                self.connect(&address).await
            },
            Command::Disconnect => {
                let Some(client) = self.client.as_mut() else {
                    bail!("not connected; connect first");
                };
                client.disconnect().await?;
                self.client = None;
                Ok(())
            },
            Command::PullPhonebook {
                name,
                filter,
                format,
                max_list_count,
                list_start_offset,
            } => {
                let client = self.client.as_mut().context("not connected")?;
                if let Some((_, data)) = client
                    .pull_phonebook(&name, filter, format, max_list_count, list_start_offset)
                    .await?
                {
                    info!("result of pull_phonebook:\n{data}");
                }
                Ok(())
            },
            Command::PullVcardListing {
                name,
                order,
                search_attribute,
                search_value,
                max_list_count,
                list_start_offset,
            } => {
                let client = self.client.as_mut().context("not connected")?;
                if let Some((_, data)) = client
                    .pull_vcard_listing(
                        &name,
                        order,
                        search_value.as_deref().map(str::as_bytes),
                        search_attribute,
                        max_list_count,
                        list_start_offset,
                    )
                    .await?
                {
                    info!("result of pull_vcard_listing:\n{data}");
                }
                Ok(())
            },
            Command::PullVcardEntry {
                name,
                filter,
                format,
            } => {
                let client = self.client.as_mut().context("not connected")?;
                if let Some((_, data)) =
                    client.pull_vcard_entry(&name, filter, format).await?
                {
                    info!("result of pull_vcard_entry:\n{data}");
                }
                Ok(())
            },
            Command::SetPhonebook {
                name,
                to_parent,
                to_root,
            } => {
                let client = self.client.as_mut().context("not connected")?;
                if client.set_phonebook(&name, to_root, to_parent).await?.is_some() {
                    info!("current folder = {}", client.current_dir);
                }
                Ok(())
            },
            Command::MirrorVfolder { address, rootdir } => {
                self.connect(&address).await?;
                let client = self.client.as_mut().context("not connected")?;
                mirror_vfolder(client, Path::new(&rootdir)).await?;
                let client = self.client.as_mut().context("not connected")?;
                client.disconnect().await?;
                self.client = None;
                Ok(())
            },
            Command::Quit => Ok(()),
        }
    }

    async fn connect(&mut self, address: &str) -> Result<()> {
        info!("connecting to pbap server = {address}");
        let stream = TcpStream::connect(address)
            .await
            .with_context(|| format!("failed to reach {address}"))?;
        let mut client = PbapClient::new(stream, &self.cfg, self.cancel.clone());
        client.connect().await?;
        self.client = Some(client);
        Ok(())
    }
}

/// Downloads the whole virtual folder tree (both memories, every
/// phone-book object) into a local directory shaped like the server's.
pub async fn mirror_vfolder<S>(
    client: &mut PbapClient<S>,
    rootdir: &Path,
) -> Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    for prefix in ["", "SIM1/"] {
        let telecom_dir: PathBuf = rootdir.join(prefix).join("telecom");
        std::fs::create_dir_all(&telecom_dir)?;
        for object in PHONEBOOK_OBJECTS {
            let object_dir = telecom_dir.join(object);
            std::fs::create_dir_all(&object_dir)?;
            let remote = format!("{prefix}telecom/{object}");

            let Some((_, listing)) = client
                .pull_vcard_listing(
                    &remote,
                    Order::Indexed,
                    None,
                    SearchAttribute::Name,
                    65535,
                    0,
                )
                .await?
            else {
                error!("vcard-listing get failed for pbobject {object:?}");
                continue;
            };
            let handles = listing_handles(&listing);
            info!("available cards in {remote}: {handles:?}");

            if client.set_phonebook(&remote, false, false).await?.is_none() {
                error!("cannot enter {remote}; skipping its entries");
                continue;
            }
            for handle in &handles {
                match client.pull_vcard_entry(handle, 0, Format::V2_1).await? {
                    Some((_, card)) => {
                        std::fs::write(object_dir.join(handle), card)?;
                    },
                    None => error!("vcard get failed for handle {handle:?}"),
                }
            }
            // Walk back to the root before pulling the concatenated file.
            if client.set_phonebook("", true, false).await?.is_none() {
                warn!("could not navigate back to the root");
            }

            let Some((params, phonebook)) = client
                .pull_phonebook(&format!("{remote}.vcf"), 0, Format::V2_1, 65535, 0)
                .await?
            else {
                error!("phonebook get failed for pbobject {object:?}");
                continue;
            };
            std::fs::write(
                telecom_dir.join(format!("{object}.vcf")),
                phonebook,
            )?;
            info!("response parameters: {params:?}");
        }
    }
    Ok(())
}

/// Extracts the card handles out of a listing document.
pub fn listing_handles(listing: &str) -> Vec<String> {
    let mut handles = Vec::new();
    let mut rest = listing;
    while let Some(start) = rest.find("handle=\"") {
        rest = &rest[start + 8..];
        if let Some(end) = rest.find('"') {
            handles.push(rest[..end].to_string());
            rest = &rest[end + 1..];
        } else {
            break;
        }
    }
    handles
}
