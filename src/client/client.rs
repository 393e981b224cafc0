// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PCE client core.
//!
//! Builds the three PBAP GET requests plus SETPATH navigation on top of
//! the OBEX transport, mirroring the server's folder position in
//! `current_dir`. Failure responses are logged at error level and
//! surfaced as an absent result; only transport faults are hard errors.

use anyhow::{Result, bail};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cfg::config::Config;
use crate::errors::PbapError;
use crate::obex::{
    PBAP_TARGET_UUID,
    conn::ObexTransport,
    header::{Header, HeaderSet},
    opcode::ResponseCode,
    packet::{
        ConnectRequest, DisconnectRequest, GetRequest, ObexPacket, SetPathFlags,
        SetPathRequest,
    },
};
use crate::params::{AppParam, Format, Order, ResponseParams, SearchAttribute, encode};
use crate::vfolder;

const TYPE_PHONEBOOK: &str = "x-bt/phonebook";
const TYPE_VCARD_LISTING: &str = "x-bt/vcard-listing";
const TYPE_VCARD: &str = "x-bt/vcard";

/// One PBAP client session over an ordered byte transport.
pub struct PbapClient<S> {
    conn: ObexTransport<S>,
    /// Local mirror of the server's folder position; updated only after
    /// the server acknowledges a SETPATH with Success.
    pub current_dir: String,
    connection_id: Option<u32>,
    max_packet_length: u16,
    connected: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> PbapClient<S> {
    pub fn new(stream: S, cfg: &Config, cancel: CancellationToken) -> Self {
        Self {
            conn: ObexTransport::new(
                stream,
                cfg.transport.timeout_connection,
                cancel,
            ),
            current_dir: "/".to_string(),
            connection_id: None,
            max_packet_length: cfg.obex.max_packet_length,
            connected: false,
        }
    }

    /// Issues the directed OBEX CONNECT carrying the PBAP target UUID.
    pub async fn connect(&mut self) -> Result<()> {
        let request = ConnectRequest {
            max_packet_length: self.max_packet_length,
            headers: vec![Header::Target(Bytes::from_static(&PBAP_TARGET_UUID))],
        };
        self.conn.write_request(request.encode()).await?;
        let response = self.conn.read_response(true).await?;
        if response.code != ResponseCode::Success {
            bail!("connect rejected: {}", response.code);
        }
        let headers = HeaderSet::collect(&response.headers);
        self.connection_id = headers.connection_id;
        if let Some(mtu) = response.max_packet_length {
            self.max_packet_length = self.max_packet_length.min(mtu);
        }
        self.connected = true;
        self.current_dir = "/".to_string();
        info!("connect success, connection_id = {:?}", self.connection_id);
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        let request = DisconnectRequest {
            headers: self.base_headers(),
        };
        self.conn.write_request(request.encode()).await?;
        let response = self.conn.read_response(false).await?;
        if response.code != ResponseCode::Success {
            bail!("disconnect rejected: {}", response.code);
        }
        self.connected = false;
        self.connection_id = None;
        Ok(())
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn base_headers(&self) -> Vec<Header> {
        match self.connection_id {
            Some(id) => vec![Header::ConnectionId(id)],
            None => Vec::new(),
        }
    }

    /// Retrieves an entire phonebook object from the current folder.
    pub async fn pull_phonebook(
        &mut self,
        name: &str,
        filter: u64,
        format: Format,
        max_list_count: u16,
        list_start_offset: u16,
    ) -> Result<Option<(ResponseParams, String)>> {
        info!(
            "requesting pull_phonebook for pbobject {name:?} with filter={filter:#x} \
             format={format:?} max_list_count={max_list_count} \
             list_start_offset={list_start_offset}"
        );
        let tlv = encode(&[
            AppParam::Filter(filter),
            AppParam::Format(format.as_u8()),
            AppParam::MaxListCount(max_list_count),
            AppParam::ListStartOffset(list_start_offset),
        ]);
        let extra = vec![
            Header::Type(TYPE_PHONEBOOK.to_string()),
            Header::AppParameters(tlv.into()),
        ];
        match self.get("pull_phonebook", name, extra).await? {
            Some((params, body)) => Ok(Some((
                params,
                String::from_utf8_lossy(&body).into_owned(),
            ))),
            None => Ok(None),
        }
    }

    /// Retrieves the XML listing of a phonebook folder. The search value
    /// is only sent when non-empty; the attribute rides along with it.
    pub async fn pull_vcard_listing(
        &mut self,
        name: &str,
        order: Order,
        search_value: Option<&[u8]>,
        search_attribute: SearchAttribute,
        max_list_count: u16,
        list_start_offset: u16,
    ) -> Result<Option<(ResponseParams, String)>> {
        info!(
            "requesting pull_vcard_listing for {name:?} with order={order:?} \
             search_attribute={search_attribute:?} max_list_count={max_list_count} \
             list_start_offset={list_start_offset}"
        );
        let mut params = vec![
            AppParam::Order(order as u8),
            AppParam::MaxListCount(max_list_count),
            AppParam::ListStartOffset(list_start_offset),
        ];
        if let Some(value) = search_value
            && !value.is_empty()
        {
            params.push(AppParam::SearchValue(value.to_vec()));
            params.push(AppParam::SearchAttribute(search_attribute.as_u8()));
        }
        let extra = vec![
            Header::Type(TYPE_VCARD_LISTING.to_string()),
            Header::AppParameters(encode(&params).into()),
        ];
        match self.get("pull_vcard_listing", name, extra).await? {
            Some((params, body)) => Ok(Some((
                params,
                String::from_utf8_lossy(&body).into_owned(),
            ))),
            None => Ok(None),
        }
    }

    /// Retrieves a single vCard from the current folder.
    pub async fn pull_vcard_entry(
        &mut self,
        name: &str,
        filter: u64,
        format: Format,
    ) -> Result<Option<(ResponseParams, String)>> {
        info!(
            "requesting pull_vcard_entry for {name:?} with filter={filter:#x} \
             format={format:?}"
        );
        let tlv = encode(&[
            AppParam::Filter(filter),
            AppParam::Format(format.as_u8()),
        ]);
        let extra = vec![
            Header::Type(TYPE_VCARD.to_string()),
            Header::AppParameters(tlv.into()),
        ];
        match self.get("pull_vcard_entry", name, extra).await? {
            Some((params, body)) => Ok(Some((
                params,
                String::from_utf8_lossy(&body).into_owned(),
            ))),
            None => Ok(None),
        }
    }

    /// Changes the server's current folder. Exactly one navigation target
    /// must be supplied: a name, `to_parent`, or `to_root`.
    pub async fn set_phonebook(
        &mut self,
        name: &str,
        to_root: bool,
        to_parent: bool,
    ) -> Result<Option<()>> {
        info!("setting current folder: name={name:?} to_root={to_root} to_parent={to_parent}");
        if name.is_empty() && !to_parent && !to_root {
            return Err(PbapError::InvalidArguments(
                "either name must be non-empty or to_parent/to_root must be set".into(),
            )
            .into());
        }

        if to_root {
            if self.current_dir == "/" {
                warn!("path is already the root folder, no need to change");
                return Ok(None);
            }
            while self.current_dir != "/" {
                if self.setpath("", true).await?.is_none() {
                    return Ok(None);
                }
                self.current_dir = vfolder::parent(&self.current_dir);
            }
            return Ok(Some(()));
        }

        if to_parent {
            if self.current_dir == "/" {
                warn!("path is already the root folder, cannot go to parent");
                return Ok(None);
            }
            if self.setpath("", true).await?.is_none() {
                return Ok(None);
            }
            self.current_dir = vfolder::parent(&self.current_dir);
            return Ok(Some(()));
        }

        if self.setpath(name, false).await?.is_none() {
            return Ok(None);
        }
        self.current_dir = vfolder::join(&self.current_dir, name);
        Ok(Some(()))
    }

    async fn setpath(&mut self, name: &str, to_parent: bool) -> Result<Option<()>> {
        let mut flags = SetPathFlags::DONT_CREATE_DIR;
        if to_parent {
            flags |= SetPathFlags::NAVIGATE_TO_PARENT;
        }
        let mut headers = self.base_headers();
        headers.push(Header::Name(name.to_string()));
        let request = SetPathRequest { flags, headers };
        self.conn.write_request(request.encode()).await?;
        let response = self.conn.read_response(false).await?;
        if response.code == ResponseCode::Success {
            Ok(Some(()))
        } else {
            error!("set_phonebook failed. reason = {}", response.code);
            Ok(None)
        }
    }

    /// Issues one GET and drains the Continue chain into a single body.
    async fn get(
        &mut self,
        operation: &'static str,
        name: &str,
        extra_headers: Vec<Header>,
    ) -> Result<Option<(ResponseParams, Bytes)>> {
        let mut headers = self.base_headers();
        headers.push(Header::Name(name.to_string()));
        headers.extend(extra_headers);
        let request = GetRequest {
            final_bit: true,
            headers,
        };
        self.conn.write_request(request.encode()).await?;

        let mut body = BytesMut::new();
        let mut response_params = ResponseParams::default();
        loop {
            let response = self.conn.read_response(false).await?;
            let headers = HeaderSet::collect(&response.headers);
            if let Some(tlv) = headers.app_parameters.as_deref() {
                match ResponseParams::from_tlv(tlv) {
                    Ok(params) => merge_params(&mut response_params, params),
                    Err(e) => warn!("undecodable response parameters: {e}"),
                }
            }
            body.extend_from_slice(&headers.body);
            if let Some(end) = headers.end_of_body.as_deref() {
                body.extend_from_slice(end);
            }
            match response.code {
                ResponseCode::Continue => {
                    debug!("continue response, requesting the next fragment");
                    let continuation = GetRequest {
                        final_bit: true,
                        headers: self.base_headers(),
                    };
                    self.conn.write_request(continuation.encode()).await?;
                },
                ResponseCode::Success => {
                    return Ok(Some((response_params, body.freeze())));
                },
                code => {
                    error!("{operation} failed for pbobject {name:?}. reason = {code}");
                    return Ok(None);
                },
            }
        }
    }
}

fn merge_params(into: &mut ResponseParams, from: ResponseParams) {
    if from.phonebook_size.is_some() {
        into.phonebook_size = from.phonebook_size;
    }
    if from.new_missed_calls.is_some() {
        into.new_missed_calls = from.new_missed_calls;
    }
}
