// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PSE transaction engine.
//!
//! One engine instance serves one peer connection in strict
//! read-decode-dispatch-respond order; there is never a request in flight
//! while the next one is read, which keeps the Continue/Success streaming
//! state machine free of interleaving.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
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
        ConnectRequest, GetRequest, ObexPacket, Request, Response, SetPathFlags,
        SetPathRequest,
    },
};
use crate::params::{Order, PhonebookParams, ResponseParams, UNRESTRICTED_LIST_COUNT};
use crate::vcard::{VCard, filter, serialize::serialize};
use crate::vfolder::{self, Phonebook, SearchQuery, SortOrder};

const TYPE_PHONEBOOK: &str = "x-bt/phonebook";
const TYPE_VCARD_LISTING: &str = "x-bt/vcard-listing";
const TYPE_VCARD: &str = "x-bt/vcard";

const CONNECTION_ID: u32 = 1;

/// Whether the session continues after a request.
enum Flow {
    Continue,
    Disconnect,
}

/// Per-connection PSE state and request dispatcher.
pub struct PbapServer {
    vfolder: Arc<dyn Phonebook + Send + Sync>,
    cfg: Config,
    rootdir: String,
    current_dir: String,
    connected: bool,
    /// mch record count at the previous mch pull of THIS connection; the
    /// profile defines NewMissedCalls relative to it. Not persisted, so a
    /// reconnect reports the full folder size first.
    mch_seen: u16,
}

impl PbapServer {
    pub fn new(vfolder: Arc<dyn Phonebook + Send + Sync>, cfg: Config) -> Self {
        Self {
            vfolder,
            cfg,
            rootdir: "/".to_string(),
            current_dir: "/".to_string(),
            connected: false,
            mch_seen: 0,
        }
    }

    /// Runs the request loop until the peer disconnects or the transport
    /// fails. Protocol-level errors answer with a failure response and
    /// keep the loop alive.
    pub async fn serve_connection<S>(
        &mut self,
        stream: S,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut conn = ObexTransport::new(
            stream,
            self.cfg.transport.timeout_connection,
            cancel,
        );
        self.current_dir = self.rootdir.clone();
        self.connected = false;
        self.mch_seen = 0;

        loop {
            let raw = conn.read_packet().await?;
            let request = match Request::decode(&raw) {
                Ok(request) => request,
                Err(e) => {
                    warn!("undecodable request: {e}");
                    conn.write_response(&Response::empty(ResponseCode::BadRequest))
                        .await?;
                    continue;
                },
            };
            match self.process_request(&mut conn, request).await? {
                Flow::Continue => {},
                Flow::Disconnect => return Ok(()),
            }
        }
    }

    async fn process_request<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        request: Request,
    ) -> Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.connected && !matches!(request, Request::Connect(_)) {
            warn!("request before CONNECT; rejecting");
            conn.write_response(&Response::empty(ResponseCode::ServiceUnavailable))
                .await?;
            return Ok(Flow::Continue);
        }
        match request {
            Request::Connect(request) => {
                debug!("request type = connect");
                self.handle_connect(conn, &request).await?;
            },
            Request::Disconnect(_) => {
                debug!("request type = disconnect");
                conn.write_response(&Response::empty(ResponseCode::Success))
                    .await?;
                self.connected = false;
                self.current_dir = self.rootdir.clone();
                return Ok(Flow::Disconnect);
            },
            Request::Get(request) => {
                debug!("request type = get");
                self.handle_get(conn, &request).await?;
            },
            Request::SetPath(request) => {
                debug!("request type = setpath");
                self.handle_setpath(conn, &request).await?;
            },
            other => {
                debug!("request type = {:?} is not served; rejected", other.opcode());
                conn.write_response(&Response::empty(ResponseCode::Forbidden))
                    .await?;
            },
        }
        Ok(Flow::Continue)
    }

    async fn handle_connect<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        request: &ConnectRequest,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let headers = HeaderSet::collect(request.headers());
        match headers.target.as_deref() {
            Some(target) if target == PBAP_TARGET_UUID => {
                self.connected = true;
                let response = Response::connect(
                    ResponseCode::Success,
                    self.cfg.obex.max_packet_length,
                    vec![
                        Header::ConnectionId(CONNECTION_ID),
                        Header::Who(Bytes::from_static(&PBAP_TARGET_UUID)),
                    ],
                );
                conn.write_response(&response).await
            },
            Some(other) => {
                warn!("connect with foreign target {other:02x?}; rejecting");
                conn.write_response(&Response::empty(ResponseCode::BadRequest))
                    .await
            },
            None => {
                // Undirected connect; legal, just without a Who echo.
                warn!("connect without a Target header");
                self.connected = true;
                let response = Response::connect(
                    ResponseCode::Success,
                    self.cfg.obex.max_packet_length,
                    vec![Header::ConnectionId(CONNECTION_ID)],
                );
                conn.write_response(&response).await
            },
        }
    }

    async fn handle_setpath<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        request: &SetPathRequest,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let headers = HeaderSet::collect(request.headers());
        let name = headers.name.unwrap_or_default();
        let create_dir = !request.flags.contains(SetPathFlags::DONT_CREATE_DIR);
        let to_parent = request.flags.contains(SetPathFlags::NAVIGATE_TO_PARENT);
        info!("createdir = {create_dir}, toparent = {to_parent}, name = {name:?}");

        if to_parent {
            if self.current_dir == self.rootdir {
                error!("current directory is the root, cannot go to parent");
                return conn
                    .write_response(&Response::empty(ResponseCode::Forbidden))
                    .await;
            }
            self.current_dir = vfolder::join(&self.current_dir, "..");
            info!("setting current directory = {}", self.current_dir);
            if name.is_empty() {
                return conn
                    .write_response(&Response::empty(ResponseCode::Success))
                    .await;
            }
        }

        let requested = vfolder::join(&self.current_dir, &name);
        if create_dir {
            if self.vfolder.isdir(&requested) {
                error!("requested path already exists, cannot create it again");
                return conn
                    .write_response(&Response::empty(ResponseCode::PreconditionFailed))
                    .await;
            }
            if let Err(e) = self.vfolder.makedirs(&requested) {
                error!("makedirs {requested} failed: {e}");
                return conn
                    .write_response(&Response::empty(e.response_code()))
                    .await;
            }
            info!("created new directory = {requested}");
            self.current_dir = requested;
            info!("setting current directory = {}", self.current_dir);
            return conn
                .write_response(&Response::empty(ResponseCode::Success))
                .await;
        }

        if !self.vfolder.isdir(&requested) {
            error!("requested path does not exist, cannot enter it");
            return conn
                .write_response(&Response::empty(ResponseCode::PreconditionFailed))
                .await;
        }
        self.current_dir = requested;
        info!("setting current directory = {}", self.current_dir);
        conn.write_response(&Response::empty(ResponseCode::Success))
            .await
    }

    async fn handle_get<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        request: &GetRequest,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !request.final_bit {
            warn!("non-final GET outside a streamed response; rejecting");
            return conn
                .write_response(&Response::empty(ResponseCode::BadRequest))
                .await;
        }
        let headers = HeaderSet::collect(request.headers());
        let outcome = match headers.object_type.as_deref() {
            Some(TYPE_VCARD_LISTING) => self.pull_vcard_listing(conn, &headers).await,
            Some(TYPE_VCARD) => self.pull_vcard_entry(conn, &headers).await,
            Some(TYPE_PHONEBOOK) => self.pull_phonebook(conn, &headers).await,
            other => Err(PbapError::UnknownObjectType(
                other.unwrap_or_default().to_string(),
            )
            .into()),
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                let code = match e.downcast_ref::<PbapError>() {
                    Some(pbap) if !pbap.is_fatal() => Some(pbap.response_code()),
                    _ => None,
                };
                match code {
                    Some(code) => {
                        error!("request failed: {e:#}");
                        conn.write_response(&Response::empty(code)).await
                    },
                    None => Err(e),
                }
            },
        }
    }

    async fn pull_vcard_listing<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        headers: &HeaderSet,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let name = headers.name.as_deref().unwrap_or_default();
        let abs = vfolder::join(&self.current_dir, name);
        info!("absolute path of requested vcard-listing object = {abs}");
        let params = PhonebookParams::from_tlv(headers.app_parameters.as_deref())?;
        if !self.vfolder.isdir(&abs) {
            return Err(PbapError::NotADirectory(abs).into());
        }

        let phonebook_size = clamp_u16(self.vfolder.count(&abs)?);
        if params.max_list_count == 0 {
            return self.respond_phonebook_size(conn, phonebook_size).await;
        }

        let query = build_search_query(&params);
        let records =
            self.vfolder
                .listdir(&abs, query.as_ref(), sort_order(params.order))?;
        let window = limit_window(&records, &params);

        let mut cards = String::new();
        for (index, record) in
            (params.list_start_offset as usize..).zip(window.iter())
        {
            let name = record.joined_value("N").unwrap_or_default();
            cards.push_str(&format!(
                "<card handle=\"{index}.vcf\" name=\"{name}\"/>\r\n"
            ));
        }
        let data = format!(
            "<?xml version=\"1.0\"?>\r\n\
             <!DOCTYPE vcard-listing SYSTEM \"vcard-listing.dtd\">\r\n\
             <vCard-listing version=\"1.0\">\r\n\
             {cards}\
             </vCard-listing>\r\n"
        );
        debug!("vcard-listing data: \r\n{data}");

        let response_params = self.response_params_for(&abs, phonebook_size);
        let mut response_headers = vec![Header::EndOfBody(Bytes::from(data))];
        if !response_params.is_empty() {
            response_headers
                .push(Header::AppParameters(response_params.to_tlv().into()));
        }
        conn.write_response(&Response::new(ResponseCode::Success, response_headers))
            .await
    }

    async fn pull_vcard_entry<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        headers: &HeaderSet,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let name = headers.name.as_deref().unwrap_or_default();
        let abs = vfolder::join(&self.current_dir, name);
        info!("absolute path of requested vcard-entry object = {abs}");
        let params = PhonebookParams::from_tlv(headers.app_parameters.as_deref())?;
        if !self.vfolder.isfile(&abs) {
            return Err(PbapError::NotAFile(abs).into());
        }
        let record = self.vfolder.read(&abs)?;
        let data = render_record(&record, &params);
        debug!("vcard data: \r\n{data}");
        conn.write_response(&Response::new(
            ResponseCode::Success,
            vec![Header::EndOfBody(Bytes::from(data))],
        ))
        .await
    }

    async fn pull_phonebook<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        headers: &HeaderSet,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let name = headers.name.as_deref().unwrap_or_default();
        let abs = vfolder::join(&self.current_dir, name);
        info!("absolute path of requested phonebook object = {abs}");
        let params = PhonebookParams::from_tlv(headers.app_parameters.as_deref())?;
        if !self.vfolder.isfile(&abs) {
            return Err(PbapError::NotAFile(abs).into());
        }

        let folder = vfolder::strip_vcf(&abs).to_string();
        let phonebook_size = clamp_u16(self.vfolder.count(&folder)?);
        if params.max_list_count == 0 {
            return self.respond_phonebook_size(conn, phonebook_size).await;
        }

        let records = self.vfolder.listdir(&folder, None, SortOrder::Indexed)?;
        let window = limit_window(&records, &params);
        let response_params = self.response_params_for(&abs, phonebook_size);

        let mut data = String::new();
        for record in window {
            data.push_str(&render_record(record, &params));
        }
        debug!("phonebook data: \r\n{data}");

        self.send_streamed_body(conn, Bytes::from(data), &response_params)
            .await
    }

    /// MaxListCount = 0 asks for the number of used indexes only: the
    /// response carries the PhonebookSize parameter and no body.
    async fn respond_phonebook_size<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        phonebook_size: u16,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("MaxListCount is 0, responding with PhonebookSize = {phonebook_size}");
        let params = ResponseParams {
            phonebook_size: Some(phonebook_size),
            new_missed_calls: None,
        };
        conn.write_response(&Response::new(
            ResponseCode::Success,
            vec![Header::AppParameters(params.to_tlv().into())],
        ))
        .await
    }

    /// NewMissedCalls is attached when and only when the resolved target
    /// lives under `mch`: the number of missed calls received since the
    /// previous mch pull of this connection.
    fn response_params_for(&mut self, abs: &str, phonebook_size: u16) -> ResponseParams {
        if !vfolder::contains_component(abs, "mch") {
            return ResponseParams::default();
        }
        let missed = phonebook_size.saturating_sub(self.mch_seen).min(255) as u8;
        self.mch_seen = phonebook_size;
        ResponseParams {
            phonebook_size: None,
            new_missed_calls: Some(missed),
        }
    }

    /// Sends a response body, splitting it into a Continue chain when it
    /// exceeds the per-fragment cap. Response parameters ride on every
    /// fragment. Between fragments the peer's GET continuations are read
    /// and discarded until a final one arrives.
    async fn send_streamed_body<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
        data: Bytes,
        response_params: &ResponseParams,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let chunk_len = self.cfg.obex.max_body_chunk;
        let with_params = |mut headers: Vec<Header>| {
            if !response_params.is_empty() {
                headers.push(Header::AppParameters(response_params.to_tlv().into()));
            }
            headers
        };

        if data.len() <= chunk_len {
            let headers = with_params(vec![Header::EndOfBody(data)]);
            return conn
                .write_response(&Response::new(ResponseCode::Success, headers))
                .await;
        }

        let mut sent = 0;
        while sent < data.len() {
            let chunk = data.slice(sent..(sent + chunk_len).min(data.len()));
            sent += chunk.len();
            let headers = with_params(vec![Header::Body(chunk)]);
            conn.write_response(&Response::new(ResponseCode::Continue, headers))
                .await?;
            self.await_get_continuation(conn).await?;
        }

        let headers = with_params(vec![Header::EndOfBody(Bytes::new())]);
        conn.write_response(&Response::new(ResponseCode::Success, headers))
            .await
    }

    async fn await_get_continuation<S>(
        &mut self,
        conn: &mut ObexTransport<S>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let raw = conn.read_packet().await?;
            match Request::decode(&raw) {
                Ok(Request::Get(get)) if get.final_bit => return Ok(()),
                Ok(other) => {
                    warn!(
                        "discarding {:?} received during a streamed response",
                        other.opcode()
                    );
                },
                Err(e) => warn!("undecodable packet during a streamed response: {e}"),
            }
        }
    }
}

fn clamp_u16(n: usize) -> u16 {
    n.min(u16::MAX as usize) as u16
}

fn sort_order(order: Order) -> SortOrder {
    match order {
        Order::Indexed => SortOrder::Indexed,
        Order::Alphanumeric => SortOrder::Alphanumeric,
        Order::Phonetical => SortOrder::Phonetical,
    }
}

/// An empty search value disables the search; so does an attribute octet
/// outside the defined range, with a warning.
fn build_search_query(params: &PhonebookParams) -> Option<SearchQuery> {
    if params.search_value.is_empty() {
        return None;
    }
    match params.search_attribute.query_attribute() {
        Some(attribute) => Some(SearchQuery {
            attribute: attribute.to_string(),
            value: String::from_utf8_lossy(&params.search_value).into_owned(),
        }),
        None => {
            warn!(
                "unsupported value for SearchAttribute={}",
                params.search_attribute.as_u8()
            );
            None
        },
    }
}

/// Applies ListStartOffset and MaxListCount (65535 = unrestricted).
fn limit_window<'a>(records: &'a [VCard], params: &PhonebookParams) -> &'a [VCard] {
    let start = (params.list_start_offset as usize).min(records.len());
    let sliced = &records[start..];
    if params.max_list_count == UNRESTRICTED_LIST_COUNT {
        sliced
    } else {
        &sliced[..(params.max_list_count as usize).min(sliced.len())]
    }
}

fn render_record(record: &VCard, params: &PhonebookParams) -> String {
    let filtered = filter::apply(record, params.filter, params.format);
    serialize(&filtered, params.format)
}
