// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Packet-level transport shared by the PSE engine and the PCE client.
//!
//! OBEX packets are self-framing: the first three bytes carry the
//! opcode/response code and the total packet length, so one read of the
//! prefix followed by one read of the remainder yields exactly one packet.
//! The underlying stream is any ordered byte transport; the Bluetooth
//! RFCOMM channel, a TCP socket, or an in-process duplex all work.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::obex::PACKET_PREFIX_LEN;
use crate::obex::packet::{Request, Response};

pub(crate) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(anyhow!("{label} cancelled")),
        res = timeout(io_timeout, fut) => {
            match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow!("{label} timeout")),
            }
        }
    }
}

/// An OBEX packet pipe over an ordered byte stream.
#[derive(Debug)]
pub struct ObexTransport<S> {
    stream: S,
    io_timeout: Duration,
    cancel: CancellationToken,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ObexTransport<S> {
    pub fn new(stream: S, io_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            stream,
            io_timeout,
            cancel,
        }
    }

    /// Reads exactly one packet off the wire and returns its raw bytes.
    pub async fn read_packet(&mut self) -> Result<Bytes> {
        let mut prefix = [0u8; PACKET_PREFIX_LEN];
        io_with_timeout(
            "read packet prefix",
            self.stream.read_exact(&mut prefix),
            self.io_timeout,
            &self.cancel,
        )
        .await?;

        let total = u16::from_be_bytes([prefix[1], prefix[2]]) as usize;
        if total < PACKET_PREFIX_LEN {
            bail!("peer announced impossible packet length {total}");
        }

        let mut packet = BytesMut::with_capacity(total);
        packet.extend_from_slice(&prefix);
        packet.resize(total, 0);
        if total > PACKET_PREFIX_LEN {
            io_with_timeout(
                "read packet body",
                self.stream.read_exact(&mut packet[PACKET_PREFIX_LEN..]),
                self.io_timeout,
                &self.cancel,
            )
            .await?;
        }
        Ok(packet.freeze())
    }

    pub async fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        io_with_timeout(
            "write packet",
            self.stream.write_all(packet),
            self.io_timeout,
            &self.cancel,
        )
        .await?;
        io_with_timeout(
            "flush packet",
            self.stream.flush(),
            self.io_timeout,
            &self.cancel,
        )
        .await
    }

    /// Server side: next request from the peer.
    pub async fn read_request(&mut self) -> Result<Request> {
        let raw = self.read_packet().await?;
        Request::decode(&raw)
    }

    /// Client side: next response. `to_connect` selects the CONNECT
    /// prelude layout.
    pub async fn read_response(&mut self, to_connect: bool) -> Result<Response> {
        let raw = self.read_packet().await?;
        Response::decode(&raw, to_connect)
    }

    pub async fn write_response(&mut self, response: &Response) -> Result<()> {
        self.write_packet(&response.encode()).await
    }

    pub async fn write_request(&mut self, packet: Bytes) -> Result<()> {
        self.write_packet(&packet).await
    }
}
