// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use pbap_rs::cfg::config::Config;
use pbap_rs::client::PbapClient;
use pbap_rs::server::PbapServer;
use pbap_rs::vfolder::mem::MemPhonebook;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const CARD_DOE: &str = "BEGIN:VCARD\r\n\
                            VERSION:2.1\r\n\
                            N:Doe;John\r\n\
                            FN:John Doe\r\n\
                            TEL:+15551234\r\n\
                            EMAIL:john@example.com\r\n\
                            END:VCARD\r\n";

pub const CARD_ROE: &str = "BEGIN:VCARD\r\n\
                            VERSION:2.1\r\n\
                            N:Roe;Jane\r\n\
                            FN:Jane Roe\r\n\
                            TEL:+15554321\r\n\
                            END:VCARD\r\n";

pub const CARD_POE: &str = "BEGIN:VCARD\r\n\
                            VERSION:2.1\r\n\
                            N:Poe;Edgar\r\n\
                            FN:Edgar Poe\r\n\
                            TEL:+15559999\r\n\
                            NOTE:quoth the raven nevermore and then some more padding\r\n\
                            END:VCARD\r\n";

pub const CARD_MISSED_1: &str = "BEGIN:VCARD\r\n\
                                 VERSION:2.1\r\n\
                                 N:Doe;John\r\n\
                                 TEL:+15551234\r\n\
                                 X-IRMC-CALL-DATETIME;MISSED:20050320T100000\r\n\
                                 END:VCARD\r\n";

pub const CARD_MISSED_2: &str = "BEGIN:VCARD\r\n\
                                 VERSION:2.1\r\n\
                                 N:Roe;Jane\r\n\
                                 TEL:+15554321\r\n\
                                 X-IRMC-CALL-DATETIME;MISSED:20050321T090000\r\n\
                                 END:VCARD\r\n";

/// Small fragment cap so the Continue chain triggers with modest bodies.
pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.obex.max_body_chunk = 64;
    cfg
}

pub fn seeded_phonebook() -> Result<Arc<MemPhonebook>> {
    let book = MemPhonebook::with_records(&[
        ("/telecom/pb", CARD_ROE),
        ("/telecom/pb", CARD_DOE),
        ("/telecom/pb", CARD_POE),
        ("/telecom/mch", CARD_MISSED_1),
        ("/telecom/mch", CARD_MISSED_2),
    ])?;
    Ok(Arc::new(book))
}

/// Spawns an engine on one end of an in-process duplex transport and
/// returns a connected client on the other.
pub async fn connected_session(
    backend: Arc<MemPhonebook>,
    cfg: Config,
) -> Result<(PbapClient<DuplexStream>, JoinHandle<Result<()>>)> {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let server_cfg = cfg.clone();
    let handle = tokio::spawn(async move {
        let mut engine = PbapServer::new(backend, server_cfg);
        engine
            .serve_connection(server_end, CancellationToken::new())
            .await
    });
    let mut client = PbapClient::new(client_end, &cfg, CancellationToken::new());
    client.connect().await?;
    Ok((client, handle))
}
