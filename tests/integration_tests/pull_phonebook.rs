// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use pbap_rs::obex::PBAP_TARGET_UUID;
use pbap_rs::obex::conn::ObexTransport;
use pbap_rs::obex::header::{Header, HeaderSet};
use pbap_rs::obex::opcode::ResponseCode;
use pbap_rs::obex::packet::{ConnectRequest, GetRequest, ObexPacket};
use pbap_rs::params::{Format, ResponseParams};
use pbap_rs::server::PbapServer;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{
    connected_session, seeded_phonebook, test_config,
};

#[tokio::test]
async fn phonebook_streams_and_reassembles() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (_, data) = client
        .pull_phonebook("telecom/pb.vcf", 0, Format::V2_1, 65535, 0)
        .await?
        .expect("phonebook failed");

    // Three cards, well above the 64-byte fragment cap, so the body went
    // through the Continue chain and must reassemble seamlessly.
    assert!(data.len() > 64);
    assert_eq!(data.matches("BEGIN:VCARD").count(), 3);
    assert_eq!(data.matches("END:VCARD").count(), 3);
    assert!(data.contains("N;CHARSET=UTF-8;ENCODING=QUOTED-PRINTABLE:Roe;Jane"));
    Ok(())
}

#[tokio::test]
async fn phonebook_size_only_response() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (params, data) = client
        .pull_phonebook("telecom/pb.vcf", 0, Format::V2_1, 0, 0)
        .await?
        .expect("phonebook failed");
    assert_eq!(params.phonebook_size, Some(3));
    assert!(data.is_empty());
    Ok(())
}

#[tokio::test]
async fn offset_and_limit_select_a_window() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (_, data) = client
        .pull_phonebook("telecom/pb.vcf", 0, Format::V2_1, 1, 1)
        .await?
        .expect("phonebook failed");
    assert_eq!(data.matches("BEGIN:VCARD").count(), 1);
    assert!(data.contains("Doe;John"));
    Ok(())
}

#[tokio::test]
async fn missed_calls_ride_on_the_phonebook_response() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (first, data) = client
        .pull_phonebook("telecom/mch.vcf", 0, Format::V2_1, 65535, 0)
        .await?
        .expect("phonebook failed");
    assert_eq!(first.new_missed_calls, Some(2));
    assert!(data.contains("X-IRMC-CALL-DATETIME"));

    let (second, _) = client
        .pull_phonebook("telecom/mch.vcf", 0, Format::V2_1, 65535, 0)
        .await?
        .expect("phonebook failed");
    assert_eq!(second.new_missed_calls, Some(0));
    Ok(())
}

/// Drives the GET by hand to observe each fragment: every Continue must
/// carry the response parameters, and the final Success closes with an
/// empty End-Of-Body.
#[tokio::test]
async fn every_fragment_carries_the_response_parameters() -> Result<()> {
    let backend = seeded_phonebook()?;
    let cfg = test_config();
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let server_cfg = cfg.clone();
    let _server = tokio::spawn(async move {
        let mut engine = PbapServer::new(backend, server_cfg);
        engine
            .serve_connection(server_end, CancellationToken::new())
            .await
    });

    let mut conn = ObexTransport::new(
        client_end,
        Duration::from_secs(5),
        CancellationToken::new(),
    );
    let connect = ConnectRequest {
        max_packet_length: cfg.obex.max_packet_length,
        headers: vec![Header::Target(Bytes::from_static(&PBAP_TARGET_UUID))],
    };
    conn.write_request(connect.encode()).await?;
    assert_eq!(conn.read_response(true).await?.code, ResponseCode::Success);

    let get = GetRequest {
        final_bit: true,
        headers: vec![
            Header::Name("telecom/mch.vcf".to_string()),
            Header::Type("x-bt/phonebook".to_string()),
        ],
    };
    conn.write_request(get.encode()).await?;

    let mut fragments = 0;
    loop {
        let response = conn.read_response(false).await?;
        let headers = HeaderSet::collect(&response.headers);
        let params = headers
            .app_parameters
            .as_deref()
            .map(ResponseParams::from_tlv)
            .transpose()?
            .unwrap_or_default();
        assert_eq!(
            params.new_missed_calls,
            Some(2),
            "fragment without NewMissedCalls"
        );
        match response.code {
            ResponseCode::Continue => {
                fragments += 1;
                assert!(!headers.body.is_empty(), "Continue without a Body chunk");
                let continuation = GetRequest {
                    final_bit: true,
                    headers: Vec::new(),
                };
                conn.write_request(continuation.encode()).await?;
            },
            ResponseCode::Success => {
                assert_eq!(
                    headers.end_of_body.as_deref(),
                    Some(&b""[..]),
                    "final fragment must close with an empty End-Of-Body"
                );
                break;
            },
            other => panic!("unexpected response code {other}"),
        }
    }
    assert!(fragments >= 1, "body never entered the Continue chain");
    Ok(())
}

#[tokio::test]
async fn missing_phonebook_file_is_not_found() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let result = client
        .pull_phonebook("telecom/nope.vcf", 0, Format::V2_1, 65535, 0)
        .await?;
    assert!(result.is_none());
    Ok(())
}
