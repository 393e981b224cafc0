// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use pbap_rs::obex::PBAP_TARGET_UUID;
use pbap_rs::obex::conn::ObexTransport;
use pbap_rs::obex::header::Header;
use pbap_rs::obex::opcode::ResponseCode;
use pbap_rs::obex::packet::{
    ConnectRequest, ObexPacket, SetPathFlags, SetPathRequest,
};
use pbap_rs::server::PbapServer;
use tokio::io::DuplexStream;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{
    connected_session, seeded_phonebook, test_config,
};

#[tokio::test]
async fn navigation_mirrors_the_server_folder() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    client
        .set_phonebook("telecom", false, false)
        .await?
        .expect("set_phonebook failed");
    assert_eq!(client.current_dir, "/telecom");

    client
        .set_phonebook("pb", false, false)
        .await?
        .expect("set_phonebook failed");
    assert_eq!(client.current_dir, "/telecom/pb");

    client
        .set_phonebook("", false, true)
        .await?
        .expect("to_parent failed");
    assert_eq!(client.current_dir, "/telecom");

    client
        .set_phonebook("", true, false)
        .await?
        .expect("to_root failed");
    assert_eq!(client.current_dir, "/");
    Ok(())
}

#[tokio::test]
async fn to_parent_at_root_is_refused_locally() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let result = client.set_phonebook("", false, true).await?;
    assert!(result.is_none());
    assert_eq!(client.current_dir, "/");
    Ok(())
}

#[tokio::test]
async fn entering_a_missing_folder_fails_and_keeps_the_folder() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let result = client.set_phonebook("nope", false, false).await?;
    assert!(result.is_none());
    assert_eq!(client.current_dir, "/");

    // The connection is still usable afterwards.
    client
        .set_phonebook("telecom", false, false)
        .await?
        .expect("set_phonebook failed");
    Ok(())
}

#[tokio::test]
async fn missing_navigation_target_is_invalid() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;
    assert!(client.set_phonebook("", false, false).await.is_err());
    Ok(())
}

#[tokio::test]
async fn disconnect_ends_the_session() -> Result<()> {
    let (mut client, server) =
        connected_session(seeded_phonebook()?, test_config()).await?;
    client.disconnect().await?;
    let outcome = server.await?;
    assert!(outcome.is_ok(), "server session must end cleanly: {outcome:?}");
    Ok(())
}

async fn raw_connected_session()
-> Result<(ObexTransport<DuplexStream>, tokio::task::JoinHandle<Result<()>>)> {
    let backend = seeded_phonebook()?;
    let cfg = test_config();
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let mut engine = PbapServer::new(backend, cfg);
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
        max_packet_length: 8192,
        headers: vec![Header::Target(Bytes::from_static(&PBAP_TARGET_UUID))],
    };
    conn.write_request(connect.encode()).await?;
    assert_eq!(conn.read_response(true).await?.code, ResponseCode::Success);
    Ok((conn, server))
}

async fn send_setpath(
    conn: &mut ObexTransport<DuplexStream>,
    name: &str,
    flags: SetPathFlags,
) -> Result<ResponseCode> {
    let request = SetPathRequest {
        flags,
        headers: vec![Header::Name(name.to_string())],
    };
    conn.write_request(request.encode()).await?;
    Ok(conn.read_response(false).await?.code)
}

#[tokio::test]
async fn server_forbids_parent_navigation_at_root() -> Result<()> {
    let (mut conn, _server) = raw_connected_session().await?;
    let code = send_setpath(
        &mut conn,
        "",
        SetPathFlags::NAVIGATE_TO_PARENT | SetPathFlags::DONT_CREATE_DIR,
    )
    .await?;
    assert_eq!(code, ResponseCode::Forbidden);

    // The refusal did not move the folder: entering `telecom` still works
    // relative to the root.
    let code = send_setpath(&mut conn, "telecom", SetPathFlags::DONT_CREATE_DIR).await?;
    assert_eq!(code, ResponseCode::Success);
    Ok(())
}

#[tokio::test]
async fn empty_name_without_flags_is_a_noop_success() -> Result<()> {
    let (mut conn, _server) = raw_connected_session().await?;
    let code = send_setpath(&mut conn, "", SetPathFlags::DONT_CREATE_DIR).await?;
    assert_eq!(code, ResponseCode::Success);
    Ok(())
}

#[tokio::test]
async fn auto_create_is_create_or_fail() -> Result<()> {
    let (mut conn, _server) = raw_connected_session().await?;

    let code = send_setpath(&mut conn, "newdir", SetPathFlags::empty()).await?;
    assert_eq!(code, ResponseCode::Success);

    // Navigate back up; creating the same folder again must fail.
    let code = send_setpath(
        &mut conn,
        "",
        SetPathFlags::NAVIGATE_TO_PARENT | SetPathFlags::DONT_CREATE_DIR,
    )
    .await?;
    assert_eq!(code, ResponseCode::Success);
    let code = send_setpath(&mut conn, "newdir", SetPathFlags::empty()).await?;
    assert_eq!(code, ResponseCode::PreconditionFailed);
    Ok(())
}
