// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use pbap_rs::params::Format;
use pbap_rs::vcard::filter::FilterMask;

use crate::integration_tests::common::{
    connected_session, seeded_phonebook, test_config,
};

#[tokio::test]
async fn entry_is_served_from_the_current_folder() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    client
        .set_phonebook("telecom/pb", false, false)
        .await?
        .expect("set_phonebook failed");
    assert_eq!(client.current_dir, "/telecom/pb");

    let (_, card) = client
        .pull_vcard_entry("1.vcf", 0, Format::V2_1)
        .await?
        .expect("entry failed");
    assert!(card.starts_with("BEGIN:VCARD\r\nVERSION:2.1\r\n"));
    assert!(card.contains("N;CHARSET=UTF-8;ENCODING=QUOTED-PRINTABLE:Doe;John"));
    assert!(card.ends_with("END:VCARD\r\n"));
    Ok(())
}

#[tokio::test]
async fn filter_mask_trims_the_entry() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    client
        .set_phonebook("telecom/pb", false, false)
        .await?
        .expect("set_phonebook failed");

    let (_, card) = client
        .pull_vcard_entry("1.vcf", FilterMask::TEL.bits(), Format::V2_1)
        .await?
        .expect("entry failed");
    // Mandatory floor keeps N and TEL; the rest is filtered out.
    assert!(card.contains("N;"));
    assert!(card.contains("TEL:+15551234"));
    assert!(!card.contains("EMAIL"));
    assert!(!card.contains("FN"));
    Ok(())
}

#[tokio::test]
async fn entry_renders_the_requested_version() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    client
        .set_phonebook("telecom/pb", false, false)
        .await?
        .expect("set_phonebook failed");

    let (_, card) = client
        .pull_vcard_entry("1.vcf", 0, Format::V3_0)
        .await?
        .expect("entry failed");
    assert!(card.contains("VERSION:3.0"));
    assert!(card.contains("N:Doe;John"));
    Ok(())
}

#[tokio::test]
async fn out_of_range_entry_is_not_found() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    client
        .set_phonebook("telecom/pb", false, false)
        .await?
        .expect("set_phonebook failed");

    let result = client.pull_vcard_entry("99.vcf", 0, Format::V2_1).await?;
    assert!(result.is_none());
    Ok(())
}
