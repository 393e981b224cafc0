// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use pbap_rs::params::{Order, SearchAttribute};

use crate::integration_tests::common::{
    connected_session, seeded_phonebook, test_config,
};

#[tokio::test]
async fn size_only_when_max_list_count_is_zero() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (params, data) = client
        .pull_vcard_listing("telecom/pb", Order::Indexed, None, SearchAttribute::Name, 0, 0)
        .await?
        .expect("listing failed");

    assert_eq!(params.phonebook_size, Some(3));
    assert!(data.is_empty(), "size-only response must carry no body");
    client.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn listing_renders_handles_and_names() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (_, data) = client
        .pull_vcard_listing(
            "telecom/pb",
            Order::Indexed,
            None,
            SearchAttribute::Name,
            65535,
            0,
        )
        .await?
        .expect("listing failed");

    assert!(data.starts_with(
        "<?xml version=\"1.0\"?>\r\n\
         <!DOCTYPE vcard-listing SYSTEM \"vcard-listing.dtd\">\r\n\
         <vCard-listing version=\"1.0\">\r\n"
    ));
    assert!(data.ends_with("</vCard-listing>\r\n"));
    // Seeded order: Roe, Doe, Poe.
    assert!(data.contains("<card handle=\"0.vcf\" name=\"Roe;Jane\"/>"));
    assert!(data.contains("<card handle=\"1.vcf\" name=\"Doe;John\"/>"));
    assert!(data.contains("<card handle=\"2.vcf\" name=\"Poe;Edgar\"/>"));
    Ok(())
}

#[tokio::test]
async fn offset_shifts_the_handle_numbering() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (_, data) = client
        .pull_vcard_listing(
            "telecom/pb",
            Order::Indexed,
            None,
            SearchAttribute::Name,
            1,
            1,
        )
        .await?
        .expect("listing failed");

    assert!(!data.contains("handle=\"0.vcf\""));
    assert!(data.contains("<card handle=\"1.vcf\" name=\"Doe;John\"/>"));
    assert!(!data.contains("handle=\"2.vcf\""));
    Ok(())
}

#[tokio::test]
async fn alphanumeric_order_sorts_by_name() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (_, data) = client
        .pull_vcard_listing(
            "telecom/pb",
            Order::Alphanumeric,
            None,
            SearchAttribute::Name,
            65535,
            0,
        )
        .await?
        .expect("listing failed");

    let doe = data.find("Doe;John").expect("Doe missing");
    let poe = data.find("Poe;Edgar").expect("Poe missing");
    let roe = data.find("Roe;Jane").expect("Roe missing");
    assert!(doe < poe && poe < roe, "names out of order: {data}");
    Ok(())
}

#[tokio::test]
async fn search_narrows_the_listing() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (_, data) = client
        .pull_vcard_listing(
            "telecom/pb",
            Order::Indexed,
            Some(b"Doe"),
            SearchAttribute::Name,
            65535,
            0,
        )
        .await?
        .expect("listing failed");

    assert!(data.contains("name=\"Doe;John\""));
    assert!(!data.contains("Roe;Jane"));
    assert!(!data.contains("Poe;Edgar"));
    Ok(())
}

#[tokio::test]
async fn missed_calls_counter_resets_after_a_pull() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let (first, _) = client
        .pull_vcard_listing(
            "telecom/mch",
            Order::Indexed,
            None,
            SearchAttribute::Name,
            65535,
            0,
        )
        .await?
        .expect("listing failed");
    assert_eq!(first.new_missed_calls, Some(2));

    let (second, _) = client
        .pull_vcard_listing(
            "telecom/mch",
            Order::Indexed,
            None,
            SearchAttribute::Name,
            65535,
            0,
        )
        .await?
        .expect("listing failed");
    assert_eq!(second.new_missed_calls, Some(0));
    Ok(())
}

#[tokio::test]
async fn listing_of_a_missing_folder_fails() -> Result<()> {
    let (mut client, _server) =
        connected_session(seeded_phonebook()?, test_config()).await?;

    let result = client
        .pull_vcard_listing(
            "telecom/nope",
            Order::Indexed,
            None,
            SearchAttribute::Name,
            65535,
            0,
        )
        .await?;
    assert!(result.is_none(), "missing folder must report a failure");

    // The session survives the failure.
    let again = client
        .pull_vcard_listing(
            "telecom/pb",
            Order::Indexed,
            None,
            SearchAttribute::Name,
            65535,
            0,
        )
        .await?;
    assert!(again.is_some());
    Ok(())
}
