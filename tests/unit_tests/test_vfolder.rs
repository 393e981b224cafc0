// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use pbap_rs::errors::PbapError;
use pbap_rs::vfolder::{
    Phonebook, SearchQuery, SortOrder, contains_component, fs::FsPhonebook, join,
    mem::MemPhonebook, parent, strip_vcf,
};
use serial_test::serial;

const CARD_DOE: &str = "BEGIN:VCARD\r\nVERSION:2.1\r\nN:Doe;John\r\nTEL:+15551234\r\nEND:VCARD\r\n";
const CARD_ROE: &str = "BEGIN:VCARD\r\nVERSION:2.1\r\nN:Roe;Jane\r\nTEL:+15554321\r\nEND:VCARD\r\n";
const CARD_NO_NAME: &str = "BEGIN:VCARD\r\nVERSION:2.1\r\nTEL:+15550000\r\nEND:VCARD\r\n";

#[test]
fn join_normalizes_paths() {
    assert_eq!(join("/", "telecom"), "/telecom");
    assert_eq!(join("/telecom", "pb"), "/telecom/pb");
    assert_eq!(join("/telecom/pb", ".."), "/telecom");
    assert_eq!(join("/", ".."), "/");
    assert_eq!(join("/telecom", ""), "/telecom");
    assert_eq!(join("/telecom", "/SIM1/telecom"), "/SIM1/telecom");
    assert_eq!(join("/a//b", "./c"), "/a/b/c");
}

#[test]
fn parent_stops_at_root() {
    assert_eq!(parent("/telecom/pb"), "/telecom");
    assert_eq!(parent("/telecom"), "/");
    assert_eq!(parent("/"), "/");
}

#[test]
fn component_check_sees_through_vcf_suffix() {
    assert!(contains_component("/telecom/mch", "mch"));
    assert!(contains_component("/telecom/mch.vcf", "mch"));
    assert!(contains_component("/telecom/mch/3.vcf", "mch"));
    assert!(!contains_component("/telecom/pb", "mch"));
    assert!(!contains_component("/telecom/mchx", "mch"));
}

#[test]
fn strip_vcf_only_removes_the_suffix() {
    assert_eq!(strip_vcf("/telecom/pb.vcf"), "/telecom/pb");
    assert_eq!(strip_vcf("/telecom/pb"), "/telecom/pb");
}

#[test]
fn mem_backend_exposes_the_wellknown_tree() {
    let book = MemPhonebook::new();
    for dir in [
        "/",
        "/telecom",
        "/telecom/pb",
        "/telecom/mch",
        "/SIM1/telecom",
        "/SIM1/telecom/fav",
    ] {
        assert!(book.isdir(dir), "{dir} should be a directory");
    }
    assert!(!book.isdir("/telecom/unknown"));
    // Empty books still expose their whole-phonebook file.
    assert!(book.isfile("/telecom/pb.vcf"));
    assert!(!book.isfile("/telecom/pb/0.vcf"));
}

#[test]
fn mem_backend_indexes_inserted_records() {
    let book = MemPhonebook::with_records(&[
        ("/telecom/pb", CARD_DOE),
        ("/telecom/pb", CARD_ROE),
    ])
    .expect("seed failed");
    assert!(book.isfile("/telecom/pb/0.vcf"));
    assert!(book.isfile("/telecom/pb/1.vcf"));
    assert!(!book.isfile("/telecom/pb/2.vcf"));
    assert_eq!(book.count("/telecom/pb").expect("count failed"), 2);

    let record = book.read("/telecom/pb/1.vcf").expect("read failed");
    assert_eq!(record.joined_value("N").as_deref(), Some("Roe;Jane"));
}

#[test]
fn mem_backend_reads_whole_phonebook_as_merged_record() {
    let book = MemPhonebook::with_records(&[
        ("/telecom/pb", CARD_DOE),
        ("/telecom/pb", CARD_ROE),
    ])
    .expect("seed failed");
    let merged = book.read("/telecom/pb.vcf").expect("read failed");
    assert_eq!(merged.properties.len(), 4);
}

#[test]
fn mem_backend_makedirs_is_create_or_fail() {
    let book = MemPhonebook::new();
    book.makedirs("/telecom/extra").expect("create failed");
    assert!(book.isdir("/telecom/extra"));
    let err = book
        .makedirs("/telecom/extra")
        .expect_err("second create must fail");
    assert!(matches!(err, PbapError::PathExists(_)), "{err}");
}

#[test]
fn listdir_sorts_alphanumerically_with_missing_keys_last() {
    let book = MemPhonebook::with_records(&[
        ("/telecom/pb", CARD_ROE),
        ("/telecom/pb", CARD_NO_NAME),
        ("/telecom/pb", CARD_DOE),
    ])
    .expect("seed failed");
    let records = book
        .listdir("/telecom/pb", None, SortOrder::Alphanumeric)
        .expect("listdir failed");
    let names: Vec<Option<String>> =
        records.iter().map(|r| r.joined_value("N")).collect();
    assert_eq!(
        names,
        vec![
            Some("Doe;John".to_string()),
            Some("Roe;Jane".to_string()),
            None
        ]
    );
}

#[test]
fn listdir_keeps_backing_order_when_indexed() {
    let book = MemPhonebook::with_records(&[
        ("/telecom/pb", CARD_ROE),
        ("/telecom/pb", CARD_DOE),
    ])
    .expect("seed failed");
    let records = book
        .listdir("/telecom/pb", None, SortOrder::Indexed)
        .expect("listdir failed");
    assert_eq!(records[0].joined_value("N").as_deref(), Some("Roe;Jane"));
}

#[test]
fn listdir_applies_the_search_query() {
    let book = MemPhonebook::with_records(&[
        ("/telecom/pb", CARD_DOE),
        ("/telecom/pb", CARD_ROE),
    ])
    .expect("seed failed");
    let query = SearchQuery {
        attribute: "N".to_string(),
        value: "Doe".to_string(),
    };
    let records = book
        .listdir("/telecom/pb", Some(&query), SortOrder::Indexed)
        .expect("listdir failed");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].joined_value("N").as_deref(), Some("Doe;John"));

    // Exact value-slot match: a substring does not qualify.
    let query = SearchQuery {
        attribute: "N".to_string(),
        value: "Do".to_string(),
    };
    let records = book
        .listdir("/telecom/pb", Some(&query), SortOrder::Indexed)
        .expect("listdir failed");
    assert!(records.is_empty());
}

#[test]
fn listdir_on_a_file_path_fails() {
    let book = MemPhonebook::new();
    let err = book
        .listdir("/telecom/pb/0.vcf", None, SortOrder::Indexed)
        .expect_err("listdir on a file must fail");
    assert!(matches!(err, PbapError::NotADirectory(_)), "{err}");
}

#[test]
#[serial]
fn fs_backend_serves_a_mirrored_tree() {
    let root = std::env::temp_dir().join(format!("pbap-fs-test-{}", std::process::id()));
    let pb = root.join("telecom/pb");
    std::fs::create_dir_all(&pb).expect("mkdir failed");
    std::fs::write(pb.join("0.vcf"), CARD_DOE).expect("write failed");
    std::fs::write(pb.join("1.vcf"), CARD_ROE).expect("write failed");
    std::fs::write(root.join("telecom/pb.vcf"), format!("{CARD_DOE}{CARD_ROE}"))
        .expect("write failed");

    let book = FsPhonebook::new(root.as_path());
    assert!(book.isdir("/telecom/pb"));
    assert!(book.isfile("/telecom/pb.vcf"));
    assert!(book.isfile("/telecom/pb/0.vcf"));
    assert_eq!(book.count("/telecom/pb").expect("count failed"), 2);

    let records = book
        .listdir("/telecom/pb", None, SortOrder::Indexed)
        .expect("listdir failed");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].joined_value("N").as_deref(), Some("Doe;John"));

    // The concatenation file parses into one merged record.
    let merged = book.read("/telecom/pb.vcf").expect("read failed");
    assert_eq!(merged.properties.len(), 4);

    book.makedirs("/telecom/extra").expect("create failed");
    let err = book
        .makedirs("/telecom/extra")
        .expect_err("second create must fail");
    assert!(matches!(err, PbapError::PathExists(_)), "{err}");

    std::fs::remove_dir_all(&root).expect("cleanup failed");
}
