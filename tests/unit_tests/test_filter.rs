// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use pbap_rs::params::Format;
use pbap_rs::vcard::filter::{FILTER_ATTRS, FilterMask, apply, mandatory};
use pbap_rs::vcard::{Property, VCard};

fn sample_card() -> VCard {
    VCard {
        properties: vec![
            Property::new("N", Vec::new(), vec!["Doe".into(), "John".into()]),
            Property::new("FN", Vec::new(), vec!["John Doe".into()]),
            Property::new("TEL", Vec::new(), vec!["+15551234".into()]),
            Property::new("EMAIL", Vec::new(), vec!["john@example.com".into()]),
            Property::new("NOTE", Vec::new(), vec!["likes trains".into()]),
        ],
    }
}

#[test]
fn zero_mask_means_no_filter() {
    let card = sample_card();
    assert_eq!(apply(&card, 0, Format::V2_1), card);
}

#[test]
fn tel_only_mask_keeps_mandatory_floor_at_2_1() {
    let filtered = apply(&sample_card(), FilterMask::TEL.bits(), Format::V2_1);
    let names: Vec<&str> = filtered.properties.iter().map(|p| p.name.as_str()).collect();
    // 2.1 mandatory floor is VERSION|N|TEL; VERSION lives in the framing,
    // so N and TEL survive and everything else is gone.
    assert_eq!(names, vec!["N", "TEL"]);
}

#[test]
fn mandatory_floor_at_3_0_includes_fn() {
    let filtered = apply(&sample_card(), FilterMask::TEL.bits(), Format::V3_0);
    let names: Vec<&str> = filtered.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["N", "FN", "TEL"]);
}

#[test]
fn selected_bits_keep_their_properties() {
    let mask = FilterMask::EMAIL.union(FilterMask::NOTE).bits();
    let filtered = apply(&sample_card(), mask, Format::V2_1);
    let names: Vec<&str> = filtered.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["N", "TEL", "EMAIL", "NOTE"]);
}

#[test]
fn proprietary_bits_are_ignored() {
    // Bit 45 is proprietary; alone it selects nothing beyond the floor.
    let filtered = apply(&sample_card(), 1 << 45, Format::V2_1);
    let names: Vec<&str> = filtered.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["N", "TEL"]);
}

#[test]
fn every_surviving_property_is_mandatory_or_selected() {
    let mask = FilterMask::EMAIL.bits();
    for version in [Format::V2_1, Format::V3_0] {
        let filtered = apply(&sample_card(), mask, version);
        for property in &filtered.properties {
            let bit = FILTER_ATTRS
                .iter()
                .find(|(_, name)| *name == property.name)
                .map(|(bit, _)| *bit)
                .expect("filtered property must be a known attribute");
            let allowed =
                mandatory(version).contains(bit) || FilterMask::EMAIL.contains(bit);
            assert!(allowed, "{} escaped the filter", property.name);
        }
    }
}

#[test]
fn mandatory_masks_match_the_profile() {
    assert_eq!(mandatory(Format::V2_1).bits(), 0b1000_0101);
    assert_eq!(mandatory(Format::V3_0).bits(), 0b1000_0111);
}

#[test]
fn preserves_property_order() {
    let mask = FilterMask::NOTE.union(FilterMask::EMAIL).bits();
    let filtered = apply(&sample_card(), mask, Format::V2_1);
    let names: Vec<&str> = filtered.properties.iter().map(|p| p.name.as_str()).collect();
    // Source order, not mask order.
    assert_eq!(names, vec!["N", "TEL", "EMAIL", "NOTE"]);
}
